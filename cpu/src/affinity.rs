// cpu pinning for the contention demos and latency runs
//
// a pinned reader and writer on distinct physical cores is the setup the
// seqlock padding exists for; unpinned threads migrate and muddy any
// latency measurement

use {
    crate::error::CpuAffinityError,
    std::io,
};

// maximum cpu id addressable through cpu_set_t
// standard glibc value, fixed at 1024 across major distros
#[cfg(target_os = "linux")]
const CPU_SETSIZE: usize = 1024;

// pin the calling thread to a single cpu
#[cfg(target_os = "linux")]
pub fn pin_to_cpu(cpu: usize) -> Result<(), CpuAffinityError> {
    let max = cpu_count()?.saturating_sub(1);
    if cpu > max || cpu >= CPU_SETSIZE {
        return Err(CpuAffinityError::InvalidCpu { cpu, max });
    }

    // safety: cpu_set_t is a pod type, zero-initialization is the documented init
    let mut cpu_set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    // safety: cpu validated against CPU_SETSIZE above
    unsafe {
        libc::CPU_SET(cpu, &mut cpu_set);
    }

    // safety: pid 0 targets the calling thread, set is fully initialized
    let result = unsafe {
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &cpu_set)
    };

    if result != 0 {
        return Err(CpuAffinityError::Io(io::Error::last_os_error()));
    }

    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn pin_to_cpu(_cpu: usize) -> Result<(), CpuAffinityError> {
    Err(CpuAffinityError::NotSupported)
}

// number of online logical cpus (hyperthreads included)
#[cfg(target_os = "linux")]
pub fn cpu_count() -> Result<usize, CpuAffinityError> {
    // safety: sysconf is always safe to call
    let count = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };

    if count <= 0 {
        return Err(CpuAffinityError::Io(io::Error::last_os_error()));
    }

    Ok(count as usize)
}

#[cfg(not(target_os = "linux"))]
pub fn cpu_count() -> Result<usize, CpuAffinityError> {
    Err(CpuAffinityError::NotSupported)
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_count_positive() {
        assert!(cpu_count().unwrap() >= 1);
    }

    #[test]
    fn test_pin_to_cpu_zero() {
        // cpu 0 is always online
        pin_to_cpu(0).unwrap();
    }

    #[test]
    fn test_pin_to_invalid_cpu() {
        let err = pin_to_cpu(usize::MAX).unwrap_err();
        assert!(matches!(err, CpuAffinityError::InvalidCpu { .. }));
    }
}
