// error types for cpu affinity operations

use {std::io, thiserror::Error};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CpuAffinityError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CPU affinity operations are not supported on this platform")]
    NotSupported,

    #[error("CPU {cpu} is invalid (max CPU is {max})")]
    InvalidCpu { cpu: usize, max: usize },
}
