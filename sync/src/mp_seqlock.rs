//! multi-writer sequence lock.
//!
//! identical storage and reader protocol to [`SpSeqLock`](crate::SpSeqLock),
//! but any number of threads may write. writers arbitrate through a single
//! compare-and-swap on the version counter: whoever flips it from an even
//! value to odd holds exclusive mutation rights until it stores the matching
//! even value back. losers reload and retry.
//!
//! the arbitration loop is livelock-free only probabilistically - a writer
//! can in principle lose the CAS forever under pathological scheduling. that
//! is the standard CAS fairness trade-off, accepted here; there is no
//! fairness guarantee among writers, last completed write wins.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use strand_cpu::{compiler_barrier, fence_acquire, spin_backoff, CachePadded};

/// a sequence lock safe for any number of concurrent writers.
///
/// same `T: Copy` precondition as the single-writer variant: torn copies
/// must be discardable without running any recovery code.
///
/// each write costs one contended CAS on top of the two counter stores; if
/// the call sites can guarantee a single writer, `SpSeqLock` avoids that.
#[repr(C)]
pub struct MpSeqLock<T> {
    version: CachePadded<AtomicUsize>,
    data: UnsafeCell<T>,
}

// safety: readers only return version-validated copies; writers hold
// exclusive mutation rights between a won CAS (even -> odd) and the closing
// even store, so mutation is serialized.
unsafe impl<T: Send> Send for MpSeqLock<T> {}
unsafe impl<T: Send + Sync> Sync for MpSeqLock<T> {}

impl<T: Copy> MpSeqLock<T> {
    /// create a new lock with the given initial value. version starts at 0.
    #[inline]
    pub const fn new(value: T) -> Self {
        Self {
            version: CachePadded::new(AtomicUsize::new(0)),
            data: UnsafeCell::new(value),
        }
    }

    /// try to read the value without retrying.
    ///
    /// returns `None` if any writer's store was in progress or completed
    /// during the copy.
    #[inline]
    pub fn try_read(&self) -> Option<T> {
        let v1 = self.version.load(Ordering::Acquire);
        if v1 & 1 == 1 {
            return None;
        }

        compiler_barrier();
        // safety: torn copies are rejected by the version re-check below
        let value = unsafe { *self.data.get() };
        fence_acquire();

        let v2 = self.version.load(Ordering::Relaxed);
        if v1 != v2 {
            return None;
        }

        Some(value)
    }

    /// read the value, retrying until a consistent snapshot is obtained.
    #[inline]
    pub fn read(&self) -> T {
        let mut spins = 0u32;
        loop {
            if let Some(value) = self.try_read() {
                return value;
            }
            spin_backoff(&mut spins);
        }
    }

    /// zero-copy read attempt under the version bracket.
    #[inline]
    pub fn try_read_with<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&T) -> R,
    {
        let v1 = self.version.load(Ordering::Acquire);
        if v1 & 1 == 1 {
            return None;
        }

        compiler_barrier();
        // safety: result is discarded unless the version bracket validates
        let result = f(unsafe { &*self.data.get() });
        fence_acquire();

        let v2 = self.version.load(Ordering::Relaxed);
        if v1 != v2 {
            return None;
        }

        Some(result)
    }

    /// zero-copy read, retrying until consistent.
    #[inline]
    pub fn read_with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R + Copy,
    {
        let mut spins = 0u32;
        loop {
            if let Some(result) = self.try_read_with(f) {
                return result;
            }
            spin_backoff(&mut spins);
        }
    }

    // spin until this thread flips the counter even -> odd. returns the even
    // value it won with; the caller must store claimed + 2 to release.
    #[inline]
    fn claim(&self) -> usize {
        let mut spins = 0u32;
        let mut v = self.version.load(Ordering::Relaxed);
        loop {
            // odd means another writer is mid-write; no point in a CAS
            if v & 1 == 1 {
                spin_backoff(&mut spins);
                v = self.version.load(Ordering::Relaxed);
                continue;
            }
            match self.version.compare_exchange_weak(
                v,
                v.wrapping_add(1),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return v,
                Err(current) => {
                    v = current;
                    spin_backoff(&mut spins);
                }
            }
        }
    }

    /// publish a new value. safe from any number of threads.
    ///
    /// exactly one writer at a time wins the counter; the rest spin in the
    /// arbitration loop until the cell is even again.
    #[inline]
    pub fn write(&self, value: T) {
        let v = self.claim();
        compiler_barrier();

        // safety: the won CAS above grants exclusive mutation rights until
        // the closing even store
        unsafe {
            *self.data.get() = value;
        }

        compiler_barrier();
        self.version.store(v.wrapping_add(2), Ordering::Release);
    }

    /// mutate the value in place under the write bracket.
    ///
    /// the closure runs while the counter is odd, so it executes exclusively
    /// with respect to other writers; overlapping readers discard their
    /// copies.
    #[inline]
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        let v = self.claim();
        compiler_barrier();

        // safety: exclusive mutation rights held, see claim
        unsafe {
            f(&mut *self.data.get());
        }

        compiler_barrier();
        self.version.store(v.wrapping_add(2), Ordering::Release);
    }

    /// current raw version counter. even = stable, odd = write in progress.
    #[inline]
    pub fn version(&self) -> usize {
        self.version.load(Ordering::Acquire)
    }
}

impl<T: Copy + Default> Default for MpSeqLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Copy + std::fmt::Debug> std::fmt::Debug for MpSeqLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.try_read() {
            Some(value) => f.debug_struct("MpSeqLock").field("value", &value).finish(),
            None => f
                .debug_struct("MpSeqLock")
                .field("value", &"<write in progress>")
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_basic_read_write() {
        let lock = MpSeqLock::new(42u64);
        assert_eq!(lock.read(), 42);

        lock.write(100);
        assert_eq!(lock.read(), 100);
    }

    #[test]
    fn test_version_parity() {
        let lock = MpSeqLock::new(0u64);
        assert_eq!(lock.version(), 0);

        lock.write(1);
        assert_eq!(lock.version(), 2);

        lock.update(|v| *v += 1);
        assert_eq!(lock.version(), 4);
        assert_eq!(lock.read(), 2);
    }

    #[test]
    fn test_default_and_debug() {
        let lock: MpSeqLock<u64> = MpSeqLock::default();
        assert_eq!(lock.read(), 0);

        let debug = format!("{:?}", lock);
        assert!(debug.contains("MpSeqLock"));
    }

    #[test]
    fn test_read_with() {
        let lock = MpSeqLock::new([1u64, 2, 3, 4, 5]);
        assert_eq!(lock.read_with(|arr| arr[2]), 3);
        assert_eq!(lock.try_read_with(|arr| arr.iter().sum::<u64>()), Some(15));
    }

    #[test]
    fn test_concurrent_writers_no_lost_updates() {
        // every writer bumps the counter twice; with update() no increment
        // may be lost, so the final value is exactly writers * iterations
        const WRITERS: usize = 4;
        const ITERS: usize = 50_000;

        let lock = Arc::new(MpSeqLock::new(0usize));

        let handles: Vec<_> = (0..WRITERS)
            .map(|_| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    for _ in 0..ITERS {
                        lock.update(|v| *v += 1);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(lock.read(), WRITERS * ITERS);
        assert_eq!(lock.version(), 2 * WRITERS * ITERS);
    }

    #[test]
    fn test_competing_writers_reader_sees_whole_ids() {
        // two writers loop storing their own id; a reader may only ever
        // observe 0 (before the first write lands) or a published id,
        // and once an id is seen the initial value never comes back
        const ITERS: usize = 1_000_000;

        let lock = Arc::new(MpSeqLock::new(0usize));
        let done = Arc::new(AtomicBool::new(false));

        let reader = {
            let lock = Arc::clone(&lock);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut seen_write = false;
                while !done.load(Ordering::Relaxed) {
                    let value = lock.read();
                    match value {
                        1 | 2 => seen_write = true,
                        0 => assert!(!seen_write, "initial value resurfaced"),
                        other => panic!("observed unpublished value {}", other),
                    }
                }
            })
        };

        let writers: Vec<_> = [1usize, 2]
            .into_iter()
            .map(|id| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    for _ in 0..ITERS {
                        lock.write(id);
                    }
                })
            })
            .collect();

        for w in writers {
            w.join().unwrap();
        }
        done.store(true, Ordering::Relaxed);
        reader.join().unwrap();
    }

    #[test]
    fn test_snapshot_coherence_many_writers() {
        // each writer publishes internally consistent triples; readers must
        // never see a blend of two writers' rows
        #[derive(Copy, Clone)]
        struct Row {
            a: usize,
            b: usize,
            c: usize,
        }

        const WRITERS: usize = 4;

        let lock = Arc::new(MpSeqLock::new(Row { a: 0, b: 100, c: 100 }));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    while !done.load(Ordering::Relaxed) {
                        let snap = lock.read();
                        assert_eq!(snap.a + 100, snap.b);
                        assert_eq!(snap.c, snap.a + snap.b);
                    }
                })
            })
            .collect();

        let writers: Vec<_> = (0..WRITERS)
            .map(|w| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    for i in 0..100_000usize {
                        let a = w * 1_000_000 + i;
                        lock.write(Row { a, b: a + 100, c: a + (a + 100) });
                    }
                })
            })
            .collect();

        for w in writers {
            w.join().unwrap();
        }
        done.store(true, Ordering::Relaxed);
        for r in readers {
            r.join().unwrap();
        }
    }
}
