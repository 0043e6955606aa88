//! single-writer sequence lock.
//!
//! # how it works
//!
//! - version counter starts at 0 (even)
//! - the writer stores version+1 (odd) before touching the data, version+2
//!   (even) after
//! - a reader loads the version, copies the data, loads the version again
//! - if the two loads differ or are odd, the copy may be torn and is
//!   discarded; the reader retries
//!
//! tearing is detected, not prevented: the raw data copy is non-atomic and
//! may race with the writer, but a racy copy can never be returned because
//! the bracketing version loads cannot both come back equal and even around
//! an overlapping write.
//!
//! # single-writer contract
//!
//! only one thread may call [`write`](SpSeqLock::write) or
//! [`update`](SpSeqLock::update) at a time. this is not enforced; two
//! concurrent writers corrupt the counter discipline. use
//! [`MpSeqLock`](crate::MpSeqLock) when writers can race.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use strand_cpu::{compiler_barrier, fence_acquire, spin_backoff, CachePadded};

/// a sequence lock for single-writer, multi-reader scenarios.
///
/// `T` must be `Copy`: readers copy the data out (a torn copy must be
/// discardable without running any drop or fixup code) and writers copy the
/// data in. the bound is the compile-time rendering of "trivially copyable,
/// copy cannot fail" - there is nothing to check at runtime.
///
/// the version counter is cache-line padded so reader polling of the counter
/// and writer mutation of the payload never fight over the same line.
#[repr(C)]
pub struct SpSeqLock<T> {
    version: CachePadded<AtomicUsize>,
    data: UnsafeCell<T>,
}

// safety: shared access follows the seqlock protocol. readers only ever
// return copies validated by the version bracket; mutation is confined to
// the (caller-guaranteed) single writer.
unsafe impl<T: Send> Send for SpSeqLock<T> {}
unsafe impl<T: Send + Sync> Sync for SpSeqLock<T> {}

impl<T: Copy> SpSeqLock<T> {
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
    /// returns `None` if a write was in progress or completed during the
    /// copy. this is the building block for caller-side retry bounds or
    /// deadline policies; [`read`](Self::read) is the spin-until-consistent
    /// version.
    #[inline]
    pub fn try_read(&self) -> Option<T> {
        let v1 = self.version.load(Ordering::Acquire);
        if v1 & 1 == 1 {
            return None;
        }

        compiler_barrier();
        // safety: a concurrently mutated (torn) copy is never returned, the
        // version re-check below rejects it
        let value = unsafe { *self.data.get() };
        // orders the copy above before the relaxed re-load below
        fence_acquire();

        let v2 = self.version.load(Ordering::Relaxed);
        if v1 != v2 {
            return None;
        }

        Some(value)
    }

    /// read the value, retrying until a consistent snapshot is obtained.
    ///
    /// never blocks and never fails. under sustained write pressure the
    /// retry count is unbounded in theory, bounded by relative write
    /// frequency in practice; the loop backs off progressively so a
    /// preempted writer can finish.
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

    /// zero-copy read attempt: run a closure against the data in place.
    ///
    /// the closure must not stash the reference or observe side effects of
    /// its own execution: it may run against a torn view, whose result is
    /// discarded when the version re-check fails.
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

    /// publish a new value.
    ///
    /// # contract
    ///
    /// single writer only. concurrent calls from multiple threads are a data
    /// race on the counter discipline and corrupt the lock.
    #[inline]
    pub fn write(&self, value: T) {
        // relaxed is enough: no other thread stores the counter
        let v = self.version.load(Ordering::Relaxed);

        // odd: write in progress, readers must discard overlapping copies
        self.version.store(v.wrapping_add(1), Ordering::Release);
        compiler_barrier();

        // safety: exclusive mutation per the single-writer contract
        unsafe {
            *self.data.get() = value;
        }

        compiler_barrier();
        // even: write complete, ordered after the payload store
        self.version.store(v.wrapping_add(2), Ordering::Release);
    }

    /// mutate the value in place under the write bracket.
    ///
    /// same single-writer contract as [`write`](Self::write). readers that
    /// overlap the closure discard their copies, so partial mutation states
    /// are never observable.
    #[inline]
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        let v = self.version.load(Ordering::Relaxed);

        self.version.store(v.wrapping_add(1), Ordering::Release);
        compiler_barrier();

        // safety: exclusive mutation per the single-writer contract
        unsafe {
            f(&mut *self.data.get());
        }

        compiler_barrier();
        self.version.store(v.wrapping_add(2), Ordering::Release);
    }

    /// current raw version counter. even = stable, odd = write in progress.
    ///
    /// each completed write advances it by exactly 2; useful as a cheap
    /// write-rate or retry diagnostic.
    #[inline]
    pub fn version(&self) -> usize {
        self.version.load(Ordering::Acquire)
    }
}

impl<T: Copy + Default> Default for SpSeqLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Copy + std::fmt::Debug> std::fmt::Debug for SpSeqLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.try_read() {
            Some(value) => f.debug_struct("SpSeqLock").field("value", &value).finish(),
            None => f
                .debug_struct("SpSeqLock")
                .field("value", &"<write in progress>")
                .finish(),
        }
    }
}
