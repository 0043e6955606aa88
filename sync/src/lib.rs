//! lock-free synchronization primitives.
//!
//! this crate provides sequence locks, optimized for scenarios where:
//! - read operations vastly outnumber writes
//! - latency is critical (nanosecond-level reads)
//! - the payload is a plain `Copy` value with no interior pointers
//!
//! # available primitives
//!
//! - [`SpSeqLock`]: single-writer, multi-reader sequence lock. the writer
//!   never synchronizes beyond two counter stores; single-writer discipline
//!   is a caller contract.
//! - [`MpSeqLock`]: multi-writer variant. writers arbitrate through one
//!   compare-and-swap on the counter, everything else is identical.
//!
//! both share the same reader protocol: snapshot the version counter, copy
//! the payload, re-check the counter, retry on mismatch or an odd (write in
//! progress) value. readers never block writers and writers never wait for
//! readers; a reader under sustained write pressure retries, in principle
//! unboundedly. use `try_read` to put a bound on that externally.
//!
//! # what not to do
//!
//! do not split a logically-atomic payload across several independently
//! atomic fields instead of guarding one `Copy` struct. each field access is
//! race-free on its own, but a reader can then pair one field from an old
//! write with another from a new one, which is exactly the torn snapshot the
//! sequence counter exists to rule out.
//!
//! # example
//!
//! ```
//! use strand_sync::SpSeqLock;
//!
//! let lock = SpSeqLock::new([0u64; 4]);
//!
//! // writer (one thread only)
//! lock.write([1, 2, 3, 4]);
//!
//! // readers (any thread, lock-free)
//! assert_eq!(lock.read(), [1, 2, 3, 4]);
//! ```

mod mp_seqlock;
mod sp_seqlock;

pub use {mp_seqlock::MpSeqLock, sp_seqlock::SpSeqLock};
