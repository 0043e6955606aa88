// strand-cpu

mod affinity;
mod backoff;
mod cache_padded;
mod error;
pub mod fence;

pub use {
    affinity::{cpu_count, pin_to_cpu},
    backoff::spin_backoff,
    cache_padded::{CachePadded, CACHE_LINE_SIZE},
    error::CpuAffinityError,
    fence::{compiler_barrier, cpu_pause, fence_acquire, fence_release},
};
