// cache-line padding to reduce false sharing
//
// cache coherence operates at line granularity, so two threads hammering
// distinct variables on the same line still invalidate each other's caches.
// wrapping a value in CachePadded gives it a line (or pair of lines) to itself.
//
// guarantees:
// - value field at offset 0
// - alignment CACHE_LINE_SIZE, size rounded up to a multiple of it
//
// x86_64 and aarch64 commonly prefetch line pairs (spatial prefetcher), so
// padding to 128 bytes there avoids destructive interference across the
// adjacent line as well. everything else gets the plain 64-byte line.

use core::fmt;
use core::ops::{Deref, DerefMut};

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
pub const CACHE_LINE_SIZE: usize = 128;
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub const CACHE_LINE_SIZE: usize = 64;

#[cfg_attr(any(target_arch = "x86_64", target_arch = "aarch64"), repr(C, align(128)))]
#[cfg_attr(not(any(target_arch = "x86_64", target_arch = "aarch64")), repr(C, align(64)))]
pub struct CachePadded<T> {
    value: T,
}

impl<T> CachePadded<T> {
    #[inline]
    pub const fn new(value: T) -> Self {
        Self { value }
    }

    #[inline]
    pub fn into_inner(self) -> T {
        self.value
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> Deref for CachePadded<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for CachePadded<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Default> Default for CachePadded<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone> Clone for CachePadded<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T: Copy> Copy for CachePadded<T> {}

impl<T: fmt::Debug> fmt::Debug for CachePadded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachePadded")
            .field("value", &self.value)
            .finish()
    }
}

impl<T> From<T> for CachePadded<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::{align_of, size_of};
    use core::sync::atomic::AtomicUsize;

    #[test]
    fn test_alignment_and_size() {
        assert_eq!(align_of::<CachePadded<u8>>(), CACHE_LINE_SIZE);
        assert_eq!(size_of::<CachePadded<u8>>(), CACHE_LINE_SIZE);
        assert_eq!(align_of::<CachePadded<AtomicUsize>>(), CACHE_LINE_SIZE);
        assert_eq!(size_of::<CachePadded<AtomicUsize>>(), CACHE_LINE_SIZE);
    }

    #[test]
    fn test_size_rounds_up_to_whole_lines() {
        // anything larger than one line still occupies whole lines
        let size = size_of::<CachePadded<[u8; CACHE_LINE_SIZE + 1]>>();
        assert_eq!(size % CACHE_LINE_SIZE, 0);
        assert!(size >= 2 * CACHE_LINE_SIZE);
    }

    #[test]
    fn test_deref() {
        let padded = CachePadded::new(7usize);
        assert_eq!(*padded, 7);

        let mut padded = CachePadded::new(0usize);
        *padded = 9;
        assert_eq!(padded.into_inner(), 9);
    }

    #[test]
    fn test_adjacent_instances_do_not_share_lines() {
        let pair = [CachePadded::new(0u8), CachePadded::new(0u8)];
        let a = &pair[0] as *const _ as usize;
        let b = &pair[1] as *const _ as usize;
        assert!(b - a >= CACHE_LINE_SIZE);
    }
}
