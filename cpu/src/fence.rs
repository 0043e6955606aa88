// memory fence operations
//
// notes:
// - fences constrain reordering and participate in happens-before rules
// - on x86/x86_64, acquire/release fences compile to no cpu barrier (but still compiler fence)
// - a compiler barrier only pins instruction order within the emitting thread;
//   it is free at runtime and is what a seqlock needs between its counter
//   stores and the non-atomic payload copy

use core::sync::atomic::{compiler_fence, fence, Ordering};

// acquire fence - prevents subsequent ops from reordering before fence
#[inline(always)]
pub fn fence_acquire() {
    fence(Ordering::Acquire);
}

// release fence - prevents prior ops from reordering after fence
#[inline(always)]
pub fn fence_release() {
    fence(Ordering::Release);
}

// compiler-only barrier in both directions - no cpu instruction emitted
// keeps the compiler from hoisting or sinking memory ops across this point
#[inline(always)]
pub fn compiler_barrier() {
    compiler_fence(Ordering::AcqRel);
}

// cpu spin-loop hint - use inside tight spin-wait loops
// not a memory fence, reduces power and improves smt/ht friendliness
// maps to PAUSE on x86/x86_64
#[inline(always)]
pub fn cpu_pause() {
    core::hint::spin_loop();
}
