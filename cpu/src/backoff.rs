//! progressive backoff for spin-wait loops.
//!
//! retry loops in the strand primitives (reader retries, writer arbitration)
//! never block on an OS primitive. under sustained contention a pure busy
//! spin burns power and starves sibling hyperthreads, so the loops thread a
//! counter through [`spin_backoff`] and let it escalate from plain spinning
//! to pause bursts to an occasional yield.

/// progressive backoff to reduce cache contention during waits.
///
/// three-phase strategy, tuned for low latency first:
/// - **phase 1 (0-64)**: single spin hint, short waits resolve here
/// - **phase 2 (64-1024)**: growing bursts of cpu pause to back off the line
/// - **phase 3 (1024+)**: occasional yield so a preempted writer can finish
///
/// the caller owns the counter and resets it (or just drops it) once the
/// condition is met; wrapping back to phase 1 after `u32::MAX` iterations is
/// harmless.
#[inline]
pub fn spin_backoff(iteration: &mut u32) {
    let i = *iteration;
    if i < 64 {
        core::hint::spin_loop();
    } else if i < 1024 {
        // burst grows with contention, capped so phase 2 stays bounded
        let pauses = ((i - 64) >> 4) + 1;
        for _ in 0..pauses.min(32) {
            core::hint::spin_loop();
        }
    } else if i % 16 == 0 {
        std::thread::yield_now();
    } else {
        core::hint::spin_loop();
    }
    *iteration = iteration.wrapping_add(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_advances_once_per_call() {
        let mut iter = 0;
        for _ in 0..2000 {
            spin_backoff(&mut iter);
        }
        assert_eq!(iter, 2000);
    }

    #[test]
    fn test_wrapping() {
        let mut iter = u32::MAX;
        spin_backoff(&mut iter);
        assert_eq!(iter, 0);
    }
}
