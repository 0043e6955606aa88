//! contention demo: pinned writer(s) and a pinned reader hammering a cell.
//!
//! run with: cargo run --release --example contend
//!
//! the reader counts how many try_read attempts fail per accepted snapshot,
//! which is the retry diagnostic the primitive itself does not carry.

use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use strand_cpu::{cpu_count, pin_to_cpu};
use strand_sync::{MpSeqLock, SpSeqLock};

const RUN_FOR: Duration = Duration::from_secs(2);

#[derive(Copy, Clone)]
struct Tick {
    seq: u64,
    checksum: u64,
    payload: [u64; 6],
}

impl Tick {
    fn new(seq: u64) -> Self {
        let payload = [seq; 6];
        Self { seq, checksum: seq.wrapping_mul(7), payload }
    }

    fn verify(&self) {
        assert_eq!(self.checksum, self.seq.wrapping_mul(7), "torn snapshot");
        for lane in self.payload {
            assert_eq!(lane, self.seq, "torn snapshot");
        }
    }
}

fn pin_or_warn(cpu: usize) {
    if let Err(e) = pin_to_cpu(cpu) {
        warn!("could not pin to cpu {}: {}", cpu, e);
    }
}

fn run_single_writer(writer_cpu: usize, reader_cpu: usize) {
    let lock = Arc::new(SpSeqLock::new(Tick::new(0)));
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let lock = Arc::clone(&lock);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            pin_or_warn(reader_cpu);
            let mut reads = 0u64;
            let mut retries = 0u64;
            while !done.load(Ordering::Relaxed) {
                loop {
                    match lock.try_read() {
                        Some(tick) => {
                            tick.verify();
                            reads += 1;
                            break;
                        }
                        None => retries += 1,
                    }
                }
            }
            (reads, retries)
        })
    };

    pin_or_warn(writer_cpu);
    let start = Instant::now();
    let mut seq = 0u64;
    while start.elapsed() < RUN_FOR {
        seq += 1;
        lock.write(Tick::new(seq));
    }
    done.store(true, Ordering::Relaxed);

    let (reads, retries) = reader.join().unwrap();
    info!(
        "sp: {} writes, {} reads, {} retries ({:.4} retries/read)",
        seq,
        reads,
        retries,
        retries as f64 / reads.max(1) as f64
    );
}

fn run_multi_writer(cpus: &[usize], reader_cpu: usize) {
    let lock = Arc::new(MpSeqLock::new(Tick::new(0)));
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let lock = Arc::clone(&lock);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            pin_or_warn(reader_cpu);
            let mut reads = 0u64;
            while !done.load(Ordering::Relaxed) {
                lock.read().verify();
                reads += 1;
            }
            reads
        })
    };

    let writers: Vec<_> = cpus
        .iter()
        .map(|&cpu| {
            let lock = Arc::clone(&lock);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                pin_or_warn(cpu);
                let mut writes = 0u64;
                let mut seq = 1u64;
                while !done.load(Ordering::Relaxed) {
                    lock.write(Tick::new(seq));
                    writes += 1;
                    seq += 1;
                }
                writes
            })
        })
        .collect();

    thread::sleep(RUN_FOR);
    done.store(true, Ordering::Relaxed);

    let total_writes: u64 = writers.into_iter().map(|w| w.join().unwrap()).sum();
    let reads = reader.join().unwrap();
    info!(
        "mp: {} writers, {} writes total, {} reads, counter = {}",
        cpus.len(),
        total_writes,
        reads,
        lock.version()
    );
    assert_eq!(lock.version() as u64, 2 * total_writes);
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cpus = cpu_count().unwrap_or(1);
    info!("{} cpus online", cpus);

    if cpus < 2 {
        warn!("fewer than 2 cpus, contention numbers will be meaningless");
    }

    // writer on 0, reader on 1
    run_single_writer(0, 1 % cpus);

    // writers on 0 and 2, reader on 1
    let writer_cpus: Vec<usize> = if cpus >= 3 { vec![0, 2] } else { vec![0, 0] };
    run_multi_writer(&writer_cpus, 1 % cpus);
}
