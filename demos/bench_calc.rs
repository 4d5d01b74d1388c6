// Benchmark segment hash calculation throughput
// Usage: cargo run --release --example bench_calc [size_mib]

use std::io::{self, Cursor};
use std::time::Instant;

use seghash::common::MIN_SEGMENT_SIZE;
use seghash::pipeline::SinkFactory;
use seghash::{calculate, CalcOptions, HashAlgorithm};

const WARMUP_RUNS: u32 = 2;
const TIMED_RUNS: u32 = 8;

/// Discards manifest output so only reading and hashing are timed
struct NullSinks;

impl SinkFactory for NullSinks {
    type Sink = io::Sink;

    fn create(&mut self, role: &str) -> io::Result<(io::Sink, String)> {
        Ok((io::sink(), role.to_string()))
    }
}

fn main() {
    let size_mib: usize = std::env::args()
        .nth(1)
        .map(|arg| arg.parse().expect("size_mib must be a whole number"))
        .unwrap_or(300);

    println!("Segment Hash Calculation Benchmark");
    println!("==================================\n");
    println!("  Input: {} MiB in memory", size_mib);
    println!("  Segment size: {} MiB", MIN_SEGMENT_SIZE / (1024 * 1024));
    println!("  Runs: {} warm-up, {} timed\n", WARMUP_RUNS, TIMED_RUNS);

    let data = pattern(size_mib * 1024 * 1024);
    let mut input = Cursor::new(data);

    println!("{:<22} {:>11} {:>18}", "Algorithm", "Time/run", "Throughput");
    println!("{}", "-".repeat(53));

    for algorithm in [HashAlgorithm::Md5, HashAlgorithm::Sha1] {
        let options = CalcOptions::new(MIN_SEGMENT_SIZE, vec![algorithm]);
        let mut elapsed = 0.0;

        for run in 0..WARMUP_RUNS + TIMED_RUNS {
            let start = Instant::now();
            let outcome = calculate(&mut input, &options, NullSinks, |_| {}).expect("calculation failed");
            let duration = start.elapsed().as_secs_f64();

            assert_eq!(outcome.bytes, input.get_ref().len() as u64);
            if run >= WARMUP_RUNS {
                elapsed += duration;
            }
        }

        let per_run = elapsed / f64::from(TIMED_RUNS);
        println!("{:<22} {:>10.3}s {:>12.2} MiB/s", algorithm.name(), per_run, size_mib as f64 / per_run);
    }
}

/// Pseudo-random bytes, so no hash gets an easy input
fn pattern(len: usize) -> Vec<u8> {
    let mut state = 0x9e37_79b9_7f4a_7c15u64;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 56) as u8
        })
        .collect()
}
