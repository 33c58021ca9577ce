//! Benchmarks for block generation.
//!
//! Run with: cargo bench
//!
//! A voice has one block duration to generate and write its next block, so
//! generation must stay far below that budget:
//!   - 10 ms block at 44.1 kHz  =   441 samples
//!   - 50 ms block at 44.1 kHz  =  2205 samples
//!   - 100 ms block at 44.1 kHz =  4410 samples

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use keytone::dsp::tone::{generate, ToneParams};

const SAMPLE_RATE: u32 = 44_100;

/// Block durations in milliseconds.
const BLOCK_MS: &[u64] = &[10, 50, 100];

fn bench_tone(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/tone");

    for &ms in BLOCK_MS {
        let duration = ms as f64 / 1000.0;

        // Allocating entry point, validates every call
        group.bench_with_input(BenchmarkId::new("generate", ms), &duration, |b, &d| {
            let mut phase = 0.0;
            b.iter(|| {
                let block = generate(black_box(440.0), phase, d, SAMPLE_RATE, 0.25).unwrap();
                phase = block.end_phase;
                block
            })
        });

        // What a voice runs per block: reused buffer, no validation
        let params = ToneParams::new(440.0, SAMPLE_RATE, 0.25).unwrap();
        let mut buffer = vec![0.0f32; (SAMPLE_RATE as f64 * duration).round() as usize];
        group.bench_with_input(BenchmarkId::new("fill", ms), &ms, |b, _| {
            let mut phase = 0.0;
            b.iter(|| {
                phase = params.fill(black_box(phase), black_box(&mut buffer));
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tone);
criterion_main!(benches);
