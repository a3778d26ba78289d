//! Rendering cost of the reference tune, one poll interval at a time

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use prok::framer::{mix, reference_tune, render, Synth};
use prok::protocol::ServerInfo;

fn bench_mix(c: &mut Criterion) {
    let synth = Synth::new(40960);
    let tune = reference_tune(&synth, 5);
    let mut group = c.benchmark_group("mix");

    // one poll interval and one full second of 8-bit mono
    for len in [2048usize, 40960] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            b.iter(|| mix(black_box(12_000), len, std::slice::from_ref(&tune)))
        });
    }
    group.finish();
}

fn bench_render_stereo(c: &mut Criterion) {
    let info = ServerInfo::new(48000, 16, 2);
    let tune = reference_tune(&Synth::from_info(&info), 5);

    c.bench_function("render_16bit_stereo", |b| {
        b.iter(|| render(&info, black_box(48_000), 9600, std::slice::from_ref(&tune)))
    });
}

criterion_group!(benches, bench_mix, bench_render_stereo);
criterion_main!(benches);
