//! Benchmarks for segment planning and ffprobe output parsing
//!
//! These run once per source file in a batch, so they only need to stay
//! negligible next to the ffmpeg work.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sg_av::naming::{strip_role_suffix, strip_run_id, strip_segment_suffix};
use sg_av::probe::{parse_duration, parse_frame_count};
use sg_core::config::MIN_SEGMENT_SECONDS;
use sg_core::SegmentPlan;

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_plan");
    for duration in [30.0_f64, 95.0, 5_400.0, 86_400.0] {
        group.bench_with_input(BenchmarkId::from_parameter(duration), &duration, |b, &d| {
            b.iter(|| SegmentPlan::compute(black_box(d), black_box(4), MIN_SEGMENT_SECONDS))
        });
    }
    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_duration", |b| {
        b.iter(|| parse_duration(black_box("5400.023000\n")))
    });
    c.bench_function("parse_frame_count", |b| {
        b.iter(|| parse_frame_count(black_box("129600,\n")))
    });
}

fn bench_naming(c: &mut Criterion) {
    c.bench_function("strip_suffixes", |b| {
        b.iter(|| {
            strip_segment_suffix(black_box(".holiday_0123456789abcdef_video_17_encoded"))
                .map(|stem| strip_run_id(strip_role_suffix(stem)))
        })
    });
}

criterion_group!(benches, bench_plan, bench_parse, bench_naming);
criterion_main!(benches);
