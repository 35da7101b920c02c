/// Benchmarks for temporal resampling.
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flowmap::resample::{resample, BucketOrigin};
use ndarray::Array2;
use time::{Duration, OffsetDateTime};

fn criterion_benchmark(c: &mut Criterion) {
    for num_times in [168, 8760] {
        let start = OffsetDateTime::UNIX_EPOCH;
        let times: Vec<OffsetDateTime> = (0..num_times)
            .map(|hour| start + Duration::hours(hour as i64))
            .collect();
        let values = Array2::from_shape_fn((num_times, 1_000), |(time, reach)| {
            if (time + reach) % 17 == 0 {
                f64::NAN
            } else {
                (time * reach) as f64
            }
        });
        for bucket_hours in [3, 24, 168] {
            let name = format!("resample({num_times}, {bucket_hours}h)");
            c.bench_function(&name, |b| {
                b.iter(|| {
                    resample(
                        black_box(&times),
                        bucket_hours,
                        black_box(values.view()),
                        BucketOrigin::StartDay,
                    )
                    .unwrap()
                })
            });
        }
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
