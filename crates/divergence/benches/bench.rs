use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use divergence::{
    Chances, DedupQueue, FlickerGenerator, JobQueues, Material, Priority, TubeScene, TubeTheme,
    Value,
};
use rand::{SeedableRng, rngs::StdRng};
use std::{
    sync::{Arc, Barrier},
    thread::scope,
    time::Instant,
};

// Values pushed per benchmark iteration (per-thread for multi-threaded).
const TOTAL_VALUES: usize = 4096;

/// Benchmarks flicker sequence generation at several display widths.
fn bench_flicker(c: &mut Criterion) {
    let mut group = c.benchmark_group("flicker");
    for digits in [1, 8, 19] {
        let generator = FlickerGenerator::new(digits, Chances::default()).unwrap();
        group.throughput(Throughput::Elements(60 * digits as u64));
        group.bench_function(format!("digits/{digits}/frames/60"), |b| {
            let mut rng = StdRng::seed_from_u64(0);
            b.iter(|| black_box(generator.generate(&mut rng, 60)));
        });
    }
    group.finish();
}

/// Benchmarks building the SVG document for one frame.
fn bench_scene(c: &mut Criterion) {
    let scene = TubeScene::new(TubeTheme::default());
    let materials = [
        Material::On,
        Material::Half,
        Material::On,
        Material::Off,
        Material::On,
        Material::On,
        Material::On,
        Material::Half,
    ];
    c.bench_function("scene/document/8", |b| {
        b.iter(|| black_box(scene.document(black_box("01234567"), &materials).unwrap()));
    });
}

/// Benchmarks single-threaded push/pop with a quarter of the pushes being
/// duplicates.
fn bench_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup_queue");
    group.throughput(Throughput::Elements(TOTAL_VALUES as u64));
    group.bench_function(format!("elems/{TOTAL_VALUES}"), |b| {
        b.iter(|| {
            let mut queue = DedupQueue::new();
            for i in 0..TOTAL_VALUES as u64 {
                queue.push(Value(i - i % 4 / 3));
            }
            while let Some(v) = queue.pop() {
                black_box(v);
            }
        });
    });
    group.finish();
}

/// Benchmarks request-side pushes into shared queues from several threads.
fn bench_queues_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("job_queues_contended");
    for threads in [2, 4, 8] {
        group.throughput(Throughput::Elements((TOTAL_VALUES * threads) as u64));
        group.bench_function(format!("threads/{threads}/elems/{TOTAL_VALUES}"), |b| {
            b.iter_custom(|iters| {
                let start = Instant::now();
                for _ in 0..iters {
                    let queues = Arc::new(JobQueues::new());
                    let barrier = Arc::new(Barrier::new(threads));
                    scope(|s| {
                        for t in 0..threads {
                            let queues = Arc::clone(&queues);
                            let barrier = Arc::clone(&barrier);
                            s.spawn(move || {
                                barrier.wait();
                                for i in 0..TOTAL_VALUES as u64 {
                                    let priority = if i % 8 == 0 {
                                        Priority::Refresh
                                    } else {
                                        Priority::Fresh
                                    };
                                    let _ = queues.push(priority, Value(i + t as u64));
                                }
                            });
                        }
                    });
                    black_box(queues.snapshot());
                }
                start.elapsed()
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_flicker,
    bench_scene,
    bench_queue,
    bench_queues_contended
);
criterion_main!(benches);
