use criterion::{Criterion, black_box, criterion_group, criterion_main};
use forkpool::{ObjectPool, PoolConfiguration};
use std::sync::Arc;
use std::thread;

fn bench_acquire_release(c: &mut Criterion) {
    let pool = ObjectPool::from_factory(|| vec![0u8; 4096], PoolConfiguration::new().with_max_size(8))
        .expect("valid configuration");
    pool.open().expect("pool opens");

    c.bench_function("acquire_release_single_thread", |b| {
        b.iter(|| {
            let buf = pool.acquire().expect("pool is open");
            black_box(buf.len());
        })
    });

    c.bench_function("try_acquire_release_single_thread", |b| {
        b.iter(|| {
            let buf = pool.try_acquire().expect("pool has capacity");
            black_box(buf.len());
        })
    });
}

fn bench_contended(c: &mut Criterion) {
    let pool = Arc::new(
        ObjectPool::from_factory(|| 0u64, PoolConfiguration::new().with_max_size(2))
            .expect("valid configuration"),
    );
    pool.open().expect("pool opens");

    c.bench_function("acquire_release_4_threads_2_slots", |b| {
        b.iter(|| {
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    let pool = Arc::clone(&pool);
                    thread::spawn(move || {
                        for _ in 0..100 {
                            let mut counter = pool.acquire().expect("pool is open");
                            *counter += 1;
                        }
                    })
                })
                .collect();
            for worker in workers {
                worker.join().expect("worker panicked");
            }
        })
    });
}

criterion_group!(benches, bench_acquire_release, bench_contended);
criterion_main!(benches);
