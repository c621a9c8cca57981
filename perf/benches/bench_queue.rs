use basalt_perf::{cleanup, temp_queue_options};
use basalt_queue::{CancellationToken, Publisher, Subscriber};
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

fn bench_roundtrip(c: &mut Criterion) {
    let options = temp_queue_options("roundtrip", 1 << 20);
    let mut publisher =
        Publisher::create(options.clone()).expect("failed to create bench publisher");
    let mut subscriber =
        Subscriber::create(options.clone()).expect("failed to attach bench subscriber");
    let token = CancellationToken::default();
    let body = [0u8; 32];
    let mut out = Vec::new();

    let mut group = c.benchmark_group("queue");
    group.throughput(Throughput::Elements(1));

    // Paired so the ring stays near-empty and the enqueue never hits the
    // full-queue path.
    group.bench_function("enqueue + dequeue (32 B)", |b| {
        b.iter(|| {
            publisher
                .try_enqueue(black_box(&body))
                .expect("bench enqueue failed");
            subscriber
                .try_dequeue_into(&mut out, &token)
                .expect("bench dequeue failed");
        });
    });

    drop(group);
    drop(publisher);
    drop(subscriber);
    cleanup(&options);
}

fn bench_try_dequeue_empty(c: &mut Criterion) {
    let options = temp_queue_options("empty", 1 << 20);
    let _publisher =
        Publisher::create(options.clone()).expect("failed to create bench publisher");
    let mut subscriber =
        Subscriber::create(options.clone()).expect("failed to attach bench subscriber");
    let token = CancellationToken::default();
    let mut out = Vec::new();

    let mut group = c.benchmark_group("queue");
    group.throughput(Throughput::Elements(1));

    group.bench_function("try_dequeue (empty)", |b| {
        b.iter(|| black_box(subscriber.try_dequeue_into(&mut out, &token).unwrap()));
    });

    drop(group);
    drop(subscriber);
    drop(_publisher);
    cleanup(&options);
}

criterion_group!(benches, bench_roundtrip, bench_try_dequeue_empty);
criterion_main!(benches);
