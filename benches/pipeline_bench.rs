use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rider_pubsub::{
    broker::BrokerConfig, BrokerClient, CodecRegistry, InMemoryBroker, Payload, Producer,
    ProducerConfig, RiderLocation, TopicRegistry,
};
use std::{sync::Arc, time::Duration};

fn producer_for(broker: &InMemoryBroker) -> Producer {
    Producer::new(
        Arc::new(broker.clone()),
        Arc::new(CodecRegistry::new()),
        ProducerConfig::default(),
    )
}

fn benchmark_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("Producer_Publish");
    group.throughput(Throughput::Elements(1));

    for partitions in [1u32, 3, 12].iter() {
        group.bench_with_input(
            BenchmarkId::new("keyed_rider", partitions),
            partitions,
            |b, &partitions| {
                let broker = InMemoryBroker::connect(
                    BrokerConfig::default().with_retention_records(Some(10_000)),
                )
                .unwrap();
                TopicRegistry::new(Arc::new(broker.clone()))
                    .ensure("riders", partitions, 1)
                    .unwrap();
                let producer = producer_for(&broker);
                let payload = Payload::from(RiderLocation::new("rider123", 28.31, 77.34));

                let mut i = 0u64;
                b.iter(|| {
                    i += 1;
                    let key = format!("rider-{}", i % 64);
                    producer.publish_now("riders", Some(&key), &payload).unwrap();
                });
            },
        );
    }

    group.finish();
}

fn benchmark_publish_and_poll(c: &mut Criterion) {
    let mut group = c.benchmark_group("Broker_RoundTrip");
    let batch = 256u64;
    group.throughput(Throughput::Elements(batch));

    group.bench_function("text_batch", |b| {
        let broker = InMemoryBroker::new();
        let producer = producer_for(&broker);
        let mut subscription = broker.subscribe("bench", "g").unwrap();

        b.iter(|| {
            for i in 0..batch {
                producer.send_text("bench", &format!("message {}", i)).unwrap();
            }
            for _ in 0..batch {
                subscription
                    .poll(Duration::from_millis(100))
                    .unwrap()
                    .unwrap();
            }
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_publish, benchmark_publish_and_poll);
criterion_main!(benches);
