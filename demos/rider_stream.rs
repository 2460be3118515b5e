//! Continuous rider location emission into a partitioned topic, consumed by
//! two members of one group.

use rider_pubsub::{
    broker::BrokerConfig, topic::RecordMetadata, CodecRegistry, ConsumerConfig, ConsumerCore,
    InMemoryBroker, ListenerSpec, Payload, PayloadKind, Producer, ProducerConfig, Result,
    RiderLocationGenerator, TopicRegistry,
};
use std::{sync::Arc, thread, time::Duration};

fn main() -> Result<()> {
    env_logger::init();

    let broker = InMemoryBroker::connect(BrokerConfig::default())?;
    TopicRegistry::new(Arc::new(broker.clone())).ensure("rider-positions", 4, 1)?;

    let codecs = Arc::new(CodecRegistry::new());
    let consumer = ConsumerCore::new(
        Arc::new(broker.clone()),
        codecs.clone(),
        ConsumerConfig::default(),
    );

    let mut members = Vec::new();
    for member in ["tracker-a", "tracker-b"] {
        let handle = consumer.register_listener(
            ListenerSpec::new("rider-positions", "trackers", PayloadKind::RiderLocation),
            move |payload: &Payload, metadata: &RecordMetadata| {
                if let Some(location) = payload.as_rider_location() {
                    println!(
                        "[{}] p{} {} at ({:.5}, {:.5})",
                        member,
                        metadata.partition,
                        location.rider_id,
                        location.latitude,
                        location.longitude
                    );
                }
            },
        )?;
        handle.wait_until_active(Duration::from_secs(5));
        members.push(handle);
    }

    let producer = Producer::new(Arc::new(broker.clone()), codecs, ProducerConfig::default());
    let task = producer.start_scheduled_emission(
        "rider-positions",
        Duration::from_millis(100),
        RiderLocationGenerator::new(2024, 6)?,
    )?;

    thread::sleep(Duration::from_secs(2));
    let emitted = task.stop();
    thread::sleep(Duration::from_millis(200));

    println!("\nEmitted {} samples ({} failed)", emitted.emitted, emitted.failed);
    for handle in members {
        let stats = handle.stop();
        println!("  {}: {} delivered", handle.name(), stats.delivered);
    }

    Ok(())
}
