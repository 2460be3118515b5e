//! Basic usage of the rider-pubsub pipeline: declare topics, run two
//! consumer groups on one topic and publish through both triggers.

use rider_pubsub::{
    config, producer::generator::reference_sample, topic::RecordMetadata, BrokerAdmin, CodecRegistry,
    ConsumerConfig, ConsumerCore, InMemoryBroker, ListenerSpec, Payload, PayloadKind, Producer,
    ProducerConfig, Result, TopicRegistry,
};
use std::{sync::Arc, thread, time::Duration};

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    println!("rider-pubsub Example");
    println!("====================");

    let broker = InMemoryBroker::new();
    let codecs = Arc::new(CodecRegistry::new());

    let registry = TopicRegistry::new(Arc::new(broker.clone()));
    registry.ensure(config::TEXT_TOPIC, 1, 1)?;
    registry.ensure(config::RIDER_TOPIC, 1, 1)?;
    registry.ensure(config::PARTITIONED_TOPIC, config::PARTITIONED_TOPIC_PARTITIONS, 1)?;
    println!("Declared {} topics", broker.list_topics().len());

    let consumer = ConsumerCore::new(
        Arc::new(broker.clone()),
        codecs.clone(),
        ConsumerConfig::default(),
    );
    let first = consumer.register_listener(
        ListenerSpec::new(config::TEXT_TOPIC, config::TEXT_GROUP, PayloadKind::Text),
        |payload: &Payload, _: &RecordMetadata| {
            println!("Received Message 1: {}", payload.as_text().unwrap_or_default());
        },
    )?;
    let second = consumer.register_listener(
        ListenerSpec::new(config::TEXT_TOPIC, config::TEXT_GROUP_2, PayloadKind::Text),
        |payload: &Payload, _: &RecordMetadata| {
            println!("Received Message 2: {}", payload.as_text().unwrap_or_default());
        },
    )?;
    let rider = consumer.register_listener(
        ListenerSpec::new(config::RIDER_TOPIC, config::RIDER_GROUP, PayloadKind::RiderLocation),
        |payload: &Payload, _: &RecordMetadata| {
            if let Some(location) = payload.as_rider_location() {
                println!(
                    "Received Location: {} : {} : {}",
                    location.rider_id, location.latitude, location.longitude
                );
            }
        },
    )?;
    for listener in [&first, &second, &rider] {
        listener.wait_until_active(Duration::from_secs(5));
    }

    let producer = Producer::new(Arc::new(broker.clone()), codecs, ProducerConfig::default());
    producer.send_text(config::TEXT_TOPIC, "hello")?;
    println!("Message sent: hello");
    let rider_id = producer.send_rider_location(config::RIDER_TOPIC, reference_sample())?;
    println!("Message sent: {}", rider_id);

    thread::sleep(Duration::from_millis(300));

    println!("\nListener statistics:");
    for listener in [first, second, rider] {
        let stats = listener.stop();
        println!("  {}: delivered {}", listener.name(), stats.delivered);
    }

    Ok(())
}
