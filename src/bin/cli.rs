use clap::{App, Arg, ArgMatches, SubCommand};
use rider_pubsub::{
    config,
    consumer::LoggingHandler,
    producer::generator::{reference_sample, streaming_sample},
    BrokerAdmin, CodecRegistry, ConsumerCore, InMemoryBroker, ListenerHandle, PipelineSettings,
    Producer, PubSubError, Result, RiderLocationGenerator, TopicRegistry,
};
use std::{
    sync::{atomic::Ordering, Arc},
    thread,
    time::Duration,
};

fn main() -> Result<()> {
    env_logger::init();

    let matches = App::new("rider-pubsub")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Topic-based publish/subscribe pipeline for text and rider locations")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Pipeline settings (TOML); the reference pipeline when absent")
                .global(true)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("linger_ms")
                .long("linger-ms")
                .value_name("MS")
                .help("Time given to listeners before shutdown")
                .default_value("300")
                .global(true)
                .takes_value(true),
        )
        .subcommand(
            SubCommand::with_name("send1")
                .about("Publish a text message to the text topic")
                .arg(
                    Arg::with_name("topic")
                        .short("t")
                        .long("topic")
                        .value_name("TOPIC")
                        .help("Destination topic")
                        .default_value(config::TEXT_TOPIC)
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("message")
                        .short("m")
                        .long("message")
                        .value_name("TEXT")
                        .help("Message to send")
                        .required(true)
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("send2")
                .about("Publish the sample rider location to the rider topic")
                .arg(
                    Arg::with_name("topic")
                        .short("t")
                        .long("topic")
                        .value_name("TOPIC")
                        .help("Destination topic")
                        .default_value(config::RIDER_TOPIC)
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("message")
                        .short("m")
                        .long("message")
                        .value_name("TEXT")
                        .help("Accepted for compatibility; not used")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("stream")
                .about("Emit rider locations on a fixed cadence")
                .arg(
                    Arg::with_name("topic")
                        .short("t")
                        .long("topic")
                        .value_name("TOPIC")
                        .help("Destination topic")
                        .default_value(config::RIDER_TOPIC)
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("interval_ms")
                        .short("i")
                        .long("interval-ms")
                        .value_name("MS")
                        .help("Emission interval; the configured one when absent")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("count")
                        .short("n")
                        .long("count")
                        .value_name("COUNT")
                        .help("Number of emissions before stopping")
                        .default_value("5")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("riders")
                        .short("r")
                        .long("riders")
                        .value_name("RIDERS")
                        .help("Simulated riders; 0 repeats the fixed sample")
                        .default_value("0")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("seed")
                        .long("seed")
                        .value_name("SEED")
                        .help("Seed for simulated riders")
                        .default_value("42")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("topics")
                .about("Declare the configured topics and list them"),
        )
        .subcommand(
            SubCommand::with_name("demo")
                .about("Run both triggers and a short stream through the pipeline"),
        )
        .get_matches();

    let settings = match matches.value_of("config") {
        Some(path) => PipelineSettings::from_file(path)?,
        None => PipelineSettings::reference(),
    };
    settings.validate()?;
    let linger = Duration::from_millis(parse_arg(&matches, "linger_ms")?);

    let pipeline = Pipeline::start(&settings)?;
    let outcome = match matches.subcommand() {
        ("send1", Some(send_matches)) => handle_send1(&pipeline, send_matches),
        ("send2", Some(send_matches)) => handle_send2(&pipeline, send_matches),
        ("stream", Some(stream_matches)) => handle_stream(&pipeline, &settings, stream_matches),
        ("topics", Some(_)) => show_topics(&pipeline),
        ("demo", Some(_)) => run_demo(&pipeline, &settings),
        _ => {
            println!("Use --help for usage information");
            Ok(())
        }
    };

    thread::sleep(linger);
    pipeline.shutdown();
    outcome
}

/// Wired components of one run
struct Pipeline {
    broker: InMemoryBroker,
    codecs: Arc<CodecRegistry>,
    producer: Producer,
    consumer: ConsumerCore,
    listeners: Vec<ListenerHandle>,
}

impl Pipeline {
    fn start(settings: &PipelineSettings) -> Result<Self> {
        let broker = InMemoryBroker::connect(settings.broker.clone())?;
        let codecs = Arc::new(CodecRegistry::new());
        settings.register_codecs(&codecs)?;

        let registry = TopicRegistry::new(Arc::new(broker.clone()));
        for (name, outcome) in registry.ensure_all(&settings.topic_specs()) {
            if let Err(err) = outcome {
                log::error!("Topic '{}' not declared: {}", name, err);
            }
        }

        let producer = Producer::new(
            Arc::new(broker.clone()),
            codecs.clone(),
            settings.producer_config(),
        );
        let consumer = ConsumerCore::new(
            Arc::new(broker.clone()),
            codecs.clone(),
            settings.consumer.clone(),
        );

        let mut listeners = Vec::new();
        for spec in settings.listener_specs()? {
            let label = format!("{} ({})", spec.group_id, spec.topic);
            listeners.push(consumer.register_listener(spec, LoggingHandler::new(label))?);
        }
        for listener in &listeners {
            if !listener.wait_until_active(Duration::from_secs(5)) {
                log::warn!(
                    "Listener {} not active: {}",
                    listener.name(),
                    listener.state()
                );
            }
        }

        Ok(Self {
            broker,
            codecs,
            producer,
            consumer,
            listeners,
        })
    }

    fn shutdown(self) {
        for (name, stats) in self.consumer.shutdown() {
            println!(
                "  {}: delivered {}, malformed {}, handler failures {}",
                name, stats.delivered, stats.malformed, stats.handler_failures
            );
        }
        drop(self.listeners);
    }
}

fn parse_arg<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> Result<T> {
    matches
        .value_of(name)
        .unwrap_or_default()
        .parse()
        .map_err(|_| PubSubError::invalid_parameter(name, "Invalid number"))
}

fn handle_send1(pipeline: &Pipeline, matches: &ArgMatches) -> Result<()> {
    let topic = matches.value_of("topic").unwrap_or(config::TEXT_TOPIC);
    let message = matches.value_of("message").unwrap_or_default();
    pipeline.producer.send_text(topic, message)?;
    println!("Message sent: {}", message);
    Ok(())
}

fn handle_send2(pipeline: &Pipeline, matches: &ArgMatches) -> Result<()> {
    if let Some(ignored) = matches.value_of("message") {
        log::debug!("send2 ignores its message argument ({:?})", ignored);
    }
    let topic = matches.value_of("topic").unwrap_or(config::RIDER_TOPIC);
    let rider_id = pipeline
        .producer
        .send_rider_location(topic, reference_sample())?;
    println!("Message sent: {}", rider_id);
    Ok(())
}

fn handle_stream(
    pipeline: &Pipeline,
    settings: &PipelineSettings,
    matches: &ArgMatches,
) -> Result<()> {
    let topic = matches.value_of("topic").unwrap_or(config::RIDER_TOPIC);
    let interval = match matches.value_of("interval_ms") {
        Some(_) => Duration::from_millis(parse_arg(matches, "interval_ms")?),
        None => settings.emission_interval(),
    };
    let count: u64 = parse_arg(matches, "count")?;
    let riders: usize = parse_arg(matches, "riders")?;

    let generator = if riders == 0 {
        RiderLocationGenerator::fixed(streaming_sample())
    } else {
        RiderLocationGenerator::new(parse_arg(matches, "seed")?, riders)?
    };

    println!("Streaming {} rider locations to '{}' every {:?}", count, topic, interval);
    let task = pipeline
        .producer
        .start_scheduled_emission(topic, interval, generator)?;
    while task.stats().emitted + task.stats().failed < count {
        thread::sleep(interval / 4);
    }
    let stats = task.stop();

    println!("\nResults:");
    println!("  Emitted: {}", stats.emitted);
    println!("  Failed: {}", stats.failed);
    Ok(())
}

fn show_topics(pipeline: &Pipeline) -> Result<()> {
    let topics = pipeline.broker.list_topics();
    if topics.is_empty() {
        println!("No topics found");
    } else {
        println!("Topics:");
        for topic in topics {
            let groups = pipeline.broker.list_groups(&topic.name);
            let rejected = pipeline
                .broker
                .topic_stats(&topic.name)
                .map(|stats| stats.records_rejected.load(Ordering::Relaxed))
                .unwrap_or(0);
            println!("  - {} groups={:?} rejected={}", topic, groups, rejected);
        }
    }

    let assignments = pipeline.codecs.assignments();
    if !assignments.is_empty() {
        println!("Codecs:");
        for (topic, codec) in assignments {
            println!("  - {} -> {}", topic, codec);
        }
    }
    Ok(())
}

fn run_demo(pipeline: &Pipeline, settings: &PipelineSettings) -> Result<()> {
    println!("rider-pubsub v{}", rider_pubsub::VERSION);

    pipeline.producer.send_text(config::TEXT_TOPIC, "hello")?;
    println!("Message sent: hello");

    let rider_id = pipeline
        .producer
        .send_rider_location(config::RIDER_TOPIC, reference_sample())?;
    println!("Message sent: {}", rider_id);

    let interval = settings.emission_interval().min(Duration::from_millis(200));
    let task = pipeline.producer.start_scheduled_emission(
        config::RIDER_TOPIC,
        interval,
        RiderLocationGenerator::new(7, 3)?,
    )?;
    thread::sleep(interval * 3 + interval / 2);
    let stats = task.stop();
    println!("Streamed {} rider locations", stats.emitted);

    show_topics(pipeline)?;
    let broker_stats = pipeline.broker.stats();
    println!(
        "Broker: {} topics, {} records",
        broker_stats.total_topics, broker_stats.total_records
    );
    Ok(())
}
