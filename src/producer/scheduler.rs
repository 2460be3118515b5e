//! Scheduled (streaming) emission
//!
//! A [`ScheduledEmission`] owns one thread that wakes on a fixed cadence,
//! asks its [`EmissionSource`] for a payload and publishes it through
//! [`Producer::publish_with_headers`]. Missed ticks are skipped rather than
//! replayed in a burst. A failed publish is logged and counted; the next
//! tick proceeds normally.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Condvar, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use super::Producer;
use crate::{
    codec::Payload,
    error::{PubSubError, Result},
    topic::{HeaderValue, Headers},
};

/// One payload produced by a source, with optional key and headers
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub key: Option<String>,
    pub payload: Payload,
    pub headers: Headers,
}

impl Emission {
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self {
            key: None,
            payload: payload.into(),
            headers: Headers::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Supplier of payloads for scheduled emission
pub trait EmissionSource: Send + 'static {
    fn next_emission(&mut self) -> Emission;
}

impl<F> EmissionSource for F
where
    F: FnMut() -> Emission + Send + 'static,
{
    fn next_emission(&mut self) -> Emission {
        self()
    }
}

/// Final counters of a stopped emission task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmissionStats {
    pub emitted: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct EmissionShared {
    stopped: Mutex<bool>,
    wake: Condvar,
    emitted: AtomicU64,
    failed: AtomicU64,
}

impl EmissionShared {
    /// Sleep until `deadline` or a stop request; true when stopped
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut stopped = self.stopped.lock().unwrap();
        loop {
            if *stopped {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self.wake.wait_timeout(stopped, deadline - now).unwrap();
            stopped = guard;
        }
    }

    fn snapshot(&self) -> EmissionStats {
        EmissionStats {
            emitted: self.emitted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Handle to a running periodic publish task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
#[must_use = "dropping the handle stops it"]
pub struct ScheduledEmission {
    topic: String,
    interval: Duration,
    shared: Arc<EmissionShared>,
    thread: Option<JoinHandle<()>>,
}

impl ScheduledEmission {
    pub(super) fn spawn<S: EmissionSource>(
        producer: Producer,
        topic: String,
        interval: Duration,
        mut source: S,
    ) -> Result<Self> {
        let shared = Arc::new(EmissionShared::default());
        let task_shared = shared.clone();
        let task_topic = topic.clone();

        let thread = thread::Builder::new()
            .name(format!("emit-{}", topic))
            .spawn(move || {
                log::info!(
                    "Scheduled emission to '{}' every {:?} started",
                    task_topic,
                    interval
                );
                let mut next_tick = Instant::now() + interval;

                while !task_shared.wait_until(next_tick) {
                    let emission = source.next_emission();
                    match producer.publish_with_headers(
                        &task_topic,
                        emission.key.as_deref(),
                        &emission.payload,
                        emission.headers,
                    ) {
                        Ok(_) => {
                            task_shared.emitted.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            task_shared.failed.fetch_add(1, Ordering::Relaxed);
                            log::warn!("Scheduled emission to '{}' failed: {}", task_topic, err);
                        }
                    }

                    next_tick += interval;
                    let now = Instant::now();
                    while next_tick <= now {
                        next_tick += interval;
                    }
                }

                log::info!("Scheduled emission to '{}' stopped", task_topic);
            })
            .map_err(|e| PubSubError::from_io(e, "Failed to spawn emission thread"))?;

        Ok(Self {
            topic,
            interval,
            shared,
            thread: Some(thread),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Counters so far
    pub fn stats(&self) -> EmissionStats {
        self.shared.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }

    /// Stop the task, waiting for an in-progress publish to finish
    pub fn stop(mut self) -> EmissionStats {
        self.shutdown();
        self.shared.snapshot()
    }

    fn shutdown(&mut self) {
        {
            let mut stopped = self.shared.stopped.lock().unwrap();
            *stopped = true;
        }
        self.shared.wake.notify_all();

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Emission thread for '{}' panicked", self.topic);
            }
        }
    }
}

impl Drop for ScheduledEmission {
    fn drop(&mut self) {
        self.shutdown();
    }
}
