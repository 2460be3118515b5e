//! Listener lifecycle
//!
//! Every registered listener runs on its own thread:
//!
//! ```text
//! Registered -> Subscribing -> Active <-> Backoff
//!                    |            |          |
//!                    v            v          v
//!                  Failed      Stopped     Failed
//! ```
//!
//! Connection loss while subscribing or polling moves the listener to
//! `Backoff`; it retries with exponential delay and returns to `Active` on
//! the first successful poll. Exhausting the retry budget or hitting a
//! non-transient error moves it to `Failed`. A stop request lets the
//! message in flight finish, then leaves the group.

use std::{
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{atomic::Ordering, Arc, Condvar, Mutex},
    thread::JoinHandle,
    time::{Duration, Instant},
};

use super::{
    handler::MessageHandler,
    stats::{ListenerCounters, ListenerStats},
    ConsumerConfig, ListenerSpec,
};
use crate::{
    broker::{BrokerClient, Subscription},
    codec::PayloadCodec,
    error::{PubSubError, Result},
    topic::ConsumerRecord,
};

/// Lifecycle state of a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Registered,
    Subscribing,
    Active,
    Backoff,
    Stopped,
    Failed,
}

impl ListenerState {
    pub fn name(self) -> &'static str {
        match self {
            ListenerState::Registered => "registered",
            ListenerState::Subscribing => "subscribing",
            ListenerState::Active => "active",
            ListenerState::Backoff => "backoff",
            ListenerState::Stopped => "stopped",
            ListenerState::Failed => "failed",
        }
    }

    /// Whether the listener thread has exited
    pub fn is_terminal(self) -> bool {
        matches!(self, ListenerState::Stopped | ListenerState::Failed)
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
struct Control {
    state: ListenerState,
    stop_requested: bool,
    member_id: Option<String>,
    last_error: Option<String>,
}

/// State shared between a listener thread and its handles
#[derive(Debug)]
pub(super) struct ListenerShared {
    name: String,
    spec: ListenerSpec,
    control: Mutex<Control>,
    changed: Condvar,
    counters: ListenerCounters,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ListenerShared {
    pub(super) fn new(name: String, spec: ListenerSpec) -> Self {
        Self {
            name,
            spec,
            control: Mutex::new(Control {
                state: ListenerState::Registered,
                stop_requested: false,
                member_id: None,
                last_error: None,
            }),
            changed: Condvar::new(),
            counters: ListenerCounters::default(),
            thread: Mutex::new(None),
        }
    }

    pub(super) fn attach_thread(&self, thread: JoinHandle<()>) {
        *self.thread.lock().unwrap() = Some(thread);
    }

    fn state(&self) -> ListenerState {
        self.control.lock().unwrap().state
    }

    fn set_state(&self, state: ListenerState) {
        let previous = {
            let mut control = self.control.lock().unwrap();
            std::mem::replace(&mut control.state, state)
        };
        if previous != state {
            log::debug!("Listener {}: {} -> {}", self.name, previous, state);
            self.changed.notify_all();
        }
    }

    fn fail(&self, err: &PubSubError) {
        log::error!("Listener {} failed: {}", self.name, err);
        {
            let mut control = self.control.lock().unwrap();
            control.last_error = Some(err.to_string());
        }
        self.set_state(ListenerState::Failed);
    }

    fn stop_requested(&self) -> bool {
        self.control.lock().unwrap().stop_requested
    }

    /// Sleep for `delay` unless a stop arrives first; true when stopped
    fn sleep_unless_stopped(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        let mut control = self.control.lock().unwrap();
        loop {
            if control.stop_requested {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self.changed.wait_timeout(control, deadline - now).unwrap();
            control = guard;
        }
    }

    /// Request a stop and join the thread; idempotent
    pub(super) fn stop(&self) -> ListenerStats {
        self.control.lock().unwrap().stop_requested = true;
        self.changed.notify_all();

        let thread = self.thread.lock().unwrap().take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                log::error!("Listener thread {} panicked", self.name);
                self.set_state(ListenerState::Failed);
            }
        }
        self.counters.snapshot()
    }

    pub(super) fn name(&self) -> &str {
        &self.name
    }

    pub(super) fn current_state(&self) -> ListenerState {
        self.state()
    }
}

/// Handle to a registered listener.
///
/// Dropping the handle stops the listener. The owning
/// [`ConsumerCore`](super::ConsumerCore) also stops every listener it
/// registered on shutdown.
#[derive(Debug)]
#[must_use = "dropping the handle stops it"]
pub struct ListenerHandle {
    shared: Arc<ListenerShared>,
}

impl ListenerHandle {
    pub(super) fn new(shared: Arc<ListenerShared>) -> Self {
        Self { shared }
    }

    /// Name of the form `topic/group#n`
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn spec(&self) -> &ListenerSpec {
        &self.shared.spec
    }

    pub fn state(&self) -> ListenerState {
        self.shared.state()
    }

    /// Group member id, once subscribed
    pub fn member_id(&self) -> Option<String> {
        self.shared.control.lock().unwrap().member_id.clone()
    }

    /// Message of the error that last moved the listener to `Backoff` or
    /// `Failed`
    pub fn last_error(&self) -> Option<String> {
        self.shared.control.lock().unwrap().last_error.clone()
    }

    pub fn stats(&self) -> ListenerStats {
        self.shared.counters.snapshot()
    }

    /// Block until the listener reaches `state`, a terminal state, or the
    /// timeout. Returns whether `state` was reached.
    pub fn wait_for_state(&self, state: ListenerState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut control = self.shared.control.lock().unwrap();
        loop {
            if control.state == state {
                return true;
            }
            if control.state.is_terminal() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .shared
                .changed
                .wait_timeout(control, deadline - now)
                .unwrap();
            control = guard;
        }
    }

    /// Block until the listener is subscribed and polling
    pub fn wait_until_active(&self, timeout: Duration) -> bool {
        self.wait_for_state(ListenerState::Active, timeout)
    }

    /// Stop the listener and wait for its thread to exit.
    ///
    /// A message already handed to the handler is finished first. Calling
    /// `stop` again, or on a failed listener, just returns the counters.
    pub fn stop(&self) -> ListenerStats {
        self.shared.stop()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

/// Body of a listener thread
pub(super) struct ListenerTask<H> {
    pub(super) shared: Arc<ListenerShared>,
    pub(super) client: Arc<dyn BrokerClient>,
    pub(super) codec: Arc<dyn PayloadCodec>,
    pub(super) handler: H,
    pub(super) config: ConsumerConfig,
}

impl<H: MessageHandler> ListenerTask<H> {
    pub(super) fn run(self) {
        let shared = self.shared.clone();
        if shared.stop_requested() {
            shared.set_state(ListenerState::Stopped);
            return;
        }

        let mut subscription = match self.subscribe() {
            Ok(Some(subscription)) => subscription,
            Ok(None) => {
                shared.set_state(ListenerState::Stopped);
                return;
            }
            Err(err) => {
                shared.fail(&err);
                return;
            }
        };

        let outcome = self.consume(subscription.as_mut());
        subscription.close();
        match outcome {
            Ok(()) => {
                let stats = shared.counters.snapshot();
                log::info!(
                    "Listener {} stopped (delivered {}, malformed {}, handler failures {})",
                    shared.name,
                    stats.delivered,
                    stats.malformed,
                    stats.handler_failures
                );
                shared.set_state(ListenerState::Stopped);
            }
            Err(err) => shared.fail(&err),
        }
    }

    /// Join the group, retrying connection loss. `None` when stopped first.
    fn subscribe(&self) -> Result<Option<Box<dyn Subscription>>> {
        let spec = &self.shared.spec;
        let mut attempt = 0;
        self.shared.set_state(ListenerState::Subscribing);

        loop {
            match self.client.subscribe(&spec.topic, &spec.group_id) {
                Ok(subscription) => {
                    log::info!(
                        "Listener {} subscribed as {} (partitions {:?})",
                        self.shared.name,
                        subscription.member_id(),
                        subscription.assignment()
                    );
                    self.shared.control.lock().unwrap().member_id =
                        Some(subscription.member_id().to_string());
                    self.shared.set_state(ListenerState::Active);
                    return Ok(Some(subscription));
                }
                Err(err) if err.is_connection_loss() => {
                    attempt += 1;
                    if self.back_off(attempt, &err)? {
                        return Ok(None);
                    }
                    self.shared.set_state(ListenerState::Subscribing);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn consume(&self, subscription: &mut dyn Subscription) -> Result<()> {
        let mut attempt = 0;

        while !self.shared.stop_requested() {
            match subscription.poll(self.config.poll_timeout()) {
                Ok(record) => {
                    if attempt > 0 {
                        log::info!(
                            "Listener {} recovered after {} attempt(s)",
                            self.shared.name,
                            attempt
                        );
                        attempt = 0;
                        self.shared.set_state(ListenerState::Active);
                    }
                    if let Some(record) = record {
                        self.dispatch(record);
                    }
                }
                Err(err) if err.is_connection_loss() => {
                    self.shared
                        .counters
                        .connection_losses
                        .fetch_add(1, Ordering::Relaxed);
                    attempt += 1;
                    if self.back_off(attempt, &err)? {
                        break;
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Enter `Backoff` and sleep. Errors once retries are exhausted; true
    /// when a stop arrived during the sleep.
    fn back_off(&self, attempt: u32, err: &PubSubError) -> Result<bool> {
        let retry = &self.config.retry;
        if attempt > retry.max_retries {
            return Err(PubSubError::connection_loss(format!(
                "gave up after {} retries: {}",
                retry.max_retries, err
            )));
        }

        let delay = retry.delay_for(attempt);
        log::warn!(
            "Listener {}: {} (retry {}/{} in {:?})",
            self.shared.name,
            err,
            attempt,
            retry.max_retries,
            delay
        );
        self.shared.control.lock().unwrap().last_error = Some(err.to_string());
        self.shared.set_state(ListenerState::Backoff);
        Ok(self.shared.sleep_unless_stopped(delay))
    }

    fn dispatch(&self, record: ConsumerRecord) {
        let metadata = &record.metadata;
        let payload = match self.codec.decode(&record.value) {
            Ok(payload) => payload,
            Err(err) => {
                let err = err.with_record_context(&metadata.topic, metadata.partition, metadata.offset);
                self.shared.counters.malformed.fetch_add(1, Ordering::Relaxed);
                log::warn!("Listener {} skipped record: {}", self.shared.name, err);
                return;
            }
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.handler.handle(&payload, metadata)
        }));
        match outcome {
            Ok(()) => {
                self.shared.counters.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(panic) => {
                self.shared
                    .counters
                    .handler_failures
                    .fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "Listener {} handler panicked on {}[{}]@{}: {}",
                    self.shared.name,
                    metadata.topic,
                    metadata.partition,
                    metadata.offset,
                    panic_message(panic.as_ref())
                );
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
