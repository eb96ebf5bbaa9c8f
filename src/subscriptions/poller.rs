//! Polling subscription: emulates a push channel over plain reads.

use crate::error::{Result, SyncError};
use crate::notify::NotificationDispatcher;
use crate::remote::{Collection, RemoteStore, StoreEndpoint};
use crate::types::{ChannelId, Message};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::types::{MessageListener, StateCell, StatsCounters, SubscriptionState, SubscriptionStats};

/// Child key holding conversation metadata rather than a message.
pub const META_KEY: &str = "meta";

/// Pick out the messages of `collection` whose ids are not in `seen`.
///
/// `seen` is left untouched; the caller marks each id right before handing
/// its message on, so a failed delivery leaves the rest of the batch for
/// the next cycle. The metadata entry and non-object children are never
/// produced.
pub fn new_messages(collection: &Collection, seen: &HashSet<String>) -> Vec<Message> {
    collection
        .iter()
        .filter(|(id, record)| {
            !seen.contains(*id) && *id != META_KEY && matches!(record, Value::Object(_))
        })
        .map(|(id, record)| Message::from_record(id, record))
        .collect()
}

/// Everything a poll thread needs, moved onto it at start.
struct PollTask {
    channel: ChannelId,
    store: Arc<dyn RemoteStore>,
    endpoint: StoreEndpoint,
    path: String,
    listener: Box<dyn MessageListener>,
    notifier: Option<Arc<NotificationDispatcher>>,
}

impl PollTask {
    /// One poll cycle: read, diff against `seen`, deliver.
    fn cycle(&self, seen: &mut HashSet<String>, stats: &StatsCounters) -> Result<()> {
        let Some(collection) = self.store.fetch_collection(&self.endpoint, &self.path)? else {
            return Ok(());
        };

        for message in new_messages(&collection, seen) {
            // Marked before the listener runs: a panic skips this id only.
            seen.insert(message.id.clone());
            debug!(channel = %self.channel, id = %message.id, "delivering message");
            self.listener.on_message(&message);
            stats.delivered(1);
            if let Some(notifier) = &self.notifier {
                if let Err(e) = notifier.notify(notifier.title(), &message.text) {
                    warn!(channel = %self.channel, error = %e, "notification failed");
                }
            }
        }
        Ok(())
    }

    fn run(self, interval: Duration, cancel: Receiver<()>, stats: Arc<StatsCounters>) {
        // Owned by this thread alone for the subscription's lifetime.
        let mut seen = HashSet::new();

        loop {
            match cancel.try_recv() {
                Err(TryRecvError::Empty) => {}
                Ok(()) | Err(TryRecvError::Disconnected) => break,
            }

            let started = Instant::now();
            stats.cycle_started();
            match panic::catch_unwind(AssertUnwindSafe(|| self.cycle(&mut seen, &stats))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    stats.cycle_failed();
                    warn!(channel = %self.channel, error = %e, "poll cycle failed");
                }
                Err(_) => {
                    stats.cycle_failed();
                    warn!(channel = %self.channel, "poll cycle panicked");
                }
            }

            // Fixed rate: the next cycle is due one interval after this one
            // started, and never before this one finished.
            match cancel.recv_deadline(started + interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        debug!(channel = %self.channel, "poll thread exiting");
    }
}

/// Polls one channel's message collection on a dedicated thread and
/// hands every newly seen message to a listener, once.
///
/// Lifecycle is `Created -> Running -> Stopped`. A stopped subscription
/// cannot be restarted; its seen-set is discarded, so a new subscription
/// for the same channel delivers the stored history again.
pub struct PollingSubscription {
    channel: ChannelId,
    interval: Duration,
    state: StateCell,
    stats: Arc<StatsCounters>,
    /// Present until `start` moves it onto the poll thread.
    task: Mutex<Option<PollTask>>,
    /// Dropping the sender cancels the poll thread.
    cancel: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PollingSubscription {
    pub fn new(
        channel: ChannelId,
        path: impl Into<String>,
        interval: Duration,
        store: Arc<dyn RemoteStore>,
        endpoint: StoreEndpoint,
        listener: Box<dyn MessageListener>,
        notifier: Option<Arc<NotificationDispatcher>>,
    ) -> Self {
        let task = PollTask {
            channel: channel.clone(),
            store,
            endpoint,
            path: path.into(),
            listener,
            notifier,
        };
        Self {
            channel,
            interval,
            state: StateCell::new(SubscriptionState::Created),
            stats: Arc::new(StatsCounters::default()),
            task: Mutex::new(Some(task)),
            cancel: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn state(&self) -> SubscriptionState {
        self.state.get()
    }

    pub fn stats(&self) -> SubscriptionStats {
        self.stats.snapshot()
    }

    /// Start polling. The first cycle runs immediately on the new thread.
    pub fn start(&self) -> Result<()> {
        // Held until the sender is stored so a concurrent `stop` cannot
        // miss it.
        let mut cancel_slot = self.cancel.lock();
        if let Err(found) = self
            .state
            .transition(SubscriptionState::Created, SubscriptionState::Running)
        {
            return Err(SyncError::InvalidOperation(format!(
                "cannot start subscription for {} in state {:?}",
                self.channel, found
            )));
        }

        let Some(task) = self.task.lock().take() else {
            return Err(SyncError::InvalidOperation(format!(
                "subscription for {} has no poll task",
                self.channel
            )));
        };

        let (cancel_tx, cancel_rx) = bounded(1);
        let interval = self.interval;
        let stats = Arc::clone(&self.stats);
        let spawned = thread::Builder::new()
            .name(format!("poll-{}", self.channel))
            .spawn(move || task.run(interval, cancel_rx, stats));

        match spawned {
            Ok(handle) => {
                *cancel_slot = Some(cancel_tx);
                *self.worker.lock() = Some(handle);
                info!(channel = %self.channel, interval_ms = interval.as_millis() as u64, "subscription started");
                Ok(())
            }
            Err(e) => {
                self.state.stop();
                Err(SyncError::Io(e))
            }
        }
    }

    /// Stop polling. Idempotent and non-blocking.
    ///
    /// A cycle already in flight may still finish and deliver, but no
    /// further cycle is scheduled.
    pub fn stop(&self) {
        let previous = self.state.stop();
        if previous == SubscriptionState::Stopped {
            return;
        }
        self.task.lock().take();
        if let Some(cancel) = self.cancel.lock().take() {
            let _ = cancel.try_send(());
        }
        info!(channel = %self.channel, "subscription stopped");
    }

    /// Stop and wait for the poll thread to exit.
    ///
    /// Called from the poll thread itself (e.g. inside a listener) this
    /// only stops.
    pub fn stop_and_join(&self) {
        self.stop();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!(channel = %self.channel, "poll thread panicked");
            }
        }
    }
}

impl Drop for PollingSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}
