//! Subscription types.

use crate::types::Message;
use crossbeam_channel::TrySendError;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use tracing::warn;

/// Receives messages delivered by a subscription.
///
/// Called on the subscription's own poll thread, never on the caller's,
/// and only ever from that one thread, so listeners need not be `Sync`.
/// Hosts that need their own context should forward the message, e.g. by
/// passing a `crossbeam_channel::Sender<Message>` as the listener.
pub trait MessageListener: Send + 'static {
    fn on_message(&self, message: &Message);
}

impl<F> MessageListener for F
where
    F: Fn(&Message) + Send + 'static,
{
    fn on_message(&self, message: &Message) {
        self(message)
    }
}

/// Never blocks the poll thread: a full bounded channel drops the message.
impl MessageListener for crossbeam_channel::Sender<Message> {
    fn on_message(&self, message: &Message) {
        match self.try_send(message.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                warn!(id = %dropped.id, "listener channel full, message dropped");
            }
            // A dropped receiver just means nobody is listening anymore.
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Lifecycle of a polling subscription. `Stopped` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Created,
    Running,
    Stopped,
}

impl SubscriptionState {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            SubscriptionState::Created => 0,
            SubscriptionState::Running => 1,
            SubscriptionState::Stopped => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => SubscriptionState::Created,
            1 => SubscriptionState::Running,
            _ => SubscriptionState::Stopped,
        }
    }
}

/// Atomic holder for a [`SubscriptionState`].
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: SubscriptionState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub(crate) fn get(&self) -> SubscriptionState {
        SubscriptionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move from `from` to `to`. Returns the state found on failure.
    pub(crate) fn transition(
        &self,
        from: SubscriptionState,
        to: SubscriptionState,
    ) -> Result<(), SubscriptionState> {
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(SubscriptionState::from_u8)
    }

    /// Force `Stopped`, returning the previous state.
    pub(crate) fn stop(&self) -> SubscriptionState {
        SubscriptionState::from_u8(
            self.0
                .swap(SubscriptionState::Stopped.as_u8(), Ordering::SeqCst),
        )
    }
}

/// Counters for one subscription.
///
/// Failed cycles are absorbed by the poll loop; this is where they stay
/// visible.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SubscriptionStats {
    /// Poll cycles started.
    pub cycles: u64,
    /// Poll cycles that ended in an error.
    pub failed_cycles: u64,
    /// Messages handed to the listener.
    pub delivered: u64,
}

#[derive(Default)]
pub(crate) struct StatsCounters {
    cycles: AtomicU64,
    failed_cycles: AtomicU64,
    delivered: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn cycle_started(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cycle_failed(&self) {
        self.failed_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn delivered(&self, count: usize) {
        self.delivered.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SubscriptionStats {
        SubscriptionStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            failed_cycles: self.failed_cycles.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
        }
    }
}
