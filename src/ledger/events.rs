//! Admitted-alert notifications.
//!
//! All subscribers share one bounded broadcast ring. Publishing never
//! blocks the append path: a subscriber that falls more than `capacity`
//! events behind loses the oldest ones and sees the gap as lag.

use serde::Serialize;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::ledger::alert::{Alert, LedgerEntry};

/// One admitted alert and its position in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertEvent {
    pub sequence: u64,
    pub entry_hash: String,
    pub alert: Alert,
}

impl From<&LedgerEntry> for AlertEvent {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            sequence: entry.sequence,
            entry_hash: entry.entry_hash.clone(),
            alert: entry.alert.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AlertEvent>,
}

impl EventBus {
    /// Each subscriber may fall `capacity` events behind before it lags.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> Subscription {
        let receiver = self.sender.subscribe();
        log::debug!(
            "SUBSCRIBER_ADDED subscribers={}",
            self.sender.receiver_count()
        );
        Subscription {
            receiver,
            lagged: 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Offer `event` to every subscriber. Returns how many were listening.
    pub fn publish(&self, event: &AlertEvent) -> usize {
        // Err only means nobody is subscribed.
        self.sender.send(event.clone()).unwrap_or(0)
    }
}

/// Receiving end of a subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<AlertEvent>,
    lagged: u64,
}

impl Subscription {
    /// Events this subscriber missed because it fell too far behind.
    pub fn lagged(&self) -> u64 {
        self.lagged
    }

    /// Next buffered event, skipping over any lag gap.
    pub fn try_recv(&mut self) -> Option<AlertEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(missed)) => self.record_lag(missed),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Block the current thread until the next event. `None` once the
    /// ledger is gone. Must not be called from inside an async runtime.
    pub fn recv_blocking(&mut self) -> Option<AlertEvent> {
        loop {
            match self.receiver.blocking_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => self.record_lag(missed),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Every event currently buffered, without waiting.
    pub fn drain(&mut self) -> Vec<AlertEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn unsubscribe(self) {}

    fn record_lag(&mut self, missed: u64) {
        self.lagged += missed;
        log::warn!("SUBSCRIBER_LAGGING missed={} total_missed={}", missed, self.lagged);
    }
}
