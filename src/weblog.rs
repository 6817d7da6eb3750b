//! Operator log feed.
//!
//! Every message goes to `tracing` and is offered to each subscriber's
//! bounded queue without waiting. A subscriber whose queue is full misses
//! the message; a subscriber whose receiver is gone is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};

pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub time: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

struct Shared {
    subscribers: Mutex<HashMap<u64, mpsc::Sender<LogEvent>>>,
    next_id: AtomicU64,
    dropped: AtomicU64,
    capacity: usize,
}

impl Shared {
    fn subscribers(&self) -> MutexGuard<'_, HashMap<u64, mpsc::Sender<LogEvent>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cheap to clone; all clones publish to the same subscribers.
#[derive(Clone)]
pub struct LogBroadcaster {
    shared: Arc<Shared>,
}

impl LogBroadcaster {
    /// `capacity` is the queue length of each subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                capacity: capacity.max(1),
            }),
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.publish(LogLevel::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.publish(LogLevel::Warn, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(LogLevel::Error, message.into());
    }

    pub fn publish(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warn => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }
        let event = LogEvent {
            time: Utc::now(),
            level,
            message,
        };
        let mut subscribers = self.shared.subscribers();
        subscribers.retain(|_, tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }

    /// Registers a new sink. It is unregistered when the subscription is dropped.
    pub fn subscribe(&self) -> LogSubscription {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.shared.capacity);
        self.shared.subscribers().insert(id, tx);
        tracing::debug!("log subscriber {} registered", id);
        LogSubscription {
            id,
            rx,
            shared: self.shared.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers().len()
    }

    /// Messages discarded because a subscriber's queue was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

pub struct LogSubscription {
    id: u64,
    rx: mpsc::Receiver<LogEvent>,
    shared: Arc<Shared>,
}

impl LogSubscription {
    pub async fn recv(&mut self) -> Option<LogEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<LogEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for LogSubscription {
    fn drop(&mut self) {
        self.shared.subscribers().remove(&self.id);
        tracing::debug!("log subscriber {} unregistered", self.id);
    }
}
