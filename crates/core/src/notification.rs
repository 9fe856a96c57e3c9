//! User-facing notifications raised by state changes.
//!
//! Every applied action and every completed sterilization cycle produces a [`Notification`].
//! Where they go is decided by whoever builds the [`NotificationSink`]: the binary logs them
//! and keeps a short history for the REST surface; tests record them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub level: NotificationLevel,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn info(
        title: impl Into<String>,
        description: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(NotificationLevel::Info, title, description, at)
    }

    pub fn warning(
        title: impl Into<String>,
        description: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(NotificationLevel::Warning, title, description, at)
    }

    pub fn error(
        title: impl Into<String>,
        description: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(NotificationLevel::Error, title, description, at)
    }

    fn new(
        level: NotificationLevel,
        title: impl Into<String>,
        description: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            level,
            at,
        }
    }
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Emits each notification as a `tracing` event at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, n: Notification) {
        match n.level {
            NotificationLevel::Info => tracing::info!("{}: {}", n.title, n.description),
            NotificationLevel::Warning => tracing::warn!("{}: {}", n.title, n.description),
            NotificationLevel::Error => tracing::error!("{}: {}", n.title, n.description),
        }
    }
}

/// Keeps the most recent notifications in memory, oldest dropped first.
#[derive(Debug)]
pub struct RecordingSink {
    limit: usize,
    entries: Mutex<VecDeque<Notification>>,
}

impl RecordingSink {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Newest last.
    pub fn recent(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.limit {
            entries.pop_front();
        }
        entries.push_back(notification);
    }
}

/// Forwards every notification to each inner sink in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl NotificationSink for FanoutSink {
    fn notify(&self, notification: Notification) {
        for sink in &self.sinks {
            sink.notify(notification.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_drops_oldest_beyond_limit() {
        let sink = RecordingSink::new(2);
        let now = Utc::now();
        for title in ["one", "two", "three"] {
            sink.notify(Notification::info(title, "", now));
        }
        let titles: Vec<_> = sink.recent().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["two", "three"]);
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = Arc::new(RecordingSink::new(10));
        let b = Arc::new(RecordingSink::new(10));
        let fanout = FanoutSink::new().with(a.clone()).with(b.clone());

        fanout.notify(Notification::warning("Emergency over capacity", "51 / 50", Utc::now()));
        assert_eq!(a.recent().len(), 1);
        assert_eq!(b.recent()[0].level, NotificationLevel::Warning);
    }
}
