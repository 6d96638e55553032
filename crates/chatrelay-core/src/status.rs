//! Runtime status for the dashboard
//!
//! [`StatusRecorder`] is held by the message runtime and bumps counters.
//! [`StatusReporter`] is held by the HTTP layer and only reads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::config::TransportMode;
use crate::conversation::ConversationStore;

#[derive(Debug)]
struct StatusState {
    started_at: DateTime<Utc>,
    started: Instant,
    model: String,
    transport: TransportMode,
    online: AtomicBool,
    messages: AtomicU64,
    responses: AtomicU64,
    failures: AtomicU64,
    response_time_total_ms: AtomicU64,
    last_error: RwLock<Option<String>>,
    last_message_at: RwLock<Option<DateTime<Utc>>>,
}

/// Create a linked recorder/reporter pair.
pub fn status_channel(
    store: Arc<ConversationStore>,
    model: impl Into<String>,
    transport: TransportMode,
) -> (StatusRecorder, StatusReporter) {
    let state = Arc::new(StatusState {
        started_at: Utc::now(),
        started: Instant::now(),
        model: model.into(),
        transport,
        online: AtomicBool::new(false),
        messages: AtomicU64::new(0),
        responses: AtomicU64::new(0),
        failures: AtomicU64::new(0),
        response_time_total_ms: AtomicU64::new(0),
        last_error: RwLock::new(None),
        last_message_at: RwLock::new(None),
    });

    (
        StatusRecorder {
            state: state.clone(),
        },
        StatusReporter { state, store },
    )
}

#[derive(Debug, Clone)]
pub struct StatusRecorder {
    state: Arc<StatusState>,
}

impl StatusRecorder {
    pub fn set_online(&self, online: bool) {
        self.state.online.store(online, Ordering::SeqCst);
    }

    /// Count one inbound user message.
    pub fn record_inbound(&self) {
        self.state.messages.fetch_add(1, Ordering::Relaxed);
        *self.state.last_message_at.write() = Some(Utc::now());
    }

    /// Count one delivered assistant reply and its completion latency.
    pub fn record_response(&self, latency: Duration) {
        self.state.responses.fetch_add(1, Ordering::Relaxed);
        self.state
            .response_time_total_ms
            .fetch_add(latency.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, error: impl ToString) {
        self.state.failures.fetch_add(1, Ordering::Relaxed);
        self.record_error(error);
    }

    /// Remember an error without counting it as a completion failure.
    pub fn record_error(&self, error: impl ToString) {
        *self.state.last_error.write() = Some(error.to_string());
    }
}

/// Point-in-time view served at `/api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub online: bool,
    pub users: usize,
    pub messages: u64,
    pub responses: u64,
    pub failures: u64,
    /// Seconds since startup
    pub uptime: u64,
    pub started_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub average_response_ms: Option<u64>,
    pub model: String,
    pub transport: TransportMode,
}

#[derive(Debug, Clone)]
pub struct StatusReporter {
    state: Arc<StatusState>,
    store: Arc<ConversationStore>,
}

impl StatusReporter {
    pub fn is_online(&self) -> bool {
        self.state.online.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let state = &self.state;
        let responses = state.responses.load(Ordering::Relaxed);
        let average_response_ms = (responses > 0)
            .then(|| state.response_time_total_ms.load(Ordering::Relaxed) / responses);

        StatusSnapshot {
            online: self.is_online(),
            users: self.store.user_count(),
            messages: state.messages.load(Ordering::Relaxed),
            responses,
            failures: state.failures.load(Ordering::Relaxed),
            uptime: state.started.elapsed().as_secs(),
            started_at: state.started_at,
            last_message_at: *state.last_message_at.read(),
            last_error: state.last_error.read().clone(),
            average_response_ms,
            model: state.model.clone(),
            transport: state.transport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ChatRole;

    #[test]
    fn test_fresh_snapshot() {
        let store = Arc::new(ConversationStore::default());
        let (_recorder, reporter) = status_channel(store, "openai/gpt-4o", TransportMode::Polling);

        let snapshot = reporter.snapshot();
        assert!(!snapshot.online);
        assert_eq!(snapshot.users, 0);
        assert_eq!(snapshot.messages, 0);
        assert_eq!(snapshot.average_response_ms, None);
        assert!(snapshot.last_error.is_none());
        assert!(snapshot.last_message_at.is_none());
        assert_eq!(snapshot.model, "openai/gpt-4o");
    }

    #[test]
    fn test_counters_and_users() {
        let store = Arc::new(ConversationStore::default());
        let (recorder, reporter) =
            status_channel(store.clone(), "m", TransportMode::Webhook);

        recorder.set_online(true);
        store.append("a", ChatRole::User, "hi");
        store.append("b", ChatRole::User, "hi");
        recorder.record_inbound();
        recorder.record_inbound();
        recorder.record_response(Duration::from_millis(100));
        recorder.record_response(Duration::from_millis(300));
        recorder.record_failure("upstream 502");

        let snapshot = reporter.snapshot();
        assert!(snapshot.online);
        assert_eq!(snapshot.users, 2);
        assert_eq!(snapshot.messages, 2);
        assert_eq!(snapshot.responses, 2);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.average_response_ms, Some(200));
        assert_eq!(snapshot.last_error.as_deref(), Some("upstream 502"));
        assert!(snapshot.last_message_at.is_some());
    }

    #[test]
    fn test_snapshot_serializes_transport_lowercase() {
        let store = Arc::new(ConversationStore::default());
        let (_recorder, reporter) = status_channel(store, "m", TransportMode::Webhook);

        let json = serde_json::to_value(reporter.snapshot()).unwrap();
        assert_eq!(json["transport"], "webhook");
        assert!(json["uptime"].is_u64());
        assert!(json["users"].is_u64());
    }
}
