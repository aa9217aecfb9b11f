use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLogEntry {
    pub received_at: DateTime<Utc>,
    pub input: JsonValue,
    pub output: JsonValue,
}

/// Operational record of handled requests. Not read by the scheduling pipeline.
pub trait RequestLog: Send + Sync {
    fn append(&self, entry: RequestLogEntry);
    fn len(&self) -> usize;
    fn recent(&self, limit: usize) -> Vec<RequestLogEntry>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps the newest `capacity` entries; older ones are evicted first.
pub struct InMemoryRequestLog {
    capacity: usize,
    entries: Mutex<VecDeque<RequestLogEntry>>,
}

impl InMemoryRequestLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }
}

impl RequestLog for InMemoryRequestLog {
    fn append(&self, entry: RequestLogEntry) {
        match self.entries.lock() {
            Ok(mut entries) => {
                while entries.len() >= self.capacity {
                    entries.pop_front();
                }
                entries.push_back(entry);
            }
            Err(_) => warn!(target: "app::http", "request log lock poisoned; entry dropped"),
        }
    }

    fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    fn recent(&self, limit: usize) -> Vec<RequestLogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.iter().rev().take(limit).rev().cloned().collect())
            .unwrap_or_default()
    }
}
