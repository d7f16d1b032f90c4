//! Request outcome events, emitted on the `ocr_events` target.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestEvent {
    Completed {
        languages: String,
        regions: usize,
        init_ms: u64,
        ocr_ms: u64,
    },
    Rejected {
        reason: String,
    },
    Failed {
        kind: String,
        message: String,
    },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub event: RequestEvent,
}

pub struct EventLogger;

impl EventLogger {
    pub fn log_event(request_id: &str, elapsed: Duration, event: RequestEvent) -> EventLogEntry {
        let entry = EventLogEntry {
            request_id: request_id.to_string(),
            timestamp: Utc::now(),
            elapsed_ms: elapsed.as_millis() as u64,
            event,
        };

        match &entry.event {
            RequestEvent::Failed { .. } => {
                warn!(target: "ocr_events", request_id = %entry.request_id, event = ?entry, "Request failed")
            }
            _ => {
                info!(target: "ocr_events", request_id = %entry.request_id, event = ?entry, "Request finished")
            }
        }
        entry
    }
}
