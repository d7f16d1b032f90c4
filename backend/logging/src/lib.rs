//! Structured logging for ocrgate.
//!
//! Console output, optional daily rolling NDJSON files, and request outcome events.

pub mod event_logger;
pub mod logger;

pub use event_logger::{EventLogEntry, EventLogger, RequestEvent};
pub use logger::init_logger;
