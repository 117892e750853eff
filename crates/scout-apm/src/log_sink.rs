// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `Log` capability spec §1 calls out as out of scope for the core: a
//! thin seam embedding programs may implement to receive a copy of every log
//! event the engine emits, without replacing `tracing` as the crate's own
//! logging mechanism.

use tracing::Level;

/// A level/message pair handed to [`LogSink::on_log`].
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Severity of the event.
    pub level: Level,
    /// Rendered message text.
    pub message: String,
}

/// Receives a copy of log events the engine emits. Implement this to pipe
/// `scout-apm`'s diagnostics into an embedding application's own log
/// pipeline; the default implementation ([`TracingLogSink`]) just forwards
/// to `tracing`, which is what every crate in this workspace logs through
/// regardless.
pub trait LogSink: Send + Sync {
    /// Called for each log event the engine wants to surface to embedders.
    fn on_log(&self, record: &LogRecord);
}

/// The default [`LogSink`]: re-emits through `tracing` at the matching
/// level, which is where the event already went — this sink exists so
/// `Engine` always has one installed, not to add a second log destination.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn on_log(&self, record: &LogRecord) {
        match record.level {
            Level::ERROR => tracing::error!(target: "scout_apm::log_sink", "{}", record.message),
            Level::WARN => tracing::warn!(target: "scout_apm::log_sink", "{}", record.message),
            Level::INFO => tracing::info!(target: "scout_apm::log_sink", "{}", record.message),
            Level::DEBUG => tracing::debug!(target: "scout_apm::log_sink", "{}", record.message),
            Level::TRACE => tracing::trace!(target: "scout_apm::log_sink", "{}", record.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingSink {
        records: Mutex<Vec<String>>,
    }

    impl LogSink for RecordingSink {
        fn on_log(&self, record: &LogRecord) {
            self.records.lock().unwrap().push(record.message.clone());
        }
    }

    #[test]
    fn custom_sink_receives_forwarded_records() {
        let sink = Arc::new(RecordingSink { records: Mutex::new(Vec::new()) });
        sink.on_log(&LogRecord { level: Level::WARN, message: "core agent unreachable".into() });
        assert_eq!(sink.records.lock().unwrap().as_slice(), ["core agent unreachable"]);
    }

    #[test]
    fn tracing_log_sink_does_not_panic_at_any_level() {
        let sink = TracingLogSink;
        for level in [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE] {
            sink.on_log(&LogRecord { level, message: "hello".into() });
        }
    }
}
