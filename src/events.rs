//! Structured event sink injected into every node component
//!
//! Components never log through globals; they receive an `Arc<dyn EventSink>`
//! at construction and report leveled events tagged with their source. An
//! implementation must not block and must not fail the caller.

use std::sync::Arc;
use tracing::Level;

pub trait EventSink: Send + Sync {
    fn event(&self, level: Level, source: &'static str, message: &str);

    fn debug(&self, source: &'static str, message: &str) {
        self.event(Level::DEBUG, source, message);
    }

    fn info(&self, source: &'static str, message: &str) {
        self.event(Level::INFO, source, message);
    }

    fn warn(&self, source: &'static str, message: &str) {
        self.event(Level::WARN, source, message);
    }

    fn error(&self, source: &'static str, message: &str) {
        self.event(Level::ERROR, source, message);
    }
}

/// Forwards events to the `tracing` subscriber installed by the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn event(&self, level: Level, source: &'static str, message: &str) {
        match level {
            Level::ERROR => tracing::error!(source, "{}", message),
            Level::WARN => tracing::warn!(source, "{}", message),
            Level::INFO => tracing::info!(source, "{}", message),
            Level::DEBUG => tracing::debug!(source, "{}", message),
            Level::TRACE => tracing::trace!(source, "{}", message),
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn event(&self, _level: Level, _source: &'static str, _message: &str) {}
}

pub fn tracing_sink() -> Arc<dyn EventSink> {
    Arc::new(TracingSink)
}

pub fn null_sink() -> Arc<dyn EventSink> {
    Arc::new(NullSink)
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;

    #[test]
    fn test_default_methods_carry_level_and_source() {
        let sink = RecordingSink::default();
        sink.info("ledger", "seeded");
        sink.warn("worker", "peer down");

        let events = sink.events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, Level::INFO);
        assert_eq!(events[0].1, "ledger");
        assert_eq!(events[1].0, Level::WARN);
        assert_eq!(events[1].2, "peer down");
    }

    #[test]
    fn test_null_sink_accepts_everything() {
        let sink = null_sink();
        sink.error("pow", "ignored");
    }
}
