//! Structured logging capability.
//!
//! The core depends only on the [`Logger`] trait, never on a concrete
//! transport. `spec.md` §6 specifies debug/info/warn/error, each taking a
//! message and a structured payload; [`TracingLogger`] forwards that to
//! the `tracing` crate.

// Layer 2: Third-party crate imports
use serde_json::Value;

/// Structured debug/info/warn/error sink.
///
/// Implementations MUST NOT block or perform blocking I/O on the calling
/// thread; `nanny-core` may call these from inside the single event loop.
pub trait Logger: Send + Sync + 'static {
    /// Log a debug-level message with structured fields.
    fn debug(&self, message: &str, fields: Value);
    /// Log an info-level message with structured fields.
    fn info(&self, message: &str, fields: Value);
    /// Log a warn-level message with structured fields.
    fn warn(&self, message: &str, fields: Value);
    /// Log an error-level message with structured fields.
    fn error(&self, message: &str, fields: Value);
}

/// Default [`Logger`] that forwards to the `tracing` ecosystem.
///
/// # Examples
///
/// ```rust
/// use nanny_core::logger::{Logger, TracingLogger};
/// use serde_json::json;
///
/// let logger = TracingLogger;
/// logger.info("worker started", json!({ "id": "0" }));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str, fields: Value) {
        tracing::debug!(fields = %fields, "{message}");
    }

    fn info(&self, message: &str, fields: Value) {
        tracing::info!(fields = %fields, "{message}");
    }

    fn warn(&self, message: &str, fields: Value) {
        tracing::warn!(fields = %fields, "{message}");
    }

    fn error(&self, message: &str, fields: Value) {
        tracing::error!(fields = %fields, "{message}");
    }
}

/// A [`Logger`] that discards everything. Useful for benchmarks and tests
/// that don't want log noise.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn debug(&self, _message: &str, _fields: Value) {}
    fn info(&self, _message: &str, _fields: Value) {}
    fn warn(&self, _message: &str, _fields: Value) {}
    fn error(&self, _message: &str, _fields: Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct RecordingLogger(Arc<Mutex<Vec<String>>>);

    impl Logger for RecordingLogger {
        fn debug(&self, message: &str, _fields: Value) {
            self.0.lock().unwrap().push(format!("debug:{message}"));
        }
        fn info(&self, message: &str, _fields: Value) {
            self.0.lock().unwrap().push(format!("info:{message}"));
        }
        fn warn(&self, message: &str, _fields: Value) {
            self.0.lock().unwrap().push(format!("warn:{message}"));
        }
        fn error(&self, message: &str, _fields: Value) {
            self.0.lock().unwrap().push(format!("error:{message}"));
        }
    }

    #[test]
    fn recording_logger_captures_level_and_message() {
        let logger = RecordingLogger::default();
        logger.info("hello", Value::Null);
        logger.warn("careful", Value::Null);
        assert_eq!(*logger.0.lock().unwrap(), vec!["info:hello", "warn:careful"]);
    }

    #[test]
    fn noop_logger_does_not_panic() {
        let logger = NoopLogger;
        logger.debug("x", Value::Null);
        logger.info("x", Value::Null);
        logger.warn("x", Value::Null);
        logger.error("x", Value::Null);
    }

    #[test]
    fn tracing_logger_emits_through_a_real_subscriber() {
        // Without an installed subscriber the `tracing` macros are no-ops,
        // so this is the only test that actually exercises the
        // field-formatting path in `TracingLogger` rather than just
        // calling into a macro nobody is listening to.
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::fmt().with_test_writer().finish(),
        );
        let logger = TracingLogger;
        logger.debug("worker starting", serde_json::json!({ "id": "0" }));
        logger.info("worker listening", serde_json::json!({ "port": 8080 }));
        logger.warn("slow health check", serde_json::json!({ "load_ms": 250 }));
        logger.error("worker exited", serde_json::json!({ "id": "0" }));
    }
}
