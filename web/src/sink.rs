//! Log sink boundary.
//!
//! The observer hands finished records to a [`LogSink`]; what stores them
//! (stdout, a collector agent, a remote log API) is outside this crate.
//! Delivery is best-effort: the caller discards sink errors, and a slow or
//! failing sink never delays or fails the request that produced the record.

use std::future::Future;

use thiserror::Error;

/// Failure to deliver a record to the sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The transport behind the sink rejected or dropped the record.
    #[error("log transport failed: {0}")]
    Transport(String),
}

/// Destination for serialized log records.
///
/// Implementations must be cheap to clone: the observer clones the sink
/// into a spawned task for every record it emits.
pub trait LogSink: Clone + Send + Sync + 'static {
    /// Deliver one serialized record.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the record could not be delivered.
    fn send(&self, record: String) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Sink that emits records through `tracing` under the `request_log`
/// target, one compact JSON line per record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    async fn send(&self, record: String) -> Result<(), SinkError> {
        tracing::info!(target: "request_log", "{record}");
        Ok(())
    }
}

/// Sink that retains records in memory for assertions.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone, Default)]
pub struct CapturingSink {
    records: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl CapturingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records captured so far, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<String> {
        self.records.lock().map(|records| records.clone()).unwrap_or_default()
    }

    /// Number of records captured so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or_default()
    }

    /// Whether no record has been captured yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl LogSink for CapturingSink {
    async fn send(&self, record: String) -> Result<(), SinkError> {
        self.records
            .lock()
            .map_err(|_| SinkError::Transport("capture buffer poisoned".to_string()))?
            .push(record);
        Ok(())
    }
}
