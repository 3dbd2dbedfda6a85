use std::{sync::Arc, time::Duration};

use opentelemetry_sdk::{error::OTelSdkError, trace::SdkTracerProvider};
use tokio::task::JoinError;

#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    #[error("telemetry flush timed out after {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Export(#[from] OTelSdkError),
    #[error("telemetry flush task failed: {0}")]
    Join(#[from] JoinError),
}

/// Pushes buffered telemetry to the backend.
///
/// Implementations may block; [`flush_with_timeout`] runs them off the async
/// executor.
pub trait Flush: Send + Sync + 'static {
    fn flush(&self) -> Result<(), FlushError>;
}

impl Flush for SdkTracerProvider {
    fn flush(&self) -> Result<(), FlushError> {
        self.force_flush()?;
        Ok(())
    }
}

/// Flushes `flusher`, giving up after `timeout`.
///
/// A flush that times out keeps running in the background, its result is
/// discarded.
pub async fn flush_with_timeout(
    flusher: Arc<dyn Flush>,
    timeout: Duration,
) -> Result<(), FlushError> {
    let task = tokio::task::spawn_blocking(move || flusher.flush());

    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => joined?,
        Err(_) => Err(FlushError::TimedOut(timeout)),
    }
}
