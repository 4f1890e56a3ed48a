//! Cooperative stop signal shared between a run and its controllers.

use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Cloneable handle that requests a running cross-validation to stop.
///
/// Stopping is sticky and idempotent. It may be requested from any thread,
/// including one that is not running a tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            warn!("Cross-validation stop requested");
        }
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`stop`](Self::stop) has been called.
    pub async fn stopped(&self) {
        self.token.cancelled().await
    }
}
