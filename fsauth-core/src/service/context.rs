use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::AuthServiceError;

/// Per-call deadline and cancellation signal.
///
/// Every storage call made on behalf of a request is raced against both.
/// When either fires the storage future is dropped, which rolls back any
/// open transaction.
#[derive(Debug, Clone)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl Default for CallContext {
    fn default() -> Self {
        Self {
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl CallContext {
    /// A fresh context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::default().timeout(timeout)
    }

    /// Tighten the deadline to `timeout` from now. An earlier deadline is
    /// kept.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
        self
    }

    /// Tie this call to an outer cancellation token (e.g. server shutdown).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Absolute deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Run `fut` unless the deadline passes or the call is cancelled first.
    pub async fn bound<F, T>(&self, fut: F) -> Result<T, AuthServiceError>
    where
        F: Future<Output = T>,
    {
        if self.cancel.is_cancelled() {
            return Err(AuthServiceError::Cancelled);
        }

        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AuthServiceError::Cancelled),
            _ = deadline => Err(AuthServiceError::DeadlineExceeded),
            value = fut => Ok(value),
        }
    }
}
