use std::{fmt, sync::Arc, time::Duration};

use fsauth_core::{AuthService, CallContext};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub service_name: Arc<str>,
    request_timeout: Duration,
    shutdown: CancellationToken,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("service_name", &self.service_name)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        auth_service: Arc<AuthService>,
        service_name: impl Into<Arc<str>>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            auth_service,
            service_name: service_name.into(),
            request_timeout,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelled once the server starts shutting down.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Deadline and cancellation for one incoming request.
    pub fn call_context(&self) -> CallContext {
        CallContext::with_timeout(self.request_timeout)
            .with_cancellation(self.shutdown.child_token())
    }
}
