//! Per-request execution context
//!
//! Carries the caller's deadline and cancellation signal down to every store
//! call. Dropping a request future already cancels the call in flight; the
//! context covers the cases where the caller wants to stop work it does not
//! own (server shutdown) or bound it in time (operation timeout).

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::db::{StoreError, StoreResult};

/// Deadline, cancellation token and trace id for one inbound operation
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
    trace_id: Option<String>,
}

impl RequestContext {
    /// Context without deadline that is never cancelled from outside
    pub fn background() -> Self {
        Self::default()
    }

    /// Context whose cancellation follows `parent`
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            deadline: None,
            cancel: parent.child_token(),
            trace_id: None,
        }
    }

    /// Set the deadline to `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Set an absolute deadline, keeping an earlier one if already present
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run one store operation under this context.
    ///
    /// Fails fast with `Cancelled` or `DeadlineExceeded` when the context is
    /// already done, and aborts the operation as soon as either happens while
    /// it is pending.
    pub async fn run<T, F>(&self, operation: &'static str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        if self.is_cancelled() {
            return Err(StoreError::Cancelled(operation));
        }

        let bounded = async {
            match self.deadline {
                Some(deadline) if deadline <= Instant::now() => {
                    Err(StoreError::DeadlineExceeded(operation))
                }
                Some(deadline) => match tokio::time::timeout_at(deadline, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(StoreError::DeadlineExceeded(operation)),
                },
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StoreError::Cancelled(operation)),
            result = bounded => result,
        }
    }
}
