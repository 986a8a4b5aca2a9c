//! Request context for handlers.
//!
//! Every callback receives the context of the request it runs in:
//! - `watermark` - the engine's event-time progress for this batch
//! - `cancellation` - fires when the caller gives up on the request
//!
//! # Example
//!
//! ```
//! use rxn_handler::handler::RequestContext;
//!
//! let ctx = RequestContext::new();
//! assert!(!ctx.is_cancelled());
//! ctx.cancellation_token().cancel();
//! assert!(ctx.is_cancelled());
//! ```

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

/// Context passed to handler callbacks.
///
/// Cheap to clone; clones share the same cancellation token.
#[derive(Debug, Clone)]
pub struct RequestContext {
    watermark: DateTime<Utc>,
    cancel: CancellationToken,
}

impl RequestContext {
    /// A context with a fresh token and the watermark at the Unix epoch.
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// A context observing an existing token.
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            watermark: DateTime::<Utc>::UNIX_EPOCH,
            cancel,
        }
    }

    /// Copy of this context with a different watermark.
    pub fn with_watermark(&self, watermark: DateTime<Utc>) -> Self {
        Self {
            watermark,
            cancel: self.cancel.clone(),
        }
    }

    /// The watermark of the batch being processed.
    #[inline]
    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Resolves when the request is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
