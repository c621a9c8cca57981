//! Cooperative cancellation for blocking queue calls.
//!
//! Blocking operations poll their token at every suspension point (before a
//! CAS round, a yield, or a signal wait) and bail out with
//! [`QueueError::Cancelled`](crate::QueueError::Cancelled) once it trips.
//! Cancellation never disturbs shared queue state.

use crate::error::QueueError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Owner side of a cancellation flag. Dropping the source does not cancel
/// the tokens handed out; call [`cancel`](Self::cancel) explicitly.
#[derive(Debug, Default)]
pub struct CancellationSource {
    flag: Arc<AtomicBool>,
}

impl CancellationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token observing this source.
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            flag: Arc::clone(&self.flag),
        }
    }

    /// Trips every token handed out by this source. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

/// Observer side of a cancellation flag.
///
/// The `Default` token has no source and never cancels; use it for calls
/// that should run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn bail_if_cancelled(&self) -> Result<(), QueueError> {
        if self.is_cancelled() {
            Err(QueueError::Cancelled)
        } else {
            Ok(())
        }
    }
}
