//! Operator cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use grokdock_common::error::{CiError, Result};

/// Shared flag set by the interrupt handler and observed by every wait.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fails with `CiError::Interrupted` once cancelled.
    ///
    /// # Errors
    ///
    /// Returns `CiError::Interrupted` if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CiError::Interrupted)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let handler_side = token.clone();
        assert!(token.check().is_ok());
        handler_side.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(CiError::Interrupted)));
    }
}
