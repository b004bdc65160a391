use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{JimakuError, Result};

/// Cooperative cancellation shared between a compile run and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails with [`JimakuError::Cancelled`] once `cancel` has been called.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(JimakuError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let handle = token.clone();
        assert!(token.checkpoint().is_ok());
        handle.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.checkpoint(), Err(JimakuError::Cancelled)));
    }
}
