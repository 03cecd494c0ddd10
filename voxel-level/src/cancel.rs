//! Cooperative cancellation for blocking suspension points (region I/O, lock
//! acquisition). Shaped like `tokio_util::sync::CancellationToken` but built
//! over a plain atomic since the core here is synchronous, not async.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::VoxelError;

/// A cheaply cloneable flag observed at suspension boundaries.
///
/// All clones of a token share the same underlying flag: cancelling one
/// cancels every handle derived from it.
#[derive(Clone, Debug, Default)]
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

    /// Returns `Err(Cancelled)` if this token has been cancelled; otherwise `Ok(())`.
    ///
    /// Call at each suspension boundary: before/after region I/O, and before
    /// blocking on a chunk lock.
    pub fn check(&self) -> Result<(), VoxelError> {
        if self.is_cancelled() {
            Err(VoxelError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncancelled_token_checks_ok() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
    }

    #[test]
    fn cancelling_one_clone_cancels_all() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(VoxelError::Cancelled)));
    }
}
