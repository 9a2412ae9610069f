//! # Cooperative Cancellation
//!
//! Segnale di stop condiviso tra il chiamante e i job in corso.
//!
//! ## Responsabilità:
//! - `CancelHandle`: lato chiamante (UI, Ctrl-C), invia lo stop
//! - `CancelToken`: lato job, controllato tra due encode o tra due formati
//!
//! Il controllo non interrompe mai un encode in corso: il job termina al
//! prossimo punto di controllo con `CompressError::Cancelled`.
//!
//! ## Esempio:
//! ```rust,ignore
//! let handle = CancelHandle::new();
//! let token = handle.token();
//! tokio::spawn(async move { engine.compress(job, &token).await });
//! handle.cancel();
//! ```

use crate::error::{CompressError, Result};
use tokio::sync::watch;
use tracing::debug;

/// Sender side of the stop signal
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// New token observing this handle
    pub fn token(&self) -> CancelToken {
        CancelToken {
            receiver: self.sender.subscribe(),
        }
    }

    /// Signal every token; idempotent
    pub fn cancel(&self) {
        debug!("Cancellation requested");
        self.sender.send_replace(true);
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver side, checked between encodes and between formats
#[derive(Debug, Clone)]
pub struct CancelToken {
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    /// Token that is never cancelled
    pub fn never() -> Self {
        let (_, receiver) = watch::channel(false);
        Self { receiver }
    }

    /// Stop state stays set once observed; a dropped handle does not cancel
    pub fn should_stop(&self) -> bool {
        *self.receiver.borrow()
    }

    /// `Err(Cancelled)` if a stop has been requested
    pub fn check(&self) -> Result<()> {
        if self.should_stop() {
            Err(CompressError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_reaches_all_tokens() {
        let handle = CancelHandle::new();
        let a = handle.token();
        let b = a.clone();
        assert!(a.check().is_ok());

        handle.cancel();
        assert!(a.should_stop());
        assert!(b.should_stop());
        assert!(matches!(b.check(), Err(CompressError::Cancelled)));
        // still set on the second look
        assert!(a.should_stop());
    }

    #[test]
    fn test_dropped_handle_does_not_cancel() {
        let token = {
            let handle = CancelHandle::new();
            handle.token()
        };
        assert!(!token.should_stop());
        assert!(!CancelToken::never().should_stop());
    }
}
