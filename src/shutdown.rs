//! Shutdown broadcast shared by the signal handler and the dispatcher.
use tokio::sync::broadcast;

/// Sending `()` stops new attempts from being admitted.
pub type ShutdownSender = broadcast::Sender<()>;
pub type ShutdownReceiver = broadcast::Receiver<()>;
