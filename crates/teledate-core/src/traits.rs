use crate::{
    error::TeledateError,
    message::{IncomingMessage, OutgoingMessage},
};
use async_trait::async_trait;

/// Messaging Channel trait.
///
/// Every messaging platform (Telegram today, anything else tomorrow)
/// implements this trait to receive and send messages.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start listening for incoming messages.
    /// Returns a receiver that yields incoming messages.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<IncomingMessage>, TeledateError>;

    /// Send a response back through this channel.
    async fn send(&self, message: OutgoingMessage) -> Result<(), TeledateError>;

    /// Send a photo (PNG bytes) with an optional caption.
    async fn send_photo(
        &self,
        _target: &str,
        _image: &[u8],
        _caption: &str,
    ) -> Result<(), TeledateError> {
        Ok(())
    }

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), TeledateError>;
}
