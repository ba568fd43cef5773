use std::fmt::Debug;
use tokio::sync::mpsc;

use crate::model::AppMessage;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Wearable link closed")]
    Closed,
}

/// Outbound message channel to the paired wearable. Delivery is fire-and-forget.
pub trait DeviceLink: Send + Sync + Debug {
    fn send(&self, message: AppMessage) -> Result<(), LinkError>;
}

/// Link that hands messages to an in-process receiver (the host's transport, or a test).
#[derive(Debug, Clone)]
pub struct ChannelLink {
    tx: mpsc::UnboundedSender<AppMessage>,
}

impl ChannelLink {
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<AppMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl DeviceLink for ChannelLink {
    fn send(&self, message: AppMessage) -> Result<(), LinkError> {
        self.tx.send(message).map_err(|_| LinkError::Closed)
    }
}
