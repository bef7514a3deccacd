//! Queue backend trait.
//!
//! Defines the publish/consume/acknowledge contract every backend
//! implements. Backends own their "consumed since last acknowledgement"
//! log; callers only read it or settle it through [`QueueBackend::acknowledge`].

use searchkit_types::QueueMessage;

use crate::error::QueueError;

/// Trait for message queue backends.
pub trait QueueBackend: Send + Sync {
    /// Name of this backend for logging.
    fn name(&self) -> &str;

    /// Create an empty message.
    ///
    /// Backends that need their own message metadata can pre-fill it here.
    fn new_message(&self) -> QueueMessage {
        QueueMessage::new()
    }

    /// Append a message to the delivery structure.
    ///
    /// Any id already on the message is discarded; ids are only assigned
    /// by [`consume`](QueueBackend::consume).
    fn publish(&self, message: QueueMessage) -> Result<(), QueueError>;

    /// Claim the next undelivered message, or `None` when the backend is
    /// drained.
    ///
    /// The returned message carries a backend-assigned id and is recorded
    /// in the consumed log. An empty backend is not an error.
    fn consume(&self) -> Result<Option<QueueMessage>, QueueError>;

    /// Settle every message consumed since the last acknowledgement.
    ///
    /// With `success` the messages are removed for good. Without it they
    /// stay in place for redelivery. Either way the consumed log is
    /// cleared. Returns the number of messages settled.
    fn acknowledge(&self, success: bool) -> usize;

    /// Messages consumed since the last acknowledgement.
    fn consumed(&self) -> Vec<QueueMessage>;

    fn consumed_count(&self) -> usize {
        self.consumed().len()
    }
}
