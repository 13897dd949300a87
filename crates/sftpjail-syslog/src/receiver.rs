//! Receiver extension point
//!
//! Every decoded [`Message`] is handed to each registered receiver in
//! registration order. Receivers are shared by all daemons, so they are
//! called concurrently and must synchronize internally.

use crate::message::Message;
use std::sync::Arc;

/// Consumer of decoded messages
pub trait Receiver: Send + Sync {
    /// Handle one message
    ///
    /// Called synchronously on the daemon's task; slow receivers delay the
    /// next read from that user's socket.
    fn receive(&self, message: &Message);
}

/// Ordered receiver list, fixed before any daemon starts
pub type SharedReceivers = Arc<[Arc<dyn Receiver>]>;
