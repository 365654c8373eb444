//! The batch envelope posted to peers.

use serde::{Deserialize, Serialize};

/// One batch of wire payloads from a single sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Namespace of the application that produced the batch.
    pub app: String,
    /// Network address of the sending device.
    pub source: String,
    /// Payloads in enqueue order.
    pub messages: Vec<String>,
}
