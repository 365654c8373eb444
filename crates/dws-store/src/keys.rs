//! Logical keys and their on-disk encoding.

/// The key holding the node's current state.
pub const CURRENT_STATE: &str = "dws.current_state";

/// Encode a logical key for `RocksDB`.
#[must_use]
pub fn encode(key: &str) -> Vec<u8> {
    key.as_bytes().to_vec()
}
