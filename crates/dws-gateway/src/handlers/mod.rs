//! HTTP request handlers.

pub mod device;
pub mod events;
pub mod health;
pub mod messages;
pub mod panel;
pub mod state;
