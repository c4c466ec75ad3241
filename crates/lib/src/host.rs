//! Host capabilities injected into the relay client.
//!
//! The messenger automation host hands the script a reply primitive for the
//! triggering room and a room-broadcast primitive for arbitrary rooms. Both
//! are modeled as traits so the client is host-agnostic and testable without
//! the real runtime.

use async_trait::async_trait;

/// Reply into the room the triggering notification came from.
#[async_trait]
pub trait Replier: Send + Sync {
    /// Send `text` as the reply. Called at most once per inbound event.
    async fn reply(&self, text: &str) -> Result<(), String>;
}

/// Send a message into a named room (e.g. scheduled-message dispatch).
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn send(&self, room: &str, text: &str) -> Result<(), String>;
}
