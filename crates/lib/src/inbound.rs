//! Inbound chat notification from the host: one event per received message.

/// Fields extracted from a chat notification, delivered once per message.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub room: String,
    pub sender: String,
    pub message: String,
    pub is_group_chat: bool,
}
