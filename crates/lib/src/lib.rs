//! relaybot core library — config, host capability traits, relay HTTP client,
//! scheduled-message poller, and the notification handler used by the CLI host.

pub mod commands;
pub mod config;
pub mod handler;
pub mod host;
pub mod inbound;
pub mod init;
pub mod poll;
pub mod relay;
