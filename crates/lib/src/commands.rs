//! Local command surface: literal message strings handled without network I/O.

/// Commands answered from local state. String-literal matches, not a parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalCommand {
    /// Canned connectivity reply echoing room and sender.
    TestLocal,
    /// Echo the configured relay URL.
    ServerAddress,
    /// Echo relay URL, status, and response snippet of the last relay call.
    Debug,
    /// Echo the last caught error.
    CheckError,
}

impl LocalCommand {
    pub fn parse(message: &str) -> Option<Self> {
        match message {
            "/test-local" => Some(Self::TestLocal),
            "/server-address" => Some(Self::ServerAddress),
            "/debug" => Some(Self::Debug),
            "/check-error" => Some(Self::CheckError),
            _ => None,
        }
    }
}
