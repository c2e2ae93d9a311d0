/// Errors from key-value store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Could not establish a connection to the store.
    #[error("failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    /// Connecting or waiting for a reply took longer than allowed.
    #[error("timed out after {millis}ms waiting for {addr}")]
    Timeout { addr: String, millis: u64 },

    /// The server closed the connection.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// The byte stream could not be framed as RESP.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered a command with an error reply.
    #[error("server error reply to {command}: {message}")]
    Server { command: String, message: String },

    /// The server answered with a frame of an unexpected shape.
    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: String, reply: String },

    /// The scan pattern is not a valid glob.
    #[error("invalid scan pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// I/O error from the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
