/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An operation was attempted before [`Transport::start`](crate::Transport::start).
    #[error("transport not started")]
    NotStarted,

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,

    /// There is no remote connection to send on.
    #[error("not connected to a remote peer")]
    NotConnected,

    /// Opening the connection failed.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// A read ran past the end of the message.
    #[error("message truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes the read required.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// The message bytes do not follow the buffer format.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A status-changed item carried a status byte we don't know.
    #[error("unknown connection status byte {0}")]
    UnknownStatus(u8),
}
