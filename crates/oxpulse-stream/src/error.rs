/// Errors that can occur within the streaming layer.
///
/// Delivery failures are handled inside the registry (the broken client is
/// disconnected, others are unaffected); this type surfaces only where a
/// caller addresses one specific client.
///
/// # Examples
///
/// ```rust
/// use oxpulse_stream::error::StreamError;
///
/// let err = StreamError::ClientNotConnected("dash-1".to_string());
/// assert!(err.to_string().contains("dash-1"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The addressed client has no live connection.
    #[error("Stream: client '{0}' is not connected")]
    ClientNotConnected(String),

    /// The client's outbound channel is closed; the registry disconnects
    /// the client as a side effect.
    #[error("Stream: delivery to client '{0}' failed, connection closed")]
    DeliveryFailed(String),
}

/// Convenience `Result` alias for streaming operations.
pub type Result<T> = std::result::Result<T, StreamError>;
