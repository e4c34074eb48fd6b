/// Errors that can occur in the transport layer.
///
/// Per-connection read/write failures never surface as this type: they are
/// posted to the completion port as [`Completion::Failed`](crate::Completion)
/// and handled by the reactor like any other completion.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listen socket failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Accepting a connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The listener's local address could not be read.
    #[error("local address unavailable: {0}")]
    LocalAddr(#[source] std::io::Error),
}
