use thiserror::Error;

/// Errors raised on the broker ingestion path.
///
/// Everything in here is contained locally: a malformed message is logged
/// and dropped, a transport failure drives the reconnect state machine.
/// None of these may crash the adapter or reach observers.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The message payload or topic could not be decoded. Discarded.
    #[error("malformed message on `{topic}`: {reason}")]
    MalformedMessage { topic: String, reason: String },
    /// The broker connection dropped. Triggers reconnection, never fatal.
    #[error("broker transport disconnected: {0}")]
    TransportDisconnected(String),
    /// A command was requested while the broker link is down.
    ///
    /// Commands are fire-and-forget and are never queued; the caller owns
    /// the retry decision.
    #[error("command channel unavailable: broker is not connected")]
    CommandUnavailable,
    /// Outbound publish was accepted by the client but failed to enqueue.
    #[error("failed to publish to `{topic}`: {reason}")]
    PublishFailed { topic: String, reason: String },
    /// Event bus delivery failure (channel closed during shutdown).
    #[error("event bus closed")]
    BusClosed,
}
