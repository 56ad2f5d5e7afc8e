//! Pluggable transport layer.
//!
//! The engine operates on complete frames: one [`Transport::recv`] call
//! yields exactly one envelope (or, pre-handshake, one raw DH share). How
//! those frames are delimited on the wire — length prefixes, WebSocket
//! messages — is the transport's business, never the protocol core's.

/// A full-duplex frame transport.
///
/// Implementations are expected to handle their own buffering; network I/O
/// is the only place the protocol stack may block.
pub trait Transport {
    /// The error type returned by send/recv operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send one complete frame to the remote.
    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receive the next complete frame from the remote.
    ///
    /// Implementations should block until a full frame is available.
    fn recv(&mut self) -> Result<Vec<u8>, Self::Error>;
}
