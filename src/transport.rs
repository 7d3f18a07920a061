use crate::error::Error;

/// An event surfaced by a [`Transport`] poll.
///
/// Events are delivered in the order the transport observes them; the core
/// imposes no reordering or buffering of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The metadata request completed with an HTTP response.
    Info { status: u16, body: Vec<u8> },
    /// The metadata request failed at the network layer.
    InfoFailed(String),
    /// The persistent socket finished its open handshake.
    Opened,
    /// One binary frame arrived on the socket.
    Message(Vec<u8>),
    /// The socket reported an error.
    Errored,
    /// The socket closed.
    Closed { clean: bool, code: u16 },
}

/// The IO seam between a [`Connection`](crate::Connection) and the network.
///
/// A session connection is statically dispatched over a generic
/// `T: Transport`, which allows any non-blocking implementation to stand in
/// for the real socket; the crate's tests drive the whole state machine
/// through an in-memory transport this way.
///
/// `request_info` and `connect` only *initiate* work; completions come back
/// as [`TransportEvent`]s from `poll`, which must never block on socket
/// reads.
pub trait Transport {
    type Error: Into<Error>;
    /// Begins the session metadata request against `url`.
    fn request_info(&mut self, url: &str);
    /// Begins the persistent socket handshake against `url`.
    fn connect(&mut self, url: &str);
    /// Transmits one binary frame over the open socket.
    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error>;
    /// Requests a socket-level close handshake; the resulting
    /// [`TransportEvent::Closed`] still arrives through `poll`.
    fn close(&mut self);
    /// Drops all socket state unconditionally. Idempotent.
    fn shutdown(&mut self);
    /// Returns the next pending event, if any.
    fn poll(&mut self) -> Option<TransportEvent>;
}
