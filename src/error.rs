use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("tick out of range: {0} (max 2047)")]
    TickOutOfRange(u16),
    #[error("handshake failed: HTTP {0}")]
    HandshakeStatus(u16),
    #[error("fetch: {msg} (url={url})")]
    Fetch { msg: String, url: String },
    #[error("invalid session info: {0}")]
    InvalidInfo(#[from] serde_json::Error),
    #[error("unexpected socket error")]
    Socket,
    #[error(transparent)]
    Transport(#[from] crate::socket::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
