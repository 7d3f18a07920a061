use std::io::ErrorKind;
use std::net::TcpStream;

use tungstenite::{protocol::frame::coding::CloseCode, stream::MaybeTlsStream, Message, WebSocket};

use crate::transport::{Transport, TransportEvent};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket failure: {0}")]
    Ws(#[from] tungstenite::Error),
    #[error("socket is not open")]
    NotOpen,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Close code reported when the peer closes without a code.
const NO_STATUS_CODE: u16 = 1005;

enum Phase {
    Idle,
    /// Metadata GET pending; performed on the next poll.
    Fetch(String),
    /// WebSocket connect pending; performed on the next poll.
    Connect(String),
    Open(Box<WebSocket<MaybeTlsStream<TcpStream>>>),
}

/// The production [`Transport`]: a blocking HTTP client for the metadata
/// fetch and a `tungstenite` WebSocket for the persistent session socket.
///
/// The two handshake steps (HTTP GET, WebSocket connect) run synchronously
/// inside [`poll`](Transport::poll); those are the runtime's only
/// suspension points. Once open, the underlying stream is switched to
/// non-blocking mode so socket reads never stall the caller's timeline.
pub struct NetTransport {
    http: reqwest::blocking::Client,
    phase: Phase,
}

impl NetTransport {
    pub fn new() -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            phase: Phase::Idle,
        }
    }

    fn poll_socket(&mut self, mut ws: Box<WebSocket<MaybeTlsStream<TcpStream>>>) -> Option<TransportEvent> {
        match ws.read() {
            Ok(Message::Binary(data)) => {
                self.phase = Phase::Open(ws);
                Some(TransportEvent::Message(data))
            }
            Ok(Message::Close(frame)) => {
                // Let tungstenite finish the close handshake on its own.
                let code = frame
                    .map(|f| u16::from(f.code))
                    .unwrap_or(NO_STATUS_CODE);
                Some(TransportEvent::Closed { clean: true, code })
            }
            Ok(_) => {
                // Text/ping/pong frames are not part of the protocol.
                self.phase = Phase::Open(ws);
                None
            }
            Err(tungstenite::Error::Io(e)) if e.kind() == ErrorKind::WouldBlock => {
                self.phase = Phase::Open(ws);
                None
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Some(TransportEvent::Closed {
                    clean: true,
                    code: u16::from(CloseCode::Normal),
                })
            }
            Err(e) => {
                log::warn!("socket read failed: {e}");
                Some(TransportEvent::Errored)
            }
        }
    }
}

impl Default for NetTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for NetTransport {
    type Error = Error;

    fn request_info(&mut self, url: &str) {
        self.phase = Phase::Fetch(url.to_owned());
    }

    fn connect(&mut self, url: &str) {
        self.phase = Phase::Connect(url.to_owned());
    }

    fn send(&mut self, frame: &[u8]) -> Result<()> {
        match &mut self.phase {
            Phase::Open(ws) => {
                ws.send(Message::Binary(frame.to_vec()))?;
                Ok(())
            }
            _ => Err(Error::NotOpen),
        }
    }

    fn close(&mut self) {
        if let Phase::Open(ws) = &mut self.phase {
            if let Err(e) = ws.close(None) {
                log::warn!("socket close request failed: {e}");
            }
        }
    }

    fn shutdown(&mut self) {
        self.phase = Phase::Idle;
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => None,
            Phase::Fetch(url) => match self.http.get(&url).send() {
                Ok(res) => {
                    let status = res.status().as_u16();
                    match res.bytes() {
                        Ok(body) => Some(TransportEvent::Info {
                            status,
                            body: body.to_vec(),
                        }),
                        Err(e) => Some(TransportEvent::InfoFailed(e.to_string())),
                    }
                }
                Err(e) => Some(TransportEvent::InfoFailed(e.to_string())),
            },
            Phase::Connect(url) => match tungstenite::connect(url.as_str()) {
                Ok((ws, _response)) => {
                    let mut ws = Box::new(ws);
                    let nonblocking = match ws.get_mut() {
                        MaybeTlsStream::Plain(stream) => stream.set_nonblocking(true),
                        MaybeTlsStream::Rustls(stream) => stream.sock.set_nonblocking(true),
                        _ => Ok(()),
                    };
                    if let Err(e) = nonblocking {
                        log::warn!("failed to make socket non-blocking: {e}");
                        return Some(TransportEvent::Errored);
                    }
                    self.phase = Phase::Open(ws);
                    Some(TransportEvent::Opened)
                }
                Err(e) => {
                    log::warn!("socket connect failed: {e}");
                    Some(TransportEvent::Errored)
                }
            },
            Phase::Open(ws) => self.poll_socket(ws),
        }
    }
}
