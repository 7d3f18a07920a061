use crate::{
    error::{Error, Result},
    frame::InputFrame,
    transport::{Transport, TransportEvent},
};

/// Session parameters negotiated during the handshake, fetched as a JSON
/// array of 4 integers from the session's info endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionInfo {
    pub random_seed: i64,
    pub tick_rate: i64,
    pub logic_rate: i64,
    pub sync_rate: i64,
}

impl SessionInfo {
    fn parse(body: &[u8]) -> Result<Self> {
        let [random_seed, tick_rate, logic_rate, sync_rate] =
            serde_json::from_slice::<[i64; 4]>(body)?;
        Ok(Self {
            random_seed,
            tick_rate,
            logic_rate,
            sync_rate,
        })
    }
}

/// Why the persistent socket closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseReason {
    pub clean: bool,
    pub code: u16,
}

/// A lifecycle event surfaced by [`Connection::poll`].
///
/// Exactly-once, in-order delivery per connection: `Opened` fires at most
/// once (with the stored handshake metadata), and nothing fires after
/// disposal.
#[derive(Debug)]
pub enum ConnectionEvent {
    Opened(SessionInfo),
    Message(Vec<u8>),
    Errored(Error),
    Closed(CloseReason),
}

/// One handshake + socket pair for one remote session.
///
/// The open protocol has two phases: a metadata fetch from
/// `http{s}://{endpoint}/i/{session}`, then a persistent binary WebSocket to
/// `ws{s}://{endpoint}/g/{session}`. The fetched metadata is held until the
/// socket reports open and is delivered exactly once.
///
/// No retry lives here; every failure is surfaced once and the owner decides
/// what to do. Disposal is idempotent and wins every race: once
/// [`dispose`](Connection::dispose) has run, no event is ever surfaced
/// again, even if a handshake completion is already sitting in the
/// transport.
pub struct Connection {
    endpoint: String,
    session_id: u32,
    secure: bool,
    disposed: bool,
    info: Option<SessionInfo>,
    // Reused for every outbound frame to avoid per-send allocation.
    frame: [u8; InputFrame::SIZE],
}

impl Connection {
    pub fn new(endpoint: &str, session_id: u32, secure: bool) -> Self {
        Self {
            endpoint: endpoint.to_owned(),
            session_id,
            secure,
            disposed: false,
            info: None,
            frame: [0u8; InputFrame::SIZE],
        }
    }

    fn info_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}/i/{}", scheme, self.endpoint, self.session_id)
    }

    fn socket_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}/g/{}", scheme, self.endpoint, self.session_id)
    }

    /// Begins the two-phase handshake. A no-op once disposed.
    pub fn open<T: Transport>(&mut self, transport: &mut T) {
        if self.disposed {
            return;
        }
        log::debug!("conn fetching info for session #{}", self.session_id);
        transport.request_info(&self.info_url());
    }

    /// Drains transport completions into at most one lifecycle event.
    ///
    /// The disposed flag is re-tested before anything observable happens, so
    /// a completion that raced with disposal is silently absorbed.
    pub fn poll<T: Transport>(&mut self, transport: &mut T) -> Option<ConnectionEvent> {
        if self.disposed {
            return None;
        }
        while let Some(event) = transport.poll() {
            match event {
                TransportEvent::Info { status, body } => {
                    if !(200..300).contains(&status) {
                        log::warn!("conn failed to join session #{}", self.session_id);
                        return Some(ConnectionEvent::Errored(Error::HandshakeStatus(status)));
                    }
                    let info = match SessionInfo::parse(&body) {
                        Ok(info) => info,
                        Err(e) => return Some(ConnectionEvent::Errored(e)),
                    };
                    log::debug!("conn joining session #{}", self.session_id);
                    self.info = Some(info);
                    transport.connect(&self.socket_url());
                }
                TransportEvent::InfoFailed(msg) => {
                    return Some(ConnectionEvent::Errored(Error::Fetch {
                        msg,
                        url: self.info_url(),
                    }));
                }
                TransportEvent::Opened => {
                    log::info!("conn joined session #{}", self.session_id);
                    if let Some(info) = self.info.take() {
                        return Some(ConnectionEvent::Opened(info));
                    }
                }
                TransportEvent::Message(data) => {
                    return Some(ConnectionEvent::Message(data));
                }
                TransportEvent::Errored => {
                    log::warn!("conn socket error on session #{}", self.session_id);
                    return Some(ConnectionEvent::Errored(Error::Socket));
                }
                TransportEvent::Closed { clean, code } => {
                    log::info!("conn left session #{}", self.session_id);
                    return Some(ConnectionEvent::Closed(CloseReason { clean, code }));
                }
            }
        }
        None
    }

    /// Packs and transmits one input frame over the open socket.
    ///
    /// Fails with [`Error::TickOutOfRange`] for `tick >= 2048`; `keys` is
    /// masked to its low 5 bits silently. Callers only send after
    /// [`ConnectionEvent::Opened`] has been observed.
    pub fn send<T: Transport>(&mut self, transport: &mut T, tick: u16, keys: u8) -> Result<()> {
        let frame = InputFrame::new(tick, keys)?;
        let mut cursor = std::io::Cursor::new(&mut self.frame[..]);
        frame.write_to(&mut cursor)?;
        transport.send(&self.frame).map_err(Into::into)
    }

    /// Requests a socket-level close; the resulting close event still
    /// arrives through `poll` unless the connection is disposed in the
    /// interim.
    pub fn close<T: Transport>(&mut self, transport: &mut T) {
        if self.disposed {
            return;
        }
        transport.close();
    }

    /// Tears the connection down unconditionally. Safe at any point in the
    /// handshake; idempotent; no event is surfaced afterwards.
    pub fn dispose<T: Transport>(&mut self, transport: &mut T) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.info = None;
        transport.shutdown();
        log::debug!("conn disposed");
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
