use crate::{
    connection::{CloseReason, Connection, ConnectionEvent, SessionInfo},
    consts::{COMMAND_QUEUE_SIZE, DEFAULT_RENDER_RATE, INITIAL_TARGET_TICK, MAX_TICK},
    ring::Ring,
    sampler::{InputSampler, Keypad},
    scheduler::{Scheduler, TickHandler},
    socket::NetTransport,
    transport::Transport,
};

type JoinCallback<Ctx> = Box<dyn FnMut(u32, SessionInfo, &mut Ctx) + Send + Sync + 'static>;
type PartCallback<Ctx> = Box<dyn FnMut(u32, CloseReason, &mut Ctx) + Send + Sync + 'static>;
type MessageCallback<Ctx> = Box<dyn FnMut(&[u8], &mut Ctx) + Send + Sync + 'static>;
type TickCallback<Ctx> = Box<dyn FnMut(f64, f64, &mut Ctx) + Send + Sync + 'static>;
type RenderCallback<Ctx> = Box<dyn FnMut(f64, f64, f64, &mut Ctx) + Send + Sync + 'static>;

/// Configuration for a session client.
///
/// * `queue_size` - Capacity of the pending-command queue (rounded up to a power of two).
/// * `render_rate` - Render callbacks per second; the update rate comes from the session handshake.
/// * `on_join` - Called once a join completes, with the session id and negotiated parameters.
/// * `on_part` - Called once a part completes, with the session id and close reason.
/// * `on_message` - Called for each binary frame received from the server, verbatim.
/// * `on_tick` - Called once per simulation step while joined.
/// * `on_render` - Called once per render step while joined, with an interpolation factor.
///
/// # Example
/// ```
/// use loopnet::{ClientConfig, SessionClient};
///
/// let cfg = ClientConfig::new()
///     .render_rate(60.0)
///     .on_join(|session, info, _ctx| {
///         println!("joined #{session} at {} ticks/s", info.tick_rate);
///     })
///     .on_message(|data, _ctx| {
///         println!("server sent {} bytes", data.len());
///     });
/// let mut client = SessionClient::with_config("localhost:8080", false, cfg);
/// client.join(5);
/// ```
pub struct ClientConfig<Ctx> {
    queue_size: usize,
    render_rate: f64,
    context: Ctx,
    on_join: Option<JoinCallback<Ctx>>,
    on_part: Option<PartCallback<Ctx>>,
    on_message: Option<MessageCallback<Ctx>>,
    on_tick: Option<TickCallback<Ctx>>,
    on_render: Option<RenderCallback<Ctx>>,
}

impl Default for ClientConfig<()> {
    fn default() -> Self {
        ClientConfig::with_context(())
    }
}

impl ClientConfig<()> {
    /// Create a new, default client configuration with no context.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<Ctx> ClientConfig<Ctx> {
    /// Create a new client configuration with context that will be passed to the callbacks.
    pub fn with_context(ctx: Ctx) -> Self {
        Self {
            queue_size: COMMAND_QUEUE_SIZE,
            render_rate: DEFAULT_RENDER_RATE,
            context: ctx,
            on_join: None,
            on_part: None,
            on_message: None,
            on_tick: None,
            on_render: None,
        }
    }
    /// Set the capacity of the pending-command queue. The default is 16.
    pub fn queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }
    /// Set the render rate in callbacks per second. The default is 30.
    pub fn render_rate(mut self, render_rate: f64) -> Self {
        self.render_rate = render_rate;
        self
    }
    /// Set a callback that will be called when a join completes.
    pub fn on_join<F>(mut self, cb: F) -> Self
    where
        F: FnMut(u32, SessionInfo, &mut Ctx) + Send + Sync + 'static,
    {
        self.on_join = Some(Box::new(cb));
        self
    }
    /// Set a callback that will be called when a part completes.
    pub fn on_part<F>(mut self, cb: F) -> Self
    where
        F: FnMut(u32, CloseReason, &mut Ctx) + Send + Sync + 'static,
    {
        self.on_part = Some(Box::new(cb));
        self
    }
    /// Set a callback that will be called for each frame received from the server.
    pub fn on_message<F>(mut self, cb: F) -> Self
    where
        F: FnMut(&[u8], &mut Ctx) + Send + Sync + 'static,
    {
        self.on_message = Some(Box::new(cb));
        self
    }
    /// Set a callback that will be called once per simulation step.
    pub fn on_tick<F>(mut self, cb: F) -> Self
    where
        F: FnMut(f64, f64, &mut Ctx) + Send + Sync + 'static,
    {
        self.on_tick = Some(Box::new(cb));
        self
    }
    /// Set a callback that will be called once per render step.
    pub fn on_render<F>(mut self, cb: F) -> Self
    where
        F: FnMut(f64, f64, f64, &mut Ctx) + Send + Sync + 'static,
    {
        self.on_render = Some(Box::new(cb));
        self
    }
}

/// The states in the client state machine.
///
/// The cycle is `Idle → Opening → Opened → Closing → Idle`. Commands are
/// only consumed from the queue while `Idle` or `Opened`; the two
/// transitional states block draining until the connection reports the
/// outcome it is waiting on (handshake completion or socket close).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Opening,
    Opened,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Join(u32),
    Part,
}

/// The session client: a state machine coordinating one
/// [`Connection`](crate::Connection) against user-issued join/part commands,
/// wiring the scheduler and input sampler to the connection's lifecycle.
///
/// The client performs no IO of its own and owns no clock; the embedding
/// application drives it by calling [`update`](SessionClient::update) from
/// its main loop and [`frame`](SessionClient::frame) from its presentation
/// driver, both with the current time in milliseconds.
///
/// There is no automatic reconnection anywhere: every failure returns the
/// state machine to `Idle`, and re-initiation is the embedding
/// application's responsibility via a fresh [`join`](SessionClient::join).
///
/// # Example
/// ```no_run
/// let mut client = loopnet::SessionClient::new("game.example.com", true);
/// client.join(7);
///
/// let start = std::time::Instant::now();
/// loop {
///     let now_ms = start.elapsed().as_secs_f64() * 1000.0;
///     client.update(now_ms);
///     client.frame(now_ms);
///     # break;
/// }
/// ```
pub struct SessionClient<T: Transport, S: InputSampler, Ctx = ()> {
    endpoint: String,
    secure: bool,
    transport: T,
    sampler: S,
    pending: Ring<Command>,
    scheduler: Scheduler,
    connection: Option<Connection>,
    state: ConnectionState,
    session_id: Option<u32>,
    key_state: u8,
    target_tick: i64,
    cfg: ClientConfig<Ctx>,
}

impl SessionClient<NetTransport, Keypad> {
    /// Create a new client with a default configuration.
    ///
    /// `secure` selects TLS for both handshake phases (`https`/`wss` instead
    /// of `http`/`ws`). Trailing slashes are stripped from the endpoint.
    pub fn new(endpoint: &str, secure: bool) -> Self {
        SessionClient::with_config(endpoint, secure, ClientConfig::default())
    }
}

impl<Ctx> SessionClient<NetTransport, Keypad, Ctx> {
    /// Create a new client with a custom configuration. <br>
    /// Callbacks with context can be registered to be notified of session
    /// lifecycle and per-tick events. See [`ClientConfig`](ClientConfig) for more details.
    pub fn with_config(endpoint: &str, secure: bool, cfg: ClientConfig<Ctx>) -> Self {
        SessionClient::with_transport(endpoint, secure, NetTransport::new(), Keypad::new(), cfg)
    }
}

impl<T: Transport, S: InputSampler, Ctx> SessionClient<T, S, Ctx> {
    /// Create a new client over a custom transport and input sampler.
    pub fn with_transport(
        endpoint: &str,
        secure: bool,
        transport: T,
        sampler: S,
        cfg: ClientConfig<Ctx>,
    ) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            secure,
            transport,
            sampler,
            pending: Ring::new(cfg.queue_size),
            scheduler: Scheduler::new(),
            connection: None,
            state: ConnectionState::Idle,
            session_id: None,
            key_state: 0,
            target_tick: INITIAL_TARGET_TICK,
            cfg,
        }
    }

    /// Requests a join of the given session. The command is queued and
    /// processed as soon as the state machine allows; joining while already
    /// joined elsewhere parts first.
    pub fn join(&mut self, session_id: u32) {
        log::debug!("client queued: join #{session_id}");
        self.pending.put(Command::Join(session_id));
        self.drain();
    }

    /// Requests a part from the current session.
    pub fn part(&mut self) {
        log::debug!("client queued: part");
        self.pending.put(Command::Part);
        self.drain();
    }

    /// Coarse driver: pumps connection events onto this timeline, acts as a
    /// fallback tick source when the presentation driver is stalled, and
    /// resamples scheduler metrics. Call from the application's main loop.
    pub fn update(&mut self, now_ms: f64) {
        self.pump(now_ms);
        let Self {
            scheduler,
            transport,
            connection,
            sampler,
            key_state,
            target_tick,
            cfg,
            ..
        } = self;
        let mut ticker = Ticker {
            transport,
            connection: connection.as_mut(),
            sampler,
            key_state,
            target_tick,
            cfg,
        };
        scheduler.interval_tick(now_ms, &mut ticker);
    }

    /// Presentation-aligned driver; call as often as the host allows, ideally
    /// once per display refresh.
    pub fn frame(&mut self, now_ms: f64) {
        self.pump(now_ms);
        let Self {
            scheduler,
            transport,
            connection,
            sampler,
            key_state,
            target_tick,
            cfg,
            ..
        } = self;
        let mut ticker = Ticker {
            transport,
            connection: connection.as_mut(),
            sampler,
            key_state,
            target_tick,
            cfg,
        };
        scheduler.frame_tick(now_ms, &mut ticker);
    }

    /// Pauses the simulation channel; render callbacks keep firing.
    pub fn pause(&mut self) {
        self.scheduler.pause();
    }

    pub fn resume(&mut self) {
        self.scheduler.resume();
    }

    /// Gets the current state of the client.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Gets the most recently targeted session id.
    pub fn session(&self) -> Option<u32> {
        self.session_id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The input sampler, for the embedding application to feed its device
    /// events into.
    pub fn sampler_mut(&mut self) -> &mut S {
        &mut self.sampler
    }

    /// Read-only view of the scheduler, for its diagnostic metrics.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn context(&self) -> &Ctx {
        &self.cfg.context
    }

    pub fn context_mut(&mut self) -> &mut Ctx {
        &mut self.cfg.context
    }

    fn pump(&mut self, now_ms: f64) {
        loop {
            let event = self
                .connection
                .as_mut()
                .and_then(|conn| conn.poll(&mut self.transport));
            let Some(event) = event else { return };
            self.handle_event(event, now_ms);
        }
    }

    fn handle_event(&mut self, event: ConnectionEvent, now_ms: f64) {
        match event {
            ConnectionEvent::Opened(info) => {
                self.state = ConnectionState::Opened;
                let session_id = self.session_id.unwrap_or_default();
                log::info!(
                    "client joined session #{session_id} (tr={} lr={} sr={} seed={})",
                    info.tick_rate,
                    info.logic_rate,
                    info.sync_rate,
                    info.random_seed
                );
                let ClientConfig {
                    on_join, context, ..
                } = &mut self.cfg;
                if let Some(cb) = on_join {
                    cb(session_id, info, context);
                }
                self.sampler.reset();
                self.sampler.start();
                self.scheduler
                    .set_rates(info.tick_rate as f64, self.cfg.render_rate);
                self.scheduler.start(now_ms);
                self.drain();
            }
            ConnectionEvent::Message(data) => {
                let ClientConfig {
                    on_message,
                    context,
                    ..
                } = &mut self.cfg;
                if let Some(cb) = on_message {
                    cb(&data, context);
                }
            }
            ConnectionEvent::Errored(err) => {
                log::warn!("client error: {err}");
                self.teardown();
                self.drain();
            }
            ConnectionEvent::Closed(reason) => {
                let session_id = self.session_id.unwrap_or_default();
                log::info!(
                    "client left session #{session_id} (ok={} code={})",
                    reason.clean,
                    reason.code
                );
                let ClientConfig {
                    on_part, context, ..
                } = &mut self.cfg;
                if let Some(cb) = on_part {
                    cb(session_id, reason, context);
                }
                self.teardown();
                self.drain();
            }
        }
    }

    /// Shared hard-reset path for error, close, and part-while-idle.
    /// Never re-enters the drain loop itself; callers resume draining.
    fn teardown(&mut self) {
        log::debug!("client resetting");
        self.scheduler.stop();
        self.sampler.stop();
        if let Some(mut connection) = self.connection.take() {
            connection.dispose(&mut self.transport);
        }
        self.key_state = 0;
        self.target_tick = INITIAL_TARGET_TICK;
        self.state = ConnectionState::Idle;
    }

    /// Processes queued commands against the current state until the queue
    /// is empty or the head command is blocked on a connection event. An
    /// explicit work-list loop: steps that re-enqueue commands (switching
    /// targets) are picked up by later iterations, never by recursion.
    fn drain(&mut self) {
        loop {
            let Some(&command) = self.pending.peek() else {
                return;
            };
            match (command, self.state) {
                (Command::Join(session_id), ConnectionState::Idle) => {
                    self.pending.get();
                    log::info!("client connecting to session #{session_id}");
                    self.state = ConnectionState::Opening;
                    self.session_id = Some(session_id);
                    let mut connection = Connection::new(&self.endpoint, session_id, self.secure);
                    connection.open(&mut self.transport);
                    self.connection = Some(connection);
                }
                (Command::Join(session_id), ConnectionState::Opened) => {
                    // Already joined; switching splits into part-then-join.
                    self.pending.get();
                    log::info!("client switching to session #{session_id}");
                    self.pending.put(Command::Part);
                    self.pending.put(Command::Join(session_id));
                }
                (Command::Join(_), _) => {
                    log::debug!("client waiting for connection before joining");
                    return;
                }
                (Command::Part, ConnectionState::Opened) => {
                    self.pending.get();
                    self.sampler.stop();
                    self.scheduler.stop();
                    log::info!("client closing connection");
                    self.state = ConnectionState::Closing;
                    if let Some(connection) = self.connection.as_mut() {
                        connection.close(&mut self.transport);
                    }
                }
                (Command::Part, ConnectionState::Idle) => {
                    self.pending.get();
                    self.teardown();
                }
                (Command::Part, _) => {
                    log::debug!("client waiting for connection before leaving");
                    return;
                }
            }
        }
    }
}

/// Per-tick glue between the scheduler and the rest of the client: samples
/// input on every simulation step and sends a frame only when the key state
/// changed since the last send.
struct Ticker<'a, T: Transport, S: InputSampler, Ctx> {
    transport: &'a mut T,
    connection: Option<&'a mut Connection>,
    sampler: &'a mut S,
    key_state: &'a mut u8,
    target_tick: &'a mut i64,
    cfg: &'a mut ClientConfig<Ctx>,
}

impl<T: Transport, S: InputSampler, Ctx> TickHandler for Ticker<'_, T, S, Ctx> {
    fn update(&mut self, t: f64, step: f64) {
        let t_ms = t as i64;
        // Double the horizon as simulation time reaches it, keeping the
        // outbound tick inside the 11-bit window with headroom to spare.
        if t_ms >= *self.target_tick {
            *self.target_tick <<= 1;
        }
        let sampled = self.sampler.sample();
        if sampled != *self.key_state {
            *self.key_state = sampled;
            let tick = MAX_TICK as i64 - (*self.target_tick - t_ms);
            match u16::try_from(tick) {
                Ok(tick) => {
                    if let Some(connection) = self.connection.as_deref_mut() {
                        if let Err(e) = connection.send(&mut *self.transport, tick, sampled) {
                            log::warn!("client failed to send input frame: {e}");
                        }
                    }
                }
                Err(_) => log::warn!("client input tick {tick} outside send window"),
            }
        }
        let ClientConfig {
            on_tick, context, ..
        } = &mut *self.cfg;
        if let Some(cb) = on_tick {
            cb(t, step, context);
        }
    }

    fn render(&mut self, t: f64, dt: f64, alpha: f64) {
        let ClientConfig {
            on_render, context, ..
        } = &mut *self.cfg;
        if let Some(cb) = on_render {
            cb(t, dt, alpha, context);
        }
    }
}
