mod connection;
mod consts;
mod error;
mod frame;
mod ring;
mod sampler;
mod scheduler;
mod socket;
mod transport;

#[cfg(test)]
mod simulator;

pub mod client;

pub use client::{ClientConfig, ConnectionState, SessionClient};
pub use connection::{CloseReason, Connection, ConnectionEvent, SessionInfo};
pub use consts::{
    DEFAULT_RENDER_RATE, DEFAULT_UPDATE_RATE, INPUT_FRAME_SIZE, KEY_MASK, MAX_CATCHUP_MS, MAX_TICK,
    METRICS_WINDOW, SAMPLE_PERIOD_MS,
};
pub use error::{Error, Result};
pub use frame::InputFrame;
pub use ring::Ring;
pub use sampler::{
    InputSampler, KeyState, Keypad, KEY_ACTION, KEY_DOWN, KEY_LEFT, KEY_RIGHT, KEY_UP,
};
pub use scheduler::{ChannelMetrics, Scheduler, TickHandler};
pub use socket::NetTransport;
pub use transport::{Transport, TransportEvent};
