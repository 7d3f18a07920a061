/// Exclusive upper bound of the tick counter carried in an input frame (11 bits).
pub const MAX_TICK: u16 = 1 << 11;
/// Low 5 bits of an input frame carry the key vector.
pub const KEY_MASK: u8 = 0x1F;
/// Size of one outbound input frame in bytes.
pub const INPUT_FRAME_SIZE: usize = 2;

pub const DEFAULT_UPDATE_RATE: f64 = 30.0;
pub const DEFAULT_RENDER_RATE: f64 = 30.0;
/// Period of the coarse driver: fallback ticking and metrics resampling.
pub const SAMPLE_PERIOD_MS: f64 = 200.0;
/// Cap on the wall-clock delta fed into the simulation accumulators,
/// bounding catch-up replay after a stall.
pub const MAX_CATCHUP_MS: f64 = 2000.0;
/// Number of samples in each rolling metrics window.
pub const METRICS_WINDOW: usize = 5;

pub(crate) const COMMAND_QUEUE_SIZE: usize = 16;
pub(crate) const INITIAL_TARGET_TICK: i64 = MAX_TICK as i64;
