/// Bit index of the "right" key in the sampled vector.
pub const KEY_RIGHT: u8 = 0;
pub const KEY_LEFT: u8 = 1;
pub const KEY_DOWN: u8 = 2;
pub const KEY_UP: u8 = 3;
pub const KEY_ACTION: u8 = 4;

/// Decoded form of the 5-slot key vector, in
/// (right, left, down, up, action) order.
pub type KeyState = [bool; 5];

/// Polled source of the 5-bit key vector, read once per simulation tick.
///
/// Raw input-device capture is outside this crate; the embedding application
/// feeds whatever device it owns into an implementation of this trait.
/// `start`/`stop` bracket the window in which input is being captured and are
/// called by the session client when the connection opens and closes.
pub trait InputSampler {
    /// Returns the current key vector as a 5-bit mask.
    fn sample(&mut self) -> u8;
    /// Clears any latched state.
    fn reset(&mut self);
    fn start(&mut self) {}
    fn stop(&mut self) {}
}

/// Default [`InputSampler`]: a bitmask the embedding application sets
/// directly from its own key events.
///
/// Presses and releases are only registered while the keypad is started,
/// mirroring an event listener that is attached on join and detached on part.
#[derive(Debug, Default)]
pub struct Keypad {
    state: u8,
    listening: bool,
}

impl Keypad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: u8) {
        if self.listening && key <= KEY_ACTION {
            self.state |= 1 << key;
        }
    }

    pub fn release(&mut self, key: u8) {
        if self.listening && key <= KEY_ACTION {
            self.state &= !(1 << key);
        }
    }

    pub fn state(&self) -> u8 {
        self.state
    }

    /// Decodes the current mask into the boolean vector.
    pub fn read(&self) -> KeyState {
        [
            self.state & (1 << KEY_RIGHT) != 0,
            self.state & (1 << KEY_LEFT) != 0,
            self.state & (1 << KEY_DOWN) != 0,
            self.state & (1 << KEY_UP) != 0,
            self.state & (1 << KEY_ACTION) != 0,
        ]
    }
}

impl InputSampler for Keypad {
    fn sample(&mut self) -> u8 {
        self.state
    }

    fn reset(&mut self) {
        self.state = 0;
        log::debug!("keypad reset");
    }

    fn start(&mut self) {
        if self.listening {
            return;
        }
        self.listening = true;
        log::debug!("keypad started");
    }

    fn stop(&mut self) {
        if !self.listening {
            return;
        }
        self.listening = false;
        log::debug!("keypad stopped");
    }
}
