use std::io;

use byteorder::WriteBytesExt;

use crate::{
    consts::{KEY_MASK, MAX_TICK},
    error::{Error, Result},
};

/// One outbound input record: an 11-bit tick counter packed with a 5-bit key
/// vector into two bytes.
///
/// Layout: `byte0 = (keys & 0x1F) | ((tick >> 8) << 5)`, `byte1 = tick & 0xFF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputFrame {
    pub tick: u16,
    pub keys: u8,
}

impl InputFrame {
    pub const SIZE: usize = crate::consts::INPUT_FRAME_SIZE;

    /// Fails with [`Error::TickOutOfRange`] for `tick >= 2048`; a tick that
    /// large is a programming error on the caller's side, not a transient
    /// condition. `keys` is masked to its low 5 bits silently.
    pub fn new(tick: u16, keys: u8) -> Result<Self> {
        if tick >= MAX_TICK {
            return Err(Error::TickOutOfRange(tick));
        }
        Ok(Self {
            tick,
            keys: keys & KEY_MASK,
        })
    }

    /// Encodes the frame into two bytes. Inbound frames are opaque to this
    /// crate, so there is no matching decoder.
    pub fn write_to(&self, writer: &mut impl WriteBytesExt) -> io::Result<()> {
        writer.write_u8(self.keys | (((self.tick >> 8) as u8) << 5))?;
        writer.write_u8((self.tick & 0xFF) as u8)?;
        Ok(())
    }
}
