// Capture domain: the backend contract and its two implementations.

pub mod cpu;
pub mod gpu;
pub mod shaders;

use crate::error::Result;
use crate::surface::Surface;

/// Fixed channel count. Every captured frame is RGBA8.
pub const CHANNELS: u32 = 4;

/// Construction options shared by both backends.
#[derive(Debug, Default)]
pub struct Options {
    /// Pre-existing drawing surface to capture into. Created on demand when
    /// absent. The backend binds it to its own context kind and fails with a
    /// context-acquisition error if it is already bound incompatibly.
    pub surface: Option<Surface>,
}

/// The four-step capture contract, implemented once per backend.
///
/// An instance moves through Constructed, then any number of `grab`/`retrieve`
/// cycles, then `release` (terminal). `grab` or `retrieve` after `release`
/// returns a runtime error. No concurrent use of one instance is supported;
/// the owned surface and pipeline state are mutated in place.
pub trait VideoCapture {
    /// Current frame width, read live from the frame source so it always
    /// reflects the latest negotiated resolution.
    fn width(&self) -> u32;

    /// Current frame height, read live from the frame source.
    fn height(&self) -> u32;

    /// Number of colour channels per pixel. Always 4 (RGBA8).
    fn channels(&self) -> u32 {
        CHANNELS
    }

    /// Pixel count at the current dimensions.
    fn pixels(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Exact byte length a caller must allocate before calling `retrieve`.
    fn size(&self) -> usize {
        self.pixels() * self.channels() as usize
    }

    /// Synchronously capture the current frame from the source into the
    /// backend's owned surface. Resynchronises surface dimensions first.
    /// Must be called before `retrieve`.
    fn grab(&mut self) -> Result<()>;

    /// Copy the most recently grabbed frame (RGBA8, row-major, top-left
    /// origin) into the caller's buffer. The buffer length must match the
    /// grabbed frame's byte size exactly.
    fn retrieve(&mut self, buffer: &mut [u8]) -> Result<()>;

    /// Convenience composition: `grab`, then allocate and `retrieve` into a
    /// fresh buffer. Each call returns an independently owned buffer.
    fn read(&mut self) -> Result<Vec<u8>> {
        self.grab()?;
        let mut buffer = vec![0; self.size()];
        self.retrieve(&mut buffer)?;
        Ok(buffer)
    }

    /// Idempotent best-effort teardown of the owned graphics resources.
    /// The instance must not be used for further `grab`/`retrieve` afterwards.
    fn release(&mut self);
}
