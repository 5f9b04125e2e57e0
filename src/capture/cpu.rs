//! The 2D backend: immediate-mode blits into a CPU pixel surface.

use fast_image_resize::images::{Image, ImageRef};
use fast_image_resize::{PixelType, Resizer};
use tracing::debug;

use crate::capture::{Options, VideoCapture};
use crate::error::{CaptureError, Result};
use crate::source::{Frame, FrameSource};
use crate::surface::{ContextKind, Surface};

/// Captures frames by drawing them into an owned 2D pixel surface.
///
/// The cheapest backend when the host wants CPU-side pixels anyway: one
/// (possibly scaled) blit per grab and one memcpy per retrieve, no GPU
/// round trip.
#[derive(Debug)]
pub struct CpuCapture<S: FrameSource> {
    source: S,
    surface: Surface,
    resizer: Resizer,
    released: bool,
}

impl<S: FrameSource> CpuCapture<S> {
    /// Create a 2D capture backend over the given frame source.
    ///
    /// Takes the surface out of `options` or creates one, and binds it to a
    /// 2D context. Fails with a context-acquisition error if the supplied
    /// surface is already bound to a GPU context.
    pub fn new(source: S, options: Options) -> Result<Self> {
        let mut surface = options.surface.unwrap_or_default();
        surface.bind(ContextKind::TwoD)?;
        surface.resize(source.width(), source.height());
        Ok(Self {
            source,
            surface,
            resizer: Resizer::new(),
            released: false,
        })
    }

    /// The owned drawing surface.
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    fn ensure_live(&self, operation: &str) -> Result<()> {
        if self.released {
            return Err(CaptureError::Runtime(format!(
                "{operation} called after release"
            )));
        }
        Ok(())
    }

    /// Draw `frame` into the surface at full surface size, scaling when the
    /// frame's own dimensions lag behind the negotiated resolution.
    fn blit(&mut self, frame: &Frame) -> Result<()> {
        if frame.data.len() != frame.byte_len() {
            return Err(CaptureError::Runtime(format!(
                "source frame has {} bytes, expected {} for {}x{} RGBA8",
                frame.data.len(),
                frame.byte_len(),
                frame.width,
                frame.height
            )));
        }

        if frame.width == self.surface.width() && frame.height == self.surface.height() {
            self.surface.pixels_mut().copy_from_slice(&frame.data);
            return Ok(());
        }

        debug!(
            frame_width = frame.width,
            frame_height = frame.height,
            surface_width = self.surface.width(),
            surface_height = self.surface.height(),
            "scaled blit"
        );
        let src = ImageRef::new(frame.width, frame.height, &frame.data, PixelType::U8x4)
            .map_err(|e| CaptureError::Runtime(format!("source frame rejected: {e}")))?;
        let (width, height) = (self.surface.width(), self.surface.height());
        let mut dst = Image::from_slice_u8(width, height, self.surface.pixels_mut(), PixelType::U8x4)
            .map_err(|e| CaptureError::Runtime(format!("surface storage rejected: {e}")))?;
        self.resizer
            .resize(&src, &mut dst, None)
            .map_err(|e| CaptureError::Runtime(format!("blit failed: {e}")))?;
        Ok(())
    }
}

impl<S: FrameSource> VideoCapture for CpuCapture<S> {
    fn width(&self) -> u32 {
        self.source.width()
    }

    fn height(&self) -> u32 {
        self.source.height()
    }

    fn grab(&mut self) -> Result<()> {
        self.ensure_live("grab")?;
        if self.surface.resize(self.source.width(), self.source.height()) {
            debug!(
                width = self.surface.width(),
                height = self.surface.height(),
                "resized capture surface"
            );
        }
        let frame = self.source.current_frame();
        self.blit(&frame)
    }

    fn retrieve(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.ensure_live("retrieve")?;
        let expected = self.surface.pixels().len();
        if buffer.len() != expected {
            return Err(CaptureError::BufferLength {
                expected,
                actual: buffer.len(),
            });
        }
        buffer.copy_from_slice(self.surface.pixels());
        Ok(())
    }

    /// Fast path: the surface storage is cloned directly instead of going
    /// through an extra zeroed allocation plus `retrieve` copy. Still a
    /// fresh, independently owned buffer per call.
    fn read(&mut self) -> Result<Vec<u8>> {
        self.grab()?;
        Ok(self.surface.pixels().to_vec())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        // 2D surfaces have no destroy operation; clearing the pixel
        // rectangle is the whole teardown.
        self.surface.clear();
        self.released = true;
        debug!("2d capture released");
    }
}
