use std::fmt;

use crate::error::{CaptureError, Result};

/// The kind of drawing context a [`Surface`] has been bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// Immediate-mode 2D drawing (CPU pixel storage).
    TwoD,
    /// GPU rendering (pixel storage lives in the backend's render target).
    Gpu,
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextKind::TwoD => write!(f, "2d"),
            ContextKind::Gpu => write!(f, "gpu"),
        }
    }
}

/// An owned off-screen drawing target.
///
/// A surface yields exactly one kind of context over its lifetime. The first
/// backend to bind it decides the kind; binding the other kind afterwards
/// fails with a context-acquisition error. In 2D mode the surface owns the
/// RGBA8 pixel storage; resizing reallocates and clears it, which is the
/// expensive part of a resize and why backends only resize on actual drift.
#[derive(Debug, Default)]
pub struct Surface {
    width: u32,
    height: u32,
    context: Option<ContextKind>,
    pixels: Vec<u8>,
}

impl Surface {
    /// Create an unbound zero-sized surface. Backends size it to the frame
    /// source during construction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Current logical height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The context kind this surface is bound to, if any.
    pub fn context(&self) -> Option<ContextKind> {
        self.context
    }

    /// Bind the surface to a context kind. Idempotent for the same kind.
    pub(crate) fn bind(&mut self, kind: ContextKind) -> Result<()> {
        match self.context {
            None => {
                self.context = Some(kind);
                if kind == ContextKind::TwoD {
                    self.pixels = vec![0; self.byte_len()];
                }
                Ok(())
            }
            Some(bound) if bound == kind => Ok(()),
            Some(bound) => Err(CaptureError::ContextAcquisition(format!(
                "surface is already bound to a {bound} context and cannot yield a {kind} context"
            ))),
        }
    }

    /// Resynchronise the surface dimensions. Returns whether they changed.
    /// A no-op when the dimensions already match, so callers can resync
    /// before every grab without paying for reallocation.
    pub(crate) fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return false;
        }
        self.width = width;
        self.height = height;
        if self.context == Some(ContextKind::TwoD) {
            // Resizing clears the pixel rectangle, like a canvas resize.
            self.pixels = vec![0; self.byte_len()];
        }
        true
    }

    /// Clear the pixel rectangle to transparent.
    pub(crate) fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// The 2D pixel storage. Empty unless bound to a 2D context.
    pub(crate) fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable access to the 2D pixel storage.
    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_surface_is_unbound_and_empty() {
        let surface = Surface::new();
        assert_eq!(surface.width(), 0);
        assert_eq!(surface.height(), 0);
        assert!(surface.context().is_none());
        assert!(surface.pixels().is_empty());
    }

    #[test]
    fn binding_the_same_kind_twice_succeeds() {
        let mut surface = Surface::new();
        surface.bind(ContextKind::TwoD).unwrap();
        surface.bind(ContextKind::TwoD).unwrap();
        assert_eq!(surface.context(), Some(ContextKind::TwoD));
    }

    #[test]
    fn binding_an_incompatible_kind_fails() {
        let mut surface = Surface::new();
        surface.bind(ContextKind::Gpu).unwrap();
        let err = surface.bind(ContextKind::TwoD).unwrap_err();
        assert!(matches!(err, CaptureError::ContextAcquisition(_)));
    }

    #[test]
    fn resize_allocates_cleared_pixel_storage_in_2d_mode() {
        let mut surface = Surface::new();
        surface.bind(ContextKind::TwoD).unwrap();
        assert!(surface.resize(4, 3));
        assert_eq!(surface.pixels().len(), 4 * 3 * 4);
        assert!(surface.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn resize_to_same_dimensions_is_a_noop() {
        let mut surface = Surface::new();
        surface.bind(ContextKind::TwoD).unwrap();
        surface.resize(4, 3);
        surface.pixels_mut()[0] = 42;

        assert!(!surface.resize(4, 3));
        // Contents survive a no-op resize.
        assert_eq!(surface.pixels()[0], 42);
    }

    #[test]
    fn resize_clears_previous_contents() {
        let mut surface = Surface::new();
        surface.bind(ContextKind::TwoD).unwrap();
        surface.resize(2, 2);
        surface.pixels_mut().fill(255);

        surface.resize(3, 2);
        assert!(surface.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn gpu_surface_keeps_no_pixel_storage() {
        let mut surface = Surface::new();
        surface.bind(ContextKind::Gpu).unwrap();
        surface.resize(640, 480);
        assert!(surface.pixels().is_empty());
        assert_eq!(surface.width(), 640);
    }
}
