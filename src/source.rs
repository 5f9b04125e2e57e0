use std::sync::Arc;

use parking_lot::Mutex;

/// A single frame of video as seen by the capture backends.
#[derive(Debug)]
pub struct Frame {
    /// Raw pixel data (RGBA8, tightly packed, row-major, top-left origin).
    pub data: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

impl Frame {
    /// Create a frame from raw RGBA8 bytes.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Create a frame filled with a single RGBA colour. Mostly useful for
    /// tests and synthetic sources.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            data: rgba.repeat(width as usize * height as usize),
            width,
            height,
        }
    }

    /// The byte length a well-formed RGBA8 frame of these dimensions has.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// A continuously updating image producer consumed by the capture backends.
///
/// `width`/`height` report the source's current negotiated resolution and are
/// read live on every call; they may change between frames (camera
/// renegotiation). `current_frame` returns whatever image the source holds
/// right now. The frame's own dimensions may briefly lag behind the
/// negotiated resolution; backends scale the frame onto their surface.
///
/// The capture core never mutates the source.
pub trait FrameSource {
    /// Current negotiated frame width in pixels.
    fn width(&self) -> u32;

    /// Current negotiated frame height in pixels.
    fn height(&self) -> u32;

    /// The source's current image.
    ///
    /// Returns a cheap reference-counted pointer rather than copying the
    /// pixel buffer.
    fn current_frame(&self) -> Arc<Frame>;
}

/// A cloneable single-slot frame cell bridging a producer thread to a
/// capture backend.
///
/// Holds only the latest frame; publishing replaces the previous one. This is
/// deliberately not a queue: consumers that fall behind simply see the newest
/// image, which is the right behaviour for live preview capture.
#[derive(Debug, Clone)]
pub struct SharedSource {
    current: Arc<Mutex<Arc<Frame>>>,
}

impl SharedSource {
    /// Create a source seeded with an initial frame.
    pub fn new(initial: Frame) -> Self {
        Self {
            current: Arc::new(Mutex::new(Arc::new(initial))),
        }
    }

    /// Replace the current frame. Readers observe the new frame (and its
    /// dimensions) on their next access.
    pub fn publish(&self, frame: Frame) {
        *self.current.lock() = Arc::new(frame);
    }
}

impl FrameSource for SharedSource {
    fn width(&self) -> u32 {
        self.current.lock().width
    }

    fn height(&self) -> u32 {
        self.current.lock().height
    }

    fn current_frame(&self) -> Arc<Frame> {
        self.current.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_frame_has_expected_layout() {
        let frame = Frame::solid(3, 2, [10, 20, 30, 255]);
        assert_eq!(frame.data.len(), frame.byte_len());
        assert_eq!(frame.data.len(), 3 * 2 * 4);
        assert_eq!(&frame.data[..4], &[10, 20, 30, 255]);
        assert_eq!(&frame.data[20..24], &[10, 20, 30, 255]);
    }

    #[test]
    fn shared_source_reports_dimensions_of_latest_frame() {
        let source = SharedSource::new(Frame::solid(320, 240, [0, 0, 0, 255]));
        assert_eq!(source.width(), 320);
        assert_eq!(source.height(), 240);

        source.publish(Frame::solid(640, 480, [0, 0, 0, 255]));
        assert_eq!(source.width(), 640);
        assert_eq!(source.height(), 480);
    }

    #[test]
    fn shared_source_publish_is_visible_through_clones() {
        let source = SharedSource::new(Frame::solid(2, 2, [1, 2, 3, 255]));
        let reader = source.clone();

        source.publish(Frame::solid(2, 2, [9, 9, 9, 255]));
        assert_eq!(&reader.current_frame().data[..4], &[9, 9, 9, 255]);
    }

    #[test]
    fn current_frame_returns_arc_not_copy() {
        let source = SharedSource::new(Frame::solid(2, 2, [7, 7, 7, 255]));
        let a = source.current_frame();
        let b = source.current_frame();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn shared_source_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedSource>();
    }
}
