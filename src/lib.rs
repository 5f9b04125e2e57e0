//! Frame capture from live pixel sources, through one of two backends.
//!
//! A [`FrameSource`] hands out RGBA8 frames at a negotiated resolution. A
//! backend implementing [`VideoCapture`] grabs the current frame into its
//! owned [`Surface`] and hands the pixels back through `retrieve` or `read`:
//!
//! - [`CpuCapture`] blits on the CPU, scaling when frame and surface
//!   dimensions disagree. The cheap path when pixels stay host-side.
//! - [`GpuCapture`] uploads the frame as a texture, draws it across an
//!   offscreen target with a selectable fragment shader, and reads the
//!   pixels back.
//!
//! ```no_run
//! use framegrab::{CpuCapture, Frame, Options, SharedSource, VideoCapture};
//!
//! # fn main() -> framegrab::Result<()> {
//! let source = SharedSource::new(Frame::solid(320, 240, [255, 0, 0, 255]));
//! let mut capture = CpuCapture::new(source, Options::default())?;
//! let pixels = capture.read()?;
//! assert_eq!(pixels.len(), capture.size());
//! capture.release();
//! # Ok(())
//! # }
//! ```

mod capture;
mod error;
mod source;
mod surface;

pub use capture::cpu::CpuCapture;
pub use capture::gpu::{AdapterOptions, GpuCapture, GpuOptions};
pub use capture::shaders::FragmentShader;
pub use capture::{Options, VideoCapture, CHANNELS};
pub use error::{CaptureError, Result};
pub use source::{Frame, FrameSource, SharedSource};
pub use surface::{ContextKind, Surface};
