//! Frame rendering and animation encoding.
//!
//! The worker talks to rendering only through [`RenderBackend`]. The backend
//! is a non-reentrant resource: it takes `&mut self`, is owned by exactly one
//! worker, and never sees concurrent callers.
//!
//! - [`tube`] - SVG scene of the nixie display and its material theme.
//! - [`raster`] - [`TubeRenderer`], the `resvg`-backed [`RenderBackend`].
//! - [`ffmpeg`] - [`FfmpegEncoder`], streams raw frames into `ffmpeg`.

mod ffmpeg;
mod raster;
mod tube;

pub use ffmpeg::*;
pub use raster::*;
pub use tube::*;

use crate::{Material, Result};

/// One rendered still frame, straight-alpha RGBA8, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }
}

/// Renders frames of the display and encodes them into a looping animation.
///
/// Implementations must be deterministic for identical input: all randomness
/// lives in the [`FlickerGenerator`](crate::FlickerGenerator).
pub trait RenderBackend: Send + 'static {
    /// Renders one frame showing `digits`, where `materials[i]` is the state of
    /// the lit filament in tube `i`.
    fn render_frame(&mut self, digits: &str, materials: &[Material]) -> Result<Frame>;

    /// Encodes frames, in order, into a looping animation at `framerate`.
    fn encode_sequence(&mut self, frames: &[Frame], framerate: u32) -> Result<Vec<u8>>;
}

impl<B: RenderBackend + ?Sized> RenderBackend for Box<B> {
    fn render_frame(&mut self, digits: &str, materials: &[Material]) -> Result<Frame> {
        (**self).render_frame(digits, materials)
    }

    fn encode_sequence(&mut self, frames: &[Frame], framerate: u32) -> Result<Vec<u8>> {
        (**self).encode_sequence(frames, framerate)
    }
}
