//! Pixel capture of the game window.
//!
//! This module provides:
//! - The `CaptureProvider` seam used by the scan loops
//! - Relative-coordinate crop helpers
//! - On Windows, window discovery and a Graphics Capture backed provider

pub mod region;
#[cfg(windows)]
pub mod screenshot;
#[cfg(windows)]
pub mod window;

use anyhow::Result;
use image::{Rgb, RgbaImage};

use crate::layout::{RelativePoint, RelativeRect};

pub use region::{FrameCrop, bgra_to_rgba, crop_region, to_pixel};
#[cfg(windows)]
pub use screenshot::WindowCapture;
#[cfg(windows)]
pub use window::find_game_window;

/// Source of raster captures, addressed in window-relative coordinates.
///
/// Implementations own the translation to the current client size. The
/// navigation thread is the only caller.
pub trait CaptureProvider {
    /// Client area size in pixels.
    fn window_size(&self) -> Result<(u32, u32)>;

    /// Captures the whole client area.
    fn capture_window(&self) -> Result<RgbaImage>;

    /// Captures a sub-region of the client area.
    fn capture(&self, rect: RelativeRect) -> Result<RgbaImage> {
        let full = self.capture_window()?;
        Ok(crop_region(&full, &rect))
    }

    /// Samples a single pixel.
    fn pixel(&self, point: RelativePoint) -> Result<Rgb<u8>> {
        let full = self.capture_window()?;
        let (x, y) = to_pixel(point, full.dimensions());
        let p = full.get_pixel(x, y);
        Ok(Rgb([p[0], p[1], p[2]]))
    }
}
