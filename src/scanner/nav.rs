//! Navigation primitives shared by the scan loops.
//!
//! The navigator owns the input and capture collaborators for the length of
//! a pass. Every settle delay is a cancellable sleep, and once the token is
//! set no further cursor movement or click reaches the game. Key taps still
//! go through so a pass can close its menus.

use std::time::Duration;

use image::{Rgb, RgbaImage};
use tracing::debug;

use super::CancellationToken;
use super::config::ScanConfig;
use crate::capture::CaptureProvider;
use crate::error::{Result, ScanError};
use crate::input::{InputDriver, Key};
use crate::layout::{RelativePoint, RelativeRect};

/// Settle delays. Base delays are scaled, then the configured pads added.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timing {
    pub scale: f32,
    pub nav_pad: Duration,
    pub scan_pad: Duration,
}

impl Timing {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            scale: 1.0,
            nav_pad: config.nav_delay(),
            scan_pad: config.scan_delay(),
        }
    }

    /// No waiting at all, for driving fakes.
    pub fn instant() -> Self {
        Self {
            scale: 0.0,
            nav_pad: Duration::ZERO,
            scan_pad: Duration::ZERO,
        }
    }

    fn scaled(&self, ms: u64) -> Duration {
        Duration::from_millis((ms as f64 * f64::from(self.scale)).round() as u64)
    }
}

pub struct Navigator<'a> {
    input: &'a mut dyn InputDriver,
    capture: &'a dyn CaptureProvider,
    timing: Timing,
    cancel: CancellationToken,
}

impl<'a> Navigator<'a> {
    pub fn new(
        input: &'a mut dyn InputDriver,
        capture: &'a dyn CaptureProvider,
        timing: Timing,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            input,
            capture,
            timing,
            cancel,
        }
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Scaled navigation delay, for waits that are not plain sleeps.
    pub fn delay(&self, ms: u64) -> Duration {
        self.timing.scaled(ms) + self.timing.nav_pad
    }

    /// Waits for the UI to settle after a navigation step. Returns `true`
    /// if the scan was cancelled meanwhile.
    pub fn settle(&self, ms: u64) -> bool {
        self.cancel.sleep(self.delay(ms))
    }

    /// Waits before capturing an item panel.
    pub fn settle_capture(&self, ms: u64) -> bool {
        self.cancel.sleep(self.timing.scaled(ms) + self.timing.scan_pad)
    }

    pub fn focus(&mut self) -> Result<()> {
        self.input.focus().map_err(ScanError::input)
    }

    pub fn key(&mut self, key: Key) -> Result<()> {
        self.input.key_tap(key).map_err(ScanError::input)
    }

    pub fn move_to(&mut self, point: RelativePoint) -> Result<()> {
        if self.cancelled() {
            debug!(?point, "Cancelled, cursor move dropped");
            return Ok(());
        }
        self.input.move_cursor(point).map_err(ScanError::input)
    }

    pub fn click(&mut self) -> Result<()> {
        if self.cancelled() {
            debug!("Cancelled, click dropped");
            return Ok(());
        }
        self.input.click().map_err(ScanError::input)
    }

    /// Moves, pauses briefly, clicks.
    pub fn click_at(&mut self, point: RelativePoint) -> Result<()> {
        self.move_to(point)?;
        self.settle(100);
        self.click()
    }

    pub fn drag(&mut self, from: RelativePoint, to: RelativePoint) -> Result<()> {
        if self.cancelled() {
            return Ok(());
        }
        self.input.drag_scroll(from, to).map_err(ScanError::input)
    }

    pub fn window_size(&self) -> Result<(u32, u32)> {
        self.capture.window_size().map_err(ScanError::capture)
    }

    pub fn capture(&self, rect: RelativeRect) -> Result<RgbaImage> {
        self.capture.capture(rect).map_err(ScanError::capture)
    }

    pub fn capture_window(&self) -> Result<RgbaImage> {
        self.capture.capture_window().map_err(ScanError::capture)
    }

    pub fn pixel(&self, point: RelativePoint) -> Result<Rgb<u8>> {
        self.capture.pixel(point).map_err(ScanError::capture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::testing::{FakeGame, InputCall};

    #[test]
    fn test_timing_scales_base_delay() {
        let config = ScanConfig {
            nav_delay_ms: 50,
            ..Default::default()
        };
        let timing = Timing::from_config(&config);
        assert_eq!(timing.scaled(200) + timing.nav_pad, Duration::from_millis(250));
        assert_eq!(Timing::instant().scaled(1500), Duration::ZERO);

        let half = Timing { scale: 0.5, ..timing };
        assert_eq!(half.scaled(1500), Duration::from_millis(750));
        assert_eq!(half.scaled(1), Duration::from_millis(1));
    }

    #[test]
    fn test_cancelled_navigator_drops_pointer_input() {
        let game = FakeGame::new(1920, 1080);
        let mut input = game.clone();
        let cancel = CancellationToken::new();
        let mut nav = Navigator::new(&mut input, &game, Timing::instant(), cancel.clone());

        nav.click_at(RelativePoint::new(0.5, 0.5)).unwrap();
        cancel.cancel();
        nav.click_at(RelativePoint::new(0.1, 0.1)).unwrap();
        nav.drag(RelativePoint::new(0.1, 0.8), RelativePoint::new(0.1, 0.1)).unwrap();
        nav.key(Key::Escape).unwrap();

        assert_eq!(
            game.calls(),
            vec![
                InputCall::Move(RelativePoint::new(0.5, 0.5)),
                InputCall::Click,
                InputCall::Key(Key::Escape),
            ]
        );
    }
}
