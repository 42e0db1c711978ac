//! Synthetic input for driving the game UI.

#[cfg(windows)]
pub mod sendinput;

use anyhow::{Result, anyhow};

use crate::layout::RelativePoint;

#[cfg(windows)]
pub use sendinput::SendInputDriver;

/// Keys the scan loops press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Escape,
    /// A printable key, matched case-insensitively.
    Char(char),
}

impl Key {
    /// Parses a single-character hotkey from configuration.
    pub fn from_config(value: &str) -> Result<Key> {
        let mut chars = value.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphanumeric() => Ok(Key::Char(c.to_ascii_lowercase())),
            _ => Err(anyhow!("Hotkey must be a single letter or digit, got \"{}\"", value)),
        }
    }
}

/// Parses a function key name (`"F1"` to `"F12"`) into its number.
pub fn function_key(value: &str) -> Result<u8> {
    let value = value.trim();
    value
        .strip_prefix(['F', 'f'])
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|n| (1..=12).contains(n))
        .ok_or_else(|| anyhow!("Interrupt hotkey must be F1 to F12, got \"{}\"", value))
}

/// Input capability the navigation thread drives.
///
/// Coordinates are fractions of the game window's client area.
pub trait InputDriver {
    /// Brings the game window to the foreground.
    fn focus(&mut self) -> Result<()>;

    fn move_cursor(&mut self, point: RelativePoint) -> Result<()>;

    /// Left click at the current cursor position.
    fn click(&mut self) -> Result<()>;

    fn key_tap(&mut self, key: Key) -> Result<()>;

    /// Press at `from`, drag to `to`, release.
    fn drag_scroll(&mut self, from: RelativePoint, to: RelativePoint) -> Result<()>;
}
