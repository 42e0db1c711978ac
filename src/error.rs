use std::path::PathBuf;

use thiserror::Error;

/// Conditions that abort a scan before (or instead of) producing records.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Honkai: Star Rail window not found. Please open the game and try again.")]
    WindowNotFound,

    #[error("Aspect ratio {found} not supported. Supported aspect ratios: {supported:?}")]
    UnsupportedAspectRatio {
        found: String,
        supported: &'static [&'static str],
    },

    #[error("No scan options selected")]
    NoScanOptions,

    #[error("Hotkey for {0} is not set")]
    HotkeyUnset(&'static str),

    #[error("Required asset missing: {}", .0.display())]
    AssetMissing(PathBuf),

    #[error("Failed to parse {what}. Got \"{last}\" instead. Did you start the scan from the ESC menu?")]
    QuantityUnreadable { what: &'static str, last: String },

    #[error("Input error: {0}")]
    Input(String),

    #[error("Capture error: {0}")]
    Capture(String),
}

impl ScanError {
    /// Wraps a collaborator failure raised while driving the game.
    pub fn input(e: anyhow::Error) -> Self {
        ScanError::Input(format!("{e:#}"))
    }

    pub fn capture(e: anyhow::Error) -> Self {
        ScanError::Capture(format!("{e:#}"))
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = ScanError::UnsupportedAspectRatio {
            found: "8:5".to_string(),
            supported: &["16:9"],
        };
        assert_eq!(
            e.to_string(),
            "Aspect ratio 8:5 not supported. Supported aspect ratios: [\"16:9\"]"
        );

        let e = ScanError::QuantityUnreadable {
            what: "quantity",
            last: "4a/".to_string(),
        };
        assert!(e.to_string().starts_with("Failed to parse quantity. Got \"4a/\""));

        let e = ScanError::input(anyhow::anyhow!("SendInput failed"));
        assert_eq!(e.to_string(), "Input error: SendInput failed");
    }
}
