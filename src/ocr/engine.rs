use anyhow::{Result, anyhow};
use image::DynamicImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::{find_tessdata_dir, find_tesseract_executable};

/// Tesseract page segmentation modes used by the scanner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PageSegMode {
    /// Assume a single uniform block of text.
    Block,
    /// Treat the image as a single text line.
    SingleLine,
    /// Treat the image as a single character.
    SingleChar,
}

impl PageSegMode {
    pub fn as_arg(&self) -> &'static str {
        match self {
            PageSegMode::Block => "6",
            PageSegMode::SingleLine => "7",
            PageSegMode::SingleChar => "10",
        }
    }
}

/// Black-box text recognition.
///
/// Implementations must be shareable across parse threads.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &DynamicImage, whitelist: &str, psm: PageSegMode) -> Result<String>;
}

/// Runs the Tesseract CLI once per call.
pub struct TesseractEngine {
    executable: PathBuf,
    tessdata: PathBuf,
    language: String,
}

impl TesseractEngine {
    pub fn new(executable: PathBuf, tessdata: PathBuf, language: impl Into<String>) -> Self {
        Self {
            executable,
            tessdata,
            language: language.into(),
        }
    }

    /// Locates a local Tesseract install and its tessdata directory.
    pub fn discover(language: impl Into<String>) -> Result<Self> {
        Ok(Self::new(
            find_tesseract_executable()?,
            find_tessdata_dir()?,
            language,
        ))
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &DynamicImage, whitelist: &str, psm: PageSegMode) -> Result<String> {
        let temp_input = NamedTempFile::with_suffix(".png")?;
        image.save(temp_input.path())?;

        let output = Command::new(&self.executable)
            .arg(temp_input.path())
            .arg("stdout")
            .arg("--tessdata-dir")
            .arg(&self.tessdata)
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(psm.as_arg())
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={}", whitelist))
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psm_args() {
        assert_eq!(PageSegMode::Block.as_arg(), "6");
        assert_eq!(PageSegMode::SingleLine.as_arg(), "7");
        assert_eq!(PageSegMode::SingleChar.as_arg(), "10");
    }

    #[test]
    fn test_missing_executable_is_an_error() {
        let engine = TesseractEngine::new(
            PathBuf::from("definitely-not-tesseract-binary"),
            PathBuf::from("."),
            "eng",
        );
        let img = DynamicImage::new_luma8(4, 4);
        assert!(engine.recognize(&img, "0123456789", PageSegMode::SingleLine).is_err());
    }
}
