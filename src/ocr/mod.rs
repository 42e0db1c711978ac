pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod setup;

pub use engine::{OcrEngine, PageSegMode, TesseractEngine};
pub use extract::{FieldExtractor, TextField};
pub use preprocess::ColourFilter;

/// Traineddata language bundled for the game's UI font.
pub const GAME_FONT_LANGUAGE: &str = "DIN-Alternate";
