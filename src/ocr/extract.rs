//! Turns one captured field image into one string.
//!
//! Every text field has a fixed recognition recipe: a character whitelist, a
//! page segmentation mode (plus an optional second mode), a colour filter for
//! the preprocessed pass and an expected shape. Passes run in order until one
//! produces text of the expected shape:
//!
//! 1. raw image, primary mode (skipped when preprocessing is forced)
//! 2. filtered image, primary mode
//! 3. raw then filtered image, fallback mode
//!
//! Extraction never fails. Engine errors are logged and count as empty output,
//! so callers only ever see a possibly empty string.

use std::sync::Arc;
use std::sync::LazyLock;

use image::{DynamicImage, RgbaImage};
use regex::Regex;
use tracing::{debug, warn};

use super::engine::{OcrEngine, PageSegMode};
use super::preprocess::ColourFilter;

const NAME_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ 'abcedfghijklmnopqrstuvwxyz-";

static FRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\s*/\s*\d+$").expect("valid fraction pattern"));
static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("valid digits pattern"));

/// What a successful read looks like.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextShape {
    Any,
    /// `current/total`
    Fraction,
    Digits,
}

impl TextShape {
    pub fn accepts(&self, text: &str) -> bool {
        match self {
            TextShape::Any => !text.is_empty(),
            TextShape::Fraction => FRACTION.is_match(text),
            TextShape::Digits => DIGITS.is_match(text),
        }
    }
}

/// Text fields the scanner reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextField {
    Uid,
    Quantity,
    SortLabel,
    ItemName,
    LightConeLevel,
    Superimposition,
    Equipped,
    RelicLevel,
    MainStat,
    SubstatNames,
    SubstatValues,
    CharacterCount,
    CharacterName,
    CharacterLevel,
    TraceLevel,
}

/// Recognition recipe for one field.
#[derive(Clone, Copy, Debug)]
pub struct FieldRecipe {
    pub whitelist: &'static str,
    pub psm: PageSegMode,
    pub fallback_psm: Option<PageSegMode>,
    pub filter: ColourFilter,
    pub force_preprocess: bool,
    pub keep_newlines: bool,
    /// The game font's 5 is often read as S.
    pub s_as_five: bool,
    pub shape: TextShape,
}

impl FieldRecipe {
    const fn line(whitelist: &'static str, shape: TextShape) -> Self {
        Self {
            whitelist,
            psm: PageSegMode::SingleLine,
            fallback_psm: None,
            filter: ColourFilter::DEFAULT,
            force_preprocess: false,
            keep_newlines: false,
            s_as_five: false,
            shape,
        }
    }
}

impl TextField {
    pub fn recipe(&self) -> FieldRecipe {
        use PageSegMode::*;
        use TextShape::*;

        match self {
            TextField::Uid => FieldRecipe::line("0123456789", Digits),
            TextField::Quantity => FieldRecipe::line("0123456789/", Fraction),
            TextField::SortLabel => {
                FieldRecipe::line(crate::layout::SortKey::LABEL_WHITELIST, Any)
            }
            TextField::ItemName => FieldRecipe {
                psm: Block,
                ..FieldRecipe::line(NAME_WHITELIST, Any)
            },
            TextField::LightConeLevel => FieldRecipe {
                filter: ColourFilter::LIGHT_CONE_LEVEL,
                force_preprocess: true,
                s_as_five: true,
                ..FieldRecipe::line("0123456789S/", Fraction)
            },
            TextField::Superimposition => FieldRecipe {
                psm: SingleChar,
                filter: ColourFilter::SUPERIMPOSITION,
                force_preprocess: true,
                s_as_five: true,
                ..FieldRecipe::line("12345S", Digits)
            },
            TextField::Equipped => FieldRecipe {
                filter: ColourFilter::EQUIPPED,
                force_preprocess: true,
                ..FieldRecipe::line("Equiped", Any)
            },
            TextField::RelicLevel => FieldRecipe {
                s_as_five: true,
                ..FieldRecipe::line("0123456789S", Digits)
            },
            TextField::MainStat => FieldRecipe {
                filter: ColourFilter::MAIN_STAT,
                force_preprocess: true,
                ..FieldRecipe::line(
                    "ABCDEFGHIJKLMNOPQRSTUVWXYZ abcedfghijklmnopqrstuvwxyz",
                    Any,
                )
            },
            TextField::SubstatNames => FieldRecipe {
                psm: Block,
                filter: ColourFilter::SUBSTAT,
                force_preprocess: true,
                keep_newlines: true,
                ..FieldRecipe::line(" ABCDEFGHIKMPRSTacefikrt", Any)
            },
            TextField::SubstatValues => FieldRecipe {
                psm: Block,
                filter: ColourFilter::SUBSTAT,
                force_preprocess: true,
                keep_newlines: true,
                s_as_five: true,
                ..FieldRecipe::line("0123456789S.%", Any)
            },
            TextField::CharacterCount => FieldRecipe {
                filter: ColourFilter::CHARACTER_COUNT,
                ..FieldRecipe::line("0123456789/", Fraction)
            },
            TextField::CharacterName => FieldRecipe::line(
                "ABCDEFGHIJKLMNOPQRSTUVWXYZ abcdefghijklmnopqrstuvwxyz/7",
                Any,
            ),
            TextField::CharacterLevel => FieldRecipe {
                fallback_psm: Some(Block),
                force_preprocess: true,
                ..FieldRecipe::line("0123456789", Digits)
            },
            TextField::TraceLevel => FieldRecipe {
                psm: Block,
                fallback_psm: Some(SingleLine),
                filter: ColourFilter::TRACE,
                force_preprocess: true,
                ..FieldRecipe::line("0123456789/", Fraction)
            },
        }
    }
}

/// Field-level OCR with tiered fallback.
#[derive(Clone)]
pub struct FieldExtractor {
    engine: Arc<dyn OcrEngine>,
}

impl FieldExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self { engine }
    }

    /// Reads `field` from `image`. Returns an empty string when nothing
    /// usable was recognised.
    pub fn extract(&self, field: TextField, image: &RgbaImage) -> String {
        let recipe = field.recipe();
        if image.width() == 0 || image.height() == 0 {
            warn!(?field, "Empty capture, skipping OCR");
            return String::new();
        }

        let raw = DynamicImage::ImageRgba8(image.clone());
        let mut filtered: Option<DynamicImage> = None;
        let mut first_text: Option<String> = None;

        let modes = std::iter::once(recipe.psm).chain(recipe.fallback_psm);
        for psm in modes {
            for preprocess in [false, true] {
                if !preprocess && recipe.force_preprocess {
                    continue;
                }
                let input = if preprocess {
                    filtered.get_or_insert_with(|| {
                        DynamicImage::ImageLuma8(recipe.filter.apply(image))
                    })
                } else {
                    &raw
                };

                let text = match self.engine.recognize(input, recipe.whitelist, psm) {
                    Ok(text) => normalize(&text, &recipe),
                    Err(e) => {
                        warn!(?field, ?psm, error = %e, "OCR engine failed");
                        String::new()
                    }
                };

                if recipe.shape.accepts(&text) {
                    debug!(?field, ?psm, preprocess, text = %text, "OCR read");
                    return text;
                }
                if first_text.is_none() && !text.is_empty() {
                    first_text = Some(text);
                }
            }
        }

        let text = first_text.unwrap_or_default();
        debug!(?field, text = %text, "OCR read without expected shape");
        text
    }
}

fn normalize(text: &str, recipe: &FieldRecipe) -> String {
    let mut text = if recipe.keep_newlines {
        text.trim().to_string()
    } else {
        text.replace('\n', " ").trim().to_string()
    };
    if recipe.s_as_five {
        text = text.replace('S', "5");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use image::Rgba;
    use std::sync::Mutex;

    /// Returns scripted answers and records each call's input kind and mode.
    struct Scripted {
        answers: Mutex<Vec<Result<String>>>,
        calls: Mutex<Vec<(bool, PageSegMode)>>,
    }

    impl Scripted {
        fn new(answers: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into_iter().rev().collect()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    impl OcrEngine for Scripted {
        fn recognize(&self, image: &DynamicImage, _: &str, psm: PageSegMode) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((image.as_luma8().is_some(), psm));
            self.answers
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    fn sample() -> RgbaImage {
        RgbaImage::from_pixel(20, 10, Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn test_primary_pass_wins() {
        let engine = Scripted::new(vec![Ok("45/120\n".to_string())]);
        let extractor = FieldExtractor::new(engine.clone());

        assert_eq!(extractor.extract(TextField::Quantity, &sample()), "45/120");
        assert_eq!(
            *engine.calls.lock().unwrap(),
            vec![(false, PageSegMode::SingleLine)]
        );
    }

    #[test]
    fn test_invalid_primary_falls_back_to_filtered() {
        let engine = Scripted::new(vec![Ok("4S/".to_string()), Ok("45/120".to_string())]);
        let extractor = FieldExtractor::new(engine.clone());

        assert_eq!(extractor.extract(TextField::Quantity, &sample()), "45/120");
        assert_eq!(
            *engine.calls.lock().unwrap(),
            vec![(false, PageSegMode::SingleLine), (true, PageSegMode::SingleLine)]
        );
    }

    #[test]
    fn test_forced_preprocess_and_second_mode() {
        let engine = Scripted::new(vec![Ok("7".to_string()), Ok("7/10".to_string())]);
        let extractor = FieldExtractor::new(engine.clone());

        assert_eq!(extractor.extract(TextField::TraceLevel, &sample()), "7/10");
        assert_eq!(
            *engine.calls.lock().unwrap(),
            vec![(true, PageSegMode::Block), (true, PageSegMode::SingleLine)]
        );
    }

    #[test]
    fn test_engine_errors_yield_empty_string() {
        let engine = Scripted::new(vec![Err(anyhow!("boom")), Err(anyhow!("boom"))]);
        let extractor = FieldExtractor::new(engine);

        assert_eq!(extractor.extract(TextField::Quantity, &sample()), "");
    }

    #[test]
    fn test_empty_image_skips_engine() {
        let engine = Scripted::new(vec![]);
        let extractor = FieldExtractor::new(engine.clone());

        assert_eq!(extractor.extract(TextField::ItemName, &RgbaImage::new(0, 0)), "");
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_best_effort_text_is_returned() {
        let engine = Scripted::new(vec![Ok("4a".to_string())]);
        let extractor = FieldExtractor::new(engine);

        assert_eq!(extractor.extract(TextField::Uid, &sample()), "4a");
    }

    #[test]
    fn test_s_is_read_as_five_and_newlines_kept() {
        let engine = Scripted::new(vec![Ok("1S.2%\n\n3S\n".to_string())]);
        let extractor = FieldExtractor::new(engine);

        assert_eq!(
            extractor.extract(TextField::SubstatValues, &sample()),
            "15.2%\n\n35"
        );
    }
}
