//! Turns captured field bundles into typed records.
//!
//! Parsers run on worker threads, one task per item. They never touch input
//! or capture; everything they need was captured by the navigation thread
//! and arrives in the bundle. A parser returns `None` only when the scan was
//! cancelled or the item cannot be identified at all.

pub mod bundle;
pub mod character;
pub mod light_cone;
pub mod relic;
pub mod substats;

use std::sync::Arc;

use image::imageops;
use tracing::debug;

use crate::catalog::icons::normalise_avatar;
use crate::catalog::{IconSet, ReferenceCatalog};
use crate::layout::Field;
use crate::model::{ParsedRecord, RecordKind};
use crate::ocr::{FieldExtractor, TextField};
use crate::scanner::{CancellationToken, ScanContext};
use crate::vision::TemplateMatcher;

pub use bundle::{Captured, FieldBundle};
pub use character::{CharacterBundle, CharacterParser};
pub use light_cone::LightConeParser;
pub use relic::RelicParser;

/// Levenshtein distance above which an item name is not trusted.
pub const NAME_THRESHOLD: usize = 5;

/// Shared read-only state handed to every parser.
#[derive(Clone)]
pub struct ParseContext {
    pub extractor: FieldExtractor,
    pub catalog: Arc<dyn ReferenceCatalog>,
    pub icons: Arc<IconSet>,
    pub matcher: Arc<dyn TemplateMatcher>,
    pub cancel: CancellationToken,
    pub scan: Arc<ScanContext>,
}

/// One record kind's capture-to-record conversion.
pub trait RecordParser: Send + Sync {
    type Input: Send;

    fn kind(&self) -> RecordKind;

    /// Parses one item. `seq` is the capture sequence number that becomes
    /// the record's synthetic id.
    fn parse(&self, input: Self::Input, seq: u32) -> Option<ParsedRecord>;
}

/// Splits `"a/b"` into its two numbers.
pub fn parse_fraction(text: &str) -> Option<(u32, u32)> {
    let (a, b) = text.split_once('/')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

/// Leading number of a `"current/total"` read. A bare number is accepted.
pub fn leading_number(text: &str) -> Option<u32> {
    text.split('/').next()?.trim().parse().ok()
}

/// Character key of whoever has the item equipped, or an empty string.
///
/// The avatar is scored against every known icon. Gendered trailblazer icons
/// of the other gender are left out once the scan knows which one the player
/// uses.
pub fn equipped_location(ctx: &ParseContext, fields: &mut FieldBundle, id: &str) -> String {
    let equipped = fields.resolve_text(Field::Equipped, TextField::Equipped, &ctx.extractor);
    if !equipped.trim().eq_ignore_ascii_case("Equipped") {
        return String::new();
    }

    let Some(avatar) = fields.image(Field::EquippedAvatar) else {
        return String::new();
    };
    let capture = normalise_avatar(&imageops::grayscale(avatar));
    let excluded = ctx
        .scan
        .trailblazer()
        .map(|tb| tb.other().avatar_suffix());

    let best = ctx
        .icons
        .avatars
        .iter()
        .filter(|(key, _)| excluded.is_none_or(|suffix| !key.ends_with(suffix)))
        .filter_map(|(key, icon)| {
            ctx.matcher
                .best_match(&capture, icon)
                .map(|m| (key, m.score))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1));

    match best {
        Some((key, score)) => {
            debug!(id, avatar = %key, score, "Equipped avatar matched");
            key.split('#').next().unwrap_or_default().to_string()
        }
        None => String::new(),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use image::RgbaImage;

    #[test]
    fn test_parse_fraction() {
        assert_eq!(parse_fraction("20/40"), Some((20, 40)));
        assert_eq!(parse_fraction(" 1 / 20 "), Some((1, 20)));
        assert_eq!(parse_fraction("1"), None);
        assert_eq!(parse_fraction("a/20"), None);
        assert_eq!(leading_number("45/120"), Some(45));
        assert_eq!(leading_number("7"), Some(7));
        assert_eq!(leading_number("/3"), None);
    }

    #[test]
    fn test_equipped_location_requires_label() {
        let ocr = ScriptedOcr::new();
        let ctx = context(ocr.clone(), 0.9);
        let mut fields = FieldBundle::new();
        fields.insert_image(Field::Equipped, RgbaImage::new(10, 4));
        fields.insert_image(Field::EquippedAvatar, RgbaImage::new(10, 10));

        assert_eq!(equipped_location(&ctx, &mut fields, "relic_1"), "");

        ocr.answer(TextField::Equipped, "Equipped");
        let mut fields = FieldBundle::new();
        fields.insert_image(Field::Equipped, RgbaImage::new(10, 4));
        fields.insert_image(Field::EquippedAvatar, RgbaImage::new(10, 10));
        assert_eq!(equipped_location(&ctx, &mut fields, "relic_1"), "Seele");
    }
}
