use tracing::warn;

use super::{FieldBundle, NAME_THRESHOLD, ParseContext, RecordParser, equipped_location, parse_fraction};
use crate::catalog::NameTable;
use crate::catalog::tables::PLACEHOLDER_LIGHT_CONE;
use crate::layout::Field;
use crate::model::{LightCone, ParsedRecord, RecordKind};
use crate::ocr::TextField;
use crate::vision::icon_present;

pub struct LightConeParser {
    ctx: ParseContext,
}

impl LightConeParser {
    pub fn new(ctx: ParseContext) -> Self {
        Self { ctx }
    }
}

/// Ascension tier implied by the level cap (20, 30, ... 80).
pub fn ascension_from_max_level(max_level: u32) -> u32 {
    ((max_level.max(20) - 20) / 10).min(6)
}

impl RecordParser for LightConeParser {
    type Input = FieldBundle;

    fn kind(&self) -> RecordKind {
        RecordKind::LightCone
    }

    fn parse(&self, mut fields: FieldBundle, seq: u32) -> Option<ParsedRecord> {
        if self.ctx.cancel.is_cancelled() {
            return None;
        }
        let ctx = &self.ctx;
        let id = RecordKind::LightCone.synthetic_id(seq);

        let name = fields.resolve_text(Field::Name, TextField::ItemName, &ctx.extractor);
        let found = ctx.catalog.closest(NameTable::LightCones, &name);
        let key = if found.within(NAME_THRESHOLD) {
            found.name
        } else {
            warn!(
                id = %id,
                text = %name,
                distance = found.distance,
                "Light cone name not recognised, using {PLACEHOLDER_LIGHT_CONE}"
            );
            PLACEHOLDER_LIGHT_CONE.to_string()
        };

        let level_text = fields.resolve_text(Field::Level, TextField::LightConeLevel, &ctx.extractor);
        let (level, max_level) = parse_fraction(&level_text).unwrap_or_else(|| {
            warn!(id = %id, text = %level_text, "Failed to parse light cone level, using 1/20");
            (1, 20)
        });
        let level = level.clamp(1, 80);
        let ascension = ascension_from_max_level(max_level);

        let superimposition = match fields.number(Field::Superimposition) {
            Some(n) => n,
            None => {
                let text = fields.resolve_text(
                    Field::Superimposition,
                    TextField::Superimposition,
                    &ctx.extractor,
                );
                text.trim().parse().unwrap_or_else(|_| {
                    warn!(id = %id, text = %text, "Failed to parse superimposition, using 1");
                    1
                })
            }
        }
        .clamp(1, 5);

        let lock = fields
            .image(Field::Lock)
            .is_some_and(|img| icon_present(ctx.matcher.as_ref(), img, &ctx.icons.lock));
        let location = equipped_location(ctx, &mut fields, &id);

        Some(ParsedRecord::LightCone(LightCone {
            key,
            level,
            ascension,
            superimposition,
            location,
            lock,
            id,
        }))
    }
}
