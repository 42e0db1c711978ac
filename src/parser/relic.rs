use tracing::{debug, warn};

use super::substats::{SubstatValidator, parse_substats};
use super::{FieldBundle, NAME_THRESHOLD, ParseContext, RecordParser, equipped_location};
use crate::catalog::NameTable;
use crate::catalog::tables::PLACEHOLDER_RELIC;
use crate::layout::Field;
use crate::model::{ParsedRecord, RecordKind, Relic};
use crate::ocr::TextField;
use crate::vision::{centre_pixel, icon_present, rarity_from_colour};

pub struct RelicParser {
    ctx: ParseContext,
}

impl RelicParser {
    pub fn new(ctx: ParseContext) -> Self {
        Self { ctx }
    }
}

/// Rarity from the bundle, sampling the rarity strip if the filter stage
/// has not already done so.
pub fn resolve_rarity(fields: &mut FieldBundle) -> Option<u8> {
    if let Some(n) = fields.number(Field::Rarity) {
        return Some(n as u8);
    }
    let rarity = rarity_from_colour(centre_pixel(fields.image(Field::Rarity)?)?);
    fields.set_number(Field::Rarity, rarity as u32);
    Some(rarity)
}

impl RecordParser for RelicParser {
    type Input = FieldBundle;

    fn kind(&self) -> RecordKind {
        RecordKind::Relic
    }

    fn parse(&self, mut fields: FieldBundle, seq: u32) -> Option<ParsedRecord> {
        if self.ctx.cancel.is_cancelled() {
            return None;
        }
        let ctx = &self.ctx;
        let id = RecordKind::Relic.synthetic_id(seq);

        let text = fields.resolve_text(Field::Name, TextField::ItemName, &ctx.extractor);
        let found = ctx.catalog.closest(NameTable::Relics, &text);
        let name = if found.within(NAME_THRESHOLD) {
            found.name
        } else {
            warn!(id = %id, text = %text, distance = found.distance, "Relic name not recognised");
            PLACEHOLDER_RELIC.to_string()
        };

        let rarity = resolve_rarity(&mut fields).unwrap_or_else(|| {
            warn!(id = %id, "Rarity strip not captured, assuming 5");
            5
        });

        let level_text = fields.resolve_text(Field::Level, TextField::RelicLevel, &ctx.extractor);
        let level = match level_text.trim().parse::<u32>() {
            Ok(level) => level.min(rarity as u32 * 3),
            Err(_) => {
                warn!(id = %id, text = %level_text, "Failed to parse relic level, using 0");
                0
            }
        };

        let main_text = fields.resolve_text(Field::MainStat, TextField::MainStat, &ctx.extractor);
        let mainstat = ctx.catalog.closest(NameTable::MainStats, &main_text).name;
        if mainstat.is_empty() {
            warn!(id = %id, text = %main_text, "Main stat not recognised");
        }

        let names = fields.resolve_text(Field::SubstatNames, TextField::SubstatNames, &ctx.extractor);
        let values = fields.resolve_text(Field::SubstatValues, TextField::SubstatValues, &ctx.extractor);
        let substats = parse_substats(&names, &values, ctx.catalog.as_ref(), &id);

        let report = SubstatValidator::new(ctx.catalog.substat_rolls(rarity)).validate(&substats, rarity, level);
        for issue in report.issues() {
            warn!(id = %id, rarity, level, "Substat check: {issue}");
        }

        let (set, slot) = match ctx.catalog.relic_meta(&name) {
            Some(meta) => (meta.set.clone(), meta.slot.clone()),
            None => {
                if name != PLACEHOLDER_RELIC {
                    warn!(id = %id, relic = %name, "No set metadata for relic");
                }
                (String::new(), String::new())
            }
        };

        let lock = fields
            .image(Field::Lock)
            .is_some_and(|img| icon_present(ctx.matcher.as_ref(), img, &ctx.icons.lock));
        let discard = fields
            .image(Field::Discard)
            .is_some_and(|img| icon_present(ctx.matcher.as_ref(), img, &ctx.icons.discard));
        let location = equipped_location(ctx, &mut fields, &id);

        debug!(id = %id, relic = %name, rarity, level, substats = substats.len(), "Relic parsed");
        Some(ParsedRecord::Relic(Relic {
            set,
            name,
            slot,
            rarity,
            level,
            mainstat,
            substats,
            location,
            lock,
            discard,
            id,
        }))
    }
}
