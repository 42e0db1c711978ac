use std::collections::BTreeMap;

use image::RgbaImage;
use tracing::warn;

use super::{FieldBundle, ParseContext, RecordParser, leading_number};
use crate::layout::Field;
use crate::model::{Character, ParsedRecord, Path, RecordKind, Skill, SkillLevels};
use crate::ocr::TextField;
use crate::vision::count_eidolons;

/// Eidolon tiers that raise skill levels.
const BONUS_TIERS: [u32; 2] = [5, 3];

/// Everything the three roster passes captured for one character.
#[derive(Clone, Debug)]
pub struct CharacterBundle {
    /// Resolved catalog key (trailblazers already carry their path).
    pub key: String,
    pub path: Path,
    pub ascension: u32,
    /// Holds the level capture, or the level if the filter already read it.
    pub fields: FieldBundle,
    pub skill_levels: Vec<(Skill, RgbaImage)>,
    pub traces: BTreeMap<String, bool>,
    pub eidolons: Vec<RgbaImage>,
}

pub struct CharacterParser {
    ctx: ParseContext,
}

impl CharacterParser {
    pub fn new(ctx: ParseContext) -> Self {
        Self { ctx }
    }

    fn skills(&self, bundle: &CharacterBundle, eidolon: u32, id: &str) -> SkillLevels {
        let ctx = &self.ctx;
        let mut skills = SkillLevels::default();

        for tier in BONUS_TIERS.into_iter().filter(|t| eidolon >= *t) {
            match ctx.catalog.eidolon_bonus(&bundle.key, tier) {
                Some(bonus) => {
                    for skill in Skill::ALL {
                        *skills.get_mut(skill) -= bonus.get(skill);
                    }
                }
                None => warn!(id, character = %bundle.key, tier, "No eidolon bonus data"),
            }
        }

        for (skill, image) in &bundle.skill_levels {
            let text = ctx.extractor.extract(TextField::TraceLevel, image);
            let slot = skills.get_mut(*skill);
            let level = leading_number(&text).map(|n| *slot + n as i32);
            *slot = match level {
                Some(level) if (1..=skill.max_level()).contains(&level) => level,
                _ => {
                    warn!(id, ?skill, text = %text, "Skill level out of range, using 1");
                    1
                }
            };
        }

        skills
    }
}

impl RecordParser for CharacterParser {
    type Input = CharacterBundle;

    fn kind(&self) -> RecordKind {
        RecordKind::Character
    }

    fn parse(&self, mut bundle: CharacterBundle, seq: u32) -> Option<ParsedRecord> {
        if self.ctx.cancel.is_cancelled() {
            return None;
        }
        let id = RecordKind::Character.synthetic_id(seq);

        let level = match bundle.fields.number(Field::Level) {
            Some(level) => level,
            None => {
                let text = bundle
                    .fields
                    .resolve_text(Field::Level, TextField::CharacterLevel, &self.ctx.extractor);
                text.trim().parse().unwrap_or_else(|_| {
                    warn!(id = %id, text = %text, "Failed to parse character level, using 1");
                    1
                })
            }
        }
        .clamp(1, 80);

        let eidolon = count_eidolons(&bundle.eidolons);
        let skills = if bundle.skill_levels.is_empty() {
            SkillLevels::default()
        } else {
            self.skills(&bundle, eidolon, &id)
        };

        Some(ParsedRecord::Character(Character {
            key: std::mem::take(&mut bundle.key),
            path: bundle.path.name().to_string(),
            level,
            ascension: bundle.ascension.min(6),
            eidolon,
            skills,
            traces: std::mem::take(&mut bundle.traces),
            id,
        }))
    }
}
