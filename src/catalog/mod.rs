//! Reference data the parsers correct OCR text against.
//!
//! The catalog is read-only once loaded and shared by every parse task.

pub mod icons;
pub mod json;
pub mod tables;

use std::collections::HashMap;

use serde::Deserialize;

use crate::model::SkillLevels;

pub use icons::IconSet;
pub use json::{GameData, JsonCatalog};

/// Distance reported for empty input or an empty table.
pub const NO_MATCH_DISTANCE: usize = 100;

/// Name tables that support fuzzy lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NameTable {
    LightCones,
    Relics,
    Characters,
    Paths,
    MainStats,
    Substats,
}

/// Result of a fuzzy lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match {
    pub name: String,
    pub distance: usize,
}

impl Match {
    pub fn within(&self, threshold: usize) -> bool {
        self.distance <= threshold
    }
}

/// Set and slot of a relic piece.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RelicMeta {
    pub set: String,
    pub slot: String,
}

/// Roll weight of one substat value: an exact roll count, or a range of
/// possible counts when several roll combinations give the same value.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RollWeight {
    Exact(f32),
    Range([f32; 2]),
}

impl RollWeight {
    /// Ranges count as fully rolled.
    pub fn maxed(&self) -> f32 {
        match *self {
            RollWeight::Exact(w) => w,
            RollWeight::Range([_, max]) => max,
        }
    }
}

/// Substat key (with the percent marker) to value string to roll weight.
pub type RollTable = HashMap<String, HashMap<String, RollWeight>>;

pub trait ReferenceCatalog: Send + Sync {
    /// Candidate strings for a table. Entries may carry a display alias
    /// after `#` which is what OCR text is compared against.
    fn names(&self, table: NameTable) -> &[String];

    fn light_cone_rarity(&self, name: &str) -> Option<u8>;

    fn relic_meta(&self, name: &str) -> Option<&RelicMeta>;

    /// Skill levels granted by the eidolon tier (3 or 5) of a character.
    fn eidolon_bonus(&self, character: &str, tier: u32) -> Option<SkillLevels>;

    fn substat_rolls(&self, rarity: u8) -> Option<&RollTable>;

    fn closest(&self, table: NameTable, text: &str) -> Match {
        closest_match(text, self.names(table))
    }
}

/// Nearest candidate by Levenshtein distance.
///
/// Exact matches short-circuit. Ties keep the earlier candidate.
pub fn closest_match<S: AsRef<str>>(text: &str, candidates: &[S]) -> Match {
    let text = text.trim();
    if text.is_empty() {
        return Match {
            name: String::new(),
            distance: NO_MATCH_DISTANCE,
        };
    }

    if candidates.iter().any(|c| c.as_ref() == text) {
        return Match {
            name: text.to_string(),
            distance: 0,
        };
    }

    let mut best = Match {
        name: String::new(),
        distance: NO_MATCH_DISTANCE,
    };
    for candidate in candidates {
        let candidate = candidate.as_ref();
        let compared = candidate
            .split_once('#')
            .map_or(candidate, |(_, alias)| alias);
        let distance = levenshtein::levenshtein(text, compared);
        if distance < best.distance {
            best = Match {
                name: candidate.to_string(),
                distance,
            };
        }
    }
    best
}
