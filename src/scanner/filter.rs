//! Pre-parse filtering of captured items.
//!
//! A bound that every item satisfies is answered without OCR. Otherwise the
//! one field the bound needs is read and the value is cached in the bundle
//! for the parse stage.

use std::sync::Arc;

use tracing::{debug, warn};

use super::config::{CharacterFilter, ItemFilter, ScanMode};
use crate::catalog::{NameTable, ReferenceCatalog};
use crate::layout::{Field, SortKey};
use crate::model::{ItemKind, RecordKind};
use crate::ocr::{FieldExtractor, TextField};
use crate::parser::relic::resolve_rarity;
use crate::parser::{FieldBundle, NAME_THRESHOLD, leading_number};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKey {
    MinLevel,
    MinRarity,
}

/// Bounds applied to one item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterBounds {
    pub min_level: u32,
    pub min_rarity: Option<u8>,
}

impl From<ItemFilter> for FilterBounds {
    fn from(f: ItemFilter) -> Self {
        Self {
            min_level: f.min_level,
            min_rarity: Some(f.min_rarity),
        }
    }
}

impl From<CharacterFilter> for FilterBounds {
    fn from(f: CharacterFilter) -> Self {
        Self {
            min_level: f.min_level,
            min_rarity: None,
        }
    }
}

/// Highest bounds every item of a kind satisfies: `(min_level, min_rarity)`.
pub fn trivial_bounds(kind: RecordKind) -> (u32, u8) {
    match kind {
        RecordKind::LightCone => (1, 3),
        RecordKind::Relic => (0, 2),
        RecordKind::Character => (1, u8::MAX),
    }
}

/// Pass/fail per evaluated bound.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterReport {
    results: Vec<(FilterKey, bool)>,
}

impl FilterReport {
    /// Bounds that were not evaluated count as passed.
    pub fn passed(&self, key: FilterKey) -> bool {
        self.results
            .iter()
            .find(|(k, _)| *k == key)
            .is_none_or(|(_, ok)| *ok)
    }

    pub fn all_pass(&self) -> bool {
        self.results.iter().all(|(_, ok)| *ok)
    }

    fn record(&mut self, key: FilterKey, ok: bool) {
        self.results.push((key, ok));
    }
}

/// What the scan loop does with an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Parse,
    Skip,
    /// No later item can pass either.
    HardStop,
}

/// Turns a report into a verdict given the list's current sort order.
pub fn verdict(report: &FilterReport, sort: Option<SortKey>, enforce_hard_stop: bool) -> Verdict {
    if report.all_pass() {
        return Verdict::Parse;
    }
    let sorted_key_failed = match sort {
        Some(SortKey::Level) => !report.passed(FilterKey::MinLevel),
        Some(SortKey::Rarity) => !report.passed(FilterKey::MinRarity),
        _ => false,
    };
    if enforce_hard_stop && sorted_key_failed {
        Verdict::HardStop
    } else {
        Verdict::Skip
    }
}

/// Sort order that lets a filtered pass stop earliest.
pub fn optimal_sort(kind: ItemKind, filter: ItemFilter, mode: ScanMode) -> SortKey {
    if kind == ItemKind::Relic && mode == ScanMode::RecentRelics {
        return SortKey::DateObtained;
    }
    let (level_floor, _) = trivial_bounds(kind.record_kind());
    if filter.min_level > level_floor {
        SortKey::Level
    } else {
        SortKey::Rarity
    }
}

pub struct FilterEvaluator {
    extractor: FieldExtractor,
    catalog: Arc<dyn ReferenceCatalog>,
}

impl FilterEvaluator {
    pub fn new(extractor: FieldExtractor, catalog: Arc<dyn ReferenceCatalog>) -> Self {
        Self { extractor, catalog }
    }

    pub fn check(&self, kind: RecordKind, fields: &mut FieldBundle, bounds: FilterBounds, seq: u32) -> FilterReport {
        let (level_floor, rarity_floor) = trivial_bounds(kind);
        let mut report = FilterReport::default();

        if bounds.min_level > level_floor {
            let level = self.level(kind, fields);
            report.record(FilterKey::MinLevel, level >= bounds.min_level);
        }

        if let Some(min_rarity) = bounds.min_rarity.filter(|r| *r > rarity_floor) {
            match self.rarity(kind, fields, seq) {
                Some(rarity) => report.record(FilterKey::MinRarity, rarity >= min_rarity),
                None => debug!(id = %kind.synthetic_id(seq), "Rarity unknown, not filtering"),
            }
        }

        report
    }

    fn level(&self, kind: RecordKind, fields: &mut FieldBundle) -> u32 {
        match kind {
            // The level cap is still needed for ascension, so keep the text.
            RecordKind::LightCone => {
                let text = fields.resolve_text(Field::Level, TextField::LightConeLevel, &self.extractor);
                leading_number(&text).unwrap_or(1)
            }
            RecordKind::Relic => {
                if let Some(n) = fields.number(Field::Level) {
                    return n;
                }
                let text = fields.resolve_text(Field::Level, TextField::RelicLevel, &self.extractor);
                match text.trim().parse() {
                    Ok(level) => {
                        fields.set_number(Field::Level, level);
                        level
                    }
                    Err(_) => 0,
                }
            }
            RecordKind::Character => {
                if let Some(n) = fields.number(Field::Level) {
                    return n;
                }
                let text = fields.resolve_text(Field::Level, TextField::CharacterLevel, &self.extractor);
                match text.trim().parse() {
                    Ok(level) => {
                        fields.set_number(Field::Level, level);
                        level
                    }
                    Err(_) => 1,
                }
            }
        }
    }

    fn rarity(&self, kind: RecordKind, fields: &mut FieldBundle, seq: u32) -> Option<u8> {
        match kind {
            RecordKind::LightCone => {
                let text = fields.resolve_text(Field::Name, TextField::ItemName, &self.extractor);
                let found = self.catalog.closest(NameTable::LightCones, &text);
                if !found.within(NAME_THRESHOLD) {
                    warn!(id = %kind.synthetic_id(seq), text = %text, "Light cone name unreadable, rarity unknown");
                    return None;
                }
                self.catalog.light_cone_rarity(&found.name)
            }
            RecordKind::Relic => resolve_rarity(fields),
            RecordKind::Character => None,
        }
    }
}
