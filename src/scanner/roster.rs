//! Character roster pass.
//!
//! The character count comes from the Data Bank. The roster is then walked
//! three times, once per tab (Details, Traces, Eidolons), since each tab
//! shows only part of a character and switching tabs per character costs
//! more than re-walking the list. Parse tasks are spawned in the last pass.

use std::collections::BTreeMap;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::{debug, error, info, warn};

use super::filter::{FilterBounds, Verdict, verdict};
use super::nav::Navigator;
use super::retry::{FixedDelay, RetryStrategy};
use super::tasks::ScanTaskSet;
use super::{LoopContext, PassOutput};
use crate::catalog::NameTable;
use crate::error::{Result, ScanError};
use crate::input::Key;
use crate::layout::{Field, RelativePoint, RosterLayout, SortKey};
use crate::model::{Path, RecordKind, Skill, Trailblazer};
use crate::ocr::TextField;
use crate::parser::{
    CharacterBundle, CharacterParser, FieldBundle, NAME_THRESHOLD, RecordParser, leading_number,
};
use crate::vision::{PORTRAIT_CONFIDENCE, colour_dist2, similarity};

/// Ascension star probes further than this from the star colour are unlit.
const ASCENSION_MAX_DIST2: u32 = 100;
/// Trace nodes closer than this to either lit colour are unlocked.
const TRACE_MAX_DIST2: u32 = 3000;
const TRACE_LIT: [[u8; 3]; 2] = [[255, 255, 255], [178, 200, 255]];
/// How far left of the first slot a page drag ends.
const PAGE_DRAG_OVERSHOOT: f32 = 0.031;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RosterTab {
    Details,
    Traces,
    Eidolons,
}

impl RosterTab {
    fn next(self) -> Option<RosterTab> {
        match self {
            RosterTab::Details => Some(RosterTab::Traces),
            RosterTab::Traces => Some(RosterTab::Eidolons),
            RosterTab::Eidolons => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RosterState {
    OpenDataBank,
    ReadCount,
    OpenRoster(RosterTab),
    Character(RosterTab),
    Close,
    Done,
}

/// Selection cursor over the paginated roster strip.
///
/// The strip shows `per_page` portraits. Stepping past the last visible one
/// selects it and drags it to the front, after which the selection already
/// sits on the next character.
#[derive(Clone, Copy, Debug)]
struct RosterWalk {
    index: u32,
    slot: u32,
    remaining: u32,
    /// Where to click to select the current character. `None` when the page
    /// drag already selected it.
    select: Option<RelativePoint>,
}

impl RosterWalk {
    fn new(count: u32, roster: &RosterLayout) -> Self {
        Self {
            index: 0,
            slot: 0,
            remaining: count,
            select: Some(roster.char_start),
        }
    }

    fn done(&self) -> bool {
        self.remaining == 0
    }

    fn advance(&mut self, nav: &mut Navigator<'_>, roster: &RosterLayout) -> Result<()> {
        let per_page = roster.per_page;
        let y = roster.char_start.y;

        if self.remaining - 1 == per_page || self.slot == per_page - 1 {
            let x = roster.char_start.x + roster.offset_x * (self.slot + 1) as f32;
            nav.click_at(RelativePoint::new(x, y))?;
            nav.settle(100);
            nav.drag(
                RelativePoint::new(x, y),
                RelativePoint::new(roster.char_start.x - PAGE_DRAG_OVERSHOOT, y),
            )?;
            self.select = None;
            self.slot = 0;
        } else if self.remaining <= per_page {
            let x = roster.char_end.x - roster.offset_x * (self.remaining as f32 - 2.0);
            self.select = Some(RelativePoint::new(x, roster.char_end.y));
        } else {
            self.slot += 1;
            self.select = Some(roster.slot(self.slot));
        }

        self.remaining -= 1;
        self.index += 1;
        Ok(())
    }
}

/// What the Details and Traces passes learned about one character.
#[derive(Clone, Debug)]
struct RosterEntry {
    key: String,
    path: Path,
    ascension: u32,
    fields: FieldBundle,
    skill_levels: Vec<(Skill, RgbaImage)>,
    traces: BTreeMap<String, bool>,
    skip: bool,
}

pub struct RosterScanLoop<'n, 'a> {
    nav: &'n mut Navigator<'a>,
    ctx: &'n LoopContext,
    parser: Arc<CharacterParser>,
    state: RosterState,
    tasks: ScanTaskSet,
    opened: bool,
    count: u32,
    walk: Option<RosterWalk>,
    level_sorted: bool,
    /// One slot per visited character; `None` when it could not be identified.
    entries: Vec<Option<RosterEntry>>,
    last_key: Option<String>,
    trailblazer_seen: bool,
    /// Duplicate reads and later-pass mismatches left unresolved.
    unresolved_duplicates: usize,
    /// Fatal read failure, returned once the menus are closed.
    failure: Option<ScanError>,
}

impl<'n, 'a> RosterScanLoop<'n, 'a> {
    pub fn new(nav: &'n mut Navigator<'a>, ctx: &'n LoopContext) -> Self {
        Self {
            nav,
            ctx,
            parser: Arc::new(CharacterParser::new(ctx.parse.clone())),
            state: RosterState::OpenDataBank,
            tasks: ScanTaskSet::new(RecordKind::Character, ctx.progress.clone()),
            opened: false,
            count: 0,
            walk: None,
            level_sorted: false,
            entries: Vec::new(),
            last_key: None,
            trailblazer_seen: false,
            unresolved_duplicates: 0,
            failure: None,
        }
    }

    pub fn state(&self) -> RosterState {
        self.state
    }

    fn roster(&self) -> &'static RosterLayout {
        &self.ctx.layout.roster
    }

    pub fn run(mut self) -> PassOutput {
        let result = loop {
            match self.step() {
                Ok(true) => continue,
                Ok(false) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        info!(
            characters = self.entries.len(),
            queued = self.tasks.len(),
            unresolved_duplicates = self.unresolved_duplicates,
            "Roster pass finished"
        );
        PassOutput {
            tasks: self.tasks,
            unresolved_duplicates: self.unresolved_duplicates,
            result,
        }
    }

    pub fn step(&mut self) -> Result<bool> {
        if self.nav.cancelled() && !matches!(self.state, RosterState::Close | RosterState::Done) {
            info!("Scan interrupted, closing character screen");
            self.state = if self.opened {
                RosterState::Close
            } else {
                RosterState::Done
            };
        }

        match self.state {
            RosterState::OpenDataBank => {
                self.open_data_bank()?;
                self.state = RosterState::ReadCount;
            }
            RosterState::ReadCount => {
                self.state = match self.read_count() {
                    Ok(Some(count)) => {
                        info!(count, "Character count read");
                        self.count = count;
                        RosterState::OpenRoster(RosterTab::Details)
                    }
                    Ok(None) => RosterState::Close,
                    Err(e) => {
                        self.failure = Some(e);
                        RosterState::Close
                    }
                };
            }
            RosterState::OpenRoster(tab) => {
                self.open_roster(tab)?;
                // Later passes walk the same strip as Details so page
                // alignment matches, and stop where Details stopped.
                self.walk = Some(RosterWalk::new(self.count, self.roster()));
                self.state = RosterState::Character(tab);
            }
            RosterState::Character(tab) => {
                let visited = self.entries.len();
                let Some(mut walk) = self
                    .walk
                    .filter(|w| !w.done() && (tab == RosterTab::Details || (w.index as usize) < visited))
                else {
                    self.state = match tab.next() {
                        Some(next) if !self.entries.is_empty() => RosterState::OpenRoster(next),
                        _ => RosterState::Close,
                    };
                    return Ok(true);
                };

                if let Some(point) = walk.select {
                    self.nav.click_at(point)?;
                    if self.nav.settle(100) {
                        return Ok(true);
                    }
                }
                let roster = self.roster();
                let keep_going = match tab {
                    RosterTab::Details => self.scan_details(&walk)?,
                    RosterTab::Traces => {
                        self.scan_traces(&walk)?;
                        true
                    }
                    RosterTab::Eidolons => {
                        self.scan_eidolons(&walk)?;
                        true
                    }
                };

                if keep_going {
                    walk.advance(self.nav, roster)?;
                    self.walk = Some(walk);
                } else {
                    self.walk = None;
                }
            }
            RosterState::Close => {
                self.nav.settle(1000);
                self.nav.key(Key::Escape)?;
                self.nav.settle(1500);
                self.nav.key(Key::Escape)?;
                self.state = RosterState::Done;
            }
            RosterState::Done => {
                return match self.failure.take() {
                    Some(e) => Err(e),
                    None => Ok(false),
                };
            }
        }
        Ok(true)
    }

    fn open_data_bank(&mut self) -> Result<()> {
        self.nav.settle(1000);
        let window = self.nav.capture_window()?;
        let (w, h) = window.dimensions();
        let (iw, ih) = self.roster().databank_icon;
        let needle = imageops::resize(
            &self.ctx.parse.icons.databank,
            ((w as f32 * iw) as u32).max(1),
            ((h as f32 * ih) as u32).max(1),
            FilterType::Triangle,
        );
        let haystack = imageops::grayscale(&window);
        let found = self
            .ctx
            .parse
            .matcher
            .best_match(&haystack, &needle)
            .ok_or_else(|| ScanError::Capture("Data Bank button not found".to_string()))?;
        debug!(score = found.score, x = found.x, y = found.y, "Data Bank button located");

        let point = RelativePoint::new(
            (found.x + needle.width() / 2) as f32 / w as f32,
            (found.y + needle.height() / 2) as f32 / h as f32,
        );
        self.nav.click_at(point)?;
        self.opened = true;
        self.nav.settle(1000);
        Ok(())
    }

    fn read_count(&mut self) -> Result<Option<u32>> {
        let rect = self.roster().count;
        let cancel = self.nav.token().clone();
        let strategy = FixedDelay::new(self.ctx.config.quantity_retries, self.nav.delay(500));
        let ctx = self.ctx;
        let nav = &*self.nav;

        let result = strategy.execute(&cancel, |attempt| {
            if attempt > 0 {
                warn!(attempt, "Character count unreadable, reading again");
            }
            let image = nav.capture(rect).map_err(|e| e.to_string())?;
            let text = ctx.parse.extractor.extract(TextField::CharacterCount, &image);
            match leading_number(&text) {
                Some(n) if n > 0 => Ok(n),
                _ => Err(text),
            }
        });

        match result {
            Ok(count) => Ok(Some(count)),
            Err(_) if cancel.is_cancelled() => Ok(None),
            Err(last) => Err(ScanError::QuantityUnreadable {
                what: "character count",
                last,
            }),
        }
    }

    fn open_roster(&mut self, tab: RosterTab) -> Result<()> {
        let key = self
            .ctx
            .hotkeys
            .characters
            .ok_or(ScanError::HotkeyUnset("characters"))?;

        // The Data Bank sits one menu deeper than the character screen.
        if tab == RosterTab::Details {
            self.nav.key(Key::Escape)?;
            self.nav.settle(1000);
        }
        self.nav.key(Key::Escape)?;
        self.nav.settle(1000);
        self.nav.key(Key::Char('1'))?;
        self.nav.settle(200);
        self.nav.key(key)?;
        self.nav.settle(1000);

        if tab == RosterTab::Details {
            let image = self.nav.capture(self.roster().sort_label)?;
            let text = self.ctx.parse.extractor.extract(TextField::SortLabel, &image);
            self.level_sorted = SortKey::from_label(&text) == Some(SortKey::Level);
            debug!(text = %text, level_sorted = self.level_sorted, "Roster sort read");
        }
        info!(?tab, "Walking roster");
        Ok(())
    }

    /// Returns `false` when a sorted level bound ends the roster early.
    fn scan_details(&mut self, walk: &RosterWalk) -> Result<bool> {
        let roster = self.roster();
        let seq = walk.index + 1;
        let id = RecordKind::Character.synthetic_id(seq);
        self.nav.click_at(roster.details_button)?;
        if self.nav.settle(1000) {
            return Ok(true);
        }

        let mut identity = self.identify(&id, true)?;
        if self.repeats_last(&identity) {
            warn!(id = %id, character = ?self.last_key, "Same character read twice, selecting again");
            if let Some(point) = walk.select {
                self.nav.click_at(point)?;
                self.nav.settle(100);
            }
            self.nav.click_at(roster.details_button)?;
            self.nav.settle(1000);
            identity = self.identify(&id, true)?;
            if self.repeats_last(&identity) {
                error!(id = %id, character = ?self.last_key, "Unresolved duplicate character, scanning anyway");
                self.unresolved_duplicates += 1;
            }
        }

        let Some((key, path)) = identity else {
            self.entries.push(None);
            return Ok(true);
        };
        self.last_key = Some(key.clone());

        let mut fields = FieldBundle::new();
        fields.insert_image(Field::Level, self.nav.capture(roster.level)?);
        let ascension = self.read_ascension()?;

        let bounds = FilterBounds::from(self.ctx.config.filters.character);
        let report = self.ctx.filter.check(RecordKind::Character, &mut fields, bounds, seq);
        let sort = self.level_sorted.then_some(SortKey::Level);
        let skip = match verdict(&report, sort, self.level_sorted) {
            Verdict::Parse => false,
            Verdict::Skip => {
                debug!(id = %id, character = %key, "Filtered out");
                true
            }
            Verdict::HardStop => {
                info!(id = %id, character = %key, "Below level bound on a level-sorted roster, stopping");
                return Ok(false);
            }
        };

        self.entries.push(Some(RosterEntry {
            key,
            path,
            ascension,
            fields,
            skill_levels: Vec::new(),
            traces: BTreeMap::new(),
            skip,
        }));
        Ok(true)
    }

    fn repeats_last(&self, identity: &Option<(String, Path)>) -> bool {
        match (identity, &self.last_key) {
            (Some((key, _)), Some(last)) => key == last,
            _ => false,
        }
    }

    /// Reads `"Path / Name"` and resolves it to a catalog key. With
    /// `record` set, a detected Trailblazer also fixes the preference.
    fn identify(&mut self, id: &str, record: bool) -> Result<Option<(String, Path)>> {
        let image = self.nav.capture(self.roster().name)?;
        let text = self.ctx.parse.extractor.extract(TextField::CharacterName, &image);

        let mut parts = text.split('/').map(str::trim);
        let (Some(path_text), Some(name_text)) = (parts.next(), parts.next()) else {
            warn!(id, text = %text, "Character name unreadable");
            return Ok(None);
        };

        let catalog = &self.ctx.parse.catalog;
        let path_match = catalog.closest(NameTable::Paths, path_text);
        let Some(path) = Path::from_name(&path_match.name).filter(|_| path_match.within(NAME_THRESHOLD)) else {
            warn!(id, text = %path_text, "Path not recognised");
            return Ok(None);
        };

        if let Some(variant) = self.trailblazer_variant()? {
            if record {
                if self.trailblazer_seen {
                    warn!(id, "Parsed more than one Trailblazer, please review the output");
                }
                self.trailblazer_seen = true;
                if !self.ctx.parse.scan.record_trailblazer(variant) {
                    warn!(id, ?variant, "Detected Trailblazer differs from the configured one, keeping the configured one");
                }
            }
            return Ok(Some((format!("Trailblazer{}", path.short_name()), path)));
        }

        let found = catalog.closest(NameTable::Characters, name_text);
        if !found.within(NAME_THRESHOLD) {
            warn!(id, text = %name_text, distance = found.distance, "Character not found in catalog");
            return Ok(None);
        }
        let key = found.name.split('#').next().unwrap_or_default().to_string();
        Ok(Some((key, path)))
    }

    /// Which trailblazer portrait the current character matches, if any.
    fn trailblazer_variant(&self) -> Result<Option<Trailblazer>> {
        let portrait = imageops::grayscale(&self.nav.capture(self.roster().portrait)?);
        let parse = &self.ctx.parse;
        let best = parse
            .icons
            .trailblazers
            .iter()
            .map(|(tb, img)| (*tb, similarity(parse.matcher.as_ref(), &portrait, img)))
            .max_by(|a, b| a.1.total_cmp(&b.1));
        Ok(best.filter(|(_, score)| *score >= PORTRAIT_CONFIDENCE).map(|(tb, _)| tb))
    }

    fn read_ascension(&self) -> Result<u32> {
        let roster = self.roster();
        let mut ascension = 0;
        for i in 0..6 {
            let probe = roster
                .ascension_start
                .offset(roster.ascension_offset_x * i as f32, 0.0);
            let pixel = self.nav.pixel(probe)?;
            if colour_dist2(pixel.0, roster.ascension_colour) > ASCENSION_MAX_DIST2 {
                break;
            }
            ascension += 1;
        }
        Ok(ascension)
    }

    /// Checks that the selected character is the one Details recorded at
    /// this position. A mismatch is re-selected once, then logged, counted
    /// and scanned anyway.
    fn confirm_selected(&mut self, walk: &RosterWalk, expected: &str, tab_button: RelativePoint, settle_ms: u64) -> Result<()> {
        let id = RecordKind::Character.synthetic_id(walk.index + 1);
        let differs = |read: &Option<(String, Path)>| matches!(read, Some((key, _)) if key != expected);

        let read = self.identify(&id, false)?;
        if !differs(&read) {
            return Ok(());
        }
        warn!(id = %id, expected, read = ?read.map(|(key, _)| key), "Selected character differs from the Details pass, selecting again");
        if let Some(point) = walk.select {
            self.nav.click_at(point)?;
            self.nav.settle(100);
        }
        self.nav.click_at(tab_button)?;
        self.nav.settle(settle_ms);

        let read = self.identify(&id, false)?;
        if differs(&read) {
            error!(id = %id, expected, read = ?read.map(|(key, _)| key), "Unresolved character mismatch, scanning anyway");
            self.unresolved_duplicates += 1;
        }
        Ok(())
    }

    /// Key of the entry at `index` when it is still to be scanned.
    fn pending_key(&self, index: usize) -> Option<String> {
        match self.entries.get(index) {
            Some(Some(entry)) if !entry.skip => Some(entry.key.clone()),
            _ => None,
        }
    }

    fn scan_traces(&mut self, walk: &RosterWalk) -> Result<()> {
        let roster = self.roster();
        let index = walk.index as usize;
        let Some(key) = self.pending_key(index) else {
            return Ok(());
        };
        let id = RecordKind::Character.synthetic_id(walk.index + 1);

        self.nav.click_at(roster.traces_button)?;
        if self.nav.settle(1000) {
            return Ok(());
        }
        self.confirm_selected(walk, &key, roster.traces_button, 1000)?;
        let Some(Some(entry)) = self.entries.get(index) else {
            return Ok(());
        };
        let path = entry.path;

        let Some(layout) = roster.trace_layout(path) else {
            warn!(id = %id, ?path, "No trace layout for path, traces left empty");
            return Ok(());
        };

        let mut skill_levels = Vec::with_capacity(layout.levels.len());
        for (skill, _) in layout.levels {
            if let Some(rect) = roster.trace_level_rect(path, skill) {
                skill_levels.push((skill, self.nav.capture(rect)?));
            }
        }
        let mut traces = BTreeMap::new();
        for (name, point) in layout.nodes {
            let pixel = self.nav.pixel(*point)?;
            let dist = TRACE_LIT.iter().map(|lit| colour_dist2(pixel.0, *lit)).min().unwrap_or(u32::MAX);
            traces.insert(name.to_string(), dist < TRACE_MAX_DIST2);
        }

        if let Some(Some(entry)) = self.entries.get_mut(index) {
            entry.skill_levels = skill_levels;
            entry.traces = traces;
        }
        Ok(())
    }

    fn scan_eidolons(&mut self, walk: &RosterWalk) -> Result<()> {
        let roster = self.roster();
        let index = walk.index as usize;
        let Some(key) = self.pending_key(index) else {
            return Ok(());
        };

        self.nav.click_at(roster.eidolons_button)?;
        if self.nav.settle(1500) {
            return Ok(());
        }
        self.confirm_selected(walk, &key, roster.eidolons_button, 1500)?;
        let mut eidolons = Vec::with_capacity(roster.eidolons.len());
        for i in 0..roster.eidolons.len() {
            if let Some(rect) = roster.eidolon_rect(i) {
                eidolons.push(self.nav.capture(rect)?);
            }
        }

        let Some(Some(entry)) = self.entries.get_mut(index).map(Option::take) else {
            return Ok(());
        };
        let bundle = CharacterBundle {
            key: entry.key,
            path: entry.path,
            ascension: entry.ascension,
            fields: entry.fields,
            skill_levels: entry.skill_levels,
            traces: entry.traces,
            eidolons,
        };
        let seq = index as u32 + 1;
        let parser = self.parser.clone();
        self.tasks.spawn(seq, move || parser.parse(bundle, seq));
        Ok(())
    }
}
