//! Light cone and relic inventory pass.
//!
//! ```text
//! OpenTab -> ReadQuantity -> EnsureSortOrder -> Walk (one item per step) -> Close -> Done
//! ```
//!
//! The walk clicks through the item grid row by row, drag-scrolling one
//! page at a time. The last page is aligned to the bottom rows so the cursor
//! never lands on an empty slot.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::config::{ItemFilter, ScanMode};
use super::filter::{FilterBounds, Verdict, optimal_sort, verdict};
use super::nav::Navigator;
use super::retry::{FixedDelay, RetryStrategy};
use super::tasks::ScanTaskSet;
use super::{LoopContext, PassOutput};
use crate::capture::crop_region;
use crate::error::{Result, ScanError};
use crate::input::Key;
use crate::layout::{InventoryLayout, RelativePoint, SortKey};
use crate::model::ItemKind;
use crate::ocr::TextField;
use crate::parser::{FieldBundle, LightConeParser, RecordParser, RelicParser, leading_number};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InventoryState {
    OpenTab,
    ReadQuantity,
    EnsureSortOrder,
    Walk,
    Close,
    Done,
}

/// Position of the virtual cursor on the current page.
#[derive(Clone, Copy, Debug, PartialEq)]
struct GridCursor {
    row: u32,
    col: u32,
    point: RelativePoint,
}

impl GridCursor {
    /// Next slot on the page, or `None` once the page is exhausted.
    fn advance(self, inv: &InventoryLayout) -> Option<GridCursor> {
        if self.col + 1 < inv.cols {
            return Some(GridCursor {
                col: self.col + 1,
                point: self.point.offset(inv.offset_x, 0.0),
                ..self
            });
        }
        if self.row + 1 < inv.rows {
            return Some(GridCursor {
                row: self.row + 1,
                col: 0,
                point: RelativePoint::new(inv.row_start_top.x, self.point.y + inv.offset_y),
            });
        }
        None
    }
}

/// First slot of a page.
///
/// When the remaining items fit on one page of a multi-page list, the page
/// is scrolled to the bottom, so counting starts from the bottom rows.
fn page_start(inv: &InventoryLayout, quantity: u32, remaining: u32) -> GridCursor {
    let per_page = inv.per_page();
    let point = if remaining <= per_page && quantity > per_page {
        let rows_left = remaining.div_ceil(inv.cols);
        inv.row_start_bottom
            .offset(0.0, -(rows_left.saturating_sub(1) as f32) * inv.offset_y)
    } else {
        inv.row_start_top
    };
    GridCursor { row: 0, col: 0, point }
}

pub struct InventoryScanLoop<'n, 'a> {
    kind: ItemKind,
    nav: &'n mut Navigator<'a>,
    ctx: &'n LoopContext,
    parser: Arc<dyn RecordParser<Input = FieldBundle>>,
    state: InventoryState,
    tasks: ScanTaskSet,
    opened: bool,
    quantity: u32,
    remaining: u32,
    sort: Option<SortKey>,
    cursor: Option<GridCursor>,
    seq: u32,
    skipped: u32,
    /// Fatal read failure, returned once the menus are closed.
    failure: Option<ScanError>,
}

impl<'n, 'a> InventoryScanLoop<'n, 'a> {
    pub fn new(kind: ItemKind, nav: &'n mut Navigator<'a>, ctx: &'n LoopContext) -> Self {
        let parser: Arc<dyn RecordParser<Input = FieldBundle>> = match kind {
            ItemKind::LightCone => Arc::new(LightConeParser::new(ctx.parse.clone())),
            ItemKind::Relic => Arc::new(RelicParser::new(ctx.parse.clone())),
        };
        Self {
            kind,
            nav,
            ctx,
            parser,
            state: InventoryState::OpenTab,
            tasks: ScanTaskSet::new(kind.record_kind(), ctx.progress.clone()),
            opened: false,
            quantity: 0,
            remaining: 0,
            sort: None,
            cursor: None,
            seq: 0,
            skipped: 0,
            failure: None,
        }
    }

    pub fn state(&self) -> InventoryState {
        self.state
    }

    fn layout(&self) -> &'static InventoryLayout {
        self.ctx.layout.inventory(self.kind)
    }

    fn filter(&self) -> ItemFilter {
        match self.kind {
            ItemKind::LightCone => self.ctx.config.filters.light_cone,
            ItemKind::Relic => self.ctx.config.filters.relic,
        }
    }

    fn recent_only(&self) -> bool {
        self.kind == ItemKind::Relic && self.ctx.config.mode == ScanMode::RecentRelics
    }

    fn bounds(&self) -> FilterBounds {
        let mut bounds = FilterBounds::from(self.filter());
        if self.recent_only() && self.ctx.config.recent_relics_five_star {
            bounds.min_rarity = bounds.min_rarity.map(|r| r.max(5));
        }
        bounds
    }

    fn inventory_key(&self) -> Result<Key> {
        self.ctx
            .hotkeys
            .inventory
            .ok_or(ScanError::HotkeyUnset("inventory"))
    }

    /// Runs the pass to completion. The task set is returned even when the
    /// pass fails so already-spawned tasks can still be joined.
    pub fn run(mut self) -> PassOutput {
        let result = loop {
            match self.step() {
                Ok(true) => continue,
                Ok(false) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        info!(
            kind = %self.kind.record_kind(),
            queued = self.tasks.len(),
            skipped = self.skipped,
            "Inventory pass finished"
        );
        PassOutput {
            tasks: self.tasks,
            unresolved_duplicates: 0,
            result,
        }
    }

    /// Advances the state machine by one step. Returns `false` when done.
    pub fn step(&mut self) -> Result<bool> {
        if self.nav.cancelled() && !matches!(self.state, InventoryState::Close | InventoryState::Done) {
            info!("Scan interrupted, closing inventory");
            self.state = if self.opened {
                InventoryState::Close
            } else {
                InventoryState::Done
            };
        }

        match self.state {
            InventoryState::OpenTab => {
                self.open_tab()?;
                self.state = InventoryState::ReadQuantity;
            }
            InventoryState::ReadQuantity => {
                match self.read_quantity() {
                    Ok(Some(quantity)) => {
                        self.quantity = if self.recent_only() {
                            quantity.min(self.ctx.config.recent_relics_num)
                        } else {
                            quantity
                        };
                        self.remaining = self.quantity;
                        info!(kind = %self.kind.record_kind(), quantity, scanning = self.quantity, "Quantity read");
                        self.state = InventoryState::EnsureSortOrder;
                    }
                    Ok(None) => self.state = InventoryState::Close,
                    Err(e) => {
                        self.failure = Some(e);
                        self.state = InventoryState::Close;
                    }
                }
            }
            InventoryState::EnsureSortOrder => {
                self.ensure_sort_order()?;
                self.state = InventoryState::Walk;
            }
            InventoryState::Walk => {
                if self.remaining == 0 {
                    self.state = InventoryState::Close;
                } else {
                    self.scan_next_item()?;
                }
            }
            InventoryState::Close => {
                self.nav.settle(1000);
                self.nav.key(Key::Escape)?;
                self.nav.settle(1500);
                self.nav.key(Key::Escape)?;
                self.state = InventoryState::Done;
            }
            InventoryState::Done => {
                return match self.failure.take() {
                    Some(e) => Err(e),
                    None => Ok(false),
                };
            }
        }
        Ok(true)
    }

    fn open_tab(&mut self) -> Result<()> {
        let key = self.inventory_key()?;
        let tab = self.layout().tab;
        self.nav.settle(1000);
        self.nav.key(Key::Escape)?;
        self.nav.settle(1000);
        self.nav.key(key)?;
        self.opened = true;
        self.nav.settle(1000);
        self.nav.click_at(tab)?;
        self.nav.settle(1000);
        Ok(())
    }

    /// Reads the item counter. Zero is treated as a misread. Returns `None`
    /// if the scan was cancelled while retrying.
    fn read_quantity(&mut self) -> Result<Option<u32>> {
        let key = self.inventory_key()?;
        let tab = self.layout().tab;
        let rect = self.ctx.layout.quantity;
        let cancel = self.nav.token().clone();
        let strategy = FixedDelay::new(self.ctx.config.quantity_retries, self.nav.delay(500));
        let ctx = self.ctx;
        let nav = &mut *self.nav;

        let result = strategy.execute(&cancel, |attempt| {
            if attempt > 0 {
                warn!(attempt, "Quantity unreadable, reopening the inventory");
                reopen(nav, key, tab).map_err(|e| e.to_string())?;
            }
            let image = nav.capture(rect).map_err(|e| e.to_string())?;
            let text = ctx.parse.extractor.extract(TextField::Quantity, &image);
            match leading_number(&text) {
                Some(n) if n > 0 => Ok(n),
                _ => Err(text),
            }
        });

        match result {
            Ok(quantity) => Ok(Some(quantity)),
            Err(_) if cancel.is_cancelled() => Ok(None),
            Err(last) => Err(ScanError::QuantityUnreadable {
                what: "quantity",
                last,
            }),
        }
    }

    fn read_sort(&self) -> Result<Option<SortKey>> {
        let image = self.nav.capture(self.layout().sort_label)?;
        let text = self.ctx.parse.extractor.extract(TextField::SortLabel, &image);
        let sort = SortKey::from_label(&text);
        if sort.is_none() {
            debug!(text = %text, "Sort label not recognised");
        }
        Ok(sort)
    }

    fn ensure_sort_order(&mut self) -> Result<()> {
        let target = optimal_sort(self.kind, self.filter(), self.ctx.config.mode);
        let current = self.read_sort()?;
        if current == Some(target) {
            self.sort = Some(target);
            return Ok(());
        }

        info!(?current, ?target, "Changing sort order");
        let inv = self.layout();
        self.nav.click_at(inv.sort_button)?;
        self.nav.settle(500);
        self.nav.click_at(inv.sort_option(target))?;
        self.nav.settle(500);

        // Without a confirmed order a failed bound can only skip, never stop.
        self.sort = match self.read_sort()? {
            Some(sort) if sort == target => Some(target),
            other => {
                warn!(read = ?other, ?target, "Sort order not confirmed, hard stop disabled");
                None
            }
        };
        Ok(())
    }

    fn scan_next_item(&mut self) -> Result<()> {
        let inv = self.layout();
        let cursor = self
            .cursor
            .unwrap_or_else(|| page_start(inv, self.quantity, self.remaining));

        self.nav.click_at(cursor.point)?;
        if self.nav.settle_capture(200) {
            return Ok(());
        }
        self.remaining -= 1;
        self.seq += 1;
        let seq = self.seq;

        let panel = self.nav.capture(self.ctx.layout.item_panel)?;
        let mut fields = FieldBundle::new();
        for (field, rect) in inv.fields {
            fields.insert_image(*field, crop_region(&panel, rect));
        }

        let kind = self.kind.record_kind();
        let report = self.ctx.filter.check(kind, &mut fields, self.bounds(), seq);
        match verdict(&report, self.sort, true) {
            Verdict::Parse => {
                let parser = self.parser.clone();
                self.tasks.spawn(seq, move || parser.parse(fields, seq));
            }
            Verdict::Skip => {
                debug!(id = %kind.synthetic_id(seq), "Filtered out");
                self.skipped += 1;
            }
            Verdict::HardStop => {
                info!(id = %kind.synthetic_id(seq), sort = ?self.sort, "Filter bound reached on sorted list, stopping");
                self.remaining = 0;
                return Ok(());
            }
        }

        self.cursor = cursor.advance(inv);
        if self.cursor.is_none() && self.remaining > 0 {
            let x = inv.row_start_top.x;
            self.nav.drag(
                RelativePoint::new(x, inv.scroll_start_y),
                RelativePoint::new(x, inv.scroll_end_y),
            )?;
            self.nav.settle(500);
        }
        Ok(())
    }
}

fn reopen(nav: &mut Navigator<'_>, key: Key, tab: RelativePoint) -> Result<()> {
    nav.key(Key::Escape)?;
    nav.settle(1000);
    nav.key(key)?;
    nav.settle(1000);
    nav.click_at(tab)?;
    nav.settle(1000);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LAYOUT_16_9;
    use crate::scanner::config::ScanConfig;
    use crate::scanner::testing::{Harness, InputCall};

    #[test]
    fn test_page_start_aligns_last_page() {
        let inv = &LAYOUT_16_9.relic;
        assert_eq!(page_start(inv, 30, 30).point, inv.row_start_top);
        assert_eq!(page_start(inv, 100, 100).point, inv.row_start_top);

        // 20 left of 100: three rows, starting two rows above the bottom one.
        let start = page_start(inv, 100, 20).point;
        assert!((start.y - (inv.row_start_bottom.y - 2.0 * inv.offset_y)).abs() < 1e-6);
        assert_eq!(start.x, inv.row_start_bottom.x);
    }

    #[test]
    fn test_cursor_walks_rows_then_ends_page() {
        let inv = &LAYOUT_16_9.light_cone;
        let mut cursor = Some(page_start(inv, 100, 100));
        let mut visited = 0;
        while let Some(c) = cursor {
            visited += 1;
            cursor = c.advance(inv);
        }
        assert_eq!(visited, inv.per_page());

        let second = page_start(inv, 100, 100).advance(inv).unwrap();
        assert!((second.point.x - (inv.row_start_top.x + inv.offset_x)).abs() < 1e-6);
    }

    #[test]
    fn test_quantity_bounds_the_walk() {
        let harness = Harness::new();
        harness.ocr.answer(TextField::Quantity, "45/120");
        harness.ocr.answer(TextField::SortLabel, "Rarity");
        harness.ocr.answer(TextField::ItemName, "Void");

        let ctx = harness.loop_context(ScanConfig::default());
        let mut input = harness.game.clone();
        let mut nav = harness.navigator(&mut input);
        let PassOutput { tasks, result, .. } = InventoryScanLoop::new(ItemKind::LightCone, &mut nav, &ctx).run();
        result.unwrap();

        assert_eq!(tasks.len(), 45);
        assert_eq!(tasks.sequences().first(), Some(&1));
        assert_eq!(tasks.sequences().last(), Some(&45));
        // One page of 45 items, no scrolling.
        assert_eq!(harness.game.count(|c| matches!(c, InputCall::Drag(..))), 0);
        let joined = tasks.join();
        assert_eq!(joined.records.len(), 45);
        assert_eq!(joined.failed, 0);
    }

    #[test]
    fn test_multi_page_walk_scrolls() {
        let harness = Harness::new();
        harness.ocr.answer(TextField::Quantity, "100/1500");
        harness.ocr.answer(TextField::SortLabel, "Rarity");

        let ctx = harness.loop_context(ScanConfig::default());
        let mut input = harness.game.clone();
        let mut nav = harness.navigator(&mut input);
        let PassOutput { tasks, result, .. } = InventoryScanLoop::new(ItemKind::Relic, &mut nav, &ctx).run();
        result.unwrap();

        assert_eq!(tasks.len(), 100);
        assert_eq!(harness.game.count(|c| matches!(c, InputCall::Drag(..))), 2);
        tasks.join();
    }

    #[test]
    fn test_zero_quantity_is_retried() {
        let harness = Harness::new();
        harness.ocr.queue(TextField::Quantity, &["0/120", "0/120", "3/120"]);
        harness.ocr.answer(TextField::SortLabel, "Rarity");

        let ctx = harness.loop_context(ScanConfig::default());
        let mut input = harness.game.clone();
        let mut nav = harness.navigator(&mut input);
        let PassOutput { tasks, result, .. } = InventoryScanLoop::new(ItemKind::LightCone, &mut nav, &ctx).run();
        result.unwrap();
        assert_eq!(tasks.len(), 3);
        tasks.join();

        // Opened once, then reopened before each of the two retries.
        let tab = LAYOUT_16_9.light_cone.tab;
        let open = [
            InputCall::Key(Key::Escape),
            InputCall::Key(Key::Char('b')),
            InputCall::Move(tab),
            InputCall::Click,
        ];
        let calls = harness.game.calls();
        assert_eq!(calls.windows(open.len()).filter(|w| *w == open).count(), 3);
        assert_eq!(harness.ocr.calls_for(TextField::Quantity), 3);
    }

    #[test]
    fn test_unreadable_quantity_is_fatal_after_retries() {
        let harness = Harness::new();
        harness.ocr.answer(TextField::Quantity, "4a");

        let ctx = harness.loop_context(ScanConfig::default());
        let mut input = harness.game.clone();
        let mut nav = harness.navigator(&mut input);
        let PassOutput { tasks, result, .. } = InventoryScanLoop::new(ItemKind::LightCone, &mut nav, &ctx).run();

        assert!(matches!(
            result,
            Err(ScanError::QuantityUnreadable { what: "quantity", .. })
        ));
        assert!(tasks.is_empty());
        // Three attempts, both passes through the filtered image each time.
        assert_eq!(harness.ocr.calls_for(TextField::Quantity), 6);
        let calls = harness.game.calls();
        assert_eq!(calls[calls.len() - 2..], [InputCall::Key(Key::Escape), InputCall::Key(Key::Escape)]);
    }

    #[test]
    fn test_hard_stop_on_sorted_level() {
        let harness = Harness::new();
        harness.ocr.answer(TextField::Quantity, "30/30");
        harness.ocr.answer(TextField::SortLabel, "Lv");
        harness
            .ocr
            .queue(TextField::RelicLevel, &["15", "12", "9", "3"]);

        let mut config = ScanConfig::default();
        config.filters.relic.min_level = 9;
        let ctx = harness.loop_context(config);
        let mut input = harness.game.clone();
        let mut nav = harness.navigator(&mut input);
        let PassOutput { tasks, result, .. } = InventoryScanLoop::new(ItemKind::Relic, &mut nav, &ctx).run();
        result.unwrap();

        assert_eq!(tasks.sequences(), vec![1, 2, 3]);
        // Four item clicks, no re-sort clicks.
        assert_eq!(harness.game.count(|c| matches!(c, InputCall::Click)), 1 + 4);
        tasks.join();
    }

    #[test]
    fn test_unsorted_failures_are_skipped() {
        let harness = Harness::new();
        harness.ocr.answer(TextField::Quantity, "4/4");
        // Sort stays unrecognised even after re-sorting.
        harness.ocr.answer(TextField::SortLabel, "???");
        harness.ocr.queue(TextField::RelicLevel, &["3", "12", "0", "15"]);

        let mut config = ScanConfig::default();
        config.filters.relic.min_level = 9;
        let ctx = harness.loop_context(config);
        let mut input = harness.game.clone();
        let mut nav = harness.navigator(&mut input);
        let PassOutput { tasks, result, .. } = InventoryScanLoop::new(ItemKind::Relic, &mut nav, &ctx).run();
        result.unwrap();
        assert_eq!(tasks.sequences(), vec![2, 4]);
        tasks.join();
    }

    #[test]
    fn test_recent_relics_limit_and_five_star_filter() {
        let harness = Harness::new();
        harness.ocr.answer(TextField::Quantity, "200/1500");
        harness.ocr.answer(TextField::SortLabel, "Date obtained");

        let config = ScanConfig {
            mode: ScanMode::RecentRelics,
            recent_relics_num: 5,
            ..Default::default()
        };
        let ctx = harness.loop_context(config);
        let mut input = harness.game.clone();
        let mut nav = harness.navigator(&mut input);
        let PassOutput { tasks, result, .. } = InventoryScanLoop::new(ItemKind::Relic, &mut nav, &ctx).run();
        result.unwrap();

        // Blank canvas reads as a low-rarity strip: all five visited, none kept.
        assert!(tasks.is_empty());
        assert_eq!(harness.game.count(|c| matches!(c, InputCall::Click)), 1 + 5);
    }

    #[test]
    fn test_cancellation_stops_pointer_input() {
        let harness = Harness::new();
        harness.ocr.answer(TextField::Quantity, "45/120");
        harness.ocr.answer(TextField::SortLabel, "Rarity");
        // Tab click plus ten item clicks.
        harness.game.cancel_after_clicks(11, harness.cancel.clone());

        let ctx = harness.loop_context(ScanConfig::default());
        let mut input = harness.game.clone();
        let mut nav = harness.navigator(&mut input);
        let PassOutput { tasks, result, .. } = InventoryScanLoop::new(ItemKind::LightCone, &mut nav, &ctx).run();
        result.unwrap();

        let calls = harness.game.calls();
        let last_click = calls.iter().rposition(|c| *c == InputCall::Click).unwrap();
        assert!(
            calls[last_click + 1..]
                .iter()
                .all(|c| matches!(c, InputCall::Key(_))),
            "pointer input after cancellation: {:?}",
            &calls[last_click + 1..]
        );
        assert_eq!(harness.game.count(|c| matches!(c, InputCall::Click)), 11);
        // The tenth item was clicked but never captured.
        assert_eq!(tasks.sequences(), (1..=9).collect::<Vec<_>>());
        assert!(calls.ends_with(&[InputCall::Key(Key::Escape), InputCall::Key(Key::Escape)]));
        tasks.join();
    }
}
