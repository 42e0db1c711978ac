//! Top-level scan sequencing.

use std::sync::Arc;

use chrono::Local;
use tracing::{error, info, warn};

use super::filter::FilterEvaluator;
use super::inventory::InventoryScanLoop;
use super::nav::{Navigator, Timing};
use super::progress::ProgressSink;
use super::roster::RosterScanLoop;
use super::tasks::ScanTaskSet;
use super::{CancellationToken, LoopContext, ScanConfig, ScanContext};
use crate::capture::CaptureProvider;
use crate::catalog::{IconSet, ReferenceCatalog};
use crate::error::ScanError;
use crate::input::InputDriver;
use crate::layout::{SUPPORTED_ASPECT_RATIOS, ScreenLayout, aspect_ratio};
use crate::model::{ItemKind, ScanResult};
use crate::ocr::{FieldExtractor, OcrEngine, TextField};
use crate::parser::ParseContext;
use crate::vision::TemplateMatcher;

/// Collaborators a scan runs against.
pub struct ScanEnv<'a> {
    pub input: &'a mut dyn InputDriver,
    pub capture: &'a dyn CaptureProvider,
    pub ocr: Arc<dyn OcrEngine>,
    pub catalog: Arc<dyn ReferenceCatalog>,
    pub icons: Arc<IconSet>,
    pub matcher: Arc<dyn TemplateMatcher>,
    pub progress: Arc<dyn ProgressSink>,
    pub cancel: CancellationToken,
    pub timing: Timing,
}

/// How a scan ended.
#[derive(Debug)]
pub enum Outcome {
    Completed(ScanResult),
    /// Cancelled mid-scan. Holds whatever was joined before returning.
    Interrupted(ScanResult),
    Fatal(ScanError),
}

impl Outcome {
    pub fn result(&self) -> Option<&ScanResult> {
        match self {
            Outcome::Completed(r) | Outcome::Interrupted(r) => Some(r),
            Outcome::Fatal(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pass {
    Inventory(ItemKind),
    Roster,
}

fn planned_passes(config: &ScanConfig) -> Vec<Pass> {
    let mut passes = Vec::new();
    if config.scan_light_cones {
        passes.push(Pass::Inventory(ItemKind::LightCone));
    }
    if config.scan_relics {
        passes.push(Pass::Inventory(ItemKind::Relic));
    }
    if config.scan_characters {
        passes.push(Pass::Roster);
    }
    passes
}

/// Resolves the layout for the current window size.
fn check_layout(capture: &dyn CaptureProvider) -> Result<&'static ScreenLayout, ScanError> {
    let (width, height) = capture.window_size().map_err(ScanError::capture)?;
    let ratio = aspect_ratio(width, height);
    ScreenLayout::for_aspect_ratio(&ratio).ok_or(ScanError::UnsupportedAspectRatio {
        found: ratio,
        supported: SUPPORTED_ASPECT_RATIOS,
    })
}

fn read_uid(nav: &Navigator<'_>, ctx: &LoopContext) -> Option<String> {
    let image = match nav.capture(ctx.layout.uid) {
        Ok(image) => image,
        Err(e) => {
            warn!("Failed to capture UID: {}", e);
            return None;
        }
    };
    let text = ctx.parse.extractor.extract(TextField::Uid, &image);
    let uid: String = text.chars().filter(char::is_ascii_digit).collect();
    if uid.is_empty() {
        warn!(text = %text, "UID unreadable");
        return None;
    }
    info!(uid = %uid, "UID read");
    Some(uid)
}

/// Runs a full scan: preconditions, UID, then each selected pass in order,
/// then the join.
///
/// Preconditions are checked before any input reaches the game. Once a pass
/// has started, every spawned task is joined before returning, including on
/// interruption and on a fatal error.
pub fn run_scan(config: &ScanConfig, env: ScanEnv<'_>) -> Outcome {
    let started_at = Local::now();

    let hotkeys = match config.validate() {
        Ok(hotkeys) => hotkeys,
        Err(e) => {
            error!("{}", e);
            return Outcome::Fatal(e);
        }
    };
    let layout = match check_layout(env.capture) {
        Ok(layout) => layout,
        Err(e) => {
            error!("{}", e);
            return Outcome::Fatal(e);
        }
    };

    let cancel = env.cancel;
    let extractor = FieldExtractor::new(env.ocr);
    let parse = ParseContext {
        extractor: extractor.clone(),
        catalog: env.catalog.clone(),
        icons: env.icons,
        matcher: env.matcher,
        cancel: cancel.clone(),
        scan: Arc::new(ScanContext::new(config.trailblazer)),
    };
    let ctx = LoopContext {
        config: config.clone(),
        hotkeys,
        layout,
        filter: FilterEvaluator::new(extractor, env.catalog),
        parse,
        progress: env.progress,
    };
    let mut nav = Navigator::new(env.input, env.capture, env.timing, cancel.clone());

    if let Err(e) = nav.focus() {
        error!("{}", e);
        return Outcome::Fatal(e);
    }
    info!(aspect_ratio = layout.aspect_ratio, "Starting scan");

    let mut result = ScanResult::new(started_at);
    if config.include_uid
        && let Some(uid) = read_uid(&nav, &ctx)
    {
        ctx.parse.scan.set_uid(uid.clone());
        result.metadata.uid = Some(uid);
    }

    let mut task_sets: Vec<ScanTaskSet> = Vec::new();
    let mut unresolved_duplicates = 0;
    let mut fatal = None;

    for pass in planned_passes(config) {
        if cancel.is_cancelled() {
            break;
        }
        info!(?pass, "Starting pass");
        let out = match pass {
            Pass::Inventory(kind) => InventoryScanLoop::new(kind, &mut nav, &ctx).run(),
            Pass::Roster => RosterScanLoop::new(&mut nav, &ctx).run(),
        };
        unresolved_duplicates += out.unresolved_duplicates;
        task_sets.push(out.tasks);
        if let Err(e) = out.result {
            error!(?pass, "{}", e);
            fatal = Some(e);
            break;
        }
    }

    let pending: usize = task_sets.iter().map(ScanTaskSet::len).sum();
    info!(pending, "Waiting for parse tasks");
    let mut failed = 0;
    for set in task_sets {
        let joined = set.join();
        failed += joined.failed;
        for record in joined.records {
            result.push(record);
        }
    }

    result.metadata.counts.failed_tasks = failed;
    result.metadata.counts.unresolved_duplicates = unresolved_duplicates;
    result.metadata.trailblazer = ctx.parse.scan.trailblazer();
    result.metadata.finished_at = Local::now();
    result.refresh_counts();

    let counts = &result.metadata.counts;
    info!(
        light_cones = counts.light_cones,
        relics = counts.relics,
        characters = counts.characters,
        failed_tasks = counts.failed_tasks,
        "Scan finished"
    );

    if let Some(e) = fatal {
        return Outcome::Fatal(e);
    }
    if cancel.is_cancelled() {
        warn!("Scan interrupted, returning partial result");
        return Outcome::Interrupted(result);
    }
    Outcome::Completed(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::PageSegMode;
    use crate::parser::fixtures::ScriptedOcr;
    use crate::scanner::testing::{FakeGame, Harness, InputCall};
    use image::DynamicImage;

    /// Quantity, character count and trace level reads share a whitelist, so
    /// their answers are queued in read order.
    fn script_full_scan(ocr: &ScriptedOcr) {
        ocr.answer(TextField::Uid, "800123456");
        ocr.queue(TextField::Quantity, &["2/2", "1/1", "1/50"]);
        ocr.answer(TextField::SortLabel, "Rarity");
        ocr.answer(TextField::ItemName, "Void");
        ocr.answer(TextField::LightConeLevel, "1/20");
        ocr.answer(TextField::CharacterName, "The Hunt / Seele");
    }

    #[test]
    fn test_full_scan_completes() {
        let harness = Harness::new();
        script_full_scan(&harness.ocr);

        let mut input = harness.game.clone();
        let outcome = run_scan(&ScanConfig::default(), harness.env(&mut input));

        let Outcome::Completed(result) = outcome else {
            panic!("expected a completed scan, got {outcome:?}");
        };
        assert_eq!(result.metadata.uid.as_deref(), Some("800123456"));
        let ids: Vec<_> = result.light_cones.iter().map(|lc| lc.id.as_str()).collect();
        assert_eq!(ids, vec!["light_cone_1", "light_cone_2"]);
        assert_eq!(result.light_cones[0].key, "Void");
        assert_eq!(result.light_cones[0].level, 1);
        assert_eq!(result.relics.len(), 1);
        assert_eq!(result.characters.len(), 1);
        assert_eq!(result.characters[0].key, "Seele");
        assert_eq!(result.metadata.counts.failed_tasks, 0);
        assert_eq!(harness.game.calls().first(), Some(&InputCall::Focus));
    }

    #[test]
    fn test_preconditions_fail_before_input() {
        let harness = Harness::new();
        let config = ScanConfig {
            scan_light_cones: false,
            scan_relics: false,
            scan_characters: false,
            ..Default::default()
        };
        let mut input = harness.game.clone();
        let outcome = run_scan(&config, harness.env(&mut input));
        assert!(matches!(outcome, Outcome::Fatal(ScanError::NoScanOptions)));

        let config = ScanConfig {
            inventory_key: String::new(),
            ..Default::default()
        };
        let outcome = run_scan(&config, harness.env(&mut input));
        assert!(matches!(outcome, Outcome::Fatal(ScanError::HotkeyUnset("inventory"))));
        assert!(harness.game.calls().is_empty());
    }

    #[test]
    fn test_unsupported_aspect_ratio() {
        let mut harness = Harness::new();
        harness.game = FakeGame::new(1920, 1200);
        let mut input = harness.game.clone();
        let outcome = run_scan(&ScanConfig::default(), harness.env(&mut input));
        match outcome {
            Outcome::Fatal(ScanError::UnsupportedAspectRatio { found, .. }) => assert_eq!(found, "8:5"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(harness.game.calls().is_empty());
    }

    #[test]
    fn test_interrupted_scan_keeps_joined_records() {
        let harness = Harness::new();
        script_full_scan(&harness.ocr);
        // The light cone pass clicks three times; the relic tab click interrupts.
        harness.game.cancel_after_clicks(4, harness.cancel.clone());

        let mut input = harness.game.clone();
        let outcome = run_scan(&ScanConfig::default(), harness.env(&mut input));
        let Outcome::Interrupted(result) = outcome else {
            panic!("expected an interrupted scan, got {outcome:?}");
        };
        assert!(result.light_cones.len() <= 2);
        assert!(result.relics.is_empty());
        assert!(result.characters.is_empty());
    }

    #[test]
    fn test_unresolved_duplicates_are_reported() {
        let harness = Harness::new();
        harness.ocr.answer(TextField::CharacterCount, "2/50");
        harness.ocr.answer(TextField::CharacterName, "The Hunt / Seele");

        let config = ScanConfig {
            scan_light_cones: false,
            scan_relics: false,
            include_uid: false,
            ..Default::default()
        };
        let mut input = harness.game.clone();
        let outcome = run_scan(&config, harness.env(&mut input));
        let Outcome::Completed(result) = outcome else {
            panic!("expected a completed scan, got {outcome:?}");
        };
        assert_eq!(result.metadata.counts.unresolved_duplicates, 1);
        assert_eq!(result.characters.len(), 2);
    }

    #[test]
    fn test_unreadable_quantity_is_fatal_after_join() {
        let harness = Harness::new();
        harness.ocr.queue(TextField::Quantity, &["2/2"]);
        harness.ocr.answer(TextField::Quantity, "4a");
        harness.ocr.answer(TextField::SortLabel, "Rarity");

        let config = ScanConfig {
            include_uid: false,
            ..Default::default()
        };
        let mut input = harness.game.clone();
        let outcome = run_scan(&config, harness.env(&mut input));
        assert!(matches!(
            outcome,
            Outcome::Fatal(ScanError::QuantityUnreadable { what: "quantity", .. })
        ));
    }

    /// Panics on character level reads, which only happen inside parse
    /// tasks once the UID read is off.
    struct PanicOnLevel(Arc<ScriptedOcr>);

    impl OcrEngine for PanicOnLevel {
        fn recognize(&self, image: &DynamicImage, whitelist: &str, psm: PageSegMode) -> anyhow::Result<String> {
            if whitelist == TextField::CharacterLevel.recipe().whitelist {
                panic!("engine crashed");
            }
            self.0.recognize(image, whitelist, psm)
        }
    }

    #[test]
    fn test_panicking_task_degrades_to_missing_record() {
        let harness = Harness::new();
        harness.ocr.answer(TextField::CharacterCount, "2/50");
        harness
            .ocr
            .queue(TextField::CharacterName, &["The Hunt / Seele", "Harmony / Bronya"]);

        let config = ScanConfig {
            scan_light_cones: false,
            scan_relics: false,
            include_uid: false,
            ..Default::default()
        };
        let mut input = harness.game.clone();
        let mut env = harness.env(&mut input);
        env.ocr = Arc::new(PanicOnLevel(harness.ocr.clone()));
        let outcome = run_scan(&config, env);

        let Outcome::Completed(result) = outcome else {
            panic!("expected a completed scan, got {outcome:?}");
        };
        assert!(result.characters.is_empty());
        assert_eq!(result.metadata.counts.failed_tasks, 2);
    }
}
