//! Scripted stand-ins for the game window.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use image::{Rgba, RgbaImage};

use super::config::ScanConfig;
use super::filter::FilterEvaluator;
use super::nav::{Navigator, Timing};
use super::orchestrator::ScanEnv;
use super::progress::LogProgress;
use super::{CancellationToken, LoopContext, ScanContext};
use crate::capture::CaptureProvider;
use crate::catalog::JsonCatalog;
use crate::input::{InputDriver, Key};
use crate::layout::{LAYOUT_16_9, RelativePoint};
use crate::ocr::FieldExtractor;
use crate::parser::ParseContext;
use crate::parser::fixtures::{FixedMatcher, ScriptedOcr, game_data, icons};

#[derive(Clone, Debug, PartialEq)]
pub enum InputCall {
    Focus,
    Move(RelativePoint),
    Click,
    Key(Key),
    Drag(RelativePoint, RelativePoint),
}

struct GameState {
    size: (u32, u32),
    canvas: RgbaImage,
    calls: Vec<InputCall>,
    clicks: usize,
    cancel_after: Option<(usize, CancellationToken)>,
}

/// Records input and serves a fixed canvas as the window contents.
#[derive(Clone)]
pub struct FakeGame {
    state: Arc<Mutex<GameState>>,
}

impl FakeGame {
    /// `width` x `height` is the reported client size. Captures come from a
    /// half-size black canvas, which is enough for relative crops.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(GameState {
                size: (width, height),
                canvas: RgbaImage::from_pixel(width / 2, height / 2, Rgba([0, 0, 0, 255])),
                calls: Vec::new(),
                clicks: 0,
                cancel_after: None,
            })),
        }
    }

    pub fn calls(&self) -> Vec<InputCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&InputCall) -> bool) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| pred(c)).count()
    }

    /// Sets `token` once the `n`-th click has gone through.
    pub fn cancel_after_clicks(&self, n: usize, token: CancellationToken) {
        self.state.lock().unwrap().cancel_after = Some((n, token));
    }

    fn record(&self, call: InputCall) {
        let mut state = self.state.lock().unwrap();
        if call == InputCall::Click {
            state.clicks += 1;
            if let Some((n, token)) = &state.cancel_after
                && state.clicks >= *n
            {
                token.cancel();
            }
        }
        state.calls.push(call);
    }
}

impl InputDriver for FakeGame {
    fn focus(&mut self) -> Result<()> {
        self.record(InputCall::Focus);
        Ok(())
    }

    fn move_cursor(&mut self, point: RelativePoint) -> Result<()> {
        self.record(InputCall::Move(point));
        Ok(())
    }

    fn click(&mut self) -> Result<()> {
        self.record(InputCall::Click);
        Ok(())
    }

    fn key_tap(&mut self, key: Key) -> Result<()> {
        self.record(InputCall::Key(key));
        Ok(())
    }

    fn drag_scroll(&mut self, from: RelativePoint, to: RelativePoint) -> Result<()> {
        self.record(InputCall::Drag(from, to));
        Ok(())
    }
}

impl CaptureProvider for FakeGame {
    fn window_size(&self) -> Result<(u32, u32)> {
        Ok(self.state.lock().unwrap().size)
    }

    fn capture_window(&self) -> Result<RgbaImage> {
        Ok(self.state.lock().unwrap().canvas.clone())
    }
}

/// A fake game, scripted OCR and the token that interrupts them.
pub struct Harness {
    pub game: FakeGame,
    pub ocr: Arc<ScriptedOcr>,
    pub cancel: CancellationToken,
    match_score: f32,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_match_score(0.0)
    }

    /// Every template comparison scores `score`.
    pub fn with_match_score(score: f32) -> Self {
        Self {
            game: FakeGame::new(1920, 1080),
            ocr: ScriptedOcr::new(),
            cancel: CancellationToken::new(),
            match_score: score,
        }
    }

    fn parse_context(&self, config: &ScanConfig) -> ParseContext {
        ParseContext {
            extractor: FieldExtractor::new(self.ocr.clone()),
            catalog: Arc::new(JsonCatalog::from_data(game_data())),
            icons: Arc::new(icons()),
            matcher: Arc::new(FixedMatcher(self.match_score)),
            cancel: self.cancel.clone(),
            scan: Arc::new(ScanContext::new(config.trailblazer)),
        }
    }

    pub fn loop_context(&self, config: ScanConfig) -> LoopContext {
        let parse = self.parse_context(&config);
        LoopContext {
            hotkeys: config.validate().unwrap(),
            layout: &LAYOUT_16_9,
            filter: FilterEvaluator::new(parse.extractor.clone(), parse.catalog.clone()),
            parse,
            progress: Arc::new(LogProgress),
            config,
        }
    }

    pub fn navigator<'a>(&'a self, input: &'a mut FakeGame) -> Navigator<'a> {
        Navigator::new(input, &self.game, Timing::instant(), self.cancel.clone())
    }

    pub fn env<'a>(&'a self, input: &'a mut FakeGame) -> ScanEnv<'a> {
        let parse = self.parse_context(&ScanConfig::default());
        ScanEnv {
            input,
            capture: &self.game,
            ocr: self.ocr.clone(),
            catalog: parse.catalog,
            icons: parse.icons,
            matcher: parse.matcher,
            progress: Arc::new(LogProgress),
            cancel: self.cancel.clone(),
            timing: Timing::instant(),
        }
    }
}
