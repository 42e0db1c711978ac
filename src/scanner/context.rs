use std::sync::OnceLock;

use tracing::{info, warn};

use crate::model::Trailblazer;

/// State discovered during a scan and read by later stages.
///
/// Replaces process-wide mutable flags: the trailblazer variant is written
/// at most once (from configuration or by the roster pass) and read by
/// equipped-by resolution in every parse task.
#[derive(Debug, Default)]
pub struct ScanContext {
    trailblazer: OnceLock<Trailblazer>,
    uid: OnceLock<String>,
}

impl ScanContext {
    pub fn new(preset: Option<Trailblazer>) -> Self {
        let ctx = Self::default();
        if let Some(tb) = preset {
            let _ = ctx.trailblazer.set(tb);
        }
        ctx
    }

    pub fn trailblazer(&self) -> Option<Trailblazer> {
        self.trailblazer.get().copied()
    }

    /// Records the detected trailblazer. Returns `false` if a different
    /// variant was already recorded, which keeps the first one.
    pub fn record_trailblazer(&self, detected: Trailblazer) -> bool {
        match self.trailblazer.get() {
            Some(existing) if *existing != detected => {
                warn!(?existing, ?detected, "Trailblazer variant differs from the recorded one");
                false
            }
            Some(_) => true,
            None => {
                let _ = self.trailblazer.set(detected);
                info!(trailblazer = ?detected, "Trailblazer variant detected");
                true
            }
        }
    }

    pub fn uid(&self) -> Option<&str> {
        self.uid.get().map(String::as_str)
    }

    pub fn set_uid(&self, uid: String) {
        let _ = self.uid.set(uid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailblazer_written_once() {
        let ctx = ScanContext::new(None);
        assert_eq!(ctx.trailblazer(), None);
        assert!(ctx.record_trailblazer(Trailblazer::Stelle));
        assert!(ctx.record_trailblazer(Trailblazer::Stelle));
        assert!(!ctx.record_trailblazer(Trailblazer::Caelus));
        assert_eq!(ctx.trailblazer(), Some(Trailblazer::Stelle));
    }

    #[test]
    fn test_preset_and_uid() {
        let ctx = ScanContext::new(Some(Trailblazer::Caelus));
        assert_eq!(ctx.trailblazer(), Some(Trailblazer::Caelus));
        ctx.set_uid("800123456".to_string());
        ctx.set_uid("1".to_string());
        assert_eq!(ctx.uid(), Some("800123456"));
    }
}
