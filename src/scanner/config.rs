//! Scan settings.
//!
//! Loaded from config.json next to the executable. Every field has a
//! default, so a partial or missing file still yields a usable config.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ScanError;
use crate::input::Key;
use crate::model::Trailblazer;

/// Thresholds for one inventory kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFilter {
    pub min_level: u32,
    pub min_rarity: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterFilter {
    pub min_level: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    pub light_cone: ItemFilter,
    pub relic: ItemFilter,
    pub character: CharacterFilter,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            light_cone: ItemFilter {
                min_level: 1,
                min_rarity: 3,
            },
            relic: ItemFilter {
                min_level: 0,
                min_rarity: 2,
            },
            character: CharacterFilter { min_level: 1 },
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanMode {
    #[default]
    Normal,
    /// Only the most recently obtained relics.
    RecentRelics,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub scan_light_cones: bool,
    pub scan_relics: bool,
    pub scan_characters: bool,
    pub filters: Filters,
    /// In-game key that opens the inventory.
    pub inventory_key: String,
    /// In-game key that opens the character screen.
    pub characters_key: String,
    /// Function key that interrupts a running scan.
    pub interrupt_hotkey: String,
    /// Added to every navigation settle delay (milliseconds)
    pub nav_delay_ms: u64,
    /// Added to the delay before an item panel is captured (milliseconds)
    pub scan_delay_ms: u64,
    pub mode: ScanMode,
    pub recent_relics_num: u32,
    pub recent_relics_five_star: bool,
    pub include_uid: bool,
    pub debug: bool,
    /// Trailblazer variant from a previous scan.
    pub trailblazer: Option<Trailblazer>,
    /// Attempts for quantity and character count reads.
    pub quantity_retries: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scan_light_cones: true,
            scan_relics: true,
            scan_characters: true,
            filters: Filters::default(),
            inventory_key: "b".to_string(),
            characters_key: "c".to_string(),
            interrupt_hotkey: "F8".to_string(),
            nav_delay_ms: 0,
            scan_delay_ms: 0,
            mode: ScanMode::Normal,
            recent_relics_num: 8,
            recent_relics_five_star: true,
            include_uid: true,
            debug: false,
            trailblazer: None,
            quantity_retries: 3,
        }
    }
}

/// Parsed in-game hotkeys. `None` for screens the scan will not open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hotkeys {
    pub inventory: Option<Key>,
    pub characters: Option<Key>,
}

impl ScanConfig {
    pub fn scans_inventory(&self) -> bool {
        self.scan_light_cones || self.scan_relics
    }

    /// Checks the preconditions that must hold before any navigation.
    pub fn validate(&self) -> std::result::Result<Hotkeys, ScanError> {
        if !self.scan_light_cones && !self.scan_relics && !self.scan_characters {
            return Err(ScanError::NoScanOptions);
        }

        let parse = |value: &str, what: &'static str| {
            Key::from_config(value).map_err(|_| ScanError::HotkeyUnset(what))
        };
        let inventory = if self.scans_inventory() {
            Some(parse(&self.inventory_key, "inventory")?)
        } else {
            None
        };
        let characters = if self.scan_characters {
            Some(parse(&self.characters_key, "characters")?)
        } else {
            None
        };

        Ok(Hotkeys {
            inventory,
            characters,
        })
    }

    pub fn nav_delay(&self) -> Duration {
        Duration::from_millis(self.nav_delay_ms)
    }

    pub fn scan_delay(&self) -> Duration {
        Duration::from_millis(self.scan_delay_ms)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// Reads `path`, falling back to defaults when the file is missing or
/// malformed.
pub fn load_config(path: &Path) -> ScanConfig {
    info!("Looking for config at: {}", path.display());

    if !path.exists() {
        info!("config.json not found, using defaults");
        return ScanConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                info!("Config loaded from config.json");
                config
            }
            Err(e) => {
                warn!("Failed to parse config.json: {}. Using defaults.", e);
                ScanConfig::default()
            }
        },
        Err(e) => {
            warn!("Failed to read config.json: {}. Using defaults.", e);
            ScanConfig::default()
        }
    }
}
