use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use super::tables::{RELIC_MAIN_STATS, RELIC_SUB_STATS};
use super::{NameTable, ReferenceCatalog, RelicMeta, RollTable};
use crate::model::{self, Skill, SkillLevels};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LightConeMeta {
    pub rarity: u8,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CharacterMeta {
    /// Skill levels granted at E3, keyed `basic`, `skill`, `ult`, `talent`.
    #[serde(default)]
    pub e3: BTreeMap<String, i32>,
    #[serde(default)]
    pub e5: BTreeMap<String, i32>,
}

/// On-disk layout of `game_data.json`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GameData {
    pub version: Option<String>,
    pub light_cones: BTreeMap<String, LightConeMeta>,
    pub relics: BTreeMap<String, RelicMeta>,
    pub characters: BTreeMap<String, CharacterMeta>,
    /// Keyed by rarity as a string (`"5"`).
    pub substat_rolls: BTreeMap<String, RollTable>,
}

/// Catalog backed by a bundled JSON file.
pub struct JsonCatalog {
    data: GameData,
    light_cones: Vec<String>,
    relics: Vec<String>,
    characters: Vec<String>,
    paths: Vec<String>,
    main_stats: Vec<String>,
    substats: Vec<String>,
}

impl JsonCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open game data: {}", path.display()))?;
        let data: GameData = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse game data: {}", path.display()))?;

        info!(
            version = data.version.as_deref().unwrap_or("unknown"),
            light_cones = data.light_cones.len(),
            relics = data.relics.len(),
            characters = data.characters.len(),
            "Game data loaded"
        );
        if data.substat_rolls.is_empty() {
            warn!("Game data has no substat roll tables, roll validation is disabled");
        }

        Ok(Self::from_data(data))
    }

    pub fn from_data(data: GameData) -> Self {
        let to_strings = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            light_cones: data.light_cones.keys().cloned().collect(),
            relics: data.relics.keys().cloned().collect(),
            characters: data.characters.keys().cloned().collect(),
            paths: model::Path::ALL.iter().map(|p| p.name().to_string()).collect(),
            main_stats: to_strings(RELIC_MAIN_STATS),
            substats: to_strings(RELIC_SUB_STATS),
            data,
        }
    }

    fn character(&self, name: &str) -> Option<&CharacterMeta> {
        self.data.characters.get(name).or_else(|| {
            self.data
                .characters
                .iter()
                .find(|(key, _)| key.split('#').next() == Some(name))
                .map(|(_, meta)| meta)
        })
    }
}

fn skill_levels(levels: &BTreeMap<String, i32>) -> SkillLevels {
    let mut out = SkillLevels::default();
    for skill in Skill::ALL {
        let key = match skill {
            Skill::Basic => "basic",
            Skill::Skill => "skill",
            Skill::Ult => "ult",
            Skill::Talent => "talent",
        };
        *out.get_mut(skill) = levels.get(key).copied().unwrap_or(0);
    }
    out
}

impl ReferenceCatalog for JsonCatalog {
    fn names(&self, table: NameTable) -> &[String] {
        match table {
            NameTable::LightCones => &self.light_cones,
            NameTable::Relics => &self.relics,
            NameTable::Characters => &self.characters,
            NameTable::Paths => &self.paths,
            NameTable::MainStats => &self.main_stats,
            NameTable::Substats => &self.substats,
        }
    }

    fn light_cone_rarity(&self, name: &str) -> Option<u8> {
        self.data.light_cones.get(name).map(|m| m.rarity)
    }

    fn relic_meta(&self, name: &str) -> Option<&RelicMeta> {
        self.data.relics.get(name)
    }

    fn eidolon_bonus(&self, character: &str, tier: u32) -> Option<SkillLevels> {
        let meta = self.character(character)?;
        match tier {
            3 => Some(skill_levels(&meta.e3)),
            5 => Some(skill_levels(&meta.e5)),
            _ => None,
        }
    }

    fn substat_rolls(&self, rarity: u8) -> Option<&RollTable> {
        self.data.substat_rolls.get(&rarity.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"{
        "version": "2.0",
        "light_cones": { "Void": { "rarity": 3 }, "Night on the Milky Way": { "rarity": 5 } },
        "relics": { "Musketeer's Wild Wheat Felt Hat": { "set": "Musketeer of Wild Wheat", "slot": "Head" } },
        "characters": {
            "Seele": { "e3": { "skill": 2, "talent": 2 }, "e5": { "basic": 1, "ult": 2 } },
            "TrailblazerDestruction": {}
        },
        "substat_rolls": { "5": { "SPD": { "2": 1, "4": [1, 2] } } }
    }"#;

    fn catalog() -> JsonCatalog {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        JsonCatalog::load(file.path()).unwrap()
    }

    #[test]
    fn test_load_and_lookup() {
        let catalog = catalog();
        assert_eq!(catalog.light_cone_rarity("Night on the Milky Way"), Some(5));
        assert_eq!(catalog.light_cone_rarity("Nope"), None);
        assert_eq!(
            catalog.relic_meta("Musketeer's Wild Wheat Felt Hat").unwrap().slot,
            "Head"
        );
        assert_eq!(catalog.names(NameTable::Paths).len(), model::Path::ALL.len());
        assert!(catalog.substat_rolls(5).unwrap()["SPD"].contains_key("4"));
        assert!(catalog.substat_rolls(4).is_none());
    }

    #[test]
    fn test_eidolon_bonus() {
        let catalog = catalog();
        let e3 = catalog.eidolon_bonus("Seele", 3).unwrap();
        assert_eq!((e3.basic, e3.skill, e3.ult, e3.talent), (0, 2, 0, 2));
        let e5 = catalog.eidolon_bonus("Seele", 5).unwrap();
        assert_eq!((e5.basic, e5.skill, e5.ult, e5.talent), (1, 0, 2, 0));
        assert!(catalog.eidolon_bonus("Seele", 4).is_none());
        assert!(catalog.eidolon_bonus("Nobody", 3).is_none());
    }

    #[test]
    fn test_fuzzy_lookup_through_trait() {
        let catalog = catalog();
        let m = catalog.closest(NameTable::LightCones, "Vold");
        assert_eq!(m.name, "Void");
        assert_eq!(m.distance, 1);
        assert_eq!(catalog.closest(NameTable::Substats, "CRIT Rat").name, "CRIT Rate");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(JsonCatalog::load(Path::new("/definitely/missing/game_data.json")).is_err());
    }
}
