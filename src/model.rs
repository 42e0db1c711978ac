//! Typed records produced by a scan.
//!
//! Records carry a synthetic `_id` of the form `"{kind}_{sequence}"`. The
//! game exposes no natural identifier, so the sequence number assigned at
//! capture time is what ties log lines to output entries.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize, Serializer};

/// The three kinds of entity a scan can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    LightCone,
    Relic,
    Character,
}

impl RecordKind {
    /// Prefix used in synthetic ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            RecordKind::LightCone => "light_cone",
            RecordKind::Relic => "relic",
            RecordKind::Character => "character",
        }
    }

    /// Builds the synthetic id for the given capture sequence number.
    pub fn synthetic_id(&self, sequence: u32) -> String {
        format!("{}_{}", self.id_prefix(), sequence)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::LightCone => write!(f, "Light Cone"),
            RecordKind::Relic => write!(f, "Relic"),
            RecordKind::Character => write!(f, "Character"),
        }
    }
}

/// Inventory tabs that are scanned with the grid loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    LightCone,
    Relic,
}

impl ItemKind {
    pub fn record_kind(&self) -> RecordKind {
        match self {
            ItemKind::LightCone => RecordKind::LightCone,
            ItemKind::Relic => RecordKind::Relic,
        }
    }
}

/// Character paths. Each path has its own trace tree layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Path {
    Hunt,
    Erudition,
    Harmony,
    Preservation,
    Destruction,
    Nihility,
    Abundance,
    Remembrance,
}

impl Path {
    pub const ALL: [Path; 8] = [
        Path::Hunt,
        Path::Erudition,
        Path::Harmony,
        Path::Preservation,
        Path::Destruction,
        Path::Nihility,
        Path::Abundance,
        Path::Remembrance,
    ];

    /// Display name as rendered in game.
    pub fn name(&self) -> &'static str {
        match self {
            Path::Hunt => "The Hunt",
            Path::Erudition => "Erudition",
            Path::Harmony => "Harmony",
            Path::Preservation => "Preservation",
            Path::Destruction => "Destruction",
            Path::Nihility => "Nihility",
            Path::Abundance => "Abundance",
            Path::Remembrance => "Remembrance",
        }
    }

    pub fn from_name(name: &str) -> Option<Path> {
        Path::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Last word of the display name, used to build trailblazer keys
    /// (`TrailblazerHunt`, `TrailblazerDestruction`, ...).
    pub fn short_name(&self) -> &'static str {
        self.name().rsplit(' ').next().unwrap_or_default()
    }
}

/// The four upgradable abilities of a character.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Basic,
    Skill,
    Ult,
    Talent,
}

impl Skill {
    pub const ALL: [Skill; 4] = [Skill::Basic, Skill::Skill, Skill::Ult, Skill::Talent];

    /// Highest reachable level before eidolon bonuses.
    pub fn max_level(&self) -> i32 {
        match self {
            Skill::Basic => 6,
            _ => 10,
        }
    }
}

/// Protagonist variant. The two are indistinguishable by name text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trailblazer {
    Caelus,
    Stelle,
}

impl Trailblazer {
    /// Suffix used by catalog avatar keys (`TrailblazerDestruction#M`).
    pub fn avatar_suffix(&self) -> &'static str {
        match self {
            Trailblazer::Caelus => "#M",
            Trailblazer::Stelle => "#F",
        }
    }

    pub fn other(&self) -> Trailblazer {
        match self {
            Trailblazer::Caelus => Trailblazer::Stelle,
            Trailblazer::Stelle => Trailblazer::Caelus,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LightCone {
    pub key: String,
    pub level: u32,
    pub ascension: u32,
    pub superimposition: u32,
    pub location: String,
    pub lock: bool,
    #[serde(rename = "_id")]
    pub id: String,
}

/// Substat value. Percentage stats carry a trailing `_` on their key.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SubstatValue {
    Flat(u32),
    Percent(f32),
}

impl SubstatValue {
    pub fn as_f32(&self) -> f32 {
        match *self {
            SubstatValue::Flat(v) => v as f32,
            SubstatValue::Percent(v) => v,
        }
    }
}

impl Serialize for SubstatValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            SubstatValue::Flat(v) => serializer.serialize_u32(v),
            SubstatValue::Percent(v) => serializer.serialize_f32(v),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Substat {
    pub key: String,
    pub value: SubstatValue,
}

impl Substat {
    /// Marker suffix distinguishing `CRIT Rate_` from a flat stat.
    pub const PERCENT_MARKER: char = '_';

    pub fn is_percent(&self) -> bool {
        self.key.ends_with(Self::PERCENT_MARKER)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Relic {
    pub set: String,
    pub name: String,
    pub slot: String,
    pub rarity: u8,
    pub level: u32,
    pub mainstat: String,
    pub substats: Vec<Substat>,
    pub location: String,
    pub lock: bool,
    pub discard: bool,
    #[serde(rename = "_id")]
    pub id: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SkillLevels {
    pub basic: i32,
    pub skill: i32,
    pub ult: i32,
    pub talent: i32,
}

impl SkillLevels {
    pub fn get(&self, skill: Skill) -> i32 {
        match skill {
            Skill::Basic => self.basic,
            Skill::Skill => self.skill,
            Skill::Ult => self.ult,
            Skill::Talent => self.talent,
        }
    }

    pub fn get_mut(&mut self, skill: Skill) -> &mut i32 {
        match skill {
            Skill::Basic => &mut self.basic,
            Skill::Skill => &mut self.skill,
            Skill::Ult => &mut self.ult,
            Skill::Talent => &mut self.talent,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Character {
    pub key: String,
    pub path: String,
    pub level: u32,
    pub ascension: u32,
    pub eidolon: u32,
    pub skills: SkillLevels,
    pub traces: BTreeMap<String, bool>,
    #[serde(rename = "_id")]
    pub id: String,
}

/// Output of one parse task.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedRecord {
    LightCone(LightCone),
    Relic(Relic),
    Character(Character),
}

impl ParsedRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            ParsedRecord::LightCone(_) => RecordKind::LightCone,
            ParsedRecord::Relic(_) => RecordKind::Relic,
            ParsedRecord::Character(_) => RecordKind::Character,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ParsedRecord::LightCone(r) => &r.id,
            ParsedRecord::Relic(r) => &r.id,
            ParsedRecord::Character(r) => &r.id,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ScanCounts {
    pub light_cones: usize,
    pub relics: usize,
    pub characters: usize,
    /// Parse tasks that panicked and were dropped at join time.
    pub failed_tasks: usize,
    /// Roster entries read twice in a row even after re-selection.
    pub unresolved_duplicates: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScanMetadata {
    pub uid: Option<String>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub counts: ScanCounts,
    pub trailblazer: Option<Trailblazer>,
}

/// Aggregated scan output.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScanResult {
    pub source: &'static str,
    pub version: u32,
    pub metadata: ScanMetadata,
    pub light_cones: Vec<LightCone>,
    pub relics: Vec<Relic>,
    pub characters: Vec<Character>,
}

impl ScanResult {
    pub const SOURCE: &'static str = "HSR_Scanner";

    pub fn new(started_at: DateTime<Local>) -> Self {
        Self {
            source: Self::SOURCE,
            version: 1,
            metadata: ScanMetadata {
                uid: None,
                started_at,
                finished_at: started_at,
                counts: ScanCounts::default(),
                trailblazer: None,
            },
            light_cones: Vec::new(),
            relics: Vec::new(),
            characters: Vec::new(),
        }
    }

    /// Files one joined record into its list.
    pub fn push(&mut self, record: ParsedRecord) {
        match record {
            ParsedRecord::LightCone(r) => self.light_cones.push(r),
            ParsedRecord::Relic(r) => self.relics.push(r),
            ParsedRecord::Character(r) => self.characters.push(r),
        }
    }

    pub fn refresh_counts(&mut self) {
        self.metadata.counts.light_cones = self.light_cones.len();
        self.metadata.counts.relics = self.relics.len();
        self.metadata.counts.characters = self.characters.len();
    }
}
