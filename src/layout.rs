//! Percentage-based screen layout tables.
//!
//! Every coordinate is a fraction of the game window's client area so the
//! tables hold for any resolution of a supported aspect ratio. Item panel
//! fields are fractions of the item panel capture instead.

use serde::{Deserialize, Serialize};

use crate::model::{ItemKind, Path, Skill};

/// Aspect ratios the tables below were measured for.
pub const SUPPORTED_ASPECT_RATIOS: &[&str] = &["16:9"];

/// A rectangle in relative coordinates (0.0 to 1.0).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    /// X position of top-left corner (0.0 = left edge, 1.0 = right edge)
    pub x: f32,
    /// Y position of top-left corner (0.0 = top edge, 1.0 = bottom edge)
    pub y: f32,
    /// Width as fraction of the parent width
    pub width: f32,
    /// Height as fraction of the parent height
    pub height: f32,
}

impl RelativeRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a rect from corner coordinates `(x1, y1, x2, y2)`.
    pub const fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    pub fn center(&self) -> RelativePoint {
        RelativePoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// A point in relative coordinates, used for click targets and pixel probes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelativePoint {
    pub x: f32,
    pub y: f32,
}

impl RelativePoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Reduces a client size to its aspect ratio string, e.g. `1920x1080 -> "16:9"`.
pub fn aspect_ratio(width: u32, height: u32) -> String {
    fn gcd(mut a: u32, mut b: u32) -> u32 {
        while b != 0 {
            (a, b) = (b, a % b);
        }
        a
    }

    let divisor = gcd(width, height).max(1);
    format!("{}:{}", width / divisor, height / divisor)
}

pub fn is_supported_aspect_ratio(ratio: &str) -> bool {
    SUPPORTED_ASPECT_RATIOS.contains(&ratio)
}

/// Logical item panel fields, cropped out of one panel capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Name,
    Level,
    Superimposition,
    Rarity,
    Lock,
    Discard,
    Equipped,
    EquippedAvatar,
    MainStat,
    SubstatNames,
    SubstatValues,
}

/// Sort orders offered by the inventory sort menu.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortKey {
    Level,
    Rarity,
    DateObtained,
}

impl SortKey {
    /// Label shown on the sort button, as OCR'd with [`SortKey::LABEL_WHITELIST`].
    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Level => "Lv",
            SortKey::Rarity => "Rarity",
            SortKey::DateObtained => "Date obtained",
        }
    }

    pub const LABEL_WHITELIST: &'static str = "RarityLvDate obtained";

    /// Matches an OCR'd sort label. Unrecognised text yields `None`.
    pub fn from_label(text: &str) -> Option<SortKey> {
        let text = text.trim();
        [SortKey::Level, SortKey::Rarity, SortKey::DateObtained]
            .into_iter()
            .find(|k| k.label().eq_ignore_ascii_case(text))
    }
}

/// Layout of one inventory tab (light cones or relics).
#[derive(Clone, Copy, Debug)]
pub struct InventoryLayout {
    pub tab: RelativePoint,
    pub sort_button: RelativePoint,
    pub sort_level: RelativePoint,
    pub sort_rarity: RelativePoint,
    pub sort_date: RelativePoint,
    pub sort_label: RelativeRect,
    pub row_start_top: RelativePoint,
    pub row_start_bottom: RelativePoint,
    pub offset_x: f32,
    pub offset_y: f32,
    pub rows: u32,
    pub cols: u32,
    pub scroll_start_y: f32,
    pub scroll_end_y: f32,
    /// Panel fields as fractions of [`ScreenLayout::item_panel`].
    pub fields: &'static [(Field, RelativeRect)],
}

impl InventoryLayout {
    pub fn sort_option(&self, key: SortKey) -> RelativePoint {
        match key {
            SortKey::Level => self.sort_level,
            SortKey::Rarity => self.sort_rarity,
            SortKey::DateObtained => self.sort_date,
        }
    }

    pub fn field(&self, field: Field) -> Option<RelativeRect> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, rect)| *rect)
    }

    pub fn per_page(&self) -> u32 {
        self.rows * self.cols
    }
}

/// Trace tree coordinates for one path.
#[derive(Clone, Copy, Debug)]
pub struct TraceLayout {
    pub path: Path,
    /// Top-left of each skill level label.
    pub levels: [(Skill, RelativePoint); 4],
    /// Probe points for unlockable trace nodes.
    pub nodes: &'static [(&'static str, RelativePoint)],
}

/// Layout of the character screens and the data bank.
#[derive(Clone, Copy, Debug)]
pub struct RosterLayout {
    pub count: RelativeRect,
    /// Databank icon size relative to the window, used to scale the template.
    pub databank_icon: (f32, f32),
    pub name: RelativeRect,
    pub level: RelativeRect,
    pub portrait: RelativeRect,
    pub sort_label: RelativeRect,
    pub details_button: RelativePoint,
    pub traces_button: RelativePoint,
    pub eidolons_button: RelativePoint,
    pub char_start: RelativePoint,
    /// Last visible slot, used when the whole roster fits on one page.
    pub char_end: RelativePoint,
    pub offset_x: f32,
    pub per_page: u32,
    pub ascension_start: RelativePoint,
    pub ascension_offset_x: f32,
    /// Colour of a lit ascension star.
    pub ascension_colour: [u8; 3],
    pub trace_level_size: (f32, f32),
    pub traces: &'static [TraceLayout],
    pub eidolons: [RelativePoint; 6],
    pub eidolon_size: (f32, f32),
}

impl RosterLayout {
    pub fn trace_layout(&self, path: Path) -> Option<&'static TraceLayout> {
        self.traces.iter().find(|t| t.path == path)
    }

    pub fn trace_level_rect(&self, path: Path, skill: Skill) -> Option<RelativeRect> {
        let layout = self.trace_layout(path)?;
        let (_, point) = layout.levels.iter().find(|(s, _)| *s == skill)?;
        Some(RelativeRect::new(
            point.x,
            point.y,
            self.trace_level_size.0,
            self.trace_level_size.1,
        ))
    }

    pub fn eidolon_rect(&self, index: usize) -> Option<RelativeRect> {
        self.eidolons.get(index).map(|p| {
            RelativeRect::new(p.x, p.y, self.eidolon_size.0, self.eidolon_size.1)
        })
    }

    pub fn slot(&self, index: u32) -> RelativePoint {
        self.char_start.offset(self.offset_x * index as f32, 0.0)
    }
}

/// Full coordinate map for one aspect ratio.
#[derive(Clone, Copy, Debug)]
pub struct ScreenLayout {
    pub aspect_ratio: &'static str,
    pub uid: RelativeRect,
    pub quantity: RelativeRect,
    pub item_panel: RelativeRect,
    pub light_cone: InventoryLayout,
    pub relic: InventoryLayout,
    pub roster: RosterLayout,
}

impl ScreenLayout {
    pub fn inventory(&self, kind: ItemKind) -> &InventoryLayout {
        match kind {
            ItemKind::LightCone => &self.light_cone,
            ItemKind::Relic => &self.relic,
        }
    }

    /// Looks up the layout for an aspect ratio string.
    pub fn for_aspect_ratio(ratio: &str) -> Option<&'static ScreenLayout> {
        match ratio {
            "16:9" => Some(&LAYOUT_16_9),
            _ => None,
        }
    }
}

const LIGHT_CONE_FIELDS: &[(Field, RelativeRect)] = &[
    (Field::Name, RelativeRect::from_corners(0.0, 0.0, 1.0, 0.09)),
    (Field::Level, RelativeRect::from_corners(0.13, 0.32, 0.35, 0.37)),
    (Field::Superimposition, RelativeRect::from_corners(0.53, 0.48, 0.6, 0.55)),
    (Field::Equipped, RelativeRect::from_corners(0.45, 0.95, 0.68, 1.0)),
    (Field::EquippedAvatar, RelativeRect::from_corners(0.35, 0.94, 0.44, 0.99)),
    (Field::Lock, RelativeRect::from_corners(0.896, 0.321, 0.97, 0.365)),
];

const RELIC_FIELDS: &[(Field, RelativeRect)] = &[
    (Field::Name, RelativeRect::from_corners(0.0, 0.0, 1.0, 0.09)),
    (Field::Rarity, RelativeRect::from_corners(0.07, 0.15, 0.2, 0.22)),
    (Field::Level, RelativeRect::from_corners(0.115, 0.255, 0.23, 0.3)),
    (Field::Lock, RelativeRect::from_corners(0.865, 0.253, 0.935, 0.293)),
    (Field::Discard, RelativeRect::from_corners(0.935, 0.253, 1.0, 0.293)),
    (Field::MainStat, RelativeRect::from_corners(0.115, 0.358, 0.7, 0.4)),
    (Field::SubstatNames, RelativeRect::from_corners(0.115, 0.41, 0.77, 0.595)),
    (Field::SubstatValues, RelativeRect::from_corners(0.77, 0.41, 1.0, 0.595)),
    (Field::Equipped, RelativeRect::from_corners(0.45, 0.95, 0.68, 1.0)),
    (Field::EquippedAvatar, RelativeRect::from_corners(0.35, 0.94, 0.44, 0.99)),
];

const fn p(x: f32, y: f32) -> RelativePoint {
    RelativePoint::new(x, y)
}

// Node probes are stored (y, x) in the measurement tables; `node` swaps them
// and moves to the centre of the 0.011 x 0.023 node icon.
const fn node(name: &'static str, y: f32, x: f32) -> (&'static str, RelativePoint) {
    (name, RelativePoint::new(x + 0.0115, y + 0.0055))
}

const fn levels(basic: (f32, f32), skill: (f32, f32), ult: (f32, f32), talent: (f32, f32)) -> [(Skill, RelativePoint); 4] {
    [
        (Skill::Basic, p(basic.1, basic.0)),
        (Skill::Skill, p(skill.1, skill.0)),
        (Skill::Ult, p(ult.1, ult.0)),
        (Skill::Talent, p(talent.1, talent.0)),
    ]
}

const HUNT_NODES: &[(&str, RelativePoint)] = &[
    node("ability_1", 0.647, 0.53),
    node("ability_2", 0.647, 0.692),
    node("ability_3", 0.278, 0.611),
    node("stat_1", 0.797, 0.605),
    node("stat_2", 0.572, 0.468),
    node("stat_3", 0.479, 0.413),
    node("stat_4", 0.354, 0.469),
    node("stat_5", 0.574, 0.741),
    node("stat_6", 0.479, 0.797),
    node("stat_7", 0.355, 0.74),
    node("stat_8", 0.20, 0.605),
    node("stat_9", 0.227, 0.517),
    node("stat_10", 0.227, 0.693),
];

const ERUDITION_NODES: &[(&str, RelativePoint)] = &[
    node("ability_1", 0.504, 0.479),
    node("ability_2", 0.504, 0.742),
    node("ability_3", 0.185, 0.61),
    node("stat_1", 0.726, 0.533),
    node("stat_2", 0.523, 0.417),
    node("stat_3", 0.412, 0.433),
    node("stat_4", 0.635, 0.433),
    node("stat_5", 0.523, 0.791),
    node("stat_6", 0.413, 0.777),
    node("stat_7", 0.635, 0.777),
    node("stat_8", 0.23, 0.515),
    node("stat_9", 0.23, 0.695),
    node("stat_10", 0.726, 0.676),
];

const HARMONY_NODES: &[(&str, RelativePoint)] = &[
    node("ability_1", 0.526, 0.442),
    node("ability_2", 0.526, 0.78),
    node("ability_3", 0.298, 0.61),
    node("stat_1", 0.798, 0.605),
    node("stat_2", 0.452, 0.398),
    node("stat_3", 0.389, 0.461),
    node("stat_4", 0.771, 0.525),
    node("stat_5", 0.656, 0.741),
    node("stat_6", 0.618, 0.682),
    node("stat_7", 0.771, 0.684),
    node("stat_8", 0.203, 0.605),
    node("stat_9", 0.231, 0.52),
    node("stat_10", 0.231, 0.69),
];

const PRESERVATION_NODES: &[(&str, RelativePoint)] = &[
    node("ability_1", 0.762, 0.526),
    node("ability_2", 0.762, 0.695),
    node("ability_3", 0.281, 0.611),
    node("stat_1", 0.776, 0.605),
    node("stat_2", 0.639, 0.451),
    node("stat_3", 0.529, 0.398),
    node("stat_4", 0.422, 0.467),
    node("stat_5", 0.639, 0.758),
    node("stat_6", 0.528, 0.811),
    node("stat_7", 0.422, 0.743),
    node("stat_8", 0.208, 0.605),
    node("stat_9", 0.231, 0.515),
    node("stat_10", 0.231, 0.694),
];

const DESTRUCTION_NODES: &[(&str, RelativePoint)] = &[
    node("ability_1", 0.664, 0.520),
    node("ability_2", 0.664, 0.703),
    node("ability_3", 0.281, 0.610),
    node("stat_1", 0.788, 0.604),
    node("stat_2", 0.612, 0.454),
    node("stat_3", 0.523, 0.402),
    node("stat_4", 0.396, 0.452),
    node("stat_5", 0.612, 0.755),
    node("stat_6", 0.524, 0.807),
    node("stat_7", 0.396, 0.757),
    node("stat_8", 0.209, 0.605),
    node("stat_9", 0.232, 0.515),
    node("stat_10", 0.232, 0.694),
];

const NIHILITY_NODES: &[(&str, RelativePoint)] = &[
    node("ability_1", 0.388, 0.465),
    node("ability_2", 0.388, 0.757),
    node("ability_3", 0.19, 0.611),
    node("stat_1", 0.68, 0.604),
    node("stat_2", 0.524, 0.401),
    node("stat_3", 0.638, 0.449),
    node("stat_4", 0.748, 0.502),
    node("stat_5", 0.524, 0.808),
    node("stat_6", 0.638, 0.760),
    node("stat_7", 0.748, 0.707),
    node("stat_8", 0.231, 0.515),
    node("stat_9", 0.231, 0.694),
    node("stat_10", 0.787, 0.604),
];

const ABUNDANCE_NODES: &[(&str, RelativePoint)] = &[
    node("ability_1", 0.685, 0.722),
    node("ability_2", 0.685, 0.501),
    node("ability_3", 0.183, 0.611),
    node("stat_1", 0.782, 0.644),
    node("stat_2", 0.597, 0.763),
    node("stat_3", 0.507, 0.792),
    node("stat_4", 0.415, 0.736),
    node("stat_5", 0.595, 0.446),
    node("stat_6", 0.507, 0.417),
    node("stat_7", 0.414, 0.473),
    node("stat_8", 0.238, 0.517),
    node("stat_9", 0.231, 0.694),
    node("stat_10", 0.782, 0.564),
];

const TRACES_16_9: &[TraceLayout] = &[
    TraceLayout {
        path: Path::Hunt,
        levels: levels((0.5352, 0.505), (0.5352, 0.655), (0.599, 0.578), (0.462, 0.578)),
        nodes: HUNT_NODES,
    },
    TraceLayout {
        path: Path::Erudition,
        levels: levels((0.588, 0.528), (0.588, 0.673), (0.588, 0.601), (0.438, 0.601)),
        nodes: ERUDITION_NODES,
    },
    TraceLayout {
        path: Path::Harmony,
        levels: levels((0.548, 0.528), (0.548, 0.673), (0.644, 0.601), (0.522, 0.601)),
        nodes: HARMONY_NODES,
    },
    TraceLayout {
        path: Path::Preservation,
        levels: levels((0.606, 0.527), (0.606, 0.677), (0.588, 0.602), (0.461, 0.602)),
        nodes: PRESERVATION_NODES,
    },
    TraceLayout {
        path: Path::Destruction,
        levels: levels((0.569, 0.516), (0.569, 0.689), (0.588, 0.602), (0.461, 0.602)),
        nodes: DESTRUCTION_NODES,
    },
    TraceLayout {
        path: Path::Nihility,
        levels: levels((0.517, 0.521), (0.517, 0.683), (0.501, 0.602), (0.387, 0.602)),
        nodes: NIHILITY_NODES,
    },
    TraceLayout {
        path: Path::Abundance,
        levels: levels((0.566, 0.53), (0.566, 0.674), (0.592, 0.602), (0.462, 0.602)),
        nodes: ABUNDANCE_NODES,
    },
];

pub static LAYOUT_16_9: ScreenLayout = ScreenLayout {
    aspect_ratio: "16:9",
    uid: RelativeRect::new(0.06, 0.965, 0.09, 0.03),
    quantity: RelativeRect::new(0.46, 0.89, 0.13, 0.06),
    item_panel: RelativeRect::new(0.72, 0.09, 0.25, 0.78),
    light_cone: InventoryLayout {
        tab: p(0.38, 0.06),
        sort_button: p(0.12, 0.91),
        sort_level: p(0.12, 0.49),
        sort_rarity: p(0.12, 0.42),
        sort_date: p(0.12, 0.84),
        sort_label: RelativeRect::new(0.079, 0.9, 0.07, 0.033),
        row_start_top: p(0.096, 0.162),
        row_start_bottom: p(0.1, 0.77),
        offset_x: 0.065,
        offset_y: 0.13796,
        rows: 5,
        cols: 9,
        scroll_start_y: 0.77,
        scroll_end_y: 0.085,
        fields: LIGHT_CONE_FIELDS,
    },
    relic: InventoryLayout {
        tab: p(0.43, 0.06),
        sort_button: p(0.12, 0.91),
        sort_level: p(0.12, 0.77),
        sort_rarity: p(0.12, 0.7),
        sort_date: p(0.12, 0.84),
        sort_label: RelativeRect::new(0.079, 0.935, 0.07, 0.033),
        row_start_top: p(0.096875, 0.23),
        row_start_bottom: p(0.096875, 0.776),
        offset_x: 0.065,
        offset_y: 0.13796,
        rows: 5,
        cols: 9,
        scroll_start_y: 0.776,
        scroll_end_y: 0.09,
        fields: RELIC_FIELDS,
    },
    roster: RosterLayout {
        count: RelativeRect::new(0.56, 0.555, 0.05, 0.035),
        databank_icon: (0.0296875, 0.05625),
        name: RelativeRect::new(0.0656, 0.059, 0.16, 0.0314),
        level: RelativeRect::new(0.795, 0.216, 0.024, 0.034),
        portrait: RelativeRect::new(0.44, 0.3315, 0.1245, 0.1037),
        sort_label: RelativeRect::new(0.07, 0.93, 0.08, 0.033),
        details_button: p(0.13, 0.143),
        traces_button: p(0.13, 0.315),
        eidolons_button: p(0.13, 0.49),
        char_start: p(0.256, 0.065),
        char_end: p(0.744, 0.066),
        offset_x: 0.055729,
        per_page: 9,
        ascension_start: p(0.78125, 0.203),
        ascension_offset_x: 0.01328,
        ascension_colour: [255, 222, 152],
        trace_level_size: (0.0177, 0.028),
        traces: TRACES_16_9,
        eidolons: [
            p(0.34, 0.198),
            p(0.546, 0.187),
            p(0.793, 0.377),
            p(0.679, 0.826),
            p(0.43, 0.796),
            p(0.197, 0.716),
        ],
        eidolon_size: (0.018, 0.0349),
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio() {
        assert_eq!(aspect_ratio(1920, 1080), "16:9");
        assert_eq!(aspect_ratio(2560, 1440), "16:9");
        assert_eq!(aspect_ratio(1920, 1200), "8:5");
        assert!(is_supported_aspect_ratio("16:9"));
        assert!(!is_supported_aspect_ratio("8:5"));
    }

    #[test]
    fn test_from_corners() {
        let rect = RelativeRect::from_corners(0.1, 0.2, 0.4, 0.5);
        assert!((rect.width - 0.3).abs() < 1e-6);
        assert!((rect.height - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_sort_key_from_label() {
        assert_eq!(SortKey::from_label("Lv"), Some(SortKey::Level));
        assert_eq!(SortKey::from_label(" Rarity "), Some(SortKey::Rarity));
        assert_eq!(SortKey::from_label("Date obtained"), Some(SortKey::DateObtained));
        assert_eq!(SortKey::from_label("Rarty"), None);
    }

    #[test]
    fn test_layout_lookup() {
        let layout = ScreenLayout::for_aspect_ratio("16:9").unwrap();
        assert_eq!(layout.inventory(ItemKind::Relic).per_page(), 45);
        assert!(layout.inventory(ItemKind::Relic).field(Field::Discard).is_some());
        assert!(layout.inventory(ItemKind::LightCone).field(Field::Discard).is_none());
        assert!(ScreenLayout::for_aspect_ratio("21:9").is_none());
    }

    #[test]
    fn test_trace_layout_per_path() {
        let roster = &LAYOUT_16_9.roster;
        for path in Path::ALL {
            let expected = path != Path::Remembrance;
            assert_eq!(roster.trace_layout(path).is_some(), expected, "{:?}", path);
        }
        let rect = roster.trace_level_rect(Path::Hunt, Skill::Basic).unwrap();
        assert!((rect.x - 0.505).abs() < 1e-6);
        assert!((rect.y - 0.5352).abs() < 1e-6);
    }
}
