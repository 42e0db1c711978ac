/// Stats a relic can roll as its main stat.
pub const RELIC_MAIN_STATS: &[&str] = &[
    "SPD",
    "HP",
    "ATK",
    "DEF",
    "Break Effect",
    "Effect Hit Rate",
    "Energy Regeneration Rate",
    "Outgoing Healing Boost",
    "Physical DMG Boost",
    "Fire DMG Boost",
    "Ice DMG Boost",
    "Wind DMG Boost",
    "Lightning DMG Boost",
    "Quantum DMG Boost",
    "Imaginary DMG Boost",
    "CRIT Rate",
    "CRIT DMG",
];

/// Stats a relic can roll as a substat.
pub const RELIC_SUB_STATS: &[&str] = &[
    "SPD",
    "ATK",
    "DEF",
    "HP",
    "Effect Hit Rate",
    "Effect RES",
    "CRIT Rate",
    "CRIT DMG",
    "Break Effect",
];

/// Light cone used when a name cannot be matched.
pub const PLACEHOLDER_LIGHT_CONE: &str = "Void";

/// Relic piece used when a name cannot be matched.
pub const PLACEHOLDER_RELIC: &str = "Unknown Relic";

/// Trailblazer keys whose equipped icon differs between Caelus and Stelle.
pub const GENDERED_TRAILBLAZERS: &[&str] = &["TrailblazerDestruction", "TrailblazerPreservation"];
