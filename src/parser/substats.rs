//! Relic substat parsing and roll validation.

use tracing::{debug, warn};

use crate::catalog::{NameTable, ReferenceCatalog, RollTable};
use crate::model::{Substat, SubstatValue};

/// Substat names further than this from any known stat are dropped.
pub const SUBSTAT_THRESHOLD: usize = 3;

const VALUE_TOLERANCE: f32 = 0.001;

/// Pairs the lines of the two substat columns by position.
///
/// Blank lines are dropped before pairing. Each name is fuzzy-corrected and
/// values containing `%` mark the stat as a percentage one.
pub fn parse_substats(names: &str, values: &str, catalog: &dyn ReferenceCatalog, id: &str) -> Vec<Substat> {
    let names: Vec<&str> = non_blank_lines(names).collect();
    let values: Vec<&str> = non_blank_lines(values).collect();

    let mut out = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let found = catalog.closest(NameTable::Substats, name);
        if !found.within(SUBSTAT_THRESHOLD) {
            debug!(id, text = %name, distance = found.distance, "Substat name rejected");
            continue;
        }

        let Some(raw) = values.get(i) else {
            warn!(id, substat = %found.name, "Substat value missing");
            continue;
        };

        let parsed = match raw.split_once('%') {
            Some((number, _)) => number
                .trim()
                .parse::<f32>()
                .map(|v| (format!("{}{}", found.name, Substat::PERCENT_MARKER), SubstatValue::Percent(v)))
                .ok(),
            None => raw
                .trim()
                .parse::<u32>()
                .map(|v| (found.name.clone(), SubstatValue::Flat(v)))
                .ok(),
        };

        match parsed {
            Some((key, value)) => out.push(Substat { key, value }),
            None => {
                // Fuzzy-matched names usually mean a stray line, only log exact ones.
                if found.distance == 0 {
                    warn!(id, substat = %found.name, value = %raw, "Failed to parse substat value");
                }
            }
        }
    }
    out
}

fn non_blank_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

/// Fewest substats a relic of this rarity and level can have.
pub fn min_substat_count(rarity: u8, level: u32) -> u32 {
    (rarity as i64 - 2 + (level / 3) as i64).clamp(0, 4) as u32
}

/// Expected range of the summed roll weights.
pub fn roll_band(rarity: u8, level: u32) -> (f32, f32) {
    let min_count = min_substat_count(rarity, level) as f32;
    let low = (min_count * 0.8 * 10.0).round() / 10.0;
    let high = rarity as f32 - 1.0 + (level / 3) as f32;
    (low, high)
}

/// Findings from one validation run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationReport {
    pub count: u32,
    pub min_count: u32,
    /// Substat keys whose value is not a possible roll.
    pub illegal: Vec<String>,
    /// `None` when no roll table was available.
    pub roll_sum: Option<f32>,
    pub band: (f32, f32),
}

impl ValidationReport {
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.count < self.min_count {
            issues.push(format!(
                "expected at least {} substats, found {}",
                self.min_count, self.count
            ));
        }
        for key in &self.illegal {
            issues.push(format!("illegal {key} value"));
        }
        if let Some(sum) = self.roll_sum {
            let (low, high) = self.band;
            if sum < low - VALUE_TOLERANCE {
                issues.push(format!("roll sum {sum} below {low}"));
            } else if sum > high + VALUE_TOLERANCE {
                issues.push(format!("roll sum {sum} above {high}"));
            }
        }
        issues
    }

    pub fn is_clean(&self) -> bool {
        self.issues().is_empty()
    }
}

/// Checks substats against the rarity's roll table. Never rejects a relic;
/// the report only feeds the log.
pub struct SubstatValidator<'a> {
    rolls: Option<&'a RollTable>,
}

impl<'a> SubstatValidator<'a> {
    pub fn new(rolls: Option<&'a RollTable>) -> Self {
        Self { rolls }
    }

    /// Roll weight of a value, or `None` if the value cannot be rolled.
    fn weight(&self, key: &str, value: f32) -> Option<f32> {
        let table = self.rolls?.get(key)?;
        table.iter().find_map(|(candidate, weight)| {
            let candidate: f32 = candidate.parse().ok()?;
            ((candidate - value).abs() < VALUE_TOLERANCE).then(|| weight.maxed())
        })
    }

    pub fn check_value(&self, key: &str, value: f32) -> bool {
        self.rolls.is_none() || self.weight(key, value).is_some()
    }

    pub fn validate(&self, substats: &[Substat], rarity: u8, level: u32) -> ValidationReport {
        let mut report = ValidationReport {
            count: substats.len() as u32,
            min_count: min_substat_count(rarity, level),
            band: roll_band(rarity, level),
            ..Default::default()
        };

        let mut sum = 0.0;
        for sub in substats {
            match self.weight(&sub.key, sub.value.as_f32()) {
                Some(w) => sum += w,
                None if self.rolls.is_some() => report.illegal.push(sub.key.clone()),
                None => {}
            }
        }
        if self.rolls.is_some() {
            report.roll_sum = Some(sum);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::JsonCatalog;
    use crate::parser::fixtures::game_data;

    fn catalog() -> JsonCatalog {
        JsonCatalog::from_data(game_data())
    }

    #[test]
    fn test_parse_pairs_lines_and_marks_percent() {
        let catalog = catalog();
        let subs = parse_substats("CRIT Rate\n\nSPD\nATK", "2.9%\n\n4\n19", &catalog, "relic_1");
        assert_eq!(
            subs,
            vec![
                Substat { key: "CRIT Rate_".into(), value: SubstatValue::Percent(2.9) },
                Substat { key: "SPD".into(), value: SubstatValue::Flat(4) },
                Substat { key: "ATK".into(), value: SubstatValue::Flat(19) },
            ]
        );
    }

    #[test]
    fn test_parse_drops_bad_lines() {
        let catalog = catalog();
        // Unknown name, missing value, unparseable value.
        let subs = parse_substats("Banana Split\nSPD\nCRIT DMG", "1\nx\n", &catalog, "relic_2");
        assert!(subs.is_empty());
    }

    #[test]
    fn test_min_count_and_band() {
        assert_eq!(min_substat_count(5, 0), 3);
        assert_eq!(min_substat_count(5, 15), 4);
        assert_eq!(min_substat_count(2, 0), 0);
        assert_eq!(min_substat_count(3, 6), 3);
        assert_eq!(roll_band(5, 0), (2.4, 4.0));
        assert_eq!(roll_band(5, 15), (3.2, 9.0));
    }

    #[test]
    fn test_validate_flags_illegal_values() {
        let data = game_data();
        let validator = SubstatValidator::new(data.substat_rolls.get("5"));
        assert!(validator.check_value("SPD", 2.0));
        assert!(!validator.check_value("SPD", 3.0));
        assert!(validator.check_value("CRIT Rate_", 5.8));

        let subs = vec![
            Substat { key: "SPD".into(), value: SubstatValue::Flat(3) },
            Substat { key: "ATK".into(), value: SubstatValue::Flat(19) },
        ];
        let report = validator.validate(&subs, 5, 0);
        assert_eq!(report.illegal, vec!["SPD".to_string()]);
        assert_eq!(report.roll_sum, Some(1.0));
        assert!(!report.is_clean());
        assert_eq!(report.issues().len(), 3);
    }

    #[test]
    fn test_sets_at_the_documented_bounds_are_clean() {
        let data = game_data();
        let validator = SubstatValidator::new(data.substat_rolls.get("5"));
        // Candidate weights for one substat: ATK 19 -> 1, SPD 4 -> 2 (range, maxed).
        let one = Substat { key: "ATK".into(), value: SubstatValue::Flat(19) };
        let two = Substat { key: "SPD".into(), value: SubstatValue::Flat(4) };

        for level in 0..=15u32 {
            let min_count = min_substat_count(5, level) as usize;
            let (low, high) = roll_band(5, level);

            // Minimum count of single rolls.
            let mut subs = vec![one.clone(); min_count];
            let report = validator.validate(&subs, 5, level);
            assert!(report.roll_sum.unwrap() >= low, "level {level}");
            assert!(report.is_clean(), "level {level}: {:?}", report.issues());

            // Upgrade rolls up to, but not beyond, the upper bound.
            let mut sum = min_count as f32;
            for sub in subs.iter_mut() {
                if sum + 1.0 <= high {
                    *sub = two.clone();
                    sum += 1.0;
                }
            }
            let report = validator.validate(&subs, 5, level);
            assert!(report.is_clean(), "level {level}: {:?}", report.issues());
        }
    }

    #[test]
    fn test_without_roll_table_only_count_is_checked() {
        let validator = SubstatValidator::new(None);
        let report = validator.validate(&[], 4, 3);
        assert_eq!(report.roll_sum, None);
        assert_eq!(report.min_count, 3);
        assert_eq!(report.issues().len(), 1);
        assert!(validator.check_value("anything", 1.0));
    }
}
