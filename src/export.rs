//! Writes a finished scan to disk as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::model::ScanResult;

/// File name for a scan finished at `finished_at`:
/// `HSRScanData_YYYYMMDD_HHMMSS.json`.
pub fn output_file_name(result: &ScanResult) -> String {
    format!(
        "HSRScanData_{}.json",
        result.metadata.finished_at.format("%Y%m%d_%H%M%S")
    )
}

/// Serializes `result` into `dir`, creating the directory if needed.
/// Returns the written path.
pub fn write_scan_result(result: &ScanResult, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let path = dir.join(output_file_name(result));
    let json = serde_json::to_string_pretty(result).context("Failed to serialize scan result")?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), "Scan result saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LightCone, ParsedRecord};
    use chrono::{Local, TimeZone};
    use tempfile::TempDir;

    #[test]
    fn test_write_scan_result() {
        let finished = Local.with_ymd_and_hms(2024, 5, 1, 13, 4, 5).unwrap();
        let mut result = ScanResult::new(finished);
        result.metadata.uid = Some("800123456".to_string());
        result.push(ParsedRecord::LightCone(LightCone {
            key: "Arrows".to_string(),
            level: 20,
            ascension: 1,
            superimposition: 5,
            location: "Seele".to_string(),
            lock: true,
            id: "light_cone_1".to_string(),
        }));
        result.refresh_counts();

        let dir = TempDir::new().unwrap();
        let out = dir.path().join("output");
        let path = write_scan_result(&result, &out).unwrap();
        assert_eq!(path.file_name().unwrap(), "HSRScanData_20240501_130405.json");

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["source"], "HSR_Scanner");
        assert_eq!(json["metadata"]["uid"], "800123456");
        assert_eq!(json["metadata"]["counts"]["light_cones"], 1);
        assert_eq!(json["light_cones"][0]["key"], "Arrows");
        assert_eq!(json["light_cones"][0]["_id"], "light_cone_1");
    }
}
