use anyhow::{Result, anyhow};
use std::path::PathBuf;

/// Returns the directory for a bundled Tesseract install
pub fn get_tesseract_dir() -> PathBuf {
    crate::paths::get_exe_dir().join("tesseract")
}

/// Returns the per-user fallback directory for Tesseract files
fn get_user_tesseract_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("hsr-scanner").join("tesseract"))
}

fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![get_tesseract_dir()];
    dirs.extend(get_user_tesseract_dir());
    dirs.push(PathBuf::from(r"C:\Program Files\Tesseract-OCR"));
    dirs.push(PathBuf::from(r"C:\Program Files (x86)\Tesseract-OCR"));
    dirs
}

/// Finds the Tesseract executable, checking bundled dirs first, then PATH
pub fn find_tesseract_executable() -> Result<PathBuf> {
    for dir in candidate_dirs() {
        let exe = dir.join("tesseract.exe");
        if exe.exists() {
            return Ok(exe);
        }
    }

    if let Ok(output) = std::process::Command::new("tesseract")
        .arg("--version")
        .output()
    {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    Err(anyhow!(
        "Tesseract not found. Install Tesseract-OCR or copy it to {}",
        get_tesseract_dir().display()
    ))
}

/// Finds the tessdata directory
pub fn find_tessdata_dir() -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = candidate_dirs()
        .into_iter()
        .map(|d| d.join("tessdata"))
        .collect();

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let prefix = PathBuf::from(prefix);
        candidates.push(prefix.join("tessdata"));
        candidates.push(prefix);
    }
    candidates.push(PathBuf::from("/usr/share/tesseract-ocr/5/tessdata"));
    candidates.push(PathBuf::from("/usr/share/tessdata"));

    find_tessdata_in(&candidates).ok_or_else(|| {
        anyhow!("tessdata directory not found. Please ensure traineddata files are available.")
    })
}

fn find_tessdata_in(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|dir| has_traineddata(dir))
        .cloned()
}

fn has_traineddata(dir: &std::path::Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .any(|e| e.path().extension().is_some_and(|ext| ext == "traineddata"))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_tessdata_in_picks_first_with_traineddata() {
        let empty = TempDir::new().unwrap();
        let populated = TempDir::new().unwrap();
        std::fs::write(populated.path().join("DIN-Alternate.traineddata"), b"x").unwrap();

        let found = find_tessdata_in(&[
            empty.path().to_path_buf(),
            populated.path().to_path_buf(),
        ]);
        assert_eq!(found.as_deref(), Some(populated.path()));
    }

    #[test]
    fn test_find_tessdata_in_none() {
        let empty = TempDir::new().unwrap();
        assert!(find_tessdata_in(&[empty.path().to_path_buf()]).is_none());
    }
}
