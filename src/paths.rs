use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the scan output directory: `<exe_dir>/output/`
pub fn get_output_dir() -> PathBuf {
    get_exe_dir().join("output")
}

/// Returns the bundled assets directory: `<exe_dir>/assets/`
pub fn get_assets_dir() -> PathBuf {
    get_exe_dir().join("assets")
}

/// Returns the icon template directory: `<exe_dir>/assets/images/`
pub fn get_images_dir() -> PathBuf {
    get_assets_dir().join("images")
}

/// Returns the reference catalog file: `<exe_dir>/assets/game_data.json`
pub fn get_game_data_path() -> PathBuf {
    get_assets_dir().join("game_data.json")
}

/// Returns the config file: `<exe_dir>/config.json`
pub fn get_config_path() -> PathBuf {
    get_exe_dir().join("config.json")
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_output_dir())?;
    Ok(())
}
