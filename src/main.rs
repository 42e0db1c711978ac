//! HSR Scanner
//!
//! Start a scan from the in-game ESC menu. The interrupt hotkey (F8 by
//! default) stops it early; whatever was scanned so far is still saved to
//! `output/`.

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    app::run()
}

#[cfg(not(windows))]
fn main() {
    eprintln!("hsr-scanner drives the Windows game client and only runs on Windows.");
    std::process::exit(1);
}

#[cfg(windows)]
mod app {
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread::{self, JoinHandle};

    use anyhow::{Context, Result, anyhow};
    use tracing::{error, info, warn};

    use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::Input::KeyboardAndMouse::{MOD_NOREPEAT, RegisterHotKey, UnregisterHotKey};
    use windows::Win32::UI::WindowsAndMessaging::{GetMessageW, MSG, PostThreadMessageW, WM_HOTKEY, WM_QUIT};

    use hsr_scanner::capture::{WindowCapture, find_game_window};
    use hsr_scanner::catalog::{IconSet, JsonCatalog, NameTable, ReferenceCatalog};
    use hsr_scanner::error::ScanError;
    use hsr_scanner::export::write_scan_result;
    use hsr_scanner::input::{SendInputDriver, function_key};
    use hsr_scanner::logging::setup_logging;
    use hsr_scanner::ocr::{GAME_FONT_LANGUAGE, TesseractEngine};
    use hsr_scanner::paths;
    use hsr_scanner::scanner::{
        CancellationToken, LogProgress, Outcome, ScanEnv, Timing, load_config, run_scan,
    };
    use hsr_scanner::vision::NccMatcher;

    const HOTKEY_INTERRUPT: i32 = 1;
    const VK_F1: u32 = 0x70;

    /// Global function-key hotkey that sets the cancellation token.
    ///
    /// The hotkey is registered on its own thread's message queue. Dropping
    /// the handle posts `WM_QUIT` to that thread and joins it.
    struct InterruptHotkey {
        thread_id: u32,
        handle: Option<JoinHandle<()>>,
    }

    impl InterruptHotkey {
        fn spawn(name: &str, cancel: CancellationToken) -> Result<Self> {
            let vk = VK_F1 + function_key(name)? as u32 - 1;
            let (tx, rx) = mpsc::channel();

            let handle = thread::Builder::new()
                .name("interrupt-hotkey".to_string())
                .spawn(move || {
                    let registered = unsafe { RegisterHotKey(HWND::default(), HOTKEY_INTERRUPT, MOD_NOREPEAT, vk) };
                    let failed = registered.is_err();
                    let _ = tx.send(
                        registered
                            .map(|()| unsafe { GetCurrentThreadId() })
                            .map_err(|e| e.to_string()),
                    );
                    if failed {
                        return;
                    }

                    let mut msg = MSG::default();
                    unsafe {
                        while GetMessageW(&mut msg, HWND::default(), 0, 0).as_bool() {
                            if msg.message == WM_HOTKEY {
                                info!("Interrupt hotkey pressed, stopping scan");
                                cancel.cancel();
                            }
                        }
                        let _ = UnregisterHotKey(HWND::default(), HOTKEY_INTERRUPT);
                    }
                })
                .context("Failed to start hotkey thread")?;

            let thread_id = rx
                .recv()
                .context("Hotkey thread exited early")?
                .map_err(|e| anyhow!("Failed to register interrupt hotkey {}: {}", name, e))?;
            Ok(Self {
                thread_id,
                handle: Some(handle),
            })
        }
    }

    impl Drop for InterruptHotkey {
        fn drop(&mut self) {
            unsafe {
                let _ = PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
            }
            if let Some(handle) = self.handle.take()
                && handle.join().is_err()
            {
                error!("Interrupt hotkey thread panicked");
            }
        }
    }

    fn require(path: std::path::PathBuf) -> Result<std::path::PathBuf, ScanError> {
        if path.exists() {
            Ok(path)
        } else {
            Err(ScanError::AssetMissing(path))
        }
    }

    pub fn run() -> Result<()> {
        std::panic::set_hook(Box::new(|panic_info| {
            let location = panic_info
                .location()
                .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
                .unwrap_or_default();
            error!("[PANIC]{} {}", location, panic_info);
            eprintln!("[PANIC]{} {}", location, panic_info);
        }));

        unsafe {
            windows::Win32::System::WinRT::RoInitialize(
                windows::Win32::System::WinRT::RO_INIT_MULTITHREADED,
            )?
        };

        paths::ensure_directories()?;
        let config_path = paths::get_config_path();
        // Read once before logging exists, only to pick the level.
        let debug = load_config(&config_path).debug;
        let _guard = setup_logging(&paths::get_logs_dir(), debug)?;
        let mut config = load_config(&config_path);

        let hwnd = find_game_window().map_err(|e| {
            warn!("Window search failed: {:#}", e);
            ScanError::WindowNotFound
        })?;
        info!("Game window found");

        let catalog = JsonCatalog::load(&require(paths::get_game_data_path())?)?;
        let icons = IconSet::load(
            &require(paths::get_images_dir())?,
            catalog.names(NameTable::Characters),
        )?;
        let ocr = TesseractEngine::discover(GAME_FONT_LANGUAGE)
            .context("Tesseract not found. Install it or place it next to the executable.")?;

        let cancel = CancellationToken::new();
        let hotkey = match InterruptHotkey::spawn(&config.interrupt_hotkey, cancel.clone()) {
            Ok(hotkey) => {
                info!("Press {} to stop the scan", config.interrupt_hotkey);
                Some(hotkey)
            }
            Err(e) => {
                warn!("{:#}. The scan cannot be interrupted.", e);
                None
            }
        };

        let capture = WindowCapture::new(hwnd)?;
        let mut input = SendInputDriver::new(hwnd);
        let env = ScanEnv {
            input: &mut input,
            capture: &capture,
            ocr: Arc::new(ocr),
            catalog: Arc::new(catalog),
            icons: Arc::new(icons),
            matcher: Arc::new(NccMatcher),
            progress: Arc::new(LogProgress),
            cancel,
            timing: Timing::from_config(&config),
        };
        let outcome = run_scan(&config, env);
        drop(hotkey);

        let result = match outcome {
            Outcome::Completed(result) => result,
            Outcome::Interrupted(result) => {
                warn!("Scan was interrupted, saving partial result");
                result
            }
            Outcome::Fatal(e) => {
                error!("Scan failed: {}", e);
                return Err(e.into());
            }
        };

        write_scan_result(&result, &paths::get_output_dir())?;

        if let Some(tb) = result.metadata.trailblazer
            && config.trailblazer != Some(tb)
        {
            config.trailblazer = Some(tb);
            if let Err(e) = config.save(&config_path) {
                warn!("Failed to save Trailblazer preference: {:#}", e);
            }
        }
        Ok(())
    }
}
