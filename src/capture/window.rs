//! Locating the StarRail.exe window and its client area.

use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;

use anyhow::{Result, anyhow};
use tracing::{debug, info};

use windows::Win32::Foundation::{BOOL, CloseHandle, FALSE, HWND, LPARAM, POINT, RECT, TRUE};
use windows::Win32::Graphics::Gdi::ClientToScreen;
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
    QueryFullProcessImageNameW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClientRect, GetWindowRect, GetWindowTextLengthW, GetWindowTextW,
    GetWindowThreadProcessId, IsWindowVisible,
};
use windows::core::PWSTR;

const GAME_PROCESS_NAME: &str = "StarRail.exe";

/// Where the client area sits, both on screen and inside the window frame.
#[derive(Clone, Copy, Debug)]
pub struct ClientArea {
    pub width: u32,
    pub height: u32,
    /// Screen position of the top-left client pixel.
    pub origin: POINT,
    /// Offset of the client area from the window's outer corner
    /// (title bar and border).
    pub inset: POINT,
}

pub fn client_area(hwnd: HWND) -> Result<ClientArea> {
    let mut client = RECT::default();
    let mut outer = RECT::default();
    let mut origin = POINT::default();
    unsafe {
        GetClientRect(hwnd, &mut client)?;
        GetWindowRect(hwnd, &mut outer)?;
        if !ClientToScreen(hwnd, &mut origin).as_bool() {
            return Err(anyhow!("ClientToScreen failed"));
        }
    }

    Ok(ClientArea {
        width: (client.right - client.left).max(0) as u32,
        height: (client.bottom - client.top).max(0) as u32,
        origin,
        inset: POINT {
            x: origin.x - outer.left,
            y: origin.y - outer.top,
        },
    })
}

fn window_title(hwnd: HWND) -> Option<String> {
    let len = unsafe { GetWindowTextLengthW(hwnd) };
    if len <= 0 {
        return None;
    }
    let mut buf = vec![0u16; len as usize + 1];
    let copied = unsafe { GetWindowTextW(hwnd, &mut buf) };
    Some(OsString::from_wide(&buf[..copied.max(0) as usize]).to_string_lossy().into_owned())
}

/// File name of the executable behind `pid`, e.g. `StarRail.exe`.
fn process_image_name(pid: u32) -> Option<String> {
    let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) }.ok()?;

    let mut buf = vec![0u16; 1024];
    let mut len = buf.len() as u32;
    let queried = unsafe {
        QueryFullProcessImageNameW(handle, PROCESS_NAME_WIN32, PWSTR(buf.as_mut_ptr()), &mut len)
    };
    let _ = unsafe { CloseHandle(handle) };
    if queried.is_err() || len == 0 {
        return None;
    }

    let path = OsString::from_wide(&buf[..len as usize]).to_string_lossy().into_owned();
    path.rsplit('\\').next().map(str::to_string)
}

struct Search {
    found: Option<(HWND, String)>,
}

unsafe extern "system" fn visit_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let search = unsafe { &mut *(lparam.0 as *mut Search) };

    if !unsafe { IsWindowVisible(hwnd) }.as_bool() {
        return TRUE;
    }
    let Some(title) = window_title(hwnd) else {
        return TRUE;
    };

    let mut pid = 0u32;
    unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
    let Some(process) = (pid != 0).then(|| process_image_name(pid)).flatten() else {
        return TRUE;
    };
    debug!(pid, process = %process, title = %title, "Visible window");

    if process.eq_ignore_ascii_case(GAME_PROCESS_NAME) {
        search.found = Some((hwnd, title));
        return FALSE;
    }
    TRUE
}

/// Finds the first visible, titled window owned by StarRail.exe.
pub fn find_game_window() -> Result<HWND> {
    let mut search = Search { found: None };
    // Stopping the enumeration early makes EnumWindows report an error.
    let _ = unsafe { EnumWindows(Some(visit_window), LPARAM(&mut search as *mut Search as isize)) };

    let (hwnd, title) = search
        .found
        .ok_or_else(|| anyhow!("No visible {} window. Is the game running?", GAME_PROCESS_NAME))?;
    info!(title = %title, "Found game window");
    Ok(hwnd)
}
