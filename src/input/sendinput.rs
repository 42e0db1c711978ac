//! Hardware-level input simulation with SendInput.
//!
//! PostMessage does not reach Unity's input layer, so clicks and keys are
//! injected as real input. This moves the actual cursor, and the game window
//! must be in the foreground.

use anyhow::{Result, anyhow};
use std::thread;
use std::time::Duration;

use windows::Win32::Foundation::{HWND, POINT, RECT};
use windows::Win32::Graphics::Gdi::ClientToScreen;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBD_EVENT_FLAGS, KEYBDINPUT, KEYEVENTF_KEYUP,
    MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE,
    MOUSE_EVENT_FLAGS, MOUSEINPUT, SendInput, VIRTUAL_KEY, VK_ESCAPE,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetClientRect, GetSystemMetrics, IsWindow, SM_CXSCREEN, SM_CYSCREEN, SetForegroundWindow,
};

use super::{InputDriver, Key};
use crate::layout::RelativePoint;

/// Number of intermediate moves in a drag, so the game registers a swipe.
const DRAG_STEPS: i32 = 20;

pub struct SendInputDriver {
    hwnd: HWND,
    /// Last absolute position in the 0-65535 SendInput space.
    cursor: (i32, i32),
}

impl SendInputDriver {
    pub fn new(hwnd: HWND) -> Self {
        Self {
            hwnd,
            cursor: (0, 0),
        }
    }

    fn ensure_window(&self) -> Result<()> {
        if unsafe { IsWindow(self.hwnd).as_bool() } {
            Ok(())
        } else {
            Err(anyhow!("Game window no longer exists"))
        }
    }

    /// Converts a client-relative point to normalized absolute coordinates.
    fn normalize(&self, point: RelativePoint) -> Result<(i32, i32)> {
        self.ensure_window()?;

        let mut client_rect = RECT::default();
        unsafe { GetClientRect(self.hwnd, &mut client_rect)? };
        let client_width = client_rect.right - client_rect.left;
        let client_height = client_rect.bottom - client_rect.top;

        let mut screen_point = POINT {
            x: (point.x * client_width as f32) as i32,
            y: (point.y * client_height as f32) as i32,
        };
        unsafe {
            if !ClientToScreen(self.hwnd, &mut screen_point).as_bool() {
                return Err(anyhow!("ClientToScreen failed"));
            }
        }

        let screen_width = unsafe { GetSystemMetrics(SM_CXSCREEN) };
        let screen_height = unsafe { GetSystemMetrics(SM_CYSCREEN) };
        if screen_width <= 0 || screen_height <= 0 {
            return Err(anyhow!("Invalid screen metrics"));
        }

        Ok((
            ((screen_point.x as i64 * 65535) / screen_width as i64) as i32,
            ((screen_point.y as i64 * 65535) / screen_height as i64) as i32,
        ))
    }

    fn send_mouse(&self, (dx, dy): (i32, i32), flags: MOUSE_EVENT_FLAGS) -> Result<()> {
        let input = INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx,
                    dy,
                    dwFlags: flags | MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_MOVE,
                    ..Default::default()
                },
            },
        };
        send(&[input])
    }

    fn send_key(&self, vk: VIRTUAL_KEY) -> Result<()> {
        let key = |flags: KEYBD_EVENT_FLAGS| INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: vk,
                    dwFlags: flags,
                    ..Default::default()
                },
            },
        };
        send(&[key(KEYBD_EVENT_FLAGS(0))])?;
        thread::sleep(Duration::from_millis(30));
        send(&[key(KEYEVENTF_KEYUP)])
    }
}

fn send(inputs: &[INPUT]) -> Result<()> {
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        return Err(anyhow!("SendInput sent {} of {} inputs", sent, inputs.len()));
    }
    Ok(())
}

fn virtual_key(key: Key) -> VIRTUAL_KEY {
    match key {
        Key::Escape => VK_ESCAPE,
        // Letter and digit virtual keys share their uppercase ASCII codes.
        Key::Char(c) => VIRTUAL_KEY(c.to_ascii_uppercase() as u16),
    }
}

impl InputDriver for SendInputDriver {
    fn focus(&mut self) -> Result<()> {
        self.ensure_window()?;
        unsafe {
            let _ = SetForegroundWindow(self.hwnd);
        }
        thread::sleep(Duration::from_millis(100));
        Ok(())
    }

    fn move_cursor(&mut self, point: RelativePoint) -> Result<()> {
        let target = self.normalize(point)?;
        self.send_mouse(target, MOUSE_EVENT_FLAGS(0))?;
        self.cursor = target;
        Ok(())
    }

    fn click(&mut self) -> Result<()> {
        self.send_mouse(self.cursor, MOUSEEVENTF_LEFTDOWN)?;
        thread::sleep(Duration::from_millis(50));
        self.send_mouse(self.cursor, MOUSEEVENTF_LEFTUP)
    }

    fn key_tap(&mut self, key: Key) -> Result<()> {
        self.ensure_window()?;
        self.send_key(virtual_key(key))
    }

    fn drag_scroll(&mut self, from: RelativePoint, to: RelativePoint) -> Result<()> {
        let start = self.normalize(from)?;
        let end = self.normalize(to)?;

        self.send_mouse(start, MOUSE_EVENT_FLAGS(0))?;
        thread::sleep(Duration::from_millis(50));
        self.send_mouse(start, MOUSEEVENTF_LEFTDOWN)?;

        for step in 1..=DRAG_STEPS {
            let x = start.0 + (end.0 - start.0) * step / DRAG_STEPS;
            let y = start.1 + (end.1 - start.1) * step / DRAG_STEPS;
            self.send_mouse((x, y), MOUSE_EVENT_FLAGS(0))?;
            thread::sleep(Duration::from_millis(15));
        }

        // Hold briefly so the list stops without inertia.
        thread::sleep(Duration::from_millis(300));
        self.send_mouse(end, MOUSEEVENTF_LEFTUP)?;
        self.cursor = end;
        Ok(())
    }
}
