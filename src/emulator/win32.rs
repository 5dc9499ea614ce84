//! Win32 implementation of [`WindowBackend`].

use std::collections::HashMap;
use std::ffi::{c_void, OsString};
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::RgbImage;
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::{CloseHandle, BOOL, HWND, LPARAM, RECT, TRUE, WPARAM};
use windows::Win32::Storage::FileSystem::{
    GetFileVersionInfoSizeW, GetFileVersionInfoW, VerQueryValueW, VS_FIXEDFILEINFO,
};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{MapVirtualKeyW, MAPVK_VK_TO_VSC};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumChildWindows, EnumWindows, GetClassNameW, GetParent, GetWindowRect,
    GetWindowTextLengthW, GetWindowThreadProcessId, IsWindow, IsWindowVisible, PostMessageW,
    WM_KEYDOWN, WM_KEYUP, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MOUSEMOVE,
};

use super::backend::{ChildWindow, TopLevelWindow, WindowBackend, WindowHandle, WindowMessage};
use crate::capture::WindowCapture;
use crate::error::{BotError, BotResult};
use crate::geometry::PixelRect;

const MK_LBUTTON: usize = 0x0001;

/// Key-up lparam flags: previous key state and transition state.
const KEY_UP_FLAGS: isize = 0xC000_0000;

fn hwnd(handle: WindowHandle) -> HWND {
    HWND(handle.0 as *mut c_void)
}

fn handle(hwnd: HWND) -> WindowHandle {
    WindowHandle(hwnd.0 as isize)
}

/// Packs client coordinates the way `MAKELPARAM(x, y)` does.
fn point_lparam(x: i32, y: i32) -> LPARAM {
    LPARAM((((y as u32 & 0xFFFF) << 16) | (x as u32 & 0xFFFF)) as isize)
}

fn key_lparam(vk: u16, up: bool) -> LPARAM {
    let scan = unsafe { MapVirtualKeyW(vk as u32, MAPVK_VK_TO_VSC) } as isize;
    let base = 1 | (scan << 16);
    LPARAM(if up { base | KEY_UP_FLAGS } else { base })
}

/// Posts messages through `PostMessageW` and captures through WGC.
#[derive(Default)]
pub struct Win32Backend {
    captures: Mutex<HashMap<isize, WindowCapture>>,
}

impl Win32Backend {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Full executable path of a process, if it can be opened.
fn process_image_path(process_id: u32) -> Option<PathBuf> {
    unsafe {
        let process = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, process_id).ok()?;
        let mut buf: Vec<u16> = vec![0; 1024];
        let mut len = buf.len() as u32;
        let result = QueryFullProcessImageNameW(
            process,
            PROCESS_NAME_WIN32,
            PWSTR(buf.as_mut_ptr()),
            &mut len,
        );
        let _ = CloseHandle(process);
        if result.is_err() || len == 0 {
            return None;
        }
        Some(PathBuf::from(OsString::from_wide(&buf[..len as usize])))
    }
}

fn wide(path: &Path) -> Vec<u16> {
    path.as_os_str().encode_wide().chain(std::iter::once(0)).collect()
}

impl WindowBackend for Win32Backend {
    fn top_level_windows(&self) -> Vec<TopLevelWindow> {
        unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
            unsafe {
                let found = &mut *(lparam.0 as *mut Vec<TopLevelWindow>);

                if !IsWindowVisible(hwnd).as_bool() || GetWindowTextLengthW(hwnd) == 0 {
                    return TRUE;
                }

                let mut process_id: u32 = 0;
                GetWindowThreadProcessId(hwnd, Some(&mut process_id));
                if process_id == 0 {
                    return TRUE;
                }

                if let Some(executable) = process_image_path(process_id) {
                    found.push(TopLevelWindow {
                        handle: handle(hwnd),
                        process_id,
                        executable,
                    });
                }
                TRUE
            }
        }

        let mut found: Vec<TopLevelWindow> = Vec::new();
        unsafe {
            let _ = EnumWindows(Some(enum_callback), LPARAM(&mut found as *mut _ as isize));
        }
        log::trace!("Enumerated {} top-level windows", found.len());
        found
    }

    fn child_windows(&self, parent: WindowHandle) -> Vec<ChildWindow> {
        unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
            unsafe {
                let found = &mut *(lparam.0 as *mut Vec<ChildWindow>);
                let mut buf = [0u16; 256];
                let len = GetClassNameW(hwnd, &mut buf);
                if len > 0 {
                    found.push(ChildWindow {
                        handle: handle(hwnd),
                        class_name: String::from_utf16_lossy(&buf[..len as usize]),
                    });
                }
                TRUE
            }
        }

        let mut found: Vec<ChildWindow> = Vec::new();
        unsafe {
            let _ = EnumChildWindows(
                hwnd(parent),
                Some(enum_callback),
                LPARAM(&mut found as *mut _ as isize),
            );
        }
        found
    }

    fn parent(&self, child: WindowHandle) -> Option<WindowHandle> {
        unsafe { GetParent(hwnd(child)) }
            .ok()
            .map(handle)
            .filter(|h| !h.is_null())
    }

    fn is_window(&self, window: WindowHandle) -> bool {
        !window.is_null() && unsafe { IsWindow(hwnd(window)) }.as_bool()
    }

    fn window_rect(&self, window: WindowHandle) -> BotResult<PixelRect> {
        let mut rect = RECT::default();
        unsafe { GetWindowRect(hwnd(window), &mut rect) }
            .map_err(|_| BotError::WindowGone { handle: window.0 })?;
        Ok(PixelRect::new(
            rect.left as f64,
            rect.top as f64,
            rect.right as f64,
            rect.bottom as f64,
        ))
    }

    fn post(&self, target: WindowHandle, message: WindowMessage) -> BotResult<()> {
        let (msg, wparam, lparam) = match message {
            WindowMessage::MouseMove { x, y, left_held } => (
                WM_MOUSEMOVE,
                WPARAM(if left_held { MK_LBUTTON } else { 0 }),
                point_lparam(x, y),
            ),
            WindowMessage::LeftButtonDown { x, y } => {
                (WM_LBUTTONDOWN, WPARAM(MK_LBUTTON), point_lparam(x, y))
            }
            WindowMessage::LeftButtonUp { x, y } => (WM_LBUTTONUP, WPARAM(0), point_lparam(x, y)),
            WindowMessage::KeyDown { vk } => (WM_KEYDOWN, WPARAM(vk as usize), key_lparam(vk, false)),
            WindowMessage::KeyUp { vk } => (WM_KEYUP, WPARAM(vk as usize), key_lparam(vk, true)),
        };

        unsafe { PostMessageW(hwnd(target), msg, wparam, lparam) }.map_err(|e| {
            if self.is_window(target) {
                BotError::Io(std::io::Error::other(e))
            } else {
                BotError::WindowGone { handle: target.0 }
            }
        })
    }

    fn capture(&self, window: WindowHandle) -> BotResult<RgbImage> {
        if !self.is_window(window) {
            self.captures.lock().map_err(poisoned)?.remove(&window.0);
            return Err(BotError::WindowGone { handle: window.0 });
        }

        let mut captures = self.captures.lock().map_err(poisoned)?;
        if !captures.contains_key(&window.0) {
            let capture =
                WindowCapture::open(hwnd(window)).map_err(|e| BotError::Capture(e.to_string()))?;
            captures.insert(window.0, capture);
        }
        let Some(capture) = captures.get_mut(&window.0) else {
            return Err(BotError::Capture("capture session vanished".into()));
        };
        match capture.grab() {
            Ok(frame) => Ok(frame),
            Err(e) => {
                // Sessions die with resizes or device loss; reopen next time.
                captures.remove(&window.0);
                Err(BotError::Capture(e.to_string()))
            }
        }
    }

    fn executable_version(&self, executable: &Path) -> Option<String> {
        let path = wide(executable);
        let name = PCWSTR(path.as_ptr());
        unsafe {
            let size = GetFileVersionInfoSizeW(name, None);
            if size == 0 {
                return None;
            }
            let mut data: Vec<u8> = vec![0; size as usize];
            GetFileVersionInfoW(name, 0, size, data.as_mut_ptr() as *mut c_void).ok()?;

            let root: Vec<u16> = "\\".encode_utf16().chain(std::iter::once(0)).collect();
            let mut info: *mut c_void = std::ptr::null_mut();
            let mut len: u32 = 0;
            if !VerQueryValueW(
                data.as_ptr() as *const c_void,
                PCWSTR(root.as_ptr()),
                &mut info,
                &mut len,
            )
            .as_bool()
                || info.is_null()
                || (len as usize) < std::mem::size_of::<VS_FIXEDFILEINFO>()
            {
                return None;
            }

            let fixed = &*(info as *const VS_FIXEDFILEINFO);
            Some(format!(
                "{}.{}.{}.{}",
                fixed.dwFileVersionMS >> 16,
                fixed.dwFileVersionMS & 0xFFFF,
                fixed.dwFileVersionLS >> 16,
                fixed.dwFileVersionLS & 0xFFFF
            ))
        }
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> BotError {
    BotError::Capture("capture cache lock poisoned".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_lparam_packs_like_makelparam() {
        assert_eq!(point_lparam(190, 120).0, (120 << 16) | 190);
        assert_eq!(point_lparam(0, 0).0, 0);
    }
}
