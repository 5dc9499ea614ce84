//! The seam between the emulator adapter and the host window system.
//!
//! Everything the adapter needs from the OS goes through [`WindowBackend`]:
//! window enumeration, rectangles, posted messages and capture. The Win32
//! implementation lives in `emulator::win32`.

use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::BotResult;
use crate::geometry::PixelRect;

/// An opaque OS window handle.
///
/// Stored as an integer so it can cross thread boundaries freely; the Win32
/// backend reconstructs an `HWND` from it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub const NULL: WindowHandle = WindowHandle(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// A top-level window together with its owning process.
#[derive(Clone, Debug)]
pub struct TopLevelWindow {
    pub handle: WindowHandle,
    pub process_id: u32,
    pub executable: PathBuf,
}

impl TopLevelWindow {
    /// File name of the owning executable, e.g. `Nox.exe`.
    pub fn executable_name(&self) -> String {
        executable_basename(&self.executable)
    }
}

/// Basename of a Windows or Unix style path.
pub fn executable_basename(path: &Path) -> String {
    let full = path.to_string_lossy();
    full.rsplit(['\\', '/']).next().unwrap_or(&full).to_string()
}

/// A child window and its class name.
#[derive(Clone, Debug)]
pub struct ChildWindow {
    pub handle: WindowHandle,
    pub class_name: String,
}

/// A message posted (queued, non-blocking) to a window.
///
/// Mouse coordinates are client-relative to the receiving window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowMessage {
    MouseMove { x: i32, y: i32, left_held: bool },
    LeftButtonDown { x: i32, y: i32 },
    LeftButtonUp { x: i32, y: i32 },
    KeyDown { vk: u16 },
    KeyUp { vk: u16 },
}

/// Host window-system operations used by the emulator adapter.
pub trait WindowBackend: Send {
    /// All visible top-level windows with their owning executables.
    fn top_level_windows(&self) -> Vec<TopLevelWindow>;

    /// Direct and nested children of a window, in enumeration order.
    fn child_windows(&self, parent: WindowHandle) -> Vec<ChildWindow>;

    fn parent(&self, handle: WindowHandle) -> Option<WindowHandle>;

    fn is_window(&self, handle: WindowHandle) -> bool;

    /// Window rectangle in screen pixels.
    fn window_rect(&self, handle: WindowHandle) -> BotResult<PixelRect>;

    fn post(&self, target: WindowHandle, message: WindowMessage) -> BotResult<()>;

    /// Client area of a window as an RGB image, even when occluded.
    fn capture(&self, handle: WindowHandle) -> BotResult<RgbImage>;

    /// File version of an executable, e.g. `"7.0.5.8"`.
    fn executable_version(&self, executable: &Path) -> Option<String>;
}

#[cfg(test)]
pub mod testing {
    //! In-memory backend that records posted messages.

    use super::*;
    use crate::error::BotError;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    #[derive(Clone, Default)]
    pub struct FakeBackend {
        pub windows: Vec<TopLevelWindow>,
        pub children: HashMap<WindowHandle, Vec<ChildWindow>>,
        pub parents: HashMap<WindowHandle, WindowHandle>,
        pub rects: HashMap<WindowHandle, PixelRect>,
        pub versions: HashMap<PathBuf, String>,
        pub frame: Option<RgbImage>,
        pub dead: Arc<Mutex<Vec<WindowHandle>>>,
        pub posted: Arc<Mutex<Vec<(Instant, WindowHandle, WindowMessage)>>>,
    }

    impl FakeBackend {
        pub fn messages(&self) -> Vec<(WindowHandle, WindowMessage)> {
            self.posted
                .lock()
                .unwrap()
                .iter()
                .map(|(_, h, m)| (*h, *m))
                .collect()
        }

        pub fn kill(&self, handle: WindowHandle) {
            self.dead.lock().unwrap().push(handle);
        }
    }

    impl WindowBackend for FakeBackend {
        fn top_level_windows(&self) -> Vec<TopLevelWindow> {
            self.windows.clone()
        }

        fn child_windows(&self, parent: WindowHandle) -> Vec<ChildWindow> {
            self.children.get(&parent).cloned().unwrap_or_default()
        }

        fn parent(&self, handle: WindowHandle) -> Option<WindowHandle> {
            self.parents.get(&handle).copied()
        }

        fn is_window(&self, handle: WindowHandle) -> bool {
            !handle.is_null() && !self.dead.lock().unwrap().contains(&handle)
        }

        fn window_rect(&self, handle: WindowHandle) -> BotResult<PixelRect> {
            if !self.is_window(handle) {
                return Err(BotError::WindowGone { handle: handle.0 });
            }
            Ok(self.rects.get(&handle).copied().unwrap_or_default())
        }

        fn post(&self, target: WindowHandle, message: WindowMessage) -> BotResult<()> {
            if !self.is_window(target) {
                return Err(BotError::WindowGone { handle: target.0 });
            }
            self.posted
                .lock()
                .unwrap()
                .push((Instant::now(), target, message));
            Ok(())
        }

        fn capture(&self, handle: WindowHandle) -> BotResult<RgbImage> {
            if !self.is_window(handle) {
                return Err(BotError::WindowGone { handle: handle.0 });
            }
            self.frame
                .clone()
                .ok_or_else(|| BotError::Capture("no frame".into()))
        }

        fn executable_version(&self, executable: &Path) -> Option<String> {
            self.versions.get(executable).cloned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executable_basename() {
        assert_eq!(
            executable_basename(Path::new(r"C:\Program Files\Nox\bin\Nox.exe")),
            "Nox.exe"
        );
        assert_eq!(executable_basename(Path::new("/opt/bs/HD-Player.exe")), "HD-Player.exe");
        assert_eq!(executable_basename(Path::new("Bluestacks.exe")), "Bluestacks.exe");
    }
}
