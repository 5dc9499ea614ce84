//! Emulator window abstraction.
//!
//! This module provides:
//! - Window discovery by executable fingerprint (`discover`)
//! - Child and key-layout handle resolution per emulator variant
//! - Coordinate transforms from normalized rects to child-relative points
//! - Posted mouse/keyboard input and screen capture

pub mod backend;
pub mod discovery;
pub mod input;
pub mod version;
#[cfg(windows)]
pub mod win32;

use std::path::PathBuf;
use std::time::Duration;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{BotError, BotResult};
use crate::geometry::{PixelRect, Rect};

pub use backend::{WindowBackend, WindowHandle, WindowMessage};
pub use discovery::{discover, FINGERPRINTS};
pub use version::Version;

/// The window backend of the running OS.
#[cfg(windows)]
pub fn platform_backend() -> BotResult<Box<dyn WindowBackend>> {
    Ok(Box::new(win32::Win32Backend::new()))
}

#[cfg(not(windows))]
pub fn platform_backend() -> BotResult<Box<dyn WindowBackend>> {
    Err(BotError::UnsupportedOperation {
        operation: "window access",
        emulator: std::env::consts::OS.to_string(),
    })
}

/// Nox versions from here on render into a differently named child window.
const NOX_MODERN_VERSION: [u32; 4] = [7, 0, 1, 1];
const NOX_MOUSE_CLASS_MODERN: &str = "subWin";
const NOX_MOUSE_CLASS_LEGACY: &str = "ScreenBoardClassWindow";
const NOX_KEY_LAYOUT_CLASS: &str = "Form";

const BLUESTACKS_MODERN_MAJOR: u32 = 5;
const BLUESTACKS_MOUSE_CLASS_MODERN: &str = "plrNativeInputWindowClass";
const BLUESTACKS_MOUSE_CLASS_LEGACY: &str = "BlueStacksApp";

/// Supported emulator families.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmulatorKind {
    #[default]
    NoxPlayer,
    BlueStacks,
}

/// How a drag gesture is synthesized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragStyle {
    Generic,
    Manual,
}

impl EmulatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            EmulatorKind::NoxPlayer => "NoxPlayer",
            EmulatorKind::BlueStacks => "BlueStacks",
        }
    }

    /// Class-name substring of the child window that receives mouse messages.
    pub fn mouse_class(&self, version: &Version) -> &'static str {
        match self {
            EmulatorKind::NoxPlayer => {
                if *version >= Version::new(&NOX_MODERN_VERSION) {
                    NOX_MOUSE_CLASS_MODERN
                } else {
                    NOX_MOUSE_CLASS_LEGACY
                }
            }
            EmulatorKind::BlueStacks => {
                if version.major() >= BLUESTACKS_MODERN_MAJOR {
                    BLUESTACKS_MOUSE_CLASS_MODERN
                } else {
                    BLUESTACKS_MOUSE_CLASS_LEGACY
                }
            }
        }
    }

    /// Class-name substring of the key-layout window, if the variant has one.
    pub fn key_layout_class(&self) -> Option<&'static str> {
        match self {
            EmulatorKind::NoxPlayer => Some(NOX_KEY_LAYOUT_CLASS),
            EmulatorKind::BlueStacks => None,
        }
    }

    /// Whether the mouse child's parent replaces the enumerated top-level window.
    pub fn parent_is_main(&self, version: &Version) -> bool {
        matches!(self, EmulatorKind::NoxPlayer) && *version >= Version::new(&NOX_MODERN_VERSION)
    }

    pub fn drag_style(&self, version: &Version) -> DragStyle {
        match self {
            EmulatorKind::BlueStacks if version.major() < BLUESTACKS_MODERN_MAJOR => {
                DragStyle::Manual
            }
            _ => DragStyle::Generic,
        }
    }

    /// Whether the running game can be closed from the emulator.
    pub fn can_close_app(&self) -> bool {
        matches!(self, EmulatorKind::NoxPlayer)
    }

    /// ADB executable shipped next to the emulator binary.
    pub fn adb_executable(&self) -> &'static str {
        match self {
            EmulatorKind::NoxPlayer => "nox_adb.exe",
            EmulatorKind::BlueStacks => "HD-Adb.exe",
        }
    }
}

impl std::fmt::Display for EmulatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A discovered emulator instance and the handles needed to drive it.
pub struct Emulator {
    kind: EmulatorKind,
    process_name: String,
    process_id: u32,
    /// Window found during enumeration; children are resolved below it.
    top_handle: WindowHandle,
    main_handle: WindowHandle,
    child_handle: WindowHandle,
    key_handle: WindowHandle,
    main_rect: PixelRect,
    child_rect: PixelRect,
    version: Version,
    adb_path: Option<PathBuf>,
    initialized: bool,
    restartable: bool,
    backend: Box<dyn WindowBackend>,
}

impl Emulator {
    /// Builds an adapter for an enumerated window and resolves its handles.
    pub fn new(
        kind: EmulatorKind,
        top_handle: WindowHandle,
        process_name: String,
        process_id: u32,
        version: Version,
        adb_path: Option<PathBuf>,
        backend: Box<dyn WindowBackend>,
    ) -> BotResult<Self> {
        let mut emulator = Self {
            kind,
            process_name,
            process_id,
            top_handle,
            main_handle: top_handle,
            child_handle: top_handle,
            key_handle: top_handle,
            main_rect: PixelRect::default(),
            child_rect: PixelRect::default(),
            version,
            adb_path,
            initialized: false,
            restartable: kind.can_close_app(),
            backend,
        };
        emulator.update_windows()?;
        Ok(emulator)
    }

    pub fn kind(&self) -> EmulatorKind {
        self.kind
    }

    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn adb_path(&self) -> Option<&PathBuf> {
        self.adb_path.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_restartable(&self) -> bool {
        self.restartable
    }

    pub fn main_handle(&self) -> WindowHandle {
        self.main_handle
    }

    pub fn child_handle(&self) -> WindowHandle {
        self.child_handle
    }

    pub fn key_handle(&self) -> WindowHandle {
        self.key_handle
    }

    pub fn main_rect(&self) -> PixelRect {
        self.main_rect
    }

    pub fn child_rect(&self) -> PixelRect {
        self.child_rect
    }

    /// Re-resolves main, child and key-layout handles and their rectangles.
    pub fn update_windows(&mut self) -> BotResult<()> {
        if !self.backend.is_window(self.top_handle) {
            return Err(self.gone(self.top_handle));
        }

        let children = self.backend.child_windows(self.top_handle);
        let mouse_class = self.kind.mouse_class(&self.version);

        self.child_handle = children
            .iter()
            .find(|c| c.class_name.contains(mouse_class))
            .map(|c| c.handle)
            .unwrap_or(self.top_handle);

        self.main_handle = if self.kind.parent_is_main(&self.version) {
            self.backend
                .parent(self.child_handle)
                .filter(|p| !p.is_null() && self.backend.is_window(*p))
                .unwrap_or(self.top_handle)
        } else {
            self.top_handle
        };

        self.key_handle = self
            .kind
            .key_layout_class()
            .and_then(|class| children.iter().find(|c| c.class_name.contains(class)))
            .map(|c| c.handle)
            .unwrap_or(self.main_handle);

        log::debug!(
            "{} windows: main={:#x} child={:#x} key={:#x}",
            self.kind,
            self.main_handle.0,
            self.child_handle.0,
            self.key_handle.0
        );

        self.refresh_rects()?;
        self.initialized = true;
        Ok(())
    }

    /// Refreshes the cached main and child rectangles.
    pub fn refresh_rects(&mut self) -> BotResult<()> {
        self.main_rect = self.rect_of(self.main_handle)?;
        self.child_rect = self.rect_of(self.child_handle)?;
        Ok(())
    }

    fn rect_of(&mut self, handle: WindowHandle) -> BotResult<PixelRect> {
        match self.backend.window_rect(handle) {
            Ok(rect) => Ok(rect),
            Err(BotError::WindowGone { handle }) => Err(self.gone(WindowHandle(handle))),
            Err(e) => Err(e),
        }
    }

    fn gone(&mut self, handle: WindowHandle) -> BotError {
        if self.initialized {
            log::error!("{} window {:#x} disappeared", self.kind, handle.0);
        }
        self.initialized = false;
        BotError::WindowGone { handle: handle.0 }
    }

    /// Global pixel box of a normalized rect over the main window.
    pub fn to_global(&self, rect: &Rect) -> PixelRect {
        rect.to_global(&self.main_rect)
    }

    /// Centre of a global pixel box relative to the child window's origin.
    pub fn get_position_inside_screen_rectangle(&self, global: &PixelRect) -> (i32, i32) {
        let (x, y) = self.child_rect.relative(global.center());
        (x as i32, y as i32)
    }

    /// Child-relative click position for a normalized rect.
    pub fn point_for(&self, rect: &Rect) -> (i32, i32) {
        self.get_position_inside_screen_rectangle(&self.to_global(rect))
    }

    pub fn click(&mut self, rect: &Rect) -> BotResult<()> {
        self.refresh_rects()?;
        let point = self.point_for(rect);
        log::trace!("click at {:?}", point);
        self.posted(|b, target| input::click(b, target, point), self.child_handle)
    }

    /// Drags between the centres of two normalized rects.
    pub fn drag(&mut self, from: &Rect, to: &Rect, duration: Duration, steps: u32) -> BotResult<()> {
        self.refresh_rects()?;
        let start = self.point_for(from);
        let end = self.point_for(to);
        let style = self.kind.drag_style(&self.version);
        log::trace!("{:?} drag {:?} -> {:?}", style, start, end);
        self.posted(
            |b, target| match style {
                DragStyle::Generic => input::drag(b, target, start, end, duration, steps),
                DragStyle::Manual => input::manual_drag(b, target, start, end, duration, steps),
            },
            self.child_handle,
        )
    }

    pub fn press_key(&mut self, vk: u16) -> BotResult<()> {
        self.posted(|b, target| input::press_key(b, target, vk), self.key_handle)
    }

    pub fn press_combo(&mut self, modifiers: &[u16], vk: u16) -> BotResult<()> {
        self.posted(|b, target| input::press_combo(b, target, modifiers, vk), self.key_handle)
    }

    /// Closes the foreground Android app.
    pub fn close_current_app(&mut self) -> BotResult<()> {
        match self.kind {
            EmulatorKind::NoxPlayer => self.press_combo(&[input::VK_CONTROL], b'7' as u16),
            EmulatorKind::BlueStacks => {
                log::warn!("Closing the current app is not supported by {}", self.kind);
                Err(BotError::UnsupportedOperation {
                    operation: "close_current_app",
                    emulator: self.kind.name().to_string(),
                })
            }
        }
    }

    /// Captures the main window's client area.
    pub fn capture(&mut self) -> BotResult<RgbImage> {
        match self.backend.capture(self.main_handle) {
            Err(BotError::WindowGone { handle }) => Err(self.gone(WindowHandle(handle))),
            Err(e) if !self.backend.is_window(self.main_handle) => {
                log::debug!("capture failed on a dead window: {}", e);
                Err(self.gone(self.main_handle))
            }
            other => other,
        }
    }

    fn posted<F>(&mut self, f: F, target: WindowHandle) -> BotResult<()>
    where
        F: FnOnce(&dyn WindowBackend, WindowHandle) -> BotResult<()>,
    {
        let result = f(self.backend.as_ref(), target);
        match result {
            Err(BotError::WindowGone { handle }) => Err(self.gone(WindowHandle(handle))),
            other => other,
        }
    }
}

impl std::fmt::Debug for Emulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emulator")
            .field("kind", &self.kind)
            .field("process_name", &self.process_name)
            .field("version", &self.version.to_string())
            .field("main_handle", &self.main_handle)
            .field("child_handle", &self.child_handle)
            .field("key_handle", &self.key_handle)
            .field("initialized", &self.initialized)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::backend::testing::FakeBackend;
    use super::backend::ChildWindow;
    use super::*;

    const TOP: WindowHandle = WindowHandle(0x100);
    const RENDER: WindowHandle = WindowHandle(0x101);
    const KEYS: WindowHandle = WindowHandle(0x102);
    const SCREEN: WindowHandle = WindowHandle(0x103);

    fn nox_backend() -> FakeBackend {
        let mut backend = FakeBackend::default();
        backend.children.insert(
            TOP,
            vec![
                ChildWindow { handle: KEYS, class_name: "Qt5QWindowIcon_Form".into() },
                ChildWindow { handle: RENDER, class_name: "subWin".into() },
            ],
        );
        backend.parents.insert(RENDER, SCREEN);
        backend.rects.insert(SCREEN, PixelRect::new(100.0, 100.0, 500.0, 400.0));
        backend.rects.insert(TOP, PixelRect::new(90.0, 60.0, 540.0, 420.0));
        backend.rects.insert(RENDER, PixelRect::new(110.0, 130.0, 490.0, 390.0));
        backend
    }

    fn nox(backend: FakeBackend, version: &[u32]) -> Emulator {
        Emulator::new(
            EmulatorKind::NoxPlayer,
            TOP,
            "Nox.exe".into(),
            4242,
            Version::new(version),
            None,
            Box::new(backend),
        )
        .unwrap()
    }

    #[test]
    fn test_variant_class_rules() {
        let modern = Version::new(&[7, 0, 1, 1]);
        let legacy = Version::new(&[6, 6, 1]);
        assert_eq!(EmulatorKind::NoxPlayer.mouse_class(&modern), "subWin");
        assert_eq!(EmulatorKind::NoxPlayer.mouse_class(&legacy), "ScreenBoardClassWindow");
        assert_eq!(
            EmulatorKind::BlueStacks.mouse_class(&Version::new(&[5, 3])),
            "plrNativeInputWindowClass"
        );
        assert_eq!(EmulatorKind::BlueStacks.mouse_class(&Version::new(&[4, 280])), "BlueStacksApp");
        assert_eq!(EmulatorKind::BlueStacks.drag_style(&Version::new(&[4])), DragStyle::Manual);
        assert_eq!(EmulatorKind::BlueStacks.drag_style(&Version::new(&[5])), DragStyle::Generic);
        assert_eq!(EmulatorKind::NoxPlayer.drag_style(&legacy), DragStyle::Generic);
    }

    #[test]
    fn test_resolves_handles_for_modern_nox() {
        let emulator = nox(nox_backend(), &[7, 0, 5, 8]);
        assert!(emulator.is_initialized());
        assert_eq!(emulator.child_handle(), RENDER);
        assert_eq!(emulator.main_handle(), SCREEN);
        assert_eq!(emulator.key_handle(), KEYS);
        assert!(emulator.is_restartable());
    }

    #[test]
    fn test_legacy_nox_keeps_top_level_as_main() {
        let mut backend = nox_backend();
        backend.children.insert(
            TOP,
            vec![ChildWindow { handle: RENDER, class_name: "ScreenBoardClassWindow".into() }],
        );
        let emulator = nox(backend, &[6, 6]);
        assert_eq!(emulator.main_handle(), TOP);
        assert_eq!(emulator.child_handle(), RENDER);
        assert_eq!(emulator.key_handle(), TOP);
    }

    #[test]
    fn test_position_inside_child() {
        let emulator = nox(nox_backend(), &[7, 0, 5, 8]);
        assert_eq!(emulator.main_rect(), PixelRect::new(100.0, 100.0, 500.0, 400.0));

        // Centre of the main window is (300, 250); the child starts at (110, 130).
        let global = emulator.to_global(&Rect::point(0.5, 0.5));
        assert_eq!(global, PixelRect::new(300.0, 250.0, 300.0, 250.0));
        assert_eq!(emulator.get_position_inside_screen_rectangle(&global), (190, 120));
    }

    #[test]
    fn test_click_posts_to_child() {
        let backend = nox_backend();
        let recorder = backend.clone();
        let mut emulator = nox(backend, &[7, 0, 5, 8]);
        emulator.click(&Rect::new(0.25, 0.5, 0.75, 0.5)).unwrap();
        let messages = recorder.messages();
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|(h, _)| *h == RENDER));
        assert_eq!(messages[2].1, WindowMessage::LeftButtonUp { x: 190, y: 120 });
    }

    #[test]
    fn test_close_app_per_variant() {
        let backend = nox_backend();
        let recorder = backend.clone();
        let mut emulator = nox(backend, &[7, 0, 5, 8]);
        emulator.close_current_app().unwrap();
        let messages = recorder.messages();
        assert_eq!(messages.len(), 4);
        assert!(messages.iter().all(|(h, _)| *h == KEYS));
        assert_eq!(messages[1].1, WindowMessage::KeyDown { vk: 0x37 });

        let mut bluestacks = Emulator::new(
            EmulatorKind::BlueStacks,
            TOP,
            "HD-Player.exe".into(),
            1,
            Version::new(&[5, 9]),
            None,
            Box::new(nox_backend()),
        )
        .unwrap();
        assert!(matches!(
            bluestacks.close_current_app(),
            Err(BotError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_window_gone_uninitializes() {
        let backend = nox_backend();
        let handle = backend.clone();
        let mut emulator = nox(backend, &[7, 0, 5, 8]);
        handle.kill(TOP);
        handle.kill(SCREEN);
        assert!(matches!(emulator.update_windows(), Err(BotError::WindowGone { .. })));
        assert!(!emulator.is_initialized());
    }
}
