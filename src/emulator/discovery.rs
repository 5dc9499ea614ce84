//! Finding a running emulator among the desktop's top-level windows.

use std::path::{Path, PathBuf};

use super::backend::{TopLevelWindow, WindowBackend};
use super::{Emulator, EmulatorKind, Version};
use crate::error::{BotError, BotResult};

/// Executable basenames that identify a supported emulator.
pub const FINGERPRINTS: &[(&str, EmulatorKind)] = &[
    ("Nox.exe", EmulatorKind::NoxPlayer),
    ("HD-Player.exe", EmulatorKind::BlueStacks),
    ("Bluestacks.exe", EmulatorKind::BlueStacks),
];

/// Emulator family for an executable basename, compared case-insensitively.
pub fn fingerprint(executable_name: &str) -> Option<EmulatorKind> {
    FINGERPRINTS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(executable_name))
        .map(|(_, kind)| *kind)
}

/// Picks the emulator window to drive.
///
/// Windows whose executable matches a fingerprint are candidates in
/// enumeration order. When `preferred` names a process, a candidate owned by
/// that process wins over the others.
pub fn select_window<'a>(
    windows: &'a [TopLevelWindow],
    preferred: Option<&str>,
) -> Option<(&'a TopLevelWindow, EmulatorKind)> {
    let candidates: Vec<(&TopLevelWindow, EmulatorKind)> = windows
        .iter()
        .filter_map(|w| fingerprint(&w.executable_name()).map(|kind| (w, kind)))
        .collect();

    if let Some(name) = preferred.map(str::trim).filter(|n| !n.is_empty()) {
        if let Some(hit) = candidates
            .iter()
            .find(|(w, _)| w.executable_name().eq_ignore_ascii_case(name))
        {
            return Some(*hit);
        }
        log::warn!("Preferred emulator '{}' is not running", name);
    }

    candidates.into_iter().next()
}

/// ADB binary shipped next to the emulator executable, if present.
fn adb_next_to(executable: &Path, kind: EmulatorKind) -> Option<PathBuf> {
    let candidate = executable.parent()?.join(kind.adb_executable());
    candidate.is_file().then_some(candidate)
}

/// Discovers a running emulator and resolves its window handles.
pub fn discover(backend: Box<dyn WindowBackend>, preferred: Option<&str>) -> BotResult<Emulator> {
    let windows = backend.top_level_windows();
    let Some((window, kind)) = select_window(&windows, preferred) else {
        let searched: Vec<&str> = FINGERPRINTS.iter().map(|(name, _)| *name).collect();
        return Err(BotError::EmulatorNotFound {
            searched: searched.join(", "),
        });
    };

    let version = backend
        .executable_version(&window.executable)
        .and_then(|v| Version::parse(&v))
        .unwrap_or_default();
    if version.is_unknown() {
        log::warn!(
            "Could not read the version of {}, assuming the oldest layout",
            window.executable.display()
        );
    }

    log::info!(
        "Found {} {} (pid {}, handle {:#x})",
        kind,
        version,
        window.process_id,
        window.handle.0
    );

    Emulator::new(
        kind,
        window.handle,
        window.executable_name(),
        window.process_id,
        version,
        adb_next_to(&window.executable, kind),
        backend,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::backend::testing::FakeBackend;
    use crate::emulator::backend::ChildWindow;
    use crate::emulator::WindowHandle;

    fn window(handle: isize, pid: u32, exe: &str) -> TopLevelWindow {
        TopLevelWindow {
            handle: WindowHandle(handle),
            process_id: pid,
            executable: PathBuf::from(exe),
        }
    }

    #[test]
    fn test_fingerprint_is_case_insensitive() {
        assert_eq!(fingerprint("nox.EXE"), Some(EmulatorKind::NoxPlayer));
        assert_eq!(fingerprint("HD-Player.exe"), Some(EmulatorKind::BlueStacks));
        assert_eq!(fingerprint("BLUESTACKS.exe"), Some(EmulatorKind::BlueStacks));
        assert_eq!(fingerprint("NoxVMHandle.exe"), None);
    }

    #[test]
    fn test_select_first_candidate() {
        let windows = vec![
            window(1, 10, r"C:\Windows\explorer.exe"),
            window(2, 20, r"C:\Program Files\BlueStacks_nxt\HD-Player.exe"),
            window(3, 30, r"D:\Nox\bin\Nox.exe"),
        ];
        let (w, kind) = select_window(&windows, None).unwrap();
        assert_eq!(w.handle, WindowHandle(2));
        assert_eq!(kind, EmulatorKind::BlueStacks);
    }

    #[test]
    fn test_preferred_process_wins() {
        let windows = vec![
            window(2, 20, r"C:\BlueStacks\HD-Player.exe"),
            window(3, 30, r"D:\Nox\bin\Nox.exe"),
        ];
        let (w, kind) = select_window(&windows, Some("nox.exe")).unwrap();
        assert_eq!(w.handle, WindowHandle(3));
        assert_eq!(kind, EmulatorKind::NoxPlayer);

        // An absent preference falls back to the first candidate.
        let (w, _) = select_window(&windows, Some("Bluestacks.exe")).unwrap();
        assert_eq!(w.handle, WindowHandle(2));
    }

    #[test]
    fn test_discover_without_emulator() {
        let mut backend = FakeBackend::default();
        backend.windows = vec![window(1, 10, "explorer.exe")];
        let err = discover(Box::new(backend), None).unwrap_err();
        assert!(matches!(err, BotError::EmulatorNotFound { .. }));
        assert!(err.to_string().contains("Nox.exe"));
    }

    #[test]
    fn test_discover_reads_version() {
        let exe = r"C:\BlueStacks\HD-Player.exe";
        let mut backend = FakeBackend::default();
        backend.windows = vec![window(7, 70, exe)];
        backend.versions.insert(PathBuf::from(exe), "4.280.0.1022".into());
        backend.children.insert(
            WindowHandle(7),
            vec![ChildWindow { handle: WindowHandle(8), class_name: "BlueStacksApp".into() }],
        );

        let emulator = discover(Box::new(backend), None).unwrap();
        assert_eq!(emulator.kind(), EmulatorKind::BlueStacks);
        assert_eq!(emulator.version().major(), 4);
        assert_eq!(emulator.child_handle(), WindowHandle(8));
        assert_eq!(emulator.key_handle(), WindowHandle(7));
        assert!(!emulator.is_restartable());
        assert_eq!(emulator.process_id(), 70);
    }
}
