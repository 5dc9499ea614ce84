//! Synthetic mouse and keyboard input posted to emulator windows.
//!
//! Messages are posted rather than sent, so the emulator does not have to be
//! in the foreground and the caller never blocks on the emulator's message
//! loop. Coordinates are relative to the receiving window.

use std::thread;
use std::time::Duration;

use super::backend::{WindowBackend, WindowHandle, WindowMessage};
use crate::error::BotResult;

/// Default drag duration.
pub const DRAG_DURATION: Duration = Duration::from_millis(700);

/// Default number of interpolation steps in a drag.
pub const DRAG_STEPS: u32 = 100;

/// How long the manual drag holds the button before and after moving.
const MANUAL_DRAG_HOLD: Duration = Duration::from_millis(300);

pub const VK_CONTROL: u16 = 0x11;
pub const VK_ESCAPE: u16 = 0x1B;

/// Clicks at a point: move, press, release.
pub fn click(backend: &dyn WindowBackend, target: WindowHandle, (x, y): (i32, i32)) -> BotResult<()> {
    backend.post(target, WindowMessage::MouseMove { x, y, left_held: false })?;
    backend.post(target, WindowMessage::LeftButtonDown { x, y })?;
    backend.post(target, WindowMessage::LeftButtonUp { x, y })?;
    Ok(())
}

/// Points visited by a drag, `start + (end - start) * i / steps` for `i in 0..steps`.
///
/// The end point itself is not included; the release happens there.
pub fn interpolate(from: (i32, i32), to: (i32, i32), steps: u32) -> Vec<(i32, i32)> {
    let steps = steps.max(1);
    (0..steps)
        .map(|i| {
            let step = |a: i32, b: i32| a + ((b - a) as i64 * i as i64 / steps as i64) as i32;
            (step(from.0, to.0), step(from.1, to.1))
        })
        .collect()
}

/// Drags with the left button held.
///
/// Each intermediate step re-asserts the button before moving, which is what
/// the emulators' touch translation expects.
pub fn drag(
    backend: &dyn WindowBackend,
    target: WindowHandle,
    from: (i32, i32),
    to: (i32, i32),
    duration: Duration,
    steps: u32,
) -> BotResult<()> {
    let steps = steps.max(1);
    let pause = duration / steps;

    backend.post(target, WindowMessage::MouseMove { x: from.0, y: from.1, left_held: false })?;
    backend.post(target, WindowMessage::LeftButtonDown { x: from.0, y: from.1 })?;

    for (x, y) in interpolate(from, to, steps) {
        backend.post(target, WindowMessage::LeftButtonDown { x, y })?;
        backend.post(target, WindowMessage::MouseMove { x, y, left_held: true })?;
        thread::sleep(pause);
    }

    backend.post(target, WindowMessage::LeftButtonUp { x: to.0, y: to.1 })?;
    Ok(())
}

/// Slower drag for emulators that ignore rapid button re-assertion.
///
/// Presses once, holds, moves with the button held, holds again, releases.
pub fn manual_drag(
    backend: &dyn WindowBackend,
    target: WindowHandle,
    from: (i32, i32),
    to: (i32, i32),
    duration: Duration,
    steps: u32,
) -> BotResult<()> {
    let steps = steps.max(1);
    let pause = duration / steps;

    backend.post(target, WindowMessage::MouseMove { x: from.0, y: from.1, left_held: false })?;
    backend.post(target, WindowMessage::LeftButtonDown { x: from.0, y: from.1 })?;
    thread::sleep(MANUAL_DRAG_HOLD);

    for (x, y) in interpolate(from, to, steps).into_iter().skip(1) {
        backend.post(target, WindowMessage::MouseMove { x, y, left_held: true })?;
        thread::sleep(pause);
    }

    backend.post(target, WindowMessage::MouseMove { x: to.0, y: to.1, left_held: true })?;
    thread::sleep(MANUAL_DRAG_HOLD);
    backend.post(target, WindowMessage::LeftButtonUp { x: to.0, y: to.1 })?;
    Ok(())
}

/// Presses and releases a single virtual key.
pub fn press_key(backend: &dyn WindowBackend, target: WindowHandle, vk: u16) -> BotResult<()> {
    backend.post(target, WindowMessage::KeyDown { vk })?;
    backend.post(target, WindowMessage::KeyUp { vk })?;
    Ok(())
}

/// Presses a key while holding modifiers, releasing in reverse order.
pub fn press_combo(
    backend: &dyn WindowBackend,
    target: WindowHandle,
    modifiers: &[u16],
    vk: u16,
) -> BotResult<()> {
    for &m in modifiers {
        backend.post(target, WindowMessage::KeyDown { vk: m })?;
    }
    press_key(backend, target, vk)?;
    for &m in modifiers.iter().rev() {
        backend.post(target, WindowMessage::KeyUp { vk: m })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::backend::testing::FakeBackend;
    use std::time::Instant;

    const TARGET: WindowHandle = WindowHandle(0x42);

    #[test]
    fn test_click_sequence() {
        let backend = FakeBackend::default();
        click(&backend, TARGET, (12, 34)).unwrap();
        assert_eq!(
            backend.messages(),
            vec![
                (TARGET, WindowMessage::MouseMove { x: 12, y: 34, left_held: false }),
                (TARGET, WindowMessage::LeftButtonDown { x: 12, y: 34 }),
                (TARGET, WindowMessage::LeftButtonUp { x: 12, y: 34 }),
            ]
        );
    }

    #[test]
    fn test_interpolate() {
        let xs: Vec<i32> = interpolate((0, 0), (100, 0), 10).iter().map(|p| p.0).collect();
        assert_eq!(xs, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);

        let pts = interpolate((10, 50), (10, 0), 5);
        assert_eq!(pts, vec![(10, 50), (10, 40), (10, 30), (10, 20), (10, 10)]);
    }

    #[test]
    fn test_drag_shape_and_duration() {
        let backend = FakeBackend::default();
        let start = Instant::now();
        drag(&backend, TARGET, (0, 0), (100, 0), Duration::from_secs(1), 10).unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));

        let messages: Vec<WindowMessage> = backend.messages().into_iter().map(|(_, m)| m).collect();
        assert_eq!(messages.len(), 2 + 10 * 2 + 1);
        assert_eq!(messages[0], WindowMessage::MouseMove { x: 0, y: 0, left_held: false });
        assert_eq!(messages[1], WindowMessage::LeftButtonDown { x: 0, y: 0 });

        let held_moves: Vec<i32> = messages[2..22]
            .iter()
            .filter_map(|m| match m {
                WindowMessage::MouseMove { x, left_held: true, .. } => Some(*x),
                _ => None,
            })
            .collect();
        assert_eq!(held_moves, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
        assert_eq!(messages[22], WindowMessage::LeftButtonUp { x: 100, y: 0 });
    }

    #[test]
    fn test_manual_drag_holds_button() {
        let backend = FakeBackend::default();
        manual_drag(&backend, TARGET, (0, 0), (0, 40), Duration::from_millis(40), 4).unwrap();
        let messages: Vec<WindowMessage> = backend.messages().into_iter().map(|(_, m)| m).collect();

        let downs = messages
            .iter()
            .filter(|m| matches!(m, WindowMessage::LeftButtonDown { .. }))
            .count();
        assert_eq!(downs, 1);
        assert_eq!(messages.last(), Some(&WindowMessage::LeftButtonUp { x: 0, y: 40 }));
    }

    #[test]
    fn test_press_combo_order() {
        let backend = FakeBackend::default();
        press_combo(&backend, TARGET, &[VK_CONTROL], 0x37).unwrap();
        let messages: Vec<WindowMessage> = backend.messages().into_iter().map(|(_, m)| m).collect();
        assert_eq!(
            messages,
            vec![
                WindowMessage::KeyDown { vk: VK_CONTROL },
                WindowMessage::KeyDown { vk: 0x37 },
                WindowMessage::KeyUp { vk: 0x37 },
                WindowMessage::KeyUp { vk: VK_CONTROL },
            ]
        );
    }
}
