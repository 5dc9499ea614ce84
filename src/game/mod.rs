//! Game-level predicates and actions for mode state machines.
//!
//! [`Game`] ties the emulator, perception and the UI catalogue together:
//! "is this element visible", "wait for it", "click it", "what is my
//! energy". Modes only talk to this type.

use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};

use image::RgbImage;
use regex::Regex;

use crate::emulator::input::{DRAG_DURATION, DRAG_STEPS, VK_ESCAPE};
use crate::emulator::Emulator;
use crate::error::{BotError, BotResult};
use crate::geometry::Rect;
use crate::perception::{ElementOnScreen, Perception};
use crate::settings::GameSettings;
use crate::ui::{self, UiElement};

/// Pause between two probes while waiting for an element.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Time for the emulator to tear down the game after closing it.
const CLOSE_APP_DELAY: Duration = Duration::from_secs(3);

/// Whole emulator screen, clicked at its centre.
const FULL_SCREEN: Rect = Rect::new(0.0, 0.0, 1.0, 1.0);

pub const MAIN_MENU_TIMEOUT: Duration = Duration::from_secs(30);
pub const GAME_START_TIMEOUT: Duration = Duration::from_secs(180);

static ENERGY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*/\s*(\d+)").expect("valid energy regex"));

/// Parses an energy counter reading such as `"87/120"`.
pub fn parse_energy(text: &str) -> Option<(u32, u32)> {
    let caps = ENERGY_RE.captures(text)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

pub struct Game {
    emulator: Emulator,
    perception: Perception,
    settings: GameSettings,
    poll_interval: Duration,
    /// Size of the last captured frame.
    frame_size: Option<(u32, u32)>,
}

impl Game {
    pub fn new(emulator: Emulator, perception: Perception, settings: GameSettings) -> Self {
        Self {
            emulator,
            perception,
            settings,
            poll_interval: POLL_INTERVAL,
            frame_size: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut GameSettings {
        &mut self.settings
    }

    pub fn emulator(&self) -> &Emulator {
        &self.emulator
    }

    pub fn emulator_mut(&mut self) -> &mut Emulator {
        &mut self.emulator
    }

    pub fn perception(&self) -> &Perception {
        &self.perception
    }

    /// Captures the current frame.
    pub fn screen(&mut self) -> BotResult<RgbImage> {
        let frame = self.emulator.capture()?;
        self.frame_size = Some(frame.dimensions());
        Ok(frame)
    }

    /// Whether an element is on screen: by reference image if it has one,
    /// otherwise by its expected text.
    pub fn is_visible(&mut self, element: &UiElement) -> BotResult<bool> {
        let frame = self.screen()?;
        self.is_visible_in(&frame, element)
    }

    pub fn is_visible_in(&self, frame: &RgbImage, element: &UiElement) -> BotResult<bool> {
        if element.image.is_some() {
            self.perception.template_present(frame, element)
        } else if element.text.is_some() {
            self.perception.text_matches(frame, element)
        } else {
            Err(BotError::UnknownElement(format!(
                "{} has nothing to recognise",
                element.name
            )))
        }
    }

    /// Looks an element up by name and checks it.
    pub fn is_visible_name(&mut self, name: &str) -> BotResult<bool> {
        let element = ui::get(name)?;
        self.is_visible(element)
    }

    /// Polls until the element is visible.
    pub fn wait_for(&mut self, element: &UiElement, timeout: Duration) -> BotResult<()> {
        self.wait_for_any(&[element], timeout).map(|_| ())
    }

    /// Polls until one of the elements is visible and returns it.
    pub fn wait_for_any<'e>(
        &mut self,
        elements: &[&'e UiElement],
        timeout: Duration,
    ) -> BotResult<&'e UiElement> {
        let start = Instant::now();
        loop {
            let frame = self.screen()?;
            for element in elements {
                if self.is_visible_in(&frame, element)? {
                    return Ok(*element);
                }
            }
            if start.elapsed() >= timeout {
                let names: Vec<&str> = elements.iter().map(|e| e.name).collect();
                return Err(BotError::PerceptionMiss {
                    element: names.join(" | "),
                    timeout,
                });
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Reads an element's text region.
    pub fn read_text(&mut self, element: &UiElement) -> BotResult<String> {
        let frame = self.screen()?;
        self.perception.ocr_on_region(&frame, element)
    }

    pub fn click(&mut self, element: &UiElement) -> BotResult<()> {
        let rect = element
            .click_rect()
            .ok_or_else(|| BotError::UnknownElement(format!("{} is not clickable", element.name)))?;
        log::debug!("Clicking {}", element.name);
        self.click_at(&rect, Some(element.name))
    }

    /// Clicks the centre of a normalized rect over the main window.
    pub fn click_at(&mut self, rect: &Rect, name: Option<&str>) -> BotResult<()> {
        self.emulator.click(rect)?;
        self.record_input(rect, name);
        Ok(())
    }

    /// Clicks an element if it is visible; returns whether it was.
    pub fn click_if_visible(&mut self, element: &UiElement) -> BotResult<bool> {
        if self.is_visible(element)? {
            self.click(element)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Drags between the centres of two elements with the default gesture.
    pub fn drag(&mut self, from: &UiElement, to: &UiElement) -> BotResult<()> {
        let (Some(start), Some(end)) = (from.click_rect(), to.click_rect()) else {
            return Err(BotError::UnknownElement(format!(
                "{} -> {} has no drag anchors",
                from.name, to.name
            )));
        };
        self.emulator.drag(&start, &end, DRAG_DURATION, DRAG_STEPS)?;
        self.record_input(&start, Some(from.name));
        self.record_input(&end, Some(to.name));
        Ok(())
    }

    /// Input annotations are in frame pixels, like perception's. Before the
    /// first capture the main window size stands in for the frame.
    fn record_input(&self, rect: &Rect, name: Option<&str>) {
        let (width, height) = self.frame_size.unwrap_or_else(|| {
            let main = self.emulator.main_rect();
            (main.width() as u32, main.height() as u32)
        });
        let (x, y) = rect.to_pixels(width, height).center();
        self.perception
            .observer()
            .record(ElementOnScreen::point(name, (x as i32, y as i32)));
    }

    pub fn is_main_menu(&mut self) -> BotResult<bool> {
        self.is_visible(&ui::MAIN_MENU_LABEL)
    }

    /// Current and maximum energy, if the counter is readable.
    pub fn current_energy(&mut self) -> BotResult<Option<(u32, u32)>> {
        let text = self.read_text(&ui::ENERGY_LABEL)?;
        let energy = parse_energy(&text);
        if energy.is_none() {
            log::debug!("Unreadable energy counter: {:?}", text);
        }
        Ok(energy)
    }

    /// Opens the main menu from wherever the game currently is.
    pub fn go_to_main_menu(&mut self, timeout: Duration) -> BotResult<()> {
        let start = Instant::now();
        loop {
            let frame = self.screen()?;
            if self.is_visible_in(&frame, &ui::MAIN_MENU_LABEL)? {
                log::info!("Main menu is open");
                return Ok(());
            }
            if self.is_visible_in(&frame, &ui::MAIN_MENU_BUTTON)? {
                self.click(&ui::MAIN_MENU_BUTTON)?;
            } else if self.is_visible_in(&frame, &ui::CLOSE_AD_BUTTON)? {
                self.click(&ui::CLOSE_AD_BUTTON)?;
            } else {
                // Backs out of most dialogs and sub screens.
                self.emulator.press_key(VK_ESCAPE)?;
            }
            if start.elapsed() >= timeout {
                return Err(BotError::PerceptionMiss {
                    element: ui::MAIN_MENU_LABEL.name.to_string(),
                    timeout,
                });
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Closes the game, starts it from the emulator home screen and waits
    /// for the lobby.
    pub fn restart_game(&mut self, timeout: Duration) -> BotResult<()> {
        if !self.emulator.is_restartable() {
            return Err(BotError::UnsupportedOperation {
                operation: "restart_game",
                emulator: self.emulator.kind().name().to_string(),
            });
        }
        let mut app_rect = self.settings.game_app_rect;
        if app_rect.is_empty() && app_rect.x1 == 0.0 && app_rect.y1 == 0.0 {
            log::warn!("game_app_rect is not configured, clicking the screen centre");
            app_rect = FULL_SCREEN;
        }

        log::info!("Restarting the game");
        self.emulator.close_current_app()?;
        thread::sleep(CLOSE_APP_DELAY.min(timeout));
        self.click_at(&app_rect, Some("GAME_APP"))?;

        self.wait_for(&ui::TAP_TO_START_LABEL, timeout)?;
        self.click(&ui::TAP_TO_START_LABEL)?;

        let start = Instant::now();
        loop {
            let found = self.wait_for_any(
                &[&ui::MAIN_MENU_BUTTON, &ui::CLOSE_AD_BUTTON],
                timeout.saturating_sub(start.elapsed()),
            )?;
            if found.name == ui::MAIN_MENU_BUTTON.name {
                log::info!("Game restarted");
                return Ok(());
            }
            self.click(found)?;
            thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::emulator::backend::testing::FakeBackend;
    use crate::emulator::backend::ChildWindow;
    use crate::emulator::{EmulatorKind, Version, WindowHandle};
    use crate::geometry::PixelRect;
    use crate::ocr::testing::ScriptedRecognizer;
    use crate::perception::{NoopObserver, PerceptionObserver};
    use std::path::PathBuf;
    use std::sync::Arc;

    pub const TOP: WindowHandle = WindowHandle(0x10);
    pub const CHILD: WindowHandle = WindowHandle(0x11);

    /// A Nox window at (0, 0, 400, 300) with its render child inset by (10, 20).
    pub fn fake_backend(frame: RgbImage) -> FakeBackend {
        let mut backend = FakeBackend::default();
        backend
            .children
            .insert(TOP, vec![ChildWindow { handle: CHILD, class_name: "ScreenBoardClassWindow".into() }]);
        backend.rects.insert(TOP, PixelRect::new(0.0, 0.0, 400.0, 300.0));
        backend.rects.insert(CHILD, PixelRect::new(10.0, 20.0, 390.0, 290.0));
        backend.frame = Some(frame);
        backend
    }

    pub fn fake_game(backend: FakeBackend, readings: &[&str]) -> Game {
        fake_game_with(EmulatorKind::NoxPlayer, backend, readings)
    }

    pub fn fake_game_with(kind: EmulatorKind, backend: FakeBackend, readings: &[&str]) -> Game {
        fake_game_observed(kind, backend, readings, Arc::new(NoopObserver))
    }

    pub fn fake_game_observed(
        kind: EmulatorKind,
        backend: FakeBackend,
        readings: &[&str],
        observer: Arc<dyn PerceptionObserver>,
    ) -> Game {
        let emulator = Emulator::new(
            kind,
            TOP,
            "Nox.exe".into(),
            1,
            Version::new(&[6, 6]),
            None,
            Box::new(backend),
        )
        .unwrap();
        let perception = Perception::new(
            Box::new(ScriptedRecognizer::new(readings)),
            PathBuf::from("missing"),
        )
        .with_observer(observer);
        Game::new(emulator, perception, GameSettings::default())
            .with_poll_interval(Duration::from_millis(5))
    }
}
