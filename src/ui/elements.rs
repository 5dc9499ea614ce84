use super::UiElement;
use crate::geometry::Rect;

pub const MAIN_MENU_LABEL: UiElement = UiElement::new("MAIN_MENU_LABEL", "Title of the main menu overlay")
    .text_rect(Rect::new(0.0235, 0.0213, 0.1407, 0.0828))
    .text("MAIN MENU");

pub const MAIN_MENU_BUTTON: UiElement = UiElement::new("MAIN_MENU_BUTTON", "Hamburger button in the top right corner")
    .button_rect(Rect::new(0.9383, 0.0213, 0.9852, 0.0909))
    .image("main_menu_button.png");

pub const HOME_BUTTON: UiElement = UiElement::new("HOME_BUTTON", "House icon returning to the lobby")
    .button_rect(Rect::new(0.8867, 0.0213, 0.9305, 0.0909))
    .image("home_button.png");

pub const CONTENT_STATUS_LABEL: UiElement = UiElement::new("CONTENT_STATUS_LABEL", "Content status board header in the main menu")
    .text_rect(Rect::new(0.1953, 0.1432, 0.3726, 0.1953))
    .text("CONTENT STATUS");

pub const ENERGY_LABEL: UiElement = UiElement::new("ENERGY_LABEL", "Energy counter in the lobby header, e.g. 123/120")
    .text_rect(Rect::new(0.4156, 0.0247, 0.5023, 0.0703))
    .threshold(130)
    .characters("0123456789/");

pub const GOLD_LABEL: UiElement = UiElement::new("GOLD_LABEL", "Gold counter in the lobby header")
    .text_rect(Rect::new(0.5593, 0.0247, 0.6625, 0.0703))
    .threshold(130)
    .characters("0123456789,");

pub const OK_BUTTON: UiElement = UiElement::new("OK_BUTTON", "Generic confirmation button in dialogs")
    .text_rect(Rect::new(0.4625, 0.7865, 0.5375, 0.8359))
    .button_rect(Rect::new(0.4188, 0.7734, 0.5813, 0.8489))
    .text("OK");

pub const CLOSE_AD_BUTTON: UiElement = UiElement::new("CLOSE_AD_BUTTON", "Close cross on start-up advertisement popups")
    .button_rect(Rect::new(0.9328, 0.0703, 0.9789, 0.1484))
    .image("close_ad_button.png");

pub const TAP_TO_START_LABEL: UiElement = UiElement::new("TAP_TO_START_LABEL", "Prompt on the title screen after loading")
    .text_rect(Rect::new(0.3984, 0.8724, 0.6016, 0.9219))
    .button_rect(Rect::new(0.3, 0.6, 0.7, 0.95))
    .text("TAP TO START");

pub const QUEST_NOTIFICATION: UiElement = UiElement::new("QUEST_NOTIFICATION", "Exclamation badge on the quest list button")
    .button_rect(Rect::new(0.0219, 0.3177, 0.0641, 0.3906))
    .image("quest_notification.png");

pub const HEROIC_QUEST_TAB: UiElement = UiElement::new("HEROIC_QUEST_TAB", "Heroic quest tab in the quest list")
    .text_rect(Rect::new(0.0531, 0.2474, 0.2078, 0.2917))
    .button_rect(Rect::new(0.0375, 0.2344, 0.2234, 0.3047))
    .text("HEROIC QUEST");

pub const HEROIC_QUEST_ACQUIRE: UiElement = UiElement::new("HEROIC_QUEST_ACQUIRE", "Truncated acquire button on a completed heroic quest")
    .text_rect(Rect::new(0.8336, 0.3203, 0.8883, 0.3620))
    .button_rect(Rect::new(0.8125, 0.3021, 0.9094, 0.3802))
    .threshold(170)
    .text("ACQ");

pub const ACQUIRE_REWARD_BUTTON: UiElement = UiElement::new("ACQUIRE_REWARD_BUTTON", "Acquire button on the reward dialog")
    .text_rect(Rect::new(0.4375, 0.8229, 0.5625, 0.8724))
    .button_rect(Rect::new(0.3969, 0.8073, 0.6031, 0.8880))
    .text("ACQUIRE");

pub const DRAG_LEFT_ANCHOR: UiElement = UiElement::new("DRAG_LEFT_ANCHOR", "Start of a horizontal swipe in list views")
    .button_rect(Rect::new(0.2, 0.5, 0.2, 0.5));

pub const DRAG_RIGHT_ANCHOR: UiElement = UiElement::new("DRAG_RIGHT_ANCHOR", "End of a horizontal swipe in list views")
    .button_rect(Rect::new(0.8, 0.5, 0.8, 0.5));

pub const DRAG_UP_ANCHOR: UiElement = UiElement::new("DRAG_UP_ANCHOR", "Lower start point of a vertical scroll")
    .button_rect(Rect::new(0.5, 0.75, 0.5, 0.75));

pub const DRAG_DOWN_ANCHOR: UiElement = UiElement::new("DRAG_DOWN_ANCHOR", "Upper end point of a vertical scroll")
    .button_rect(Rect::new(0.5, 0.35, 0.5, 0.35));

pub const LOBBY_QUEST_BUTTON_OLD: UiElement = UiElement::new("LOBBY_QUEST_BUTTON_OLD", "[DEPRECATED] Quest button before the lobby redesign")
    .button_rect(Rect::new(0.0125, 0.4609, 0.0625, 0.5443))
    .text("QUEST");

/// Every element, including deprecated ones.
pub static ELEMENTS: &[UiElement] = &[
    MAIN_MENU_LABEL,
    MAIN_MENU_BUTTON,
    HOME_BUTTON,
    CONTENT_STATUS_LABEL,
    ENERGY_LABEL,
    GOLD_LABEL,
    OK_BUTTON,
    CLOSE_AD_BUTTON,
    TAP_TO_START_LABEL,
    QUEST_NOTIFICATION,
    HEROIC_QUEST_TAB,
    HEROIC_QUEST_ACQUIRE,
    ACQUIRE_REWARD_BUTTON,
    DRAG_LEFT_ANCHOR,
    DRAG_RIGHT_ANCHOR,
    DRAG_UP_ANCHOR,
    DRAG_DOWN_ANCHOR,
    LOBBY_QUEST_BUTTON_OLD,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::TesseractEngine;
    use crate::perception::{text_matches_expected, Perception};
    use crate::video::system_font;
    use ab_glyph::PxScale;
    use image::{Rgb, RgbImage};
    use imageproc::drawing::{draw_text_mut, text_size};

    /// Renders every text element's caption, white on a dark frame, into its
    /// OCR region and reads it back with Tesseract.
    #[test]
    #[ignore = "needs a Tesseract installation and a system font"]
    fn test_rendered_captions_read_back() {
        let font = system_font().expect("system font");
        let engine = TesseractEngine::locate().expect("tesseract");
        let perception = Perception::new(Box::new(engine), "missing".into());

        for element in crate::ui::active().filter(|e| e.text.is_some()) {
            let expected = element.text.unwrap();
            let mut frame = RgbImage::from_pixel(1280, 720, Rgb([30, 30, 30]));
            let region = element.ocr_rect().unwrap().to_pixels(1280, 720);

            let mut scale = PxScale::from(region.height() as f32 * 0.7);
            let (w, _) = text_size(scale, &font, expected);
            if w as f64 > region.width() * 0.9 {
                scale = PxScale::from(scale.y * (region.width() * 0.9 / w as f64) as f32);
            }
            let (w, h) = text_size(scale, &font, expected);
            let (cx, cy) = region.center();
            draw_text_mut(
                &mut frame,
                Rgb([255, 255, 255]),
                cx as i32 - w as i32 / 2,
                cy as i32 - h as i32 / 2,
                scale,
                &font,
                expected,
            );

            let read = perception.ocr_on_region(&frame, element).unwrap();
            assert!(
                text_matches_expected(&read, expected),
                "{}: read {:?}, expected {:?}",
                element.name,
                read,
                expected
            );
        }
    }
}
