//! Symbolic names for rdev keys and buttons
//!
//! Names are lowercase and human readable ("a", "enter", "right shift").
//! Keys rdev cannot identify round-trip as "unknown:<code>".

use crate::events::MouseButton;
use rdev::{Button, Key};

const KEYS: &[(Key, &str)] = &[
    // Letters
    (Key::KeyA, "a"), (Key::KeyB, "b"), (Key::KeyC, "c"), (Key::KeyD, "d"),
    (Key::KeyE, "e"), (Key::KeyF, "f"), (Key::KeyG, "g"), (Key::KeyH, "h"),
    (Key::KeyI, "i"), (Key::KeyJ, "j"), (Key::KeyK, "k"), (Key::KeyL, "l"),
    (Key::KeyM, "m"), (Key::KeyN, "n"), (Key::KeyO, "o"), (Key::KeyP, "p"),
    (Key::KeyQ, "q"), (Key::KeyR, "r"), (Key::KeyS, "s"), (Key::KeyT, "t"),
    (Key::KeyU, "u"), (Key::KeyV, "v"), (Key::KeyW, "w"), (Key::KeyX, "x"),
    (Key::KeyY, "y"), (Key::KeyZ, "z"),
    // Digits
    (Key::Num0, "0"), (Key::Num1, "1"), (Key::Num2, "2"), (Key::Num3, "3"),
    (Key::Num4, "4"), (Key::Num5, "5"), (Key::Num6, "6"), (Key::Num7, "7"),
    (Key::Num8, "8"), (Key::Num9, "9"),
    // Punctuation
    (Key::BackQuote, "`"), (Key::Minus, "-"), (Key::Equal, "="),
    (Key::LeftBracket, "["), (Key::RightBracket, "]"), (Key::BackSlash, "\\"),
    (Key::IntlBackslash, "intl backslash"), (Key::SemiColon, ";"), (Key::Quote, "'"),
    (Key::Comma, ","), (Key::Dot, "."), (Key::Slash, "/"),
    // Whitespace and editing
    (Key::Space, "space"), (Key::Tab, "tab"), (Key::Return, "enter"),
    (Key::Backspace, "backspace"), (Key::Delete, "delete"), (Key::Insert, "insert"),
    (Key::Escape, "esc"),
    // Modifiers
    (Key::ShiftLeft, "shift"), (Key::ShiftRight, "right shift"),
    (Key::ControlLeft, "ctrl"), (Key::ControlRight, "right ctrl"),
    (Key::Alt, "alt"), (Key::AltGr, "alt gr"),
    (Key::MetaLeft, "meta"), (Key::MetaRight, "right meta"),
    (Key::CapsLock, "caps lock"), (Key::Function, "fn"),
    // Navigation
    (Key::UpArrow, "up"), (Key::DownArrow, "down"),
    (Key::LeftArrow, "left"), (Key::RightArrow, "right"),
    (Key::Home, "home"), (Key::End, "end"),
    (Key::PageUp, "page up"), (Key::PageDown, "page down"),
    // Function row
    (Key::F1, "f1"), (Key::F2, "f2"), (Key::F3, "f3"), (Key::F4, "f4"),
    (Key::F5, "f5"), (Key::F6, "f6"), (Key::F7, "f7"), (Key::F8, "f8"),
    (Key::F9, "f9"), (Key::F10, "f10"), (Key::F11, "f11"), (Key::F12, "f12"),
    (Key::PrintScreen, "print screen"), (Key::ScrollLock, "scroll lock"),
    (Key::Pause, "pause"), (Key::NumLock, "num lock"),
    // Keypad
    (Key::Kp0, "keypad 0"), (Key::Kp1, "keypad 1"), (Key::Kp2, "keypad 2"),
    (Key::Kp3, "keypad 3"), (Key::Kp4, "keypad 4"), (Key::Kp5, "keypad 5"),
    (Key::Kp6, "keypad 6"), (Key::Kp7, "keypad 7"), (Key::Kp8, "keypad 8"),
    (Key::Kp9, "keypad 9"), (Key::KpReturn, "keypad enter"),
    (Key::KpMinus, "keypad -"), (Key::KpPlus, "keypad +"),
    (Key::KpMultiply, "keypad *"), (Key::KpDivide, "keypad /"),
    (Key::KpDelete, "keypad delete"),
];

const UNKNOWN_PREFIX: &str = "unknown:";

pub fn key_name(key: Key) -> String {
    if let Key::Unknown(code) = key {
        return format!("{}{}", UNKNOWN_PREFIX, code);
    }
    KEYS.iter()
        .find(|(k, _)| *k == key)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("{:?}", key).to_lowercase())
}

pub fn key_from_name(name: &str) -> Option<Key> {
    let name = name.trim().to_lowercase();
    if let Some(code) = name.strip_prefix(UNKNOWN_PREFIX) {
        return code.parse().ok().map(Key::Unknown);
    }
    // Aliases seen in hand-edited macro files
    let name = match name.as_str() {
        "return" => "enter",
        "escape" => "esc",
        "control" | "left ctrl" => "ctrl",
        "left shift" => "shift",
        "cmd" | "command" | "windows" | "left windows" => "meta",
        "option" => "alt",
        other => other,
    };
    KEYS.iter().find(|(_, n)| *n == name).map(|(k, _)| *k)
}

/// Side buttons as rdev reports them on this platform
#[cfg(target_os = "windows")]
const SIDE_BUTTONS: &[(u8, &str)] = &[(1, "x1"), (2, "x2")];
#[cfg(target_os = "linux")]
const SIDE_BUTTONS: &[(u8, &str)] = &[(8, "x1"), (9, "x2")];
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
const SIDE_BUTTONS: &[(u8, &str)] = &[];

pub fn button_from_rdev(button: Button) -> MouseButton {
    match button {
        Button::Left => MouseButton::Left,
        Button::Right => MouseButton::Right,
        Button::Middle => MouseButton::Middle,
        Button::Unknown(code) => {
            let name = SIDE_BUTTONS
                .iter()
                .find(|(c, _)| *c == code)
                .map(|(_, n)| n.to_string())
                .unwrap_or_else(|| format!("button{}", code));
            MouseButton::Other(name)
        }
    }
}

pub fn button_to_rdev(button: &MouseButton) -> Option<Button> {
    match button {
        MouseButton::Left => Some(Button::Left),
        MouseButton::Right => Some(Button::Right),
        MouseButton::Middle => Some(Button::Middle),
        MouseButton::Other(name) => SIDE_BUTTONS
            .iter()
            .find(|(_, n)| n == name)
            .map(|(c, _)| Button::Unknown(*c))
            .or_else(|| name.strip_prefix("button")?.parse().ok().map(Button::Unknown)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_named_key_round_trips() {
        for (key, name) in KEYS {
            assert_eq!(key_name(*key), *name);
            assert_eq!(key_from_name(name), Some(*key), "{}", name);
        }
    }

    #[test]
    fn unknown_codes_round_trip() {
        assert_eq!(key_name(Key::Unknown(179)), "unknown:179");
        assert_eq!(key_from_name("unknown:179"), Some(Key::Unknown(179)));
        assert_eq!(key_from_name("unknown:x"), None);
    }

    #[test]
    fn aliases() {
        assert_eq!(key_from_name("Return"), Some(Key::Return));
        assert_eq!(key_from_name("cmd"), Some(Key::MetaLeft));
        assert_eq!(key_from_name("no such key"), None);
    }

    #[test]
    fn extra_buttons_keep_their_code() {
        let b = button_from_rdev(Button::Unknown(42));
        assert_eq!(b, MouseButton::Other("button42".into()));
        assert_eq!(button_to_rdev(&b), Some(Button::Unknown(42)));

        for (code, name) in SIDE_BUTTONS {
            assert_eq!(button_from_rdev(Button::Unknown(*code)), MouseButton::from(*name));
            assert_eq!(button_to_rdev(&MouseButton::from(*name)), Some(Button::Unknown(*code)));
        }
        assert_eq!(button_to_rdev(&MouseButton::from("thumb")), None);
    }
}
