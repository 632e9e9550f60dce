//! Key and mouse-button names, and their Win32 virtual-key codes.
//!
//! Names are lowercase (`"a"`, `"f7"`, `"space"`, `"page up"`); a few common
//! spellings (`"return"`, `"escape"`, `"control"`) are accepted as aliases.
//! Codes without a name round-trip as `"vk0x<hex>"`.

const NAMED: &[(&str, u16)] = &[
    ("backspace", 0x08),
    ("tab", 0x09),
    ("enter", 0x0D),
    ("shift", 0x10),
    ("ctrl", 0x11),
    ("alt", 0x12),
    ("pause", 0x13),
    ("caps lock", 0x14),
    ("esc", 0x1B),
    ("space", 0x20),
    ("page up", 0x21),
    ("page down", 0x22),
    ("end", 0x23),
    ("home", 0x24),
    ("left", 0x25),
    ("up", 0x26),
    ("right", 0x27),
    ("down", 0x28),
    ("print screen", 0x2C),
    ("insert", 0x2D),
    ("delete", 0x2E),
    ("windows", 0x5B),
    ("menu", 0x5D),
    ("multiply", 0x6A),
    ("add", 0x6B),
    ("separator", 0x6C),
    ("subtract", 0x6D),
    ("decimal", 0x6E),
    ("divide", 0x6F),
    ("num lock", 0x90),
    ("scroll lock", 0x91),
    (";", 0xBA),
    ("=", 0xBB),
    (",", 0xBC),
    ("-", 0xBD),
    (".", 0xBE),
    ("/", 0xBF),
    ("`", 0xC0),
    ("[", 0xDB),
    ("\\", 0xDC),
    ("]", 0xDD),
    ("'", 0xDE),
    ("oem 102", 0xE2),
    ("browser back", 0xA6),
    ("browser forward", 0xA7),
    ("browser refresh", 0xA8),
    ("browser stop", 0xA9),
    ("browser search", 0xAA),
    ("browser favorites", 0xAB),
    ("browser home", 0xAC),
    ("volume mute", 0xAD),
    ("volume down", 0xAE),
    ("volume up", 0xAF),
    ("next track", 0xB0),
    ("previous track", 0xB1),
    ("stop media", 0xB2),
    ("play pause", 0xB3),
];

// left/right variants reported by low-level hooks
const SIDED: &[(u16, &str)] = &[
    (0xA0, "shift"),
    (0xA1, "shift"),
    (0xA2, "ctrl"),
    (0xA3, "ctrl"),
    (0xA4, "alt"),
    (0xA5, "alt"),
    (0x5C, "windows"),
];

const ALIASES: &[(&str, &str)] = &[
    ("return", "enter"),
    ("escape", "esc"),
    ("del", "delete"),
    ("ins", "insert"),
    ("control", "ctrl"),
    ("win", "windows"),
    ("super", "windows"),
    ("cmd", "windows"),
    ("spacebar", "space"),
    ("capslock", "caps lock"),
    ("pgup", "page up"),
    ("pageup", "page up"),
    ("pgdn", "page down"),
    ("pagedown", "page down"),
    ("prtsc", "print screen"),
    ("mute", "volume mute"),
    ("play/pause", "play pause"),
];

/// Lowercases a key name and resolves aliases.
pub fn normalize(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or(lower)
}

/// Virtual-key code for a key name.
pub fn key_code(name: &str) -> Option<u16> {
    let name = normalize(name);

    if let Some(code) = function_key(&name).or_else(|| numpad_key(&name)).or_else(|| raw_key(&name)) {
        return Some(code);
    }

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.clone().next()) {
        match c {
            'a'..='z' => return Some(0x41 + (c as u16 - 'a' as u16)),
            '0'..='9' => return Some(0x30 + (c as u16 - '0' as u16)),
            _ => {}
        }
    }

    NAMED
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, code)| *code)
}

/// Key name for a virtual-key code, as recorded by the capture hook. Every
/// code gets a name that [`key_code`] maps back to the same code.
pub fn key_name(code: u16) -> String {
    match code {
        0x41..=0x5A => return char::from(b'a' + (code - 0x41) as u8).to_string(),
        0x30..=0x39 => return char::from(b'0' + (code - 0x30) as u8).to_string(),
        0x60..=0x69 => return format!("numpad {}", code - 0x60),
        0x70..=0x87 => return format!("f{}", code - 0x70 + 1),
        _ => {}
    }

    SIDED
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .or_else(|| NAMED.iter().find(|(_, c)| *c == code).map(|(name, _)| *name))
        .map_or_else(|| format!("vk0x{code:02x}"), str::to_string)
}

pub fn is_known_key(name: &str) -> bool {
    key_code(name).is_some()
}

fn function_key(name: &str) -> Option<u16> {
    let number: u16 = name.strip_prefix('f')?.parse().ok()?;
    (1..=24).contains(&number).then(|| 0x70 + number - 1)
}

fn numpad_key(name: &str) -> Option<u16> {
    let digit: u16 = name.strip_prefix("numpad ")?.trim().parse().ok()?;
    (digit <= 9).then(|| 0x60 + digit)
}

// "vk0x60" style names for codes with no table entry
fn raw_key(name: &str) -> Option<u16> {
    let code = u16::from_str_radix(name.strip_prefix("vk0x")?, 16).ok()?;
    (1..=0xFE).contains(&code).then_some(code)
}

/// A mouse button as named in recorded events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Left,
    Right,
    Middle,
    X1,
    X2,
}

impl Button {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Button::Left),
            "right" => Some(Button::Right),
            "middle" => Some(Button::Middle),
            "x1" | "x" => Some(Button::X1),
            "x2" => Some(Button::X2),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Button::Left => "left",
            Button::Right => "right",
            Button::Middle => "middle",
            Button::X1 => "x1",
            Button::X2 => "x2",
        }
    }
}
