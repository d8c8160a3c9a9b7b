//! WebDriver key codes, as sent through `send_keys`.

/// Private-use code points the WebDriver protocol assigns to special keys.
pub struct Keys;

impl Keys {
    pub const NULL: &'static str = "\u{E000}";
    pub const BACKSPACE: &'static str = "\u{E003}";
    pub const TAB: &'static str = "\u{E004}";
    pub const RETURN: &'static str = "\u{E006}";
    pub const ENTER: &'static str = "\u{E007}";
    pub const SHIFT: &'static str = "\u{E008}";
    pub const ESCAPE: &'static str = "\u{E00C}";
    pub const SPACE: &'static str = "\u{E00D}";

    /// Whether `keys` is a single press of the enter or return key.
    pub(crate) fn is_enter(keys: &str) -> bool {
        keys == "\n" || keys == Self::ENTER || keys == Self::RETURN
    }
}
