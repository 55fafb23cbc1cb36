//! Key names to `Input.dispatchKeyEvent` parameters.

use serde_json::{json, Value};

/// Everything `Input.dispatchKeyEvent` needs to press one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    pub key: String,
    pub code: String,
    pub key_code: i64,
    /// Text the key produces, if any.
    pub text: Option<String>,
}

impl KeySpec {
    fn named(key: &str, code: &str, key_code: i64) -> Self {
        Self {
            key: key.to_string(),
            code: code.to_string(),
            key_code,
            text: None,
        }
    }

    fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    /// CDP modifier bit this key sets while held (Alt=1, Ctrl=2, Meta=4, Shift=8).
    pub fn modifier_bit(&self) -> i64 {
        match self.key.as_str() {
            "Alt" => 1,
            "Control" => 2,
            "Meta" => 4,
            "Shift" => 8,
            _ => 0,
        }
    }

    /// `keyDown` for keys that produce text, `rawKeyDown` for the rest.
    ///
    /// Text is suppressed while Alt, Ctrl or Meta is held so chords such as
    /// `CTRL+A` reach the page as shortcuts.
    pub fn down_event(&self, modifiers: i64) -> Value {
        let mut params = self.base("rawKeyDown", modifiers);
        if let Some(text) = &self.text {
            if modifiers & 0b0111 == 0 {
                params["type"] = json!("keyDown");
                params["text"] = json!(text);
                params["unmodifiedText"] = json!(text);
            }
        }
        params
    }

    pub fn up_event(&self, modifiers: i64) -> Value {
        self.base("keyUp", modifiers)
    }

    fn base(&self, kind: &str, modifiers: i64) -> Value {
        json!({
            "type": kind,
            "key": self.key,
            "code": self.code,
            "windowsVirtualKeyCode": self.key_code,
            "nativeVirtualKeyCode": self.key_code,
            "modifiers": modifiers,
        })
    }
}

/// Resolve a key name such as `ENTER`, `ctrl`, `ArrowLeft`, `F5` or `a`.
///
/// Names are matched case-insensitively; single characters map to themselves.
pub fn resolve_key(name: &str) -> Option<KeySpec> {
    let trimmed = name.trim();
    let mut chars = trimmed.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        return Some(single_char(ch));
    }
    if trimmed.is_empty() {
        return None;
    }

    let upper = trimmed.to_ascii_uppercase();
    let spec = match upper.as_str() {
        "ENTER" | "RETURN" => KeySpec::named("Enter", "Enter", 13).with_text("\r"),
        "TAB" => KeySpec::named("Tab", "Tab", 9),
        "ESC" | "ESCAPE" => KeySpec::named("Escape", "Escape", 27),
        "BACKSPACE" => KeySpec::named("Backspace", "Backspace", 8),
        "DELETE" | "DEL" => KeySpec::named("Delete", "Delete", 46),
        "INSERT" => KeySpec::named("Insert", "Insert", 45),
        "SPACE" => KeySpec::named(" ", "Space", 32).with_text(" "),
        "UP" | "ARROWUP" => KeySpec::named("ArrowUp", "ArrowUp", 38),
        "DOWN" | "ARROWDOWN" => KeySpec::named("ArrowDown", "ArrowDown", 40),
        "LEFT" | "ARROWLEFT" => KeySpec::named("ArrowLeft", "ArrowLeft", 37),
        "RIGHT" | "ARROWRIGHT" => KeySpec::named("ArrowRight", "ArrowRight", 39),
        "HOME" => KeySpec::named("Home", "Home", 36),
        "END" => KeySpec::named("End", "End", 35),
        "PAGEUP" => KeySpec::named("PageUp", "PageUp", 33),
        "PAGEDOWN" => KeySpec::named("PageDown", "PageDown", 34),
        "SHIFT" => KeySpec::named("Shift", "ShiftLeft", 16),
        "CTRL" | "CONTROL" => KeySpec::named("Control", "ControlLeft", 17),
        "ALT" | "OPTION" => KeySpec::named("Alt", "AltLeft", 18),
        "META" | "CMD" | "COMMAND" | "SUPER" | "WIN" => KeySpec::named("Meta", "MetaLeft", 91),
        "CAPSLOCK" => KeySpec::named("CapsLock", "CapsLock", 20),
        other => return function_key(other),
    };
    Some(spec)
}

fn function_key(upper: &str) -> Option<KeySpec> {
    let number: i64 = upper.strip_prefix('F')?.parse().ok()?;
    if !(1..=12).contains(&number) {
        return None;
    }
    let name = format!("F{number}");
    Some(KeySpec::named(&name, &name, 111 + number))
}

fn single_char(ch: char) -> KeySpec {
    let text = ch.to_string();
    let (code, key_code) = if ch.is_ascii_alphabetic() {
        let upper = ch.to_ascii_uppercase();
        (format!("Key{upper}"), upper as i64)
    } else if ch.is_ascii_digit() {
        (format!("Digit{ch}"), ch as i64)
    } else if ch == ' ' {
        ("Space".to_string(), 32)
    } else {
        (String::new(), 0)
    };
    KeySpec {
        key: text.clone(),
        code,
        key_code,
        text: Some(text),
    }
}
