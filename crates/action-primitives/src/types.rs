//! Core data types for action primitives

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use paperpilot_core_types::ActionId;
use serde::{Deserialize, Serialize};

use crate::errors::ActionError;

/// Pointer button used by click actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
    Back,
    Forward,
    /// Wheel button, clicked like `Middle` on most surfaces.
    Wheel,
}

impl MouseButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
            MouseButton::Back => "back",
            MouseButton::Forward => "forward",
            MouseButton::Wheel => "wheel",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Some(MouseButton::Left),
            "right" => Some(MouseButton::Right),
            "middle" => Some(MouseButton::Middle),
            "back" => Some(MouseButton::Back),
            "forward" => Some(MouseButton::Forward),
            "wheel" => Some(MouseButton::Wheel),
            _ => None,
        }
    }
}

/// Surface coordinate in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A single discrete instruction to perform against a surface.
///
/// Exactly one kind per action; the kind's parameters are carried inline so an
/// `Action` value can never be missing a required field. Values built by hand
/// should still go through [`Action::validate`] before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Move the pointer and click.
    Click {
        x: i32,
        y: i32,
        #[serde(default)]
        button: MouseButton,
    },
    /// Move the pointer and issue a primary double click.
    DoubleClick { x: i32, y: i32 },
    /// Move the pointer without clicking.
    Move { x: i32, y: i32 },
    /// Press at the first point, move through the rest, release at the last.
    Drag { path: Vec<Point> },
    /// Emit literal text at the current focus.
    TypeText { text: String },
    /// Press each key in order.
    KeySequence { keys: Vec<String> },
    /// Position the pointer, then scroll by a relative delta.
    Scroll {
        x: i32,
        y: i32,
        delta_x: i32,
        delta_y: i32,
    },
    /// Pause for the configured interval without touching the surface.
    Wait,
    /// Request a fresh frame only.
    Screenshot,
}

/// Discriminant of [`Action`], used in logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    DoubleClick,
    Move,
    Drag,
    TypeText,
    KeySequence,
    Scroll,
    Wait,
    Screenshot,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::DoubleClick => "double_click",
            ActionKind::Move => "move",
            ActionKind::Drag => "drag",
            ActionKind::TypeText => "type_text",
            ActionKind::KeySequence => "key_sequence",
            ActionKind::Scroll => "scroll",
            ActionKind::Wait => "wait",
            ActionKind::Screenshot => "screenshot",
        }
    }

    /// Whether executing this kind sends input to the surface.
    pub fn touches_surface(&self) -> bool {
        !matches!(self, ActionKind::Wait | ActionKind::Screenshot)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Click { .. } => ActionKind::Click,
            Action::DoubleClick { .. } => ActionKind::DoubleClick,
            Action::Move { .. } => ActionKind::Move,
            Action::Drag { .. } => ActionKind::Drag,
            Action::TypeText { .. } => ActionKind::TypeText,
            Action::KeySequence { .. } => ActionKind::KeySequence,
            Action::Scroll { .. } => ActionKind::Scroll,
            Action::Wait => ActionKind::Wait,
            Action::Screenshot => ActionKind::Screenshot,
        }
    }

    /// Convenience constructor for a primary click.
    pub fn click(x: i32, y: i32) -> Self {
        Action::Click {
            x,
            y,
            button: MouseButton::Left,
        }
    }

    /// Check the invariants the type system cannot express.
    pub fn validate(&self) -> Result<(), ActionError> {
        let kind = self.kind().as_str();
        match self {
            Action::Drag { path } if path.len() < 2 => Err(ActionError::invalid(
                kind,
                "path",
                format!("needs at least 2 points, got {}", path.len()),
            )),
            Action::KeySequence { keys } if keys.is_empty() => {
                Err(ActionError::invalid(kind, "keys", "must not be empty"))
            }
            Action::KeySequence { keys } if keys.iter().any(|key| key.trim().is_empty()) => Err(
                ActionError::invalid(kind, "keys", "key identifiers must not be blank"),
            ),
            _ => Ok(()),
        }
    }

    /// Short human-readable description for logs and history. Typed text is
    /// summarised by length only.
    pub fn summary(&self) -> String {
        match self {
            Action::Click { x, y, button } => format!("click({x}, {y}, {})", button.as_str()),
            Action::DoubleClick { x, y } => format!("double_click({x}, {y})"),
            Action::Move { x, y } => format!("move({x}, {y})"),
            Action::Drag { path } => format!("drag({} points)", path.len()),
            Action::TypeText { text } => format!("type_text({} chars)", text.chars().count()),
            Action::KeySequence { keys } => format!("key_sequence({})", keys.join("+")),
            Action::Scroll {
                x,
                y,
                delta_x,
                delta_y,
            } => format!("scroll({x}, {y}, {delta_x}, {delta_y})"),
            Action::Wait => "wait".to_string(),
            Action::Screenshot => "screenshot".to_string(),
        }
    }
}

/// Image encoding of a captured frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameFormat {
    #[default]
    Png,
    Jpeg,
}

impl FrameFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            FrameFormat::Png => "image/png",
            FrameFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Visual snapshot of a surface at one instant.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Vec<u8>,
    pub format: FrameFormat,
    /// Location of the surface when captured, if the surface knows one.
    pub url: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(data: Vec<u8>, format: FrameFormat) -> Self {
        Self {
            data,
            format,
            url: None,
            captured_at: Utc::now(),
        }
    }

    pub fn png(data: Vec<u8>) -> Self {
        Self::new(data, FrameFormat::Png)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// Encode as a `data:` URL suitable for image inputs.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.format.mime_type(), self.to_base64())
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("bytes", &self.data.len())
            .field("format", &self.format)
            .field("url", &self.url)
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

/// Report produced for every executed action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReport {
    pub action_id: ActionId,
    pub kind: ActionKind,

    /// When the action started
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    /// Total latency in milliseconds, quiescence wait included
    pub latency_ms: u64,

    /// Whether input was sent to the surface
    pub dispatched: bool,

    /// Whether the surface settled before the quiescence timeout
    pub quiescent: bool,
}
