//! Parsing of untrusted action payloads into [`Action`].
//!
//! Oracles describe actions as loosely-typed JSON objects tagged by `type`
//! (or `kind`). Every kind has a fixed set of required fields; anything that
//! does not match is rejected here, before it can reach a surface.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ActionError;
use crate::types::{Action, MouseButton, Point};

/// Action descriptor exactly as received from an oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawAction(pub Value);

impl RawAction {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Kind tag as sent, for logging rejected payloads.
    pub fn kind_hint(&self) -> Option<&str> {
        self.0
            .get("type")
            .or_else(|| self.0.get("kind"))
            .and_then(Value::as_str)
    }

    pub fn parse(&self) -> Result<Action, ActionError> {
        Action::from_raw(&self.0)
    }
}

impl From<Value> for RawAction {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl Action {
    /// Parse and validate a raw action object.
    pub fn from_raw(value: &Value) -> Result<Action, ActionError> {
        let object = value
            .as_object()
            .ok_or_else(|| ActionError::Malformed(format!("expected an object, got {value}")))?;

        let tag = object
            .get("type")
            .or_else(|| object.get("kind"))
            .ok_or_else(|| ActionError::Malformed("missing 'type' tag".to_string()))?
            .as_str()
            .ok_or_else(|| ActionError::Malformed("'type' tag must be a string".to_string()))?;

        let fields = Fields { kind: tag, object };

        let action = match tag {
            "click" => Action::Click {
                x: fields.int("x")?,
                y: fields.int("y")?,
                button: fields.button()?,
            },
            "double_click" => Action::DoubleClick {
                x: fields.int("x")?,
                y: fields.int("y")?,
            },
            "move" => Action::Move {
                x: fields.int("x")?,
                y: fields.int("y")?,
            },
            "drag" => Action::Drag {
                path: fields.path()?,
            },
            "type" | "type_text" => Action::TypeText {
                text: fields.string("text")?,
            },
            "keypress" | "key_sequence" => Action::KeySequence {
                keys: fields.keys()?,
            },
            "scroll" => Action::Scroll {
                x: fields.int("x")?,
                y: fields.int("y")?,
                delta_x: fields.int_alias("scroll_x", "delta_x")?,
                delta_y: fields.int_alias("scroll_y", "delta_y")?,
            },
            "wait" => Action::Wait,
            "screenshot" => Action::Screenshot,
            other => return Err(ActionError::UnknownKind(other.to_string())),
        };

        action.validate()?;
        Ok(action)
    }
}

struct Fields<'a> {
    kind: &'a str,
    object: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn int(&self, field: &'static str) -> Result<i32, ActionError> {
        let value = self
            .object
            .get(field)
            .filter(|value| !value.is_null())
            .ok_or_else(|| ActionError::missing(self.kind, field))?;
        as_i32(value).ok_or_else(|| {
            ActionError::invalid(self.kind, field, format!("expected an integer, got {value}"))
        })
    }

    /// Integer field accepted under either of two names; the first wins.
    fn int_alias(&self, primary: &'static str, alias: &'static str) -> Result<i32, ActionError> {
        if self.present(primary) {
            self.int(primary)
        } else if self.present(alias) {
            self.int(alias)
        } else {
            Err(ActionError::missing(self.kind, primary))
        }
    }

    fn present(&self, field: &str) -> bool {
        self.object.get(field).is_some_and(|value| !value.is_null())
    }

    fn string(&self, field: &'static str) -> Result<String, ActionError> {
        match self.object.get(field) {
            None | Some(Value::Null) => Err(ActionError::missing(self.kind, field)),
            Some(Value::String(text)) => Ok(text.clone()),
            Some(other) => Err(ActionError::invalid(
                self.kind,
                field,
                format!("expected a string, got {other}"),
            )),
        }
    }

    fn button(&self) -> Result<MouseButton, ActionError> {
        match self.object.get("button") {
            None | Some(Value::Null) => Ok(MouseButton::Left),
            Some(Value::String(name)) => MouseButton::parse(name).ok_or_else(|| {
                ActionError::invalid(self.kind, "button", format!("unknown button '{name}'"))
            }),
            Some(other) => Err(ActionError::invalid(
                self.kind,
                "button",
                format!("expected a string, got {other}"),
            )),
        }
    }

    fn keys(&self) -> Result<Vec<String>, ActionError> {
        let items = match self.object.get("keys") {
            None | Some(Value::Null) => return Err(ActionError::missing(self.kind, "keys")),
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(ActionError::invalid(
                    self.kind,
                    "keys",
                    format!("expected an array, got {other}"),
                ))
            }
        };

        items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ActionError::invalid(
                        self.kind,
                        "keys",
                        format!("expected string key identifiers, got {item}"),
                    )
                })
            })
            .collect()
    }

    fn path(&self) -> Result<Vec<Point>, ActionError> {
        let items = match self.object.get("path") {
            None | Some(Value::Null) => return Err(ActionError::missing(self.kind, "path")),
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(ActionError::invalid(
                    self.kind,
                    "path",
                    format!("expected an array, got {other}"),
                ))
            }
        };

        items
            .iter()
            .map(|item| {
                let x = item.get("x").and_then(as_i32);
                let y = item.get("y").and_then(as_i32);
                match (x, y) {
                    (Some(x), Some(y)) => Ok(Point::new(x, y)),
                    _ => Err(ActionError::invalid(
                        self.kind,
                        "path",
                        format!("expected {{x, y}} integer points, got {item}"),
                    )),
                }
            })
            .collect()
    }
}

/// Integers, and floats without a fractional part, that fit in `i32`.
fn as_i32(value: &Value) -> Option<i32> {
    if let Some(int) = value.as_i64() {
        return i32::try_from(int).ok();
    }
    let float = value.as_f64()?;
    if float.fract() != 0.0 || float < i32::MIN as f64 || float > i32::MAX as f64 {
        return None;
    }
    Some(float as i32)
}
