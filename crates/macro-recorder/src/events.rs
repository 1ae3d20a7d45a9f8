//! Action and macro types
//!
//! Actions serialize to the flat JSON objects used by macro files:
//! `{"type":"mouse","event_type":"down","button":"left","position":[10,20],"timestamp":0.5}`

use serde::{Deserialize, Serialize};
use std::fmt;

/// Down or up edge of a button or key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Press {
    Down,
    Up,
}

/// Mouse button, serialized as its name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    /// Any other button, kept by name ("x1", "x2", "button8")
    Other(String),
}

impl From<String> for MouseButton {
    fn from(name: String) -> Self {
        match name.as_str() {
            "left" => MouseButton::Left,
            "right" => MouseButton::Right,
            "middle" => MouseButton::Middle,
            _ => MouseButton::Other(name),
        }
    }
}

impl From<&str> for MouseButton {
    fn from(name: &str) -> Self {
        MouseButton::from(name.to_string())
    }
}

impl From<MouseButton> for String {
    fn from(button: MouseButton) -> Self {
        match button {
            MouseButton::Other(name) => name,
            named => named.to_string(),
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
            MouseButton::Other(name) => name.as_str(),
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouseAction {
    pub event_type: Press,
    pub button: MouseButton,
    /// Screen coordinates of the cursor when the button changed
    pub position: (i32, i32),
    /// Seconds since recording start
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyboardAction {
    pub event_type: Press,
    /// Symbolic key name, e.g. "a", "enter", "shift", "unknown:42"
    pub key: String,
    /// Seconds since recording start
    pub timestamp: f64,
}

/// One recorded input event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    Mouse(MouseAction),
    Keyboard(KeyboardAction),
}

impl Action {
    pub fn mouse(event_type: Press, button: MouseButton, position: (i32, i32), timestamp: f64) -> Self {
        Action::Mouse(MouseAction {
            event_type,
            button,
            position,
            timestamp,
        })
    }

    pub fn key(event_type: Press, key: impl Into<String>, timestamp: f64) -> Self {
        Action::Keyboard(KeyboardAction {
            event_type,
            key: key.into(),
            timestamp,
        })
    }

    pub fn timestamp(&self) -> f64 {
        match self {
            Action::Mouse(m) => m.timestamp,
            Action::Keyboard(k) => k.timestamp,
        }
    }

    pub fn event_type(&self) -> Press {
        match self {
            Action::Mouse(m) => m.event_type,
            Action::Keyboard(k) => k.event_type,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Mouse(m) => write!(
                f,
                "{:>8.3}s mouse {} {:?} at ({}, {})",
                m.timestamp, m.button, m.event_type, m.position.0, m.position.1
            ),
            Action::Keyboard(k) => write!(
                f,
                "{:>8.3}s key {} {:?}",
                k.timestamp, k.key, k.event_type
            ),
        }
    }
}

/// A recorded macro - an ordered list of actions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Macro {
    pub actions: Vec<Action>,
}

impl Macro {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Action> {
        self.actions.iter()
    }

    /// Largest timestamp in the macro, 0 when empty
    pub fn duration(&self) -> f64 {
        self.actions
            .iter()
            .map(Action::timestamp)
            .fold(0.0, f64::max)
    }

    /// Copy of the actions in ascending timestamp order. Ties keep their relative order.
    pub fn sorted(&self) -> Vec<Action> {
        let mut sorted = self.actions.clone();
        sorted.sort_by(|a, b| a.timestamp().total_cmp(&b.timestamp()));
        sorted
    }

    pub fn summary(&self) -> Summary {
        let mut s = Summary::default();
        for a in &self.actions {
            match (a, a.event_type()) {
                (Action::Mouse(_), Press::Down) => s.mouse_down += 1,
                (Action::Mouse(_), Press::Up) => s.mouse_up += 1,
                (Action::Keyboard(_), Press::Down) => s.key_down += 1,
                (Action::Keyboard(_), Press::Up) => s.key_up += 1,
            }
        }
        s
    }
}

impl From<Vec<Action>> for Macro {
    fn from(actions: Vec<Action>) -> Self {
        Self { actions }
    }
}

impl FromIterator<Action> for Macro {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        Self {
            actions: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Macro {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub mouse_down: usize,
    pub mouse_up: usize,
    pub key_down: usize,
    pub key_up: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mouse_action_json_shape() {
        let a = Action::mouse(Press::Down, MouseButton::Left, (10, 20), 0.5);
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(
            v,
            json!({"type": "mouse", "event_type": "down", "button": "left", "position": [10, 20], "timestamp": 0.5})
        );
    }

    #[test]
    fn keyboard_action_has_no_mouse_fields() {
        let a = Action::key(Press::Up, "enter", 1.25);
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(
            v,
            json!({"type": "keyboard", "event_type": "up", "key": "enter", "timestamp": 1.25})
        );
    }

    #[test]
    fn other_button_names_survive_a_reload() {
        let raw = json!({
            "type": "mouse", "event_type": "up", "button": "x2", "position": [1, 2], "timestamp": 0.0
        });
        let a: Action = serde_json::from_value(raw.clone()).unwrap();
        match &a {
            Action::Mouse(m) => assert_eq!(m.button, MouseButton::Other("x2".into())),
            _ => panic!("expected mouse action"),
        }
        assert_eq!(serde_json::to_value(&a).unwrap(), raw);
        assert_eq!(MouseButton::from("middle"), MouseButton::Middle);
    }

    #[test]
    fn sorted_is_stable_and_leaves_original() {
        let m: Macro = vec![
            Action::key(Press::Down, "c", 5.0),
            Action::key(Press::Down, "a", 1.0),
            Action::key(Press::Down, "b", 3.0),
            Action::key(Press::Up, "a", 1.0),
        ]
        .into();

        let keys: Vec<_> = m
            .sorted()
            .into_iter()
            .map(|a| match a {
                Action::Keyboard(k) => (k.key, k.event_type),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                ("a".to_string(), Press::Down),
                ("a".to_string(), Press::Up),
                ("b".to_string(), Press::Down),
                ("c".to_string(), Press::Down),
            ]
        );
        assert_eq!(m.actions[0].timestamp(), 5.0);
    }

    #[test]
    fn duration_and_summary() {
        let m: Macro = vec![
            Action::mouse(Press::Down, MouseButton::Left, (0, 0), 0.1),
            Action::mouse(Press::Up, MouseButton::Left, (0, 0), 0.2),
            Action::key(Press::Down, "a", 0.7),
        ]
        .into();
        assert_eq!(m.duration(), 0.7);
        assert_eq!(
            m.summary(),
            Summary { mouse_down: 1, mouse_up: 1, key_down: 1, key_up: 0 }
        );
        assert_eq!(Macro::new().duration(), 0.0);
    }
}
