//! Console keypad: the ten physical keys and a pressed-state bitmask.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::StreamError;

// ── Key ──────────────────────────────────────────────────────────

/// One physical key of the emulated console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    A,
    B,
    L,
    R,
    #[serde(rename = "select")]
    Select,
    #[serde(rename = "start")]
    Start,
    #[serde(rename = "left")]
    Left,
    #[serde(rename = "right")]
    Right,
    #[serde(rename = "up")]
    Up,
    #[serde(rename = "down")]
    Down,
}

impl Key {
    pub const ALL: [Key; 10] = [
        Key::A,
        Key::B,
        Key::L,
        Key::R,
        Key::Select,
        Key::Start,
        Key::Left,
        Key::Right,
        Key::Up,
        Key::Down,
    ];

    /// Wire name, as used in `keyAction.key`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Key::A => "A",
            Key::B => "B",
            Key::L => "L",
            Key::R => "R",
            Key::Select => "select",
            Key::Start => "start",
            Key::Left => "left",
            Key::Right => "right",
            Key::Up => "up",
            Key::Down => "down",
        }
    }

    /// The bit this key occupies in a [`KeyState`].
    pub const fn flag(self) -> KeyState {
        match self {
            Key::A => KeyState::A,
            Key::B => KeyState::B,
            Key::L => KeyState::L,
            Key::R => KeyState::R,
            Key::Select => KeyState::SELECT,
            Key::Start => KeyState::START,
            Key::Left => KeyState::LEFT,
            Key::Right => KeyState::RIGHT,
            Key::Up => KeyState::UP,
            Key::Down => KeyState::DOWN,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Key {
    type Err = StreamError;

    /// Accepts the wire name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Key::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| StreamError::MalformedMessage(format!("unknown key {s:?}")))
    }
}

// ── KeyTransition ────────────────────────────────────────────────

/// Direction of an edge-triggered key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyTransition {
    Up,
    Down,
}

// ── KeyState ─────────────────────────────────────────────────────

bitflags! {
    /// Set of keys currently held down.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyState: u16 {
        const A      = 1 << 0;
        const B      = 1 << 1;
        const SELECT = 1 << 2;
        const START  = 1 << 3;
        const RIGHT  = 1 << 4;
        const LEFT   = 1 << 5;
        const UP     = 1 << 6;
        const DOWN   = 1 << 7;
        const R      = 1 << 8;
        const L      = 1 << 9;
    }
}

impl KeyState {
    /// Apply one transition, returning the new state.
    pub fn with(self, key: Key, transition: KeyTransition) -> Self {
        let mut next = self;
        next.set(key.flag(), transition == KeyTransition::Down);
        next
    }

    pub fn is_pressed(self, key: Key) -> bool {
        self.contains(key.flag())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip_through_serde() {
        for key in Key::ALL {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
            let back: Key = serde_json::from_str(&json).unwrap();
            assert_eq!(back, key);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Start".parse::<Key>().unwrap(), Key::Start);
        assert_eq!("a".parse::<Key>().unwrap(), Key::A);
        assert!("turbo".parse::<Key>().is_err());
    }

    #[test]
    fn flags_are_distinct() {
        let all = Key::ALL
            .into_iter()
            .fold(KeyState::empty(), |acc, k| acc | k.flag());
        assert_eq!(all, KeyState::all());
    }

    #[test]
    fn state_transitions() {
        let s = KeyState::empty()
            .with(Key::A, KeyTransition::Down)
            .with(Key::Left, KeyTransition::Down);
        assert!(s.is_pressed(Key::A));
        assert!(s.is_pressed(Key::Left));
        let s = s.with(Key::A, KeyTransition::Up);
        assert!(!s.is_pressed(Key::A));
        assert!(s.is_pressed(Key::Left));
    }
}
