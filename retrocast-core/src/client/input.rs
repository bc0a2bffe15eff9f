//! Edge detection for local key input.

use crate::protocol::{Key, KeyState, KeyTransition};

/// What the local input device reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Down,
    /// OS auto-repeat while held.
    Repeat,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub key: Key,
    pub kind: KeyEventKind,
}

impl InputEvent {
    pub fn new(key: Key, kind: KeyEventKind) -> Self {
        Self { key, kind }
    }
}

/// Turns raw key events into true up/down edges.
///
/// Auto-repeat and duplicate downs are swallowed; an up is only
/// forwarded for a key that was down.
#[derive(Debug, Default)]
pub struct KeyFilter {
    held: KeyState,
}

impl KeyFilter {
    pub fn accept(&mut self, event: InputEvent) -> Option<KeyTransition> {
        let pressed = self.held.is_pressed(event.key);
        let transition = match event.kind {
            KeyEventKind::Repeat => return None,
            KeyEventKind::Down if pressed => return None,
            KeyEventKind::Up if !pressed => return None,
            KeyEventKind::Down => KeyTransition::Down,
            KeyEventKind::Up => KeyTransition::Up,
        };
        self.held = self.held.with(event.key, transition);
        Some(transition)
    }

    /// Forget held keys, e.g. after reconnecting to a fresh session.
    pub fn reset(&mut self) {
        self.held = KeyState::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_repeat_is_suppressed() {
        let mut f = KeyFilter::default();
        let mut sent = Vec::new();
        for kind in [
            KeyEventKind::Down,
            KeyEventKind::Repeat,
            KeyEventKind::Repeat,
            KeyEventKind::Down,
            KeyEventKind::Repeat,
            KeyEventKind::Up,
            KeyEventKind::Up,
        ] {
            if let Some(t) = f.accept(InputEvent::new(Key::A, kind)) {
                sent.push(t);
            }
        }
        assert_eq!(sent, vec![KeyTransition::Down, KeyTransition::Up]);
    }

    #[test]
    fn keys_are_tracked_independently() {
        let mut f = KeyFilter::default();
        assert_eq!(
            f.accept(InputEvent::new(Key::A, KeyEventKind::Down)),
            Some(KeyTransition::Down)
        );
        assert_eq!(
            f.accept(InputEvent::new(Key::B, KeyEventKind::Down)),
            Some(KeyTransition::Down)
        );
        assert_eq!(f.accept(InputEvent::new(Key::A, KeyEventKind::Repeat)), None);
        assert_eq!(
            f.accept(InputEvent::new(Key::B, KeyEventKind::Up)),
            Some(KeyTransition::Up)
        );
    }

    #[test]
    fn reset_forgets_held_keys() {
        let mut f = KeyFilter::default();
        f.accept(InputEvent::new(Key::Start, KeyEventKind::Down));
        f.reset();
        assert_eq!(f.accept(InputEvent::new(Key::Start, KeyEventKind::Up)), None);
    }
}
