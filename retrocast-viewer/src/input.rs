//! Line-based key input.
//!
//! Each line is `<key> <down|repeat|up>`, e.g. `start down` or `A up`.
//! Blank lines and lines starting with `#` are ignored.

use retrocast_core::client::{InputEvent, KeyEventKind};
use retrocast_core::error::StreamError;
use retrocast_core::protocol::Key;

pub fn parse_line(line: &str) -> Result<Option<InputEvent>, StreamError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut parts = line.split_whitespace();
    let (Some(key), Some(kind), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(StreamError::MalformedMessage(format!(
            "expected `<key> <down|repeat|up>`, got {line:?}"
        )));
    };

    let key: Key = key.parse()?;
    let kind = match kind.to_ascii_lowercase().as_str() {
        "down" => KeyEventKind::Down,
        "repeat" => KeyEventKind::Repeat,
        "up" => KeyEventKind::Up,
        other => {
            return Err(StreamError::MalformedMessage(format!(
                "unknown key event {other:?}"
            )));
        }
    };
    Ok(Some(InputEvent::new(key, kind)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_events() {
        assert_eq!(
            parse_line("start down").unwrap(),
            Some(InputEvent::new(Key::Start, KeyEventKind::Down))
        );
        assert_eq!(
            parse_line("  a REPEAT ").unwrap(),
            Some(InputEvent::new(Key::A, KeyEventKind::Repeat))
        );
    }

    #[test]
    fn skips_blank_and_comments() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("# hold left").unwrap(), None);
    }

    #[test]
    fn rejects_bad_lines() {
        assert!(parse_line("start").is_err());
        assert!(parse_line("start down now").is_err());
        assert!(parse_line("turbo down").is_err());
        assert!(parse_line("A sideways").is_err());
    }
}
