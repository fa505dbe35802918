// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fmt;

/// The key that toggles the exclusivity policy. It is intercepted before
/// binding resolution and before edit capture, so it can never be bound
/// to a pad.
pub const RESERVED_POLICY_KEY: &str = "END";

/// A normalized input event that can be bound to a pad. Keyboard and MIDI
/// triggers live in separate namespaces: a keyboard event only ever
/// resolves against keyboard bindings, and a note-on only against MIDI
/// bindings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// A keyboard key, uppercased.
    Keyboard(String),
    /// A MIDI note number (0-127).
    Midi(u8),
}

impl Trigger {
    /// Builds a keyboard trigger, normalizing the key to its canonical
    /// uppercase form.
    pub fn keyboard(code: &str) -> Trigger {
        Trigger::Keyboard(code.trim().to_uppercase())
    }

    pub fn midi(note: u8) -> Trigger {
        Trigger::Midi(note & 0x7f)
    }

    /// The persisted wire form: the uppercased key name, or the decimal
    /// note number. Note that a decimal string 0-127 always parses back
    /// as a MIDI trigger, so a keyboard binding to a bare digit key is
    /// not representable. This constraint is carried from the original
    /// storage format.
    pub fn label(&self) -> String {
        match self {
            Trigger::Keyboard(code) => code.clone(),
            Trigger::Midi(note) => note.to_string(),
        }
    }

    /// Parses the persisted wire form.
    pub fn parse(value: &str) -> Trigger {
        if let Ok(note) = value.parse::<u8>() {
            if note <= 127 {
                return Trigger::Midi(note);
            }
        }
        Trigger::keyboard(value)
    }

    /// Returns true for the reserved policy-toggle key, which is never a
    /// valid binding.
    pub fn is_reserved(&self) -> bool {
        matches!(self, Trigger::Keyboard(code) if code == RESERVED_POLICY_KEY)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Keyboard(code) => write!(f, "key {}", code),
            Trigger::Midi(note) => write!(f, "note {}", note),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keyboard_normalization() {
        assert_eq!(Trigger::keyboard("q"), Trigger::Keyboard("Q".to_string()));
        assert_eq!(Trigger::keyboard(" a "), Trigger::Keyboard("A".to_string()));
        assert_eq!(Trigger::keyboard("q"), Trigger::keyboard("Q"));
    }

    #[test]
    fn test_parse_decimal_is_midi() {
        assert_eq!(Trigger::parse("36"), Trigger::Midi(36));
        assert_eq!(Trigger::parse("0"), Trigger::Midi(0));
        assert_eq!(Trigger::parse("127"), Trigger::Midi(127));
    }

    #[test]
    fn test_parse_out_of_range_is_keyboard() {
        assert_eq!(Trigger::parse("128"), Trigger::Keyboard("128".to_string()));
        assert_eq!(Trigger::parse("q"), Trigger::Keyboard("Q".to_string()));
    }

    #[test]
    fn test_label_round_trip() {
        for trigger in [Trigger::keyboard("Q"), Trigger::Midi(64)] {
            assert_eq!(Trigger::parse(&trigger.label()), trigger);
        }
    }

    #[test]
    fn test_reserved() {
        assert!(Trigger::keyboard("end").is_reserved());
        assert!(!Trigger::keyboard("e").is_reserved());
        assert!(!Trigger::Midi(35).is_reserved());
    }
}
