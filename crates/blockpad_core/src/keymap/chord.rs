//! Chord grammar.
//!
//! # Responsibility
//! - Parse binding strings such as `gg`, `<C-j>`, `<leader>bh1` into chords.
//! - Normalise host key events into the same chord space.
//! - Render chords for the help sheet.
//!
//! # Invariants
//! - Plain chords are printable ASCII characters (space included).
//! - Every parsed chord is one [`Chord::from_host`] can produce, so a
//!   binding that parses can always fire.
//! - A sequence holds between 1 and [`MAX_SEQUENCE_LEN`] chords.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::{BitOr, BitOrAssign};

/// Longest accepted key sequence.
pub const MAX_SEQUENCE_LEN: usize = 6;

/// Modifier set attached to one chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Modifiers {
    bits: u8,
}

impl Modifiers {
    pub const CTRL: Self = Self { bits: 1 << 0 };
    pub const ALT: Self = Self { bits: 1 << 1 };
    pub const SHIFT: Self = Self { bits: 1 << 2 };

    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    pub fn contains(self, other: Self) -> bool {
        self.bits & other.bits == other.bits
    }

    pub fn is_empty(self) -> bool {
        self.bits == 0
    }
}

impl BitOr for Modifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            bits: self.bits | rhs.bits,
        }
    }
}

impl BitOrAssign for Modifiers {
    fn bitor_assign(&mut self, rhs: Self) {
        self.bits |= rhs.bits;
    }
}

/// Key identity without modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Char(char),
    Esc,
    Enter,
    Tab,
    Backspace,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
}

impl Key {
    fn from_name(name: &str) -> Option<Self> {
        let key = match name.to_ascii_lowercase().as_str() {
            "esc" | "escape" => Self::Esc,
            "cr" | "enter" => Self::Enter,
            "tab" => Self::Tab,
            "bs" | "backspace" => Self::Backspace,
            "up" => Self::Up,
            "down" => Self::Down,
            "left" => Self::Left,
            "right" => Self::Right,
            "home" => Self::Home,
            "end" => Self::End,
            "pageup" => Self::PageUp,
            "pagedown" => Self::PageDown,
            _ => return None,
        };
        Some(key)
    }

    fn display_name(self) -> String {
        match self {
            Self::Char(' ') => "Space".to_string(),
            Self::Char(ch) => ch.to_string(),
            Self::Esc => "Esc".to_string(),
            Self::Enter => "Enter".to_string(),
            Self::Tab => "Tab".to_string(),
            Self::Backspace => "Backspace".to_string(),
            Self::Up => "Up".to_string(),
            Self::Down => "Down".to_string(),
            Self::Left => "Left".to_string(),
            Self::Right => "Right".to_string(),
            Self::Home => "Home".to_string(),
            Self::End => "End".to_string(),
            Self::PageUp => "PageUp".to_string(),
            Self::PageDown => "PageDown".to_string(),
        }
    }
}

/// One key press plus modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Chord {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl Chord {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    pub fn plain(ch: char) -> Self {
        Self::new(Key::Char(ch), Modifiers::empty())
    }

    pub fn named(key: Key) -> Self {
        Self::new(key, Modifiers::empty())
    }

    pub fn ctrl(ch: char) -> Self {
        Self::new(Key::Char(ch.to_ascii_lowercase()), Modifiers::CTRL)
    }

    pub fn alt(ch: char) -> Self {
        Self::new(Key::Char(ch.to_ascii_lowercase()), Modifiers::ALT)
    }

    /// Bare `<Esc>`, which cancels a pending prefix.
    pub fn is_cancel(&self) -> bool {
        self.key == Key::Esc && self.modifiers.is_empty()
    }

    /// Normalises a host key event into a routable chord.
    ///
    /// Returns `None` for Ctrl+Alt combinations, Shift together with Ctrl or
    /// Alt, modifiers on named keys and non-printable characters. Shift on a
    /// plain character is already reflected in the character itself.
    pub fn from_host(key: Key, modifiers: Modifiers) -> Option<Self> {
        let ctrl = modifiers.contains(Modifiers::CTRL);
        let alt = modifiers.contains(Modifiers::ALT);
        let shift = modifiers.contains(Modifiers::SHIFT);
        if ctrl && alt {
            return None;
        }
        if let Key::Char(ch) = key {
            if !is_printable(ch) {
                return None;
            }
        }
        if !(ctrl || alt) {
            return Some(Self::named(key));
        }
        if shift {
            return None;
        }
        let Key::Char(ch) = key else {
            return None;
        };
        Some(if ctrl { Self::ctrl(ch) } else { Self::alt(ch) })
    }
}

impl Display for Chord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self.key {
            Key::Char(ch) if !self.modifiers.is_empty() => ch.to_ascii_uppercase().to_string(),
            key => key.display_name(),
        };
        if self.modifiers.contains(Modifiers::CTRL) {
            write!(f, "Ctrl+{name}")
        } else if self.modifiers.contains(Modifiers::ALT) {
            write!(f, "Alt+{name}")
        } else if self.modifiers.contains(Modifiers::SHIFT) {
            write!(f, "Shift+{name}")
        } else {
            f.write_str(&name)
        }
    }
}

/// Parsed element of a binding string before leader expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceToken {
    Leader,
    Chord(Chord),
}

/// Binding string rejected by the chord grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChordError {
    Empty,
    UnknownToken(String),
    NonPrintable(char),
    TooLong(usize),
    /// Modifier combination no terminal key event normalises to.
    Unreachable(String),
}

impl Display for ChordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty key sequence"),
            Self::UnknownToken(token) => write!(f, "unknown key token `<{token}>`"),
            Self::NonPrintable(ch) => write!(f, "non-printable key {:?}", ch),
            Self::TooLong(len) => write!(
                f,
                "key sequence has {len} keys, at most {MAX_SEQUENCE_LEN} allowed"
            ),
            Self::Unreachable(token) => write!(
                f,
                "key token `<{token}>` cannot be typed; Ctrl and Alt only combine with characters and Shift only with letters"
            ),
        }
    }
}

impl Error for ChordError {}

pub(crate) fn is_printable(ch: char) -> bool {
    (' '..='~').contains(&ch)
}

/// Tokenises a binding string; `<` without a closing `>` is a literal key.
pub fn parse_sequence(value: &str) -> Result<Vec<SequenceToken>, ChordError> {
    if value.is_empty() {
        return Err(ChordError::Empty);
    }
    let mut tokens = Vec::new();
    let mut rest = value;
    while let Some(ch) = rest.chars().next() {
        if ch == '<' {
            if let Some(end) = rest[1..].find('>') {
                let inner = &rest[1..=end];
                tokens.push(parse_bracketed(inner)?);
                rest = &rest[end + 2..];
                continue;
            }
        }
        if !is_printable(ch) {
            return Err(ChordError::NonPrintable(ch));
        }
        tokens.push(SequenceToken::Chord(Chord::plain(ch)));
        rest = &rest[ch.len_utf8()..];
    }
    Ok(tokens)
}

fn parse_bracketed(inner: &str) -> Result<SequenceToken, ChordError> {
    if inner.eq_ignore_ascii_case("leader") {
        return Ok(SequenceToken::Leader);
    }
    if let Some(key) = Key::from_name(inner) {
        return Ok(SequenceToken::Chord(Chord::named(key)));
    }
    let unknown = || ChordError::UnknownToken(inner.to_string());
    let mut chars = inner.chars();
    let modifier = match chars.next().map(|ch| ch.to_ascii_uppercase()) {
        Some('C') => Modifiers::CTRL,
        Some('A') => Modifiers::ALT,
        Some('S') => Modifiers::SHIFT,
        _ => return Err(unknown()),
    };
    if chars.next() != Some('-') {
        return Err(unknown());
    }
    let base = chars.as_str();
    let mut base_chars = base.chars();
    let (Some(ch), None) = (base_chars.next(), base_chars.next()) else {
        return match Key::from_name(base) {
            Some(_) => Err(ChordError::Unreachable(inner.to_string())),
            None => Err(unknown()),
        };
    };
    if !is_printable(ch) {
        return Err(ChordError::NonPrintable(ch));
    }
    // Hosts report Shift+letter as the upper-case character.
    if modifier == Modifiers::SHIFT {
        if !ch.is_ascii_alphabetic() {
            return Err(ChordError::Unreachable(inner.to_string()));
        }
        return Ok(SequenceToken::Chord(Chord::plain(ch.to_ascii_uppercase())));
    }
    let key = Key::Char(ch.to_ascii_lowercase());
    Ok(SequenceToken::Chord(Chord::new(key, modifier)))
}

/// Parses a binding string and replaces `<leader>` by `leader`.
pub fn expand_sequence(value: &str, leader: char) -> Result<Vec<Chord>, ChordError> {
    let chords: Vec<Chord> = parse_sequence(value)?
        .into_iter()
        .map(|token| match token {
            SequenceToken::Leader => Chord::plain(leader),
            SequenceToken::Chord(chord) => chord,
        })
        .collect();
    if chords.len() > MAX_SEQUENCE_LEN {
        return Err(ChordError::TooLong(chords.len()));
    }
    Ok(chords)
}

/// Help-sheet form of a sequence: `gg`, `,bh1`, `Ctrl+J`, `Space v`.
pub fn display_sequence(chords: &[Chord]) -> String {
    let parts: Vec<String> = chords.iter().map(Chord::to_string).collect();
    if parts.iter().all(|part| part.chars().count() == 1) {
        parts.concat()
    } else {
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::{
        display_sequence, expand_sequence, parse_sequence, Chord, ChordError, Key, Modifiers,
        SequenceToken,
    };

    #[test]
    fn parses_plain_and_named_tokens() {
        let chords = expand_sequence("g<CR><C-J><leader>", ',').unwrap();
        assert_eq!(
            chords,
            vec![
                Chord::plain('g'),
                Chord::named(Key::Enter),
                Chord::ctrl('j'),
                Chord::plain(','),
            ]
        );
    }

    #[test]
    fn leader_token_is_case_insensitive() {
        assert_eq!(
            parse_sequence("<Leader>x").unwrap()[0],
            SequenceToken::Leader
        );
    }

    #[test]
    fn unterminated_angle_is_literal() {
        assert_eq!(
            expand_sequence("<a", ',').unwrap(),
            vec![Chord::plain('<'), Chord::plain('a')]
        );
    }

    #[test]
    fn rejects_bad_tokens() {
        assert_eq!(
            expand_sequence("<Foo>", ',').unwrap_err(),
            ChordError::UnknownToken("Foo".to_string())
        );
        assert_eq!(expand_sequence("", ',').unwrap_err(), ChordError::Empty);
        assert_eq!(
            expand_sequence("abcdefg", ',').unwrap_err(),
            ChordError::TooLong(7)
        );
        assert!(matches!(
            expand_sequence("é", ','),
            Err(ChordError::NonPrintable('é'))
        ));
    }

    #[test]
    fn modifier_on_named_key_is_unreachable() {
        for token in ["A-Up", "C-CR", "S-Tab"] {
            assert_eq!(
                expand_sequence(&format!("<{token}>"), ',').unwrap_err(),
                ChordError::Unreachable(token.to_string())
            );
        }
        assert_eq!(
            expand_sequence("<S-1>", ',').unwrap_err(),
            ChordError::Unreachable("S-1".to_string())
        );
    }

    #[test]
    fn every_parsed_chord_is_produced_by_the_host() {
        for value in ["<S-n>", "<C-j>", "<A-x>", "<CR>", "<Esc>", "G", " "] {
            for chord in expand_sequence(value, ',').unwrap() {
                let host_char = match chord.key {
                    Key::Char(ch) if chord.modifiers.is_empty() && ch.is_ascii_uppercase() => {
                        Chord::from_host(Key::Char(ch), Modifiers::SHIFT)
                    }
                    key => Chord::from_host(key, chord.modifiers),
                };
                assert_eq!(host_char, Some(chord), "{value}");
            }
        }
        assert_eq!(
            expand_sequence("<S-n>", ',').unwrap(),
            vec![Chord::plain('N')]
        );
    }

    #[test]
    fn host_normalisation() {
        assert_eq!(
            Chord::from_host(Key::Char('J'), Modifiers::CTRL),
            Some(Chord::ctrl('j'))
        );
        assert_eq!(
            Chord::from_host(Key::Char('G'), Modifiers::SHIFT),
            Some(Chord::plain('G'))
        );
        assert_eq!(
            Chord::from_host(Key::Char('x'), Modifiers::CTRL | Modifiers::ALT),
            None
        );
        assert_eq!(
            Chord::from_host(Key::Char('x'), Modifiers::CTRL | Modifiers::SHIFT),
            None
        );
        assert_eq!(Chord::from_host(Key::Enter, Modifiers::CTRL), None);
    }

    #[test]
    fn display_forms() {
        assert_eq!(display_sequence(&[Chord::plain('g'), Chord::plain('g')]), "gg");
        assert_eq!(display_sequence(&[Chord::ctrl('j')]), "Ctrl+J");
        assert_eq!(
            display_sequence(&[Chord::plain(' '), Chord::plain('v')]),
            "Space v"
        );
        assert_eq!(display_sequence(&[Chord::named(Key::Enter)]), "Enter");
    }
}
