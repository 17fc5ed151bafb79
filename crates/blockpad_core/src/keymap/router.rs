//! Pending-prefix mode router.
//!
//! # Invariants
//! - The pending buffer is always a strict prefix of some binding of the
//!   active mode, or empty.
//! - Switching modes empties the buffer.

use super::bindings::{Action, Keymap, Lookup, Mode};
use super::chord::Chord;
use log::debug;
use std::time::{Duration, Instant};

/// Default time a pending prefix survives between chords.
pub const DEFAULT_PENDING_TIMEOUT: Duration = Duration::from_millis(2000);

/// Result of routing one chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A binding completed; the buffer is empty again.
    Fired(Action),
    /// The buffer is a strict prefix of at least one binding.
    Pending,
    /// Nothing matched; the buffer was discarded.
    Dropped,
    /// `<Esc>` discarded a pending prefix.
    Cancelled,
}

/// Routes chords through the active mode's bindings.
#[derive(Debug, Clone)]
pub struct ModeRouter {
    keymap: Keymap,
    mode: Mode,
    pending: Vec<Chord>,
    last_input: Option<Instant>,
    timeout: Option<Duration>,
}

impl ModeRouter {
    /// Creates a router in document mode; `timeout` of `None` keeps prefixes
    /// pending indefinitely.
    pub fn new(keymap: Keymap, timeout: Option<Duration>) -> Self {
        Self {
            keymap,
            mode: Mode::Document,
            pending: Vec::new(),
            last_input: None,
            timeout,
        }
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn pending(&self) -> &[Chord] {
        &self.pending
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            debug!(
                "event=mode_switch module=keymap status=ok from={} to={}",
                self.mode, mode
            );
        }
        self.mode = mode;
        self.pending.clear();
    }

    pub fn handle_chord(&mut self, chord: Chord) -> RouteOutcome {
        self.handle_chord_at(chord, Instant::now())
    }

    /// Routes `chord` as if it arrived at `now`.
    pub fn handle_chord_at(&mut self, chord: Chord, now: Instant) -> RouteOutcome {
        if let (Some(timeout), Some(last)) = (self.timeout, self.last_input) {
            if !self.pending.is_empty() && now.saturating_duration_since(last) >= timeout {
                self.pending.clear();
            }
        }
        self.last_input = Some(now);

        if chord.is_cancel() && !self.pending.is_empty() {
            self.pending.clear();
            return RouteOutcome::Cancelled;
        }

        self.pending.push(chord);
        match self.keymap.lookup(self.mode, &self.pending) {
            Lookup::Exact(action) => {
                self.pending.clear();
                RouteOutcome::Fired(action)
            }
            Lookup::Prefix => RouteOutcome::Pending,
            Lookup::NoMatch => {
                self.pending.clear();
                RouteOutcome::Dropped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ModeRouter, RouteOutcome, DEFAULT_PENDING_TIMEOUT};
    use crate::keymap::bindings::{Action, Keymap, Mode};
    use crate::keymap::chord::{Chord, Key};
    use std::time::{Duration, Instant};

    fn router() -> ModeRouter {
        ModeRouter::new(Keymap::default(), Some(DEFAULT_PENDING_TIMEOUT))
    }

    #[test]
    fn leader_sequence_waits_then_fires() {
        let mut router = router();
        let now = Instant::now();
        assert_eq!(router.handle_chord_at(Chord::plain(','), now), RouteOutcome::Pending);
        assert_eq!(router.handle_chord_at(Chord::plain('b'), now), RouteOutcome::Pending);
        assert_eq!(router.handle_chord_at(Chord::plain('h'), now), RouteOutcome::Pending);
        assert_eq!(
            router.handle_chord_at(Chord::plain('1'), now),
            RouteOutcome::Fired(Action::InsertHeading(1))
        );
        assert!(router.pending().is_empty());
    }

    #[test]
    fn unmatched_chord_drops_buffer() {
        let mut router = router();
        let now = Instant::now();
        router.handle_chord_at(Chord::plain(','), now);
        assert_eq!(router.handle_chord_at(Chord::plain('z'), now), RouteOutcome::Dropped);
        assert!(router.pending().is_empty());
    }

    #[test]
    fn escape_cancels_only_a_pending_prefix() {
        let mut router = router();
        router.set_mode(Mode::Outline);
        let now = Instant::now();
        router.handle_chord_at(Chord::plain(','), now);
        assert_eq!(
            router.handle_chord_at(Chord::named(Key::Esc), now),
            RouteOutcome::Cancelled
        );
        assert_eq!(
            router.handle_chord_at(Chord::named(Key::Esc), now),
            RouteOutcome::Fired(Action::Close)
        );
    }

    #[test]
    fn timeout_expires_prefix_lazily() {
        let mut router = router();
        let start = Instant::now();
        router.handle_chord_at(Chord::plain('g'), start);
        let late = start + Duration::from_millis(2500);
        assert_eq!(router.handle_chord_at(Chord::plain('g'), late), RouteOutcome::Pending);
        assert_eq!(
            router.handle_chord_at(Chord::plain('g'), late),
            RouteOutcome::Fired(Action::FirstBlock)
        );
    }

    #[test]
    fn disabled_timeout_keeps_prefix() {
        let mut router = ModeRouter::new(Keymap::default(), None);
        let start = Instant::now();
        router.handle_chord_at(Chord::plain('g'), start);
        assert_eq!(
            router.handle_chord_at(Chord::plain('g'), start + Duration::from_secs(60)),
            RouteOutcome::Fired(Action::FirstBlock)
        );
    }

    #[test]
    fn mode_switch_clears_buffer() {
        let mut router = router();
        router.handle_chord_at(Chord::plain('d'), Instant::now());
        router.set_mode(Mode::Vault);
        assert!(router.pending().is_empty());
        assert_eq!(
            router.handle_chord(Chord::plain('p')),
            RouteOutcome::Fired(Action::Paste)
        );
    }
}
