//! Modal key routing.
//!
//! # Responsibility
//! - Resolve the user keymap against built-in defaults per action.
//! - Route chords through a pending-prefix buffer to mode actions.
//! - Render the help sheet from whatever keymap is active.
//!
//! # Invariants
//! - Configuration problems are reported, never raised.
//! - The router holds at most one pending prefix.

mod bindings;
mod chord;
mod help;
mod router;

pub use bindings::{
    Action, Binding, DefaultBinding, Keymap, KeymapIssue, KeymapOverrides, Lookup, Mode,
    DEFAULT_BINDINGS, DEFAULT_LEADER,
};
pub use chord::{
    display_sequence, expand_sequence, parse_sequence, Chord, ChordError, Key, Modifiers,
    SequenceToken, MAX_SEQUENCE_LEN,
};
pub use help::build_help_lines;
pub use router::{ModeRouter, RouteOutcome, DEFAULT_PENDING_TIMEOUT};
