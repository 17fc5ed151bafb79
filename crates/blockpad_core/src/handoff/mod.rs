//! External editor handoff.
//!
//! # Responsibility
//! - Delegate one block body to an out-of-process editor through a scratch
//!   file and write the result back exactly once, after the editor exits.
//! - Keep the rest of the document editable while editors are running.
//!
//! # Invariants
//! - A block under handoff is leased; structural mutation of it fails.
//! - Scratch files are owned by their session and deleted on every exit path.
//! - Editors never share a terminal with the host: stdio is nulled and the
//!   only channels back are the scratch file and the exit status.
//!
//! # See also
//! - `model::document::BlockLease`

use crate::model::block::BlockId;
use crate::model::document::DocumentError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

mod controller;
pub mod launch;

pub use controller::{HandoffController, HandoffEvent, HandoffState, ReintegratePolicy};
pub use launch::{
    default_editor_command, detect_terminal_commands, EditorLauncher, EditorProcess, ExitOutcome,
    LaunchTemplate, ProcessLauncher,
};

pub type HandoffResult<T> = Result<T, HandoffError>;

/// Handoff failures. The target block is never modified when one is raised.
#[derive(Debug)]
pub enum HandoffError {
    /// Terminal or editor process could not be started.
    EditorSpawnFailed { program: String, source: io::Error },
    /// Editor exited unsuccessfully; `code` is `None` when killed by a signal.
    EditorExitedNonZero { block_id: BlockId, code: Option<i32> },
    /// A session for this block is already running.
    AlreadyEditing(BlockId),
    /// `launch` was called for a block without a dispatched session.
    NotDispatched(BlockId),
    /// Scratch file could not be created, written or read back.
    Scratch(io::Error),
    /// Watching the editor process failed.
    Wait(io::Error),
    /// Block model rejected checkout or write-back.
    Document(DocumentError),
}

impl Display for HandoffError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EditorSpawnFailed { program, source } => {
                write!(f, "failed to launch editor `{program}`: {source}")
            }
            Self::EditorExitedNonZero { block_id, code } => match code {
                Some(code) => write!(f, "editor for block {block_id} exited with status {code}"),
                None => write!(f, "editor for block {block_id} was terminated"),
            },
            Self::AlreadyEditing(id) => write!(f, "block is already open in an editor: {id}"),
            Self::NotDispatched(id) => write!(f, "no dispatched handoff for block {id}"),
            Self::Scratch(err) => write!(f, "scratch file error: {err}"),
            Self::Wait(err) => write!(f, "failed to watch editor process: {err}"),
            Self::Document(err) => write!(f, "{err}"),
        }
    }
}

impl Error for HandoffError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::EditorSpawnFailed { source, .. } => Some(source),
            Self::Scratch(err) | Self::Wait(err) => Some(err),
            Self::Document(err) => Some(err),
            Self::EditorExitedNonZero { .. }
            | Self::AlreadyEditing(_)
            | Self::NotDispatched(_) => None,
        }
    }
}

impl From<DocumentError> for HandoffError {
    fn from(value: DocumentError) -> Self {
        Self::Document(value)
    }
}
