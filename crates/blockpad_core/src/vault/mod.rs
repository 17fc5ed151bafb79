//! Vault index and clipboard.
//!
//! # Responsibility
//! - Track registered vault roots and reject nested registrations.
//! - List, create, rename and paste documents and folders inside vaults.
//! - Hold the single clipboard item shared by document and vault modes.
//!
//! # Invariants
//! - Every mutating operation stays inside one registered root.
//! - Existing entries are never overwritten; collisions are reported.
//! - The clipboard holds at most one block or one entry, never both.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

mod clipboard;
mod index;

pub use clipboard::{ClipOp, ClipboardSlot};
pub use index::{EntryKind, VaultEntry, VaultIndex};

pub type VaultResult<T> = Result<T, VaultError>;

/// Vault operation failures.
#[derive(Debug)]
pub enum VaultError {
    /// Target name already exists.
    NameConflict(PathBuf),
    /// Clipboard or rename source no longer exists.
    SourceVanished(PathBuf),
    /// Name is empty, hidden or not a single path component.
    InvalidName(String),
    /// Path is not inside any registered vault.
    OutsideVault(PathBuf),
    /// Root is inside, or contains, an already registered vault.
    NestedVault { path: PathBuf, existing: PathBuf },
    /// Paste target is the source folder or one of its descendants, or
    /// not a folder.
    InvalidTarget(PathBuf),
    /// Clipboard holds no vault entry.
    NothingToPaste,
    Io { path: PathBuf, source: io::Error },
}

impl VaultError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl Display for VaultError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameConflict(path) => write!(f, "already exists: {}", path.display()),
            Self::SourceVanished(path) => write!(f, "no longer exists: {}", path.display()),
            Self::InvalidName(name) => write!(f, "invalid name: `{name}`"),
            Self::OutsideVault(path) => write!(f, "not inside a vault: {}", path.display()),
            Self::NestedVault { path, existing } => write!(
                f,
                "{} overlaps registered vault {}",
                path.display(),
                existing.display()
            ),
            Self::InvalidTarget(path) => write!(f, "cannot paste into {}", path.display()),
            Self::NothingToPaste => write!(f, "clipboard holds no vault entry"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl Error for VaultError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
