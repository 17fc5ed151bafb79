//! Use-case entry points consumed by the CLI and session.
//!
//! # Responsibility
//! - Open, create, save and export documents on disk.
//! - Register vault roots from a working directory.
//!
//! # Invariants
//! - A failed open or save never touches the caller's in-memory document.
//! - Document files are replaced atomically.

use crate::codec::FormatError;
use crate::config::ConfigError;
use crate::store::StoreError;
use crate::vault::VaultError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

pub mod document_service;
pub mod vault_service;

pub use document_service::{
    export_document, new_document, open_document, open_document_with, quickstart_document,
    save_document,
};
pub use vault_service::{export_vault, init_vault, register_vault, ExportReport, InitOutcome};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    Io { path: PathBuf, source: io::Error },
    Format { path: PathBuf, source: FormatError },
    Store { path: PathBuf, source: StoreError },
    Vault(VaultError),
    /// Config file exists but could not be read; it is left untouched.
    Config(ConfigError),
    /// Quickstart content is only written to paths that do not exist yet.
    QuickstartExisting(PathBuf),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Format { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Store { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Vault(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}; fix or remove it before registering a vault"),
            Self::QuickstartExisting(path) => write!(
                f,
                "quickstart only applies to new files: {} exists",
                path.display()
            ),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Format { source, .. } => Some(source),
            Self::Store { source, .. } => Some(source),
            Self::Vault(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::QuickstartExisting(_) => None,
        }
    }
}

impl From<ConfigError> for ServiceError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<VaultError> for ServiceError {
    fn from(value: VaultError) -> Self {
        Self::Vault(value)
    }
}
