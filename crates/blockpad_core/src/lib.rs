//! Core of the blockpad block editor.
//! This crate owns the document model, its file format, the external
//! editor handoff and modal key routing; hosts only draw and forward keys.

pub mod codec;
pub mod config;
pub mod handoff;
pub mod keymap;
pub mod logging;
pub mod model;
pub mod render;
pub mod service;
pub mod session;
pub mod store;
pub mod vault;

pub use codec::{decode, decode_with, encode, DecodeOptions, FormatError};
pub use config::{load_config, save_config_to, AppConfig, ConfigError};
pub use handoff::{HandoffController, HandoffError, HandoffEvent, HandoffState};
pub use keymap::{Action, Chord, Keymap, KeymapIssue, Mode, ModeRouter, RouteOutcome};
pub use logging::{default_log_dir, default_log_level, init_logging, logging_status};
pub use model::block::{Block, BlockId, BlockKind, Metadata, TextKind};
pub use model::document::{Document, DocumentError, OutlineEntry};
pub use service::{
    export_document, export_vault, init_vault, new_document, open_document,
    quickstart_document, register_vault, save_document, ServiceError,
};
pub use session::{NameRequest, Session, SessionError, SessionSignal, StatusMessage};
pub use vault::{ClipboardSlot, VaultEntry, VaultError, VaultIndex};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
