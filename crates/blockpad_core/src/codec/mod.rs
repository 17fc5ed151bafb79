//! Plain-text document format.
//!
//! # Responsibility
//! - Map the block model to and from the git-diffable `.bpad` text format.
//! - Report parse failures with the offending line instead of truncating.
//!
//! # Invariants
//! - `encode(decode(bytes)) == bytes` for every accepted file.
//! - Body text is stored and returned verbatim, never escaped or reflowed.
//!
//! # Format
//! ```text
//! # BLOCKPAD v2
//! ::text
//! kind: title
//! My document
//! ::latex
//! e^{i\pi} + 1 = 0
//! ```

use crate::model::block::BlockId;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod text_format;

pub use text_format::{decode, decode_with, encode};

/// Format name written on the header line.
pub const FORMAT_NAME: &str = "BLOCKPAD";
/// Highest format version this build reads strictly and writes.
pub const SUPPORTED_VERSION: u32 = crate::model::document::CURRENT_FORMAT_VERSION;
/// File extension of text documents, without the dot.
pub const DOCUMENT_EXTENSION: &str = "bpad";

/// Decoder switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Accept files tagged with a newer format version (best effort).
    pub lenient: bool,
}

/// Codec failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Input cannot be parsed; `line` is 1-based.
    MalformedDocument { line: usize, reason: String },
    /// Version tag newer than this build supports.
    UnsupportedVersion { found: u32, supported: u32 },
    /// A body line would be read back as a block delimiter.
    BodyContainsDelimiter { block_id: BlockId, line: usize },
    /// Metadata entry cannot be written as a `key: value` line.
    InvalidMetadata { block_id: BlockId, key: String },
    /// Opaque kind tag cannot be written on a delimiter line.
    InvalidKindTag { block_id: BlockId, tag: String },
}

impl FormatError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            line,
            reason: reason.into(),
        }
    }
}

impl Display for FormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedDocument { line, reason } => {
                write!(f, "malformed document at line {line}: {reason}")
            }
            Self::UnsupportedVersion { found, supported } => write!(
                f,
                "document format version {found} is newer than supported {supported}"
            ),
            Self::BodyContainsDelimiter { block_id, line } => write!(
                f,
                "body line {line} of block {block_id} would be read as a block delimiter"
            ),
            Self::InvalidMetadata { block_id, key } => {
                write!(f, "metadata key `{key}` of block {block_id} cannot be written")
            }
            Self::InvalidKindTag { block_id, tag } => {
                write!(f, "kind tag `{tag}` of block {block_id} cannot be written")
            }
        }
    }
}

impl Error for FormatError {}
