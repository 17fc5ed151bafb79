//! Block domain model.
//!
//! # Responsibility
//! - Define the addressable unit of document content.
//! - Keep kind-specific metadata keys behind typed accessors.
//!
//! # Invariants
//! - `id` is stable for the lifetime of a document session and never reused.
//! - Metadata keeps insertion order, duplicates and unknown keys verbatim.
//! - `Opaque` blocks keep their original kind tag so they re-encode unchanged.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for one block inside a document session.
pub type BlockId = Uuid;

/// Kind tag for plain text blocks.
pub const KIND_TEXT: &str = "text";
/// Kind tag for the derived table-of-contents block.
pub const KIND_TOC: &str = "toc";
/// Kind tag for 3D scene script blocks.
pub const KIND_THREE: &str = "three";
/// Kind tag for render-script blocks.
pub const KIND_PYIMAGE: &str = "pyimage";
/// Kind tag for math markup blocks.
pub const KIND_LATEX: &str = "latex";
/// Kind tag for map script blocks.
pub const KIND_MAP: &str = "map";

/// Metadata key holding the text subkind of a `text` block.
pub const META_TEXT_KIND: &str = "kind";
/// Metadata key holding the output format of a `pyimage` block.
pub const META_FORMAT: &str = "format";

/// Closed set of block kinds understood by this build.
///
/// Kinds written by a newer format version decode as `Opaque` and keep their
/// tag, so adding a kind is a compile-checked extension of this enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    Toc,
    Three,
    PyImage,
    Latex,
    Map,
    Opaque(String),
}

impl BlockKind {
    /// Resolves a delimiter tag; unknown tags become `Opaque`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            KIND_TEXT => Self::Text,
            KIND_TOC => Self::Toc,
            KIND_THREE => Self::Three,
            KIND_PYIMAGE => Self::PyImage,
            KIND_LATEX => Self::Latex,
            KIND_MAP => Self::Map,
            other => Self::Opaque(other.to_string()),
        }
    }

    /// Tag written on the delimiter line.
    pub fn tag(&self) -> &str {
        match self {
            Self::Text => KIND_TEXT,
            Self::Toc => KIND_TOC,
            Self::Three => KIND_THREE,
            Self::PyImage => KIND_PYIMAGE,
            Self::Latex => KIND_LATEX,
            Self::Map => KIND_MAP,
            Self::Opaque(tag) => tag.as_str(),
        }
    }

    /// Derived blocks cannot be edited through the normal edit path.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Toc)
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Opaque(_))
    }

    /// File suffix for handoff scratch files, so external editors pick a
    /// sensible syntax mode.
    pub fn scratch_suffix(&self) -> &'static str {
        match self {
            Self::Text => ".md",
            Self::Three | Self::Map => ".js",
            Self::PyImage => ".py",
            Self::Latex => ".tex",
            Self::Toc | Self::Opaque(_) => ".txt",
        }
    }
}

/// Subkind of a `text` block stored in its `kind` metadata entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    Body,
    Title,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
}

impl TextKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Title => "title",
            Self::H1 => "h1",
            Self::H2 => "h2",
            Self::H3 => "h3",
            Self::H4 => "h4",
            Self::H5 => "h5",
            Self::H6 => "h6",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "body" => Some(Self::Body),
            "title" => Some(Self::Title),
            "h1" => Some(Self::H1),
            "h2" => Some(Self::H2),
            "h3" => Some(Self::H3),
            "h4" => Some(Self::H4),
            "h5" => Some(Self::H5),
            "h6" => Some(Self::H6),
            _ => None,
        }
    }

    /// Heading subkind for `level` 1..=6.
    pub fn heading(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::H1),
            2 => Some(Self::H2),
            3 => Some(Self::H3),
            4 => Some(Self::H4),
            5 => Some(Self::H5),
            6 => Some(Self::H6),
            _ => None,
        }
    }

    /// Outline depth: title is 0, `hN` is N, body text is not a heading.
    pub fn heading_level(self) -> Option<u8> {
        match self {
            Self::Body => None,
            Self::Title => Some(0),
            Self::H1 => Some(1),
            Self::H2 => Some(2),
            Self::H3 => Some(3),
            Self::H4 => Some(4),
            Self::H5 => Some(5),
            Self::H6 => Some(6),
        }
    }
}

/// Ordered `key -> value` metadata of one block.
///
/// Backed by a vector rather than a map: the codec must reproduce key order
/// and repeated keys exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Returns the first value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }

    /// Replaces the first entry for `key`, or appends a new one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(candidate, _)| *candidate == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Appends an entry without looking for an existing key.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Removes every entry stored under `key`, returning the first value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let first = self.get(key).map(str::to_string);
        self.entries.retain(|(candidate, _)| candidate != key);
        first
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One addressable unit of document content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Stable id used to correlate handoff scratch files with this block.
    pub id: BlockId,
    pub kind: BlockKind,
    pub metadata: Metadata,
    /// Raw payload, stored and returned verbatim.
    pub body: String,
    /// Set by the decoder when the body was exactly one blank line, which the
    /// in-memory string cannot distinguish from an empty body.
    pub(crate) blank_line_body: bool,
}

impl Block {
    /// Creates a block with a generated stable id.
    pub fn new(kind: BlockKind, metadata: Metadata, body: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), kind, metadata, body)
    }

    /// Creates a block with a caller-provided id.
    ///
    /// Used by snapshot import where identity already exists.
    pub fn with_id(
        id: BlockId,
        kind: BlockKind,
        metadata: Metadata,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id,
            kind,
            metadata,
            body: body.into(),
            blank_line_body: false,
        }
    }

    /// Creates a text block with its subkind recorded in metadata.
    pub fn text(kind: TextKind, body: impl Into<String>) -> Self {
        Self::new(
            BlockKind::Text,
            Metadata::from_pairs([(META_TEXT_KIND, kind.as_str())]),
            body,
        )
    }

    /// Subkind of a text block; missing metadata reads as body text and an
    /// unrecognised value yields `None`.
    pub fn text_kind(&self) -> Option<TextKind> {
        if self.kind != BlockKind::Text {
            return None;
        }
        match self.metadata.get(META_TEXT_KIND) {
            None => Some(TextKind::Body),
            Some(value) => TextKind::parse(value.trim()),
        }
    }

    pub fn heading_level(&self) -> Option<u8> {
        self.text_kind().and_then(TextKind::heading_level)
    }

    /// First non-blank body line, used as an outline label.
    pub fn label(&self) -> &str {
        self.body
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("")
    }

    /// Copy of this block's content under a fresh id.
    pub fn duplicate(&self) -> Self {
        Self::new(self.kind.clone(), self.metadata.clone(), self.body.clone())
    }

    /// Structural equality: kind, metadata and body, ignoring identity.
    pub fn same_content(&self, other: &Self) -> bool {
        self.kind == other.kind && self.metadata == other.metadata && self.body == other.body
    }

    pub(crate) fn replace_body(&mut self, body: String) {
        self.body = body;
        self.blank_line_body = false;
    }
}

#[cfg(test)]
mod tests {
    use super::{Block, BlockKind, Metadata, TextKind, META_TEXT_KIND};

    #[test]
    fn unknown_tag_becomes_opaque_and_keeps_tag() {
        let kind = BlockKind::from_tag("chart");
        assert_eq!(kind, BlockKind::Opaque("chart".to_string()));
        assert_eq!(kind.tag(), "chart");
        assert!(kind.is_opaque());
    }

    #[test]
    fn known_tags_round_trip() {
        for tag in ["text", "toc", "three", "pyimage", "latex", "map"] {
            assert_eq!(BlockKind::from_tag(tag).tag(), tag);
        }
    }

    #[test]
    fn metadata_set_replaces_first_and_keeps_order() {
        let mut metadata = Metadata::from_pairs([("kind", "h1"), ("extra", "x")]);
        metadata.set("kind", "h2");
        metadata.set("new", "y");
        let pairs: Vec<_> = metadata.iter().collect();
        assert_eq!(pairs, vec![("kind", "h2"), ("extra", "x"), ("new", "y")]);
    }

    #[test]
    fn text_kind_defaults_to_body_and_rejects_unknown_values() {
        let plain = Block::new(BlockKind::Text, Metadata::new(), "hello");
        assert_eq!(plain.text_kind(), Some(TextKind::Body));

        let odd = Block::new(
            BlockKind::Text,
            Metadata::from_pairs([(META_TEXT_KIND, "sidebar")]),
            "x",
        );
        assert_eq!(odd.text_kind(), None);
        assert_eq!(odd.heading_level(), None);
    }

    #[test]
    fn label_skips_leading_blank_lines() {
        let block = Block::text(TextKind::H1, "\n\n  Intro  \nmore");
        assert_eq!(block.label(), "Intro");
        assert_eq!(block.heading_level(), Some(1));
    }

    #[test]
    fn duplicate_changes_identity_only() {
        let block = Block::text(TextKind::Title, "Doc");
        let copy = block.duplicate();
        assert_ne!(copy.id, block.id);
        assert!(copy.same_content(&block));
    }
}
