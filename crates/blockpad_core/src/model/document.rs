//! Ordered block document.
//!
//! # Responsibility
//! - Own every block of one document and their display/serialization order.
//! - Enforce structural invariants for insert/remove/reorder/edit.
//! - Hand out per-block leases to external edit sessions.
//!
//! # Invariants
//! - A document always holds at least one block.
//! - Block ids are unique within the document.
//! - A checked-out block cannot be removed, reordered or edited except
//!   through the lease that checked it out.
//! - `toc` blocks are derived; their body is never edited.

use crate::model::block::{Block, BlockId, BlockKind, Metadata, TextKind};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Format version written for documents created by this build.
pub const CURRENT_FORMAT_VERSION: u32 = 2;

/// Errors from block model mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// Block id is not part of this document.
    InvalidReference(BlockId),
    /// Attempted edit of a derived block.
    ReadOnlyBlock(BlockId),
    /// Structural mutation of a block that is checked out for editing.
    BlockBusy(BlockId),
    /// Removing the block would leave the document empty.
    LastBlock(BlockId),
    /// Inserted block reuses an id already present in the document.
    DuplicateId(BlockId),
    /// Document construction without any block.
    Empty,
}

impl Display for DocumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidReference(id) => write!(f, "block not found: {id}"),
            Self::ReadOnlyBlock(id) => write!(f, "block is derived and cannot be edited: {id}"),
            Self::BlockBusy(id) => write!(f, "block is open in an external editor: {id}"),
            Self::LastBlock(id) => {
                write!(f, "cannot remove the last remaining block: {id}")
            }
            Self::DuplicateId(id) => write!(f, "block id already present: {id}"),
            Self::Empty => write!(f, "a document must contain at least one block"),
        }
    }
}

impl Error for DocumentError {}

/// Exclusive edit right over one block, held by a handoff session.
///
/// Not `Clone`: the only way to end a checkout is [`Document::release`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a lease keeps its block locked until released"]
pub struct BlockLease {
    block_id: BlockId,
}

impl BlockLease {
    pub fn block_id(&self) -> BlockId {
        self.block_id
    }
}

/// One derived table-of-contents row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub block_id: BlockId,
    /// 0 for the title, N for `hN`.
    pub level: u8,
    pub label: String,
}

/// In-memory document: ordered blocks plus format bookkeeping.
#[derive(Debug, Clone)]
pub struct Document {
    blocks: Vec<Block>,
    format_version: u32,
    final_newline: bool,
    checked_out: BTreeSet<BlockId>,
    dirty: bool,
}

impl Document {
    /// Builds a document from a non-empty block list.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, DocumentError> {
        Self::with_version(blocks, CURRENT_FORMAT_VERSION)
    }

    /// Builds a document that keeps a decoded format version tag.
    pub fn with_version(blocks: Vec<Block>, format_version: u32) -> Result<Self, DocumentError> {
        if blocks.is_empty() {
            return Err(DocumentError::Empty);
        }
        let mut seen = BTreeSet::new();
        for block in &blocks {
            if !seen.insert(block.id) {
                return Err(DocumentError::DuplicateId(block.id));
            }
        }
        Ok(Self {
            blocks,
            format_version,
            final_newline: true,
            checked_out: BTreeSet::new(),
            dirty: false,
        })
    }

    /// New document holding a single `Untitled` title block.
    pub fn untitled() -> Self {
        Self {
            blocks: vec![Block::text(TextKind::Title, "Untitled")],
            format_version: CURRENT_FORMAT_VERSION,
            final_newline: true,
            checked_out: BTreeSet::new(),
            dirty: false,
        }
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    /// Re-tags the document, e.g. to write a leniently read newer file back
    /// at the supported version.
    pub fn set_format_version(&mut self, version: u32) {
        if self.format_version != version {
            self.format_version = version;
            self.dirty = true;
        }
    }

    pub(crate) fn final_newline(&self) -> bool {
        self.final_newline
    }

    pub(crate) fn set_final_newline(&mut self, value: bool) {
        self.final_newline = value;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Number of blocks; never zero.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks in display and serialization order.
    pub fn ordered(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block_at(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn get(&self, id: BlockId) -> Result<&Block, DocumentError> {
        self.blocks
            .iter()
            .find(|block| block.id == id)
            .ok_or(DocumentError::InvalidReference(id))
    }

    pub fn position(&self, id: BlockId) -> Result<usize, DocumentError> {
        self.blocks
            .iter()
            .position(|block| block.id == id)
            .ok_or(DocumentError::InvalidReference(id))
    }

    /// Creates a block and inserts it after `after`, or at the front when
    /// `after` is `None`.
    pub fn insert(
        &mut self,
        after: Option<BlockId>,
        kind: BlockKind,
        metadata: Metadata,
        body: impl Into<String>,
    ) -> Result<BlockId, DocumentError> {
        self.insert_block(after, Block::new(kind, metadata, body))
    }

    /// Inserts an already built block after `after`, or at the front.
    pub fn insert_block(
        &mut self,
        after: Option<BlockId>,
        block: Block,
    ) -> Result<BlockId, DocumentError> {
        if self.blocks.iter().any(|existing| existing.id == block.id) {
            return Err(DocumentError::DuplicateId(block.id));
        }
        let index = match after {
            Some(anchor) => self.position(anchor)? + 1,
            None => 0,
        };
        let id = block.id;
        self.blocks.insert(index, block);
        self.dirty = true;
        Ok(id)
    }

    /// Removes one block and returns it.
    pub fn remove(&mut self, id: BlockId) -> Result<Block, DocumentError> {
        let index = self.position(id)?;
        self.ensure_not_busy(id)?;
        if self.blocks.len() == 1 {
            return Err(DocumentError::LastBlock(id));
        }
        self.dirty = true;
        Ok(self.blocks.remove(index))
    }

    /// Swaps the block with its predecessor; no-op for the first block.
    pub fn move_up(&mut self, id: BlockId) -> Result<(), DocumentError> {
        let index = self.position(id)?;
        self.ensure_not_busy(id)?;
        if index > 0 {
            self.blocks.swap(index, index - 1);
            self.dirty = true;
        }
        Ok(())
    }

    /// Swaps the block with its successor; no-op for the last block.
    pub fn move_down(&mut self, id: BlockId) -> Result<(), DocumentError> {
        let index = self.position(id)?;
        self.ensure_not_busy(id)?;
        if index + 1 < self.blocks.len() {
            self.blocks.swap(index, index + 1);
            self.dirty = true;
        }
        Ok(())
    }

    /// Replaces a block body through the normal edit path.
    pub fn set_body(&mut self, id: BlockId, body: impl Into<String>) -> Result<(), DocumentError> {
        let index = self.editable_index(id)?;
        self.ensure_not_busy(id)?;
        self.blocks[index].replace_body(body.into());
        self.dirty = true;
        Ok(())
    }

    /// Sets one metadata entry through the normal edit path.
    pub fn set_metadata(
        &mut self,
        id: BlockId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), DocumentError> {
        let index = self.editable_index(id)?;
        self.ensure_not_busy(id)?;
        self.blocks[index].metadata.set(key, value);
        self.dirty = true;
        Ok(())
    }

    pub fn is_checked_out(&self, id: BlockId) -> bool {
        self.checked_out.contains(&id)
    }

    pub fn has_checkouts(&self) -> bool {
        !self.checked_out.is_empty()
    }

    /// Locks one block for an external edit session.
    pub fn checkout(&mut self, id: BlockId) -> Result<BlockLease, DocumentError> {
        self.editable_index(id)?;
        if !self.checked_out.insert(id) {
            return Err(DocumentError::BlockBusy(id));
        }
        Ok(BlockLease { block_id: id })
    }

    /// Writes a body through a lease; the block stays checked out.
    pub fn apply_lease(&mut self, lease: &BlockLease, body: String) -> Result<(), DocumentError> {
        let index = self.position(lease.block_id)?;
        if !self.checked_out.contains(&lease.block_id) {
            return Err(DocumentError::InvalidReference(lease.block_id));
        }
        self.blocks[index].replace_body(body);
        self.dirty = true;
        Ok(())
    }

    /// Ends a checkout.
    pub fn release(&mut self, lease: BlockLease) {
        self.checked_out.remove(&lease.block_id);
    }

    /// Table of contents derived from the current heading blocks.
    pub fn outline(&self) -> Vec<OutlineEntry> {
        self.blocks
            .iter()
            .filter_map(|block| {
                block.heading_level().map(|level| OutlineEntry {
                    block_id: block.id,
                    level,
                    label: block.label().to_string(),
                })
            })
            .collect()
    }

    /// Same block order with equal kind, metadata and body; ids may differ.
    pub fn structurally_eq(&self, other: &Self) -> bool {
        self.format_version == other.format_version
            && self.blocks.len() == other.blocks.len()
            && self
                .blocks
                .iter()
                .zip(other.blocks.iter())
                .all(|(left, right)| left.same_content(right))
    }

    fn editable_index(&self, id: BlockId) -> Result<usize, DocumentError> {
        let index = self.position(id)?;
        if self.blocks[index].kind.is_read_only() {
            return Err(DocumentError::ReadOnlyBlock(id));
        }
        Ok(index)
    }

    fn ensure_not_busy(&self, id: BlockId) -> Result<(), DocumentError> {
        if self.checked_out.contains(&id) {
            return Err(DocumentError::BlockBusy(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Document, DocumentError};
    use crate::model::block::{Block, BlockKind, Metadata, TextKind};

    fn three_blocks() -> (Document, [uuid::Uuid; 3]) {
        let a = Block::text(TextKind::Title, "A");
        let b = Block::text(TextKind::Body, "B");
        let c = Block::text(TextKind::H1, "C");
        let ids = [a.id, b.id, c.id];
        (Document::from_blocks(vec![a, b, c]).unwrap(), ids)
    }

    fn order(doc: &Document) -> Vec<String> {
        doc.ordered().iter().map(|b| b.body.clone()).collect()
    }

    #[test]
    fn insert_after_none_goes_to_front() {
        let (mut doc, [a, ..]) = three_blocks();
        doc.insert(None, BlockKind::Latex, Metadata::new(), "x^2")
            .unwrap();
        assert_eq!(order(&doc)[0], "x^2");
        doc.insert(Some(a), BlockKind::Map, Metadata::new(), "m")
            .unwrap();
        assert_eq!(order(&doc), vec!["x^2", "A", "m", "B", "C"]);
        assert!(doc.is_dirty());
    }

    #[test]
    fn move_at_boundaries_is_noop() {
        let (mut doc, [a, _, c]) = three_blocks();
        doc.move_up(a).unwrap();
        doc.move_down(c).unwrap();
        assert_eq!(order(&doc), vec!["A", "B", "C"]);
        assert!(!doc.is_dirty());

        doc.move_down(a).unwrap();
        assert_eq!(order(&doc), vec!["B", "A", "C"]);
    }

    #[test]
    fn unknown_id_is_invalid_reference() {
        let (mut doc, _) = three_blocks();
        let ghost = uuid::Uuid::new_v4();
        assert_eq!(
            doc.remove(ghost).unwrap_err(),
            DocumentError::InvalidReference(ghost)
        );
        assert!(doc.get(ghost).is_err());
    }

    #[test]
    fn toc_body_is_read_only() {
        let (mut doc, [a, ..]) = three_blocks();
        let toc = doc
            .insert(Some(a), BlockKind::Toc, Metadata::new(), "")
            .unwrap();
        assert_eq!(
            doc.set_body(toc, "hand edit").unwrap_err(),
            DocumentError::ReadOnlyBlock(toc)
        );
        assert_eq!(
            doc.checkout(toc).unwrap_err(),
            DocumentError::ReadOnlyBlock(toc)
        );
    }

    #[test]
    fn lease_blocks_structural_mutation_until_released() {
        let (mut doc, [_, b, _]) = three_blocks();
        let lease = doc.checkout(b).unwrap();
        assert_eq!(doc.checkout(b).unwrap_err(), DocumentError::BlockBusy(b));
        assert_eq!(doc.move_up(b).unwrap_err(), DocumentError::BlockBusy(b));
        assert_eq!(doc.set_body(b, "x").unwrap_err(), DocumentError::BlockBusy(b));

        doc.apply_lease(&lease, "edited".to_string()).unwrap();
        doc.release(lease);
        assert_eq!(doc.get(b).unwrap().body, "edited");
        doc.remove(b).unwrap();
    }

    #[test]
    fn outline_lists_headings_in_order() {
        let (doc, [a, _, c]) = three_blocks();
        let outline = doc.outline();
        assert_eq!(outline.len(), 2);
        assert_eq!((outline[0].block_id, outline[0].level), (a, 0));
        assert_eq!((outline[1].block_id, outline[1].level), (c, 1));
        assert_eq!(outline[1].label, "C");
    }

    #[test]
    fn rejects_empty_and_duplicate_construction() {
        assert_eq!(
            Document::from_blocks(vec![]).unwrap_err(),
            DocumentError::Empty
        );
        let block = Block::text(TextKind::Body, "x");
        let copy = block.clone();
        assert!(matches!(
            Document::from_blocks(vec![block, copy]),
            Err(DocumentError::DuplicateId(_))
        ));
    }
}
