//! Single-item clipboard.

use super::index::VaultEntry;
use crate::model::block::Block;

/// Whether the held item is moved or duplicated on paste.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipOp {
    Cut,
    Copy,
}

/// The one clipboard slot. Holding a block drops any held entry and the
/// other way around.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ClipboardSlot {
    #[default]
    Empty,
    Block { block: Block, op: ClipOp },
    Entry { entry: VaultEntry, op: ClipOp },
}

impl ClipboardSlot {
    pub fn hold_block(&mut self, block: Block, op: ClipOp) {
        *self = Self::Block { block, op };
    }

    pub fn hold_entry(&mut self, entry: VaultEntry, op: ClipOp) {
        *self = Self::Entry { entry, op };
    }

    pub fn block(&self) -> Option<&Block> {
        match self {
            Self::Block { block, .. } => Some(block),
            _ => None,
        }
    }

    pub fn entry(&self) -> Option<(&VaultEntry, ClipOp)> {
        match self {
            Self::Entry { entry, op } => Some((entry, *op)),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn clear(&mut self) {
        *self = Self::Empty;
    }
}
