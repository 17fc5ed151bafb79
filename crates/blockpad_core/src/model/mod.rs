//! Block document domain model.
//!
//! # Responsibility
//! - Define the canonical in-memory shape of a document.
//! - Keep every structural invariant inside core, independent of storage.
//!
//! # Invariants
//! - Every block is identified by a stable `BlockId`.
//! - A document is never empty.

pub mod block;
pub mod document;
