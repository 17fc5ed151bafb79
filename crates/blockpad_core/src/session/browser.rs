//! Vault browser cursor.

use crate::vault::{EntryKind, VaultEntry, VaultIndex, VaultResult};
use std::path::{Path, PathBuf};

/// Where the browser is and which entry is selected.
///
/// With no current folder the browser lists the registered roots.
#[derive(Debug, Clone, Default)]
pub struct VaultBrowser {
    dir: Option<PathBuf>,
    entries: Vec<VaultEntry>,
    cursor: usize,
}

/// What entering the selected entry led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseOutcome {
    Entered,
    OpenDocument(PathBuf),
    Nothing,
}

impl VaultBrowser {
    /// Current folder, or `None` at the roots list.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn entries(&self) -> &[VaultEntry] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selected(&self) -> Option<&VaultEntry> {
        self.entries.get(self.cursor)
    }

    /// Re-reads the current folder. A folder that vanished sends the
    /// browser back to the roots list.
    pub fn refresh(&mut self, index: &VaultIndex) -> VaultResult<()> {
        let selected = self.selected().map(|entry| entry.path.clone());
        if self.dir.as_deref().is_some_and(|dir| !dir.is_dir()) {
            self.dir = None;
        }
        self.entries = match &self.dir {
            None => roots_as_entries(index),
            Some(dir) => index.list_children(dir)?,
        };
        self.cursor = selected
            .and_then(|path| self.entries.iter().position(|entry| entry.path == path))
            .unwrap_or(0)
            .min(self.entries.len().saturating_sub(1));
        Ok(())
    }

    /// Selects the entry at `path` when it is listed.
    pub fn select_path(&mut self, path: &Path) {
        if let Some(index) = self.entries.iter().position(|entry| entry.path == path) {
            self.cursor = index;
        }
    }

    pub fn move_down(&mut self) {
        if self.cursor + 1 < self.entries.len() {
            self.cursor += 1;
        }
    }

    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// Goes to the parent folder; from a root, back to the roots list.
    pub fn up(&mut self, index: &VaultIndex) -> VaultResult<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        let is_root = index.roots().iter().any(|root| *root == dir);
        self.dir = if is_root {
            None
        } else {
            dir.parent().map(Path::to_path_buf)
        };
        self.entries.clear();
        self.refresh(index)?;
        self.select_path(&dir);
        Ok(())
    }

    /// Enters the selected folder or reports the selected document.
    pub fn enter(&mut self, index: &VaultIndex) -> VaultResult<BrowseOutcome> {
        let Some(entry) = self.selected().cloned() else {
            return Ok(BrowseOutcome::Nothing);
        };
        match entry.kind {
            EntryKind::Document => Ok(BrowseOutcome::OpenDocument(entry.path)),
            EntryKind::Folder => {
                let previous = self.dir.replace(entry.path);
                self.entries.clear();
                if let Err(err) = self.refresh(index) {
                    self.dir = previous;
                    self.refresh(index)?;
                    return Err(err);
                }
                self.cursor = 0;
                Ok(BrowseOutcome::Entered)
            }
        }
    }
}

fn roots_as_entries(index: &VaultIndex) -> Vec<VaultEntry> {
    index
        .roots()
        .iter()
        .map(|root| VaultEntry::new(root.clone(), EntryKind::Folder))
        .collect()
}
