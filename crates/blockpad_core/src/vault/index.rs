//! Registered vault roots and filesystem operations inside them.

use super::clipboard::{ClipOp, ClipboardSlot};
use super::{VaultError, VaultResult};
use crate::codec::{self, DOCUMENT_EXTENSION};
use crate::model::document::Document;
use log::{info, warn};
use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Kind of a listed vault entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Folder,
    Document,
}

/// One document or folder inside a vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

impl VaultEntry {
    pub fn new(path: impl Into<PathBuf>, kind: EntryKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Final path component.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Registered vault roots, stored canonicalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultIndex {
    roots: Vec<PathBuf>,
}

impl VaultIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from configured roots, skipping ones that no longer
    /// exist or overlap an earlier root.
    pub fn from_roots<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut index = Self::new();
        for root in roots {
            let root = root.as_ref();
            if let Err(err) = index.register_root(root) {
                warn!(
                    "event=vault_load module=vault status=error path={} error={err}",
                    root.display()
                );
            }
        }
        index
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Registers an absolute, existing directory as a vault root.
    ///
    /// Returns `false` when the root was already registered.
    ///
    /// # Errors
    /// - `InvalidTarget` when `path` is relative or not a directory.
    /// - `NestedVault` when `path` lies inside or contains a registered root.
    pub fn register_root(&mut self, path: impl AsRef<Path>) -> VaultResult<bool> {
        let path = path.as_ref();
        if !path.is_absolute() || !path.is_dir() {
            return Err(VaultError::InvalidTarget(path.to_path_buf()));
        }
        let root = fs::canonicalize(path).map_err(|err| VaultError::io(path, err))?;
        for existing in &self.roots {
            if *existing == root {
                return Ok(false);
            }
            if root.starts_with(existing) || existing.starts_with(&root) {
                return Err(VaultError::NestedVault {
                    path: root,
                    existing: existing.clone(),
                });
            }
        }
        info!(
            "event=vault_register module=vault status=ok root={}",
            root.display()
        );
        self.roots.push(root);
        Ok(true)
    }

    /// Registered root containing `path`, if any.
    pub fn vault_for_path(&self, path: impl AsRef<Path>) -> Option<&Path> {
        let resolved = resolve(path.as_ref())?;
        self.roots
            .iter()
            .find(|root| resolved.starts_with(root))
            .map(PathBuf::as_path)
    }

    fn require_inside(&self, path: &Path) -> VaultResult<PathBuf> {
        let resolved = resolve(path).ok_or_else(|| VaultError::OutsideVault(path.to_path_buf()))?;
        if self.roots.iter().any(|root| resolved.starts_with(root)) {
            Ok(resolved)
        } else {
            Err(VaultError::OutsideVault(path.to_path_buf()))
        }
    }

    /// Folders first, then documents, each sorted by name. Hidden entries
    /// and files other than documents are skipped.
    pub fn list_children(&self, dir: impl AsRef<Path>) -> VaultResult<Vec<VaultEntry>> {
        let dir = self.require_inside(dir.as_ref())?;
        let reader = fs::read_dir(&dir).map_err(|err| VaultError::io(&dir, err))?;
        let mut entries = Vec::new();
        for item in reader {
            let item = item.map_err(|err| VaultError::io(&dir, err))?;
            let name = item.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            let path = item.path();
            if path.is_dir() {
                entries.push(VaultEntry::new(path, EntryKind::Folder));
            } else if is_document_path(&path) {
                entries.push(VaultEntry::new(path, EntryKind::Document));
            }
        }
        entries.sort_by(compare_entries);
        Ok(entries)
    }

    /// Creates a document holding one untitled title block. `.bpad` is
    /// appended when `name` has no extension.
    pub fn create_document(&self, dir: impl AsRef<Path>, name: &str) -> VaultResult<VaultEntry> {
        let dir = self.require_inside(dir.as_ref())?;
        validate_name(name)?;
        let file_name = if Path::new(name).extension().is_some() {
            name.to_string()
        } else {
            format!("{name}.{DOCUMENT_EXTENSION}")
        };
        let path = dir.join(file_name);
        if path.exists() {
            return Err(VaultError::NameConflict(path));
        }
        let text = codec::encode(&Document::untitled())
            .map_err(|err| VaultError::io(&path, io::Error::new(io::ErrorKind::InvalidData, err)))?;
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .and_then(|mut file| io::Write::write_all(&mut file, text.as_bytes()))
            .map_err(|err| conflict_or_io(&path, err))?;
        info!(
            "event=vault_create module=vault status=ok kind=document path={}",
            path.display()
        );
        Ok(VaultEntry::new(path, EntryKind::Document))
    }

    pub fn create_folder(&self, dir: impl AsRef<Path>, name: &str) -> VaultResult<VaultEntry> {
        let dir = self.require_inside(dir.as_ref())?;
        validate_name(name)?;
        let path = dir.join(name);
        fs::create_dir(&path).map_err(|err| conflict_or_io(&path, err))?;
        info!(
            "event=vault_create module=vault status=ok kind=folder path={}",
            path.display()
        );
        Ok(VaultEntry::new(path, EntryKind::Folder))
    }

    /// Renames an entry in place, keeping its parent folder.
    pub fn rename(&self, entry: &VaultEntry, new_name: &str) -> VaultResult<VaultEntry> {
        validate_name(new_name)?;
        if !entry.path.exists() {
            return Err(VaultError::SourceVanished(entry.path.clone()));
        }
        let source = self.require_inside(&entry.path)?;
        let parent = source
            .parent()
            .ok_or_else(|| VaultError::InvalidTarget(source.clone()))?;
        let target = parent.join(new_name);
        if target.exists() {
            return Err(VaultError::NameConflict(target));
        }
        fs::rename(&source, &target).map_err(|err| VaultError::io(&source, err))?;
        info!(
            "event=vault_rename module=vault status=ok from={} to={}",
            source.display(),
            target.display()
        );
        Ok(VaultEntry::new(target, entry.kind))
    }

    /// Puts `entry` on the clipboard to be moved by the next paste.
    pub fn cut(&self, slot: &mut ClipboardSlot, entry: VaultEntry) -> VaultResult<()> {
        self.hold(slot, entry, ClipOp::Cut)
    }

    /// Puts `entry` on the clipboard to be duplicated by the next paste.
    pub fn copy(&self, slot: &mut ClipboardSlot, entry: VaultEntry) -> VaultResult<()> {
        self.hold(slot, entry, ClipOp::Copy)
    }

    fn hold(&self, slot: &mut ClipboardSlot, entry: VaultEntry, op: ClipOp) -> VaultResult<()> {
        if !entry.path.exists() {
            return Err(VaultError::SourceVanished(entry.path));
        }
        self.require_inside(&entry.path)?;
        slot.hold_entry(entry, op);
        Ok(())
    }

    /// Pastes the clipboard entry into `target_dir`: a cut moves it and
    /// empties the slot, a copy duplicates it recursively.
    ///
    /// # Errors
    /// - `NothingToPaste`, `SourceVanished`, `NameConflict`.
    /// - `InvalidTarget` when pasting a folder into itself or a descendant.
    pub fn paste(
        &self,
        slot: &mut ClipboardSlot,
        target_dir: impl AsRef<Path>,
    ) -> VaultResult<VaultEntry> {
        let (entry, op) = match slot.entry() {
            Some((entry, op)) => (entry.clone(), op),
            None => return Err(VaultError::NothingToPaste),
        };
        let target_dir = self.require_inside(target_dir.as_ref())?;
        if !target_dir.is_dir() {
            return Err(VaultError::InvalidTarget(target_dir));
        }
        if !entry.path.exists() {
            return Err(VaultError::SourceVanished(entry.path));
        }
        let source = self.require_inside(&entry.path)?;
        if entry.kind == EntryKind::Folder && target_dir.starts_with(&source) {
            return Err(VaultError::InvalidTarget(target_dir));
        }
        let name = source
            .file_name()
            .ok_or_else(|| VaultError::InvalidTarget(source.clone()))?;
        let destination = target_dir.join(name);
        if destination.exists() {
            return Err(VaultError::NameConflict(destination));
        }

        match op {
            ClipOp::Cut => {
                move_path(&source, &destination)?;
                slot.clear();
            }
            ClipOp::Copy => copy_recursive(&source, &destination)?,
        }
        info!(
            "event=vault_paste module=vault status=ok op={} from={} to={}",
            if op == ClipOp::Cut { "move" } else { "copy" },
            source.display(),
            destination.display()
        );
        Ok(VaultEntry::new(destination, entry.kind))
    }
}

/// Canonical form of `path`; a missing final component is resolved
/// through its parent.
fn resolve(path: &Path) -> Option<PathBuf> {
    if let Ok(resolved) = fs::canonicalize(path) {
        return Some(resolved);
    }
    let parent = fs::canonicalize(path.parent()?).ok()?;
    Some(parent.join(path.file_name()?))
}

fn is_document_path(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|extension| extension == DOCUMENT_EXTENSION)
}

fn compare_entries(left: &VaultEntry, right: &VaultEntry) -> Ordering {
    let rank = |entry: &VaultEntry| match entry.kind {
        EntryKind::Folder => 0,
        EntryKind::Document => 1,
    };
    rank(left)
        .cmp(&rank(right))
        .then_with(|| left.name().cmp(&right.name()))
}

fn validate_name(name: &str) -> VaultResult<()> {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single || name.starts_with('.') || name.contains(['/', '\\', '\0']) {
        return Err(VaultError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn conflict_or_io(path: &Path, err: io::Error) -> VaultError {
    if err.kind() == io::ErrorKind::AlreadyExists {
        VaultError::NameConflict(path.to_path_buf())
    } else {
        VaultError::io(path, err)
    }
}

fn move_path(source: &Path, destination: &Path) -> VaultResult<()> {
    if fs::rename(source, destination).is_ok() {
        return Ok(());
    }
    // Rename fails across filesystems; fall back to copy then delete.
    copy_recursive(source, destination)?;
    let removed = if source.is_dir() {
        fs::remove_dir_all(source)
    } else {
        fs::remove_file(source)
    };
    removed.map_err(|err| VaultError::io(source, err))
}

fn copy_recursive(source: &Path, destination: &Path) -> VaultResult<()> {
    if source.is_dir() {
        fs::create_dir(destination).map_err(|err| conflict_or_io(destination, err))?;
        let reader = fs::read_dir(source).map_err(|err| VaultError::io(source, err))?;
        for item in reader {
            let item = item.map_err(|err| VaultError::io(source, err))?;
            copy_recursive(&item.path(), &destination.join(item.file_name()))?;
        }
        Ok(())
    } else {
        fs::copy(source, destination)
            .map(|_| ())
            .map_err(|err| VaultError::io(source, err))
    }
}
