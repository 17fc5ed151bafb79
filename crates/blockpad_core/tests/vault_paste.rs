use blockpad_core::vault::{ClipboardSlot, EntryKind, VaultEntry, VaultError, VaultIndex};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

struct Vault {
    _dir: TempDir,
    root: PathBuf,
    index: VaultIndex,
}

fn vault() -> Vault {
    let dir = tempfile::tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    let mut index = VaultIndex::new();
    assert!(index.register_root(&root).unwrap());
    Vault {
        _dir: dir,
        root,
        index,
    }
}

#[test]
fn paste_onto_existing_name_changes_nothing() {
    let vault = vault();
    let archive = vault.index.create_folder(&vault.root, "archive").unwrap();
    let source = vault.index.create_document(&vault.root, "notes").unwrap();
    fs::write(archive.path.join("notes.bpad"), "kept\n").unwrap();

    let mut slot = ClipboardSlot::default();
    vault.index.cut(&mut slot, source.clone()).unwrap();
    let err = vault.index.paste(&mut slot, &archive.path).unwrap_err();
    assert!(matches!(err, VaultError::NameConflict(path) if path == archive.path.join("notes.bpad")));

    assert!(source.path.exists());
    assert_eq!(
        fs::read_to_string(archive.path.join("notes.bpad")).unwrap(),
        "kept\n"
    );
    assert!(slot.entry().is_some());
}

#[test]
fn copied_entry_onto_existing_name_changes_nothing() {
    let vault = vault();
    let archive = vault.index.create_folder(&vault.root, "archive").unwrap();
    let source = vault.index.create_document(&vault.root, "notes").unwrap();
    fs::write(&source.path, "original\n").unwrap();
    fs::write(archive.path.join("notes.bpad"), "kept\n").unwrap();

    let mut slot = ClipboardSlot::default();
    vault.index.copy(&mut slot, source.clone()).unwrap();
    let err = vault.index.paste(&mut slot, &archive.path).unwrap_err();
    assert!(matches!(err, VaultError::NameConflict(path) if path == archive.path.join("notes.bpad")));
    assert_eq!(fs::read_to_string(&source.path).unwrap(), "original\n");
    assert_eq!(
        fs::read_to_string(archive.path.join("notes.bpad")).unwrap(),
        "kept\n"
    );

    // Pasting next to itself collides with the source name too.
    let err = vault.index.paste(&mut slot, &vault.root).unwrap_err();
    assert!(matches!(err, VaultError::NameConflict(path) if path == source.path));
    assert_eq!(fs::read_to_string(&source.path).unwrap(), "original\n");
    assert!(slot.entry().is_some());

    let count = fs::read_dir(&archive.path).unwrap().count();
    assert_eq!(count, 1);
}

#[test]
fn cut_moves_and_empties_the_clipboard() {
    let vault = vault();
    let archive = vault.index.create_folder(&vault.root, "archive").unwrap();
    let source = vault.index.create_document(&vault.root, "notes").unwrap();

    let mut slot = ClipboardSlot::default();
    vault.index.cut(&mut slot, source.clone()).unwrap();
    let pasted = vault.index.paste(&mut slot, &archive.path).unwrap();

    assert_eq!(pasted.path, archive.path.join("notes.bpad"));
    assert_eq!(pasted.kind, EntryKind::Document);
    assert!(!source.path.exists());
    assert!(slot.is_empty());
    let names: Vec<_> = vault
        .index
        .list_children(&vault.root)
        .unwrap()
        .iter()
        .map(VaultEntry::name)
        .collect();
    assert_eq!(names, ["archive"]);
}

#[test]
fn copied_folder_is_duplicated_recursively() {
    let vault = vault();
    let project = vault.index.create_folder(&vault.root, "project").unwrap();
    vault.index.create_document(&project.path, "plan").unwrap();
    let target = vault.index.create_folder(&vault.root, "backup").unwrap();

    let mut slot = ClipboardSlot::default();
    vault.index.copy(&mut slot, project.clone()).unwrap();
    let pasted = vault.index.paste(&mut slot, &target.path).unwrap();

    assert!(pasted.path.join("plan.bpad").is_file());
    assert!(project.path.join("plan.bpad").is_file());
    assert!(slot.entry().is_some());
    assert!(matches!(
        vault.index.paste(&mut slot, &project.path),
        Err(VaultError::InvalidTarget(_))
    ));
}

#[test]
fn vanished_source_is_reported() {
    let vault = vault();
    let source = vault.index.create_document(&vault.root, "gone").unwrap();
    let mut slot = ClipboardSlot::default();
    vault.index.copy(&mut slot, source.clone()).unwrap();
    fs::remove_file(&source.path).unwrap();

    assert!(matches!(
        vault.index.paste(&mut slot, &vault.root),
        Err(VaultError::SourceVanished(path)) if path == source.path
    ));
}

#[test]
fn paths_outside_the_vault_are_refused() {
    let vault = vault();
    let elsewhere = tempfile::tempdir().unwrap();
    assert!(matches!(
        vault.index.create_folder(elsewhere.path(), "x"),
        Err(VaultError::OutsideVault(_))
    ));
    assert!(matches!(
        vault.index.create_folder(&vault.root, "../escape"),
        Err(VaultError::InvalidName(_))
    ));
}
