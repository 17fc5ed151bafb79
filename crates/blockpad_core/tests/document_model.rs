use blockpad_core::model::block::{Block, BlockKind, Metadata, TextKind};
use blockpad_core::model::document::{Document, DocumentError};

fn three_blocks() -> (Document, Vec<uuid::Uuid>) {
    let blocks = vec![
        Block::text(TextKind::Title, "Doc"),
        Block::text(TextKind::H1, "Part"),
        Block::text(TextKind::Body, "words"),
    ];
    let ids = blocks.iter().map(|block| block.id).collect();
    (Document::from_blocks(blocks).unwrap(), ids)
}

#[test]
fn last_block_cannot_be_removed() {
    let mut document = Document::untitled();
    let only = document.ordered()[0].id;
    assert_eq!(
        document.remove(only).unwrap_err(),
        DocumentError::LastBlock(only)
    );
    assert_eq!(document.block_count(), 1);
}

#[test]
fn moves_are_no_ops_at_the_edges() {
    let (mut document, ids) = three_blocks();
    document.move_up(ids[0]).unwrap();
    document.move_down(ids[2]).unwrap();
    assert!(!document.is_dirty());

    document.move_down(ids[0]).unwrap();
    let order: Vec<_> = document.ordered().iter().map(|block| block.id).collect();
    assert_eq!(order, [ids[1], ids[0], ids[2]]);
}

#[test]
fn insert_after_anchor_and_at_front() {
    let (mut document, ids) = three_blocks();
    let middle = document
        .insert(Some(ids[1]), BlockKind::Latex, Metadata::new(), "x^2")
        .unwrap();
    let front = document
        .insert(None, BlockKind::Map, Metadata::new(), "")
        .unwrap();
    assert_eq!(document.position(front).unwrap(), 0);
    assert_eq!(document.position(middle).unwrap(), 3);
}

#[test]
fn unknown_id_is_invalid_reference() {
    let (mut document, _) = three_blocks();
    let stranger = uuid::Uuid::new_v4();
    assert_eq!(
        document.move_up(stranger).unwrap_err(),
        DocumentError::InvalidReference(stranger)
    );
    assert!(document.get(stranger).is_err());
}

#[test]
fn toc_body_is_read_only_and_derived() {
    let (mut document, ids) = three_blocks();
    let toc = document
        .insert(Some(ids[0]), BlockKind::Toc, Metadata::new(), "")
        .unwrap();
    assert_eq!(
        document.set_body(toc, "manual").unwrap_err(),
        DocumentError::ReadOnlyBlock(toc)
    );
    assert!(document.checkout(toc).is_err());

    let labels: Vec<_> = document
        .outline()
        .into_iter()
        .map(|entry| (entry.level, entry.label))
        .collect();
    assert_eq!(labels, [(0, "Doc".to_string()), (1, "Part".to_string())]);
}

#[test]
fn checked_out_block_is_busy_until_released() {
    let (mut document, ids) = three_blocks();
    let lease = document.checkout(ids[2]).unwrap();

    assert_eq!(
        document.remove(ids[2]).unwrap_err(),
        DocumentError::BlockBusy(ids[2])
    );
    assert_eq!(
        document.move_up(ids[2]).unwrap_err(),
        DocumentError::BlockBusy(ids[2])
    );
    document.move_up(ids[1]).unwrap();

    document.apply_lease(&lease, "edited".to_string()).unwrap();
    document.release(lease);
    assert_eq!(document.get(ids[2]).unwrap().body, "edited");
    document.remove(ids[2]).unwrap();
    assert_eq!(document.block_count(), 2);
}
