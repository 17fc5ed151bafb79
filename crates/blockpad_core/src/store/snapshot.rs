//! Whole-document snapshot save/load.

use super::open::open_store;
use super::{StoreError, StoreResult};
use crate::model::block::{Block, BlockKind, Metadata};
use crate::model::document::Document;
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

const META_FORMAT_VERSION: &str = "format_version";
const META_FINAL_NEWLINE: &str = "final_newline";

/// Replaces the stored document with `document` in one transaction.
pub fn save_snapshot(conn: &mut Connection, document: &Document) -> StoreResult<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM block_metadata;", [])?;
    tx.execute("DELETE FROM blocks;", [])?;
    {
        let mut insert_block = tx.prepare(
            "INSERT INTO blocks (uuid, position, kind, body, blank_line_body)
             VALUES (?1, ?2, ?3, ?4, ?5);",
        )?;
        let mut insert_meta = tx.prepare(
            "INSERT INTO block_metadata (block_uuid, ordinal, key, value)
             VALUES (?1, ?2, ?3, ?4);",
        )?;
        for (position, block) in document.ordered().iter().enumerate() {
            let uuid = block.id.to_string();
            insert_block.execute(params![
                uuid,
                position as i64,
                block.kind.tag(),
                block.body,
                block.blank_line_body,
            ])?;
            for (ordinal, (key, value)) in block.metadata.iter().enumerate() {
                insert_meta.execute(params![uuid, ordinal as i64, key, value])?;
            }
        }
    }
    upsert_meta(&tx, META_FORMAT_VERSION, &document.format_version().to_string())?;
    upsert_meta(
        &tx,
        META_FINAL_NEWLINE,
        if document.final_newline() { "1" } else { "0" },
    )?;
    tx.commit()?;
    info!(
        "event=snapshot_save module=store status=ok blocks={}",
        document.block_count()
    );
    Ok(())
}

/// Restores the stored document with its ids, metadata order and version.
pub fn load_snapshot(conn: &Connection) -> StoreResult<Document> {
    let format_version = match read_meta(conn, META_FORMAT_VERSION)? {
        Some(value) => value
            .parse::<u32>()
            .map_err(|_| StoreError::InvalidData(format!("format version `{value}`")))?,
        None => return Err(StoreError::InvalidData("missing format version".to_string())),
    };
    let final_newline = read_meta(conn, META_FINAL_NEWLINE)?.as_deref() != Some("0");

    let mut select_blocks = conn.prepare(
        "SELECT uuid, kind, body, blank_line_body FROM blocks ORDER BY position ASC;",
    )?;
    let mut select_meta = conn.prepare(
        "SELECT key, value FROM block_metadata WHERE block_uuid = ?1 ORDER BY ordinal ASC;",
    )?;

    let rows = select_blocks.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, bool>(3)?,
        ))
    })?;

    let mut blocks = Vec::new();
    for row in rows {
        let (uuid, kind, body, blank_line_body) = row?;
        let id = Uuid::parse_str(&uuid)
            .map_err(|_| StoreError::InvalidData(format!("block id `{uuid}`")))?;
        let pairs = select_meta
            .query_map([&uuid], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut block = Block::with_id(
            id,
            BlockKind::from_tag(&kind),
            Metadata::from_pairs(pairs),
            body,
        );
        block.blank_line_body = blank_line_body;
        blocks.push(block);
    }

    let mut document = Document::with_version(blocks, format_version)
        .map_err(|err| StoreError::InvalidData(err.to_string()))?;
    document.set_final_newline(final_newline);
    Ok(document)
}

/// Writes `document` to a snapshot file, creating or replacing it.
pub fn export_snapshot(path: impl AsRef<Path>, document: &Document) -> StoreResult<()> {
    let mut conn = open_store(path)?;
    save_snapshot(&mut conn, document)
}

/// Reads a document back from a snapshot file.
pub fn import_snapshot(path: impl AsRef<Path>) -> StoreResult<Document> {
    let conn = open_store(path)?;
    load_snapshot(&conn)
}

fn upsert_meta(conn: &Connection, key: &str, value: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO snapshot_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        params![key, value],
    )?;
    Ok(())
}

fn read_meta(conn: &Connection, key: &str) -> StoreResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT value FROM snapshot_meta WHERE key = ?1;",
            [key],
            |row| row.get::<_, String>(0),
        )
        .optional()?)
}
