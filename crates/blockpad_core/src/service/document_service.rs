//! Document file use cases.
//!
//! `.bpad` paths go through the text codec; `.docv` paths go through the
//! snapshot store.

use super::{ServiceError, ServiceResult};
use crate::codec::{self, DecodeOptions};
use crate::model::block::{Block, BlockKind, Metadata, TextKind};
use crate::model::document::Document;
use crate::render::default_body;
use crate::store::{export_snapshot, import_snapshot, SNAPSHOT_EXTENSION};
use log::{error, info};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tempfile::NamedTempFile;

/// Opens a document strictly: newer format versions are refused.
pub fn open_document(path: impl AsRef<Path>) -> ServiceResult<Document> {
    open_document_with(path, DecodeOptions::default())
}

/// Opens a document with explicit decode options.
///
/// # Errors
/// - `Io` when the file cannot be read.
/// - `Format` for text the codec rejects, `Store` for a bad snapshot.
pub fn open_document_with(
    path: impl AsRef<Path>,
    options: DecodeOptions,
) -> ServiceResult<Document> {
    let path = path.as_ref();
    let started_at = Instant::now();
    let result = if is_snapshot_path(path) {
        import_snapshot(path).map_err(|source| ServiceError::Store {
            path: path.to_path_buf(),
            source,
        })
    } else {
        fs::read_to_string(path)
            .map_err(|source| ServiceError::Io {
                path: path.to_path_buf(),
                source,
            })
            .and_then(|text| {
                codec::decode_with(&text, options).map_err(|source| ServiceError::Format {
                    path: path.to_path_buf(),
                    source,
                })
            })
    };
    match &result {
        Ok(document) => info!(
            "event=document_open module=service status=ok path={} blocks={} duration_ms={}",
            path.display(),
            document.block_count(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=document_open module=service status=error path={} error={err}",
            path.display()
        ),
    }
    result
}

/// Fresh document with one `Untitled` title block.
pub fn new_document() -> Document {
    Document::untitled()
}

/// Demo document introducing the editor and its block kinds.
pub fn quickstart_document() -> Document {
    let body = |text: &str| Block::text(TextKind::Body, text);
    let blocks = vec![
        Block::text(TextKind::Title, "Blockpad"),
        body("Navigate blocks with j/k, open a block with Enter.\nPress ? for every key binding."),
        Block::text(TextKind::H1, "Editing"),
        body(
            "Enter opens the block in your editor inside a terminal.\n\
             Save and quit the editor to bring the text back.",
        ),
        Block::text(TextKind::H1, "Notes"),
        body(
            "- Every block is its own file while you edit it.\n\
             - Other blocks stay editable in the meantime.",
        ),
        Block::new(
            BlockKind::Three,
            Metadata::new(),
            default_body(&BlockKind::Three),
        ),
    ];
    Document::from_blocks(blocks).unwrap_or_else(|_| Document::untitled())
}

/// Writes `document` to `path` and marks it clean.
///
/// The file is replaced atomically; on failure the document keeps its dirty
/// state and the previous file stays intact.
pub fn save_document(path: impl AsRef<Path>, document: &mut Document) -> ServiceResult<()> {
    let path = path.as_ref();
    let result = if is_snapshot_path(path) {
        export_document(document, path)
    } else {
        write_text(path, document)
    };
    match &result {
        Ok(()) => {
            document.mark_clean();
            info!(
                "event=document_save module=service status=ok path={} blocks={}",
                path.display(),
                document.block_count()
            );
        }
        Err(err) => error!(
            "event=document_save module=service status=error path={} error={err}",
            path.display()
        ),
    }
    result
}

/// Writes a `.docv` snapshot of `document` to `out`, replacing any previous
/// snapshot there.
pub fn export_document(document: &Document, out: impl AsRef<Path>) -> ServiceResult<()> {
    let out = out.as_ref();
    export_snapshot(out, document).map_err(|source| ServiceError::Store {
        path: out.to_path_buf(),
        source,
    })?;
    info!(
        "event=document_export module=service status=ok out={}",
        out.display()
    );
    Ok(())
}

fn write_text(path: &Path, document: &Document) -> ServiceResult<()> {
    let text = codec::encode(document).map_err(|source| ServiceError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    let io_err = |source: std::io::Error| ServiceError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(parent).map_err(io_err)?;
    temp.write_all(text.as_bytes()).map_err(io_err)?;
    temp.flush().map_err(io_err)?;
    if let Some(permissions) = target_permissions(path) {
        fs::set_permissions(temp.path(), permissions).map_err(io_err)?;
    }
    temp.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}

/// Mode the saved file should end up with: the replaced file's, or
/// `0644` for a new file instead of the private temp-file mode.
fn target_permissions(path: &Path) -> Option<fs::Permissions> {
    if let Ok(metadata) = fs::metadata(path) {
        return Some(metadata.permissions());
    }
    new_file_permissions()
}

#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}

pub(crate) fn is_snapshot_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension == SNAPSHOT_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::{new_document, open_document, quickstart_document, save_document};
    use crate::model::block::BlockKind;
    use crate::service::ServiceError;

    #[test]
    fn quickstart_has_outline_and_scene() {
        let doc = quickstart_document();
        let labels: Vec<_> = doc.outline().into_iter().map(|entry| entry.label).collect();
        assert_eq!(labels, ["Blockpad", "Editing", "Notes"]);
        assert!(doc.ordered().iter().any(|block| block.kind == BlockKind::Three));
        assert!(crate::codec::encode(&doc).is_ok());
    }

    #[test]
    fn save_marks_clean_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.bpad");
        let mut doc = new_document();
        let first = doc.ordered()[0].id;
        doc.set_body(first, "Renamed").unwrap();
        assert!(doc.is_dirty());

        save_document(&path, &mut doc).unwrap();
        assert!(!doc.is_dirty());
        let reopened = open_document(&path).unwrap();
        assert!(reopened.structurally_eq(&doc));
    }

    #[cfg(unix)]
    #[test]
    fn save_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let mode = |path: &std::path::Path| {
            std::fs::metadata(path).unwrap().permissions().mode() & 0o777
        };

        let fresh = dir.path().join("fresh.bpad");
        save_document(&fresh, &mut new_document()).unwrap();
        assert_eq!(mode(&fresh), 0o644);

        let shared = dir.path().join("shared.bpad");
        save_document(&shared, &mut new_document()).unwrap();
        std::fs::set_permissions(&shared, std::fs::Permissions::from_mode(0o664)).unwrap();
        let mut doc = open_document(&shared).unwrap();
        let first = doc.ordered()[0].id;
        doc.set_body(first, "Changed").unwrap();
        save_document(&shared, &mut doc).unwrap();
        assert_eq!(mode(&shared), 0o664);
    }

    #[test]
    fn failed_save_keeps_dirty_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("note.bpad");
        let mut doc = new_document();
        let first = doc.ordered()[0].id;
        doc.set_body(first, "Unsaved").unwrap();

        let err = save_document(&path, &mut doc).unwrap_err();
        assert!(matches!(err, ServiceError::Io { .. }));
        assert!(doc.is_dirty());
        assert_eq!(doc.ordered()[0].body, "Unsaved");
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.bpad");
        std::fs::write(&path, "not a header\n").unwrap();
        assert!(matches!(
            open_document(&path),
            Err(ServiceError::Format { .. })
        ));
    }
}
