//! Vault registration and bulk export.

use super::document_service::{export_document, open_document};
use super::{ServiceError, ServiceResult};
use crate::codec::DOCUMENT_EXTENSION;
use crate::config::{load_config_from, save_config_to, AppConfig};
use crate::store::SNAPSHOT_EXTENSION;
use crate::vault::{VaultError, VaultIndex};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Result of `init_vault`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// Root was added to the configuration; the caller persists it.
    Registered(PathBuf),
    AlreadyRegistered(PathBuf),
}

/// Registers `cwd` as a vault root in `config`.
///
/// # Errors
/// - `Vault(NestedVault)` when `cwd` is inside or contains another vault.
/// - `Vault(InvalidTarget)` when `cwd` is not an absolute directory.
pub fn init_vault(config: &mut AppConfig, cwd: impl AsRef<Path>) -> ServiceResult<InitOutcome> {
    let cwd = cwd.as_ref();
    let mut index = VaultIndex::from_roots(&config.vaults);
    let added = index.register_root(cwd)?;
    let root = index
        .vault_for_path(cwd)
        .map(Path::to_path_buf)
        .ok_or_else(|| VaultError::OutsideVault(cwd.to_path_buf()))?;
    if added {
        config.add_vault(root.clone());
        info!(
            "event=vault_init module=service status=ok root={}",
            root.display()
        );
        Ok(InitOutcome::Registered(root))
    } else {
        Ok(InitOutcome::AlreadyRegistered(root))
    }
}

/// Registers `cwd` in the config file at `config_path` and saves it.
///
/// # Errors
/// - `Config` when the existing file cannot be read or parsed; nothing is
///   written so the user's settings survive.
/// - Everything `init_vault` reports.
pub fn register_vault(config_path: &Path, cwd: impl AsRef<Path>) -> ServiceResult<InitOutcome> {
    let load = load_config_from(config_path);
    if let Some(err) = load.error {
        warn!(
            "event=vault_init module=service status=error path={} error={err}",
            config_path.display()
        );
        return Err(err.into());
    }
    let mut config = load.config;
    let outcome = init_vault(&mut config, cwd)?;
    if matches!(outcome, InitOutcome::Registered(_)) {
        save_config_to(config_path, &config)?;
    }
    Ok(outcome)
}

/// Per-file outcome of `export_vault`.
#[derive(Debug, Default)]
pub struct ExportReport {
    /// Snapshot files written.
    pub exported: Vec<PathBuf>,
    /// Documents that could not be exported, with the reason.
    pub failed: Vec<(PathBuf, ServiceError)>,
}

/// Exports every document under `root` to a `.docv` snapshot beside it.
///
/// One broken document does not stop the others; it is listed in
/// `failed`.
pub fn export_vault(root: impl AsRef<Path>) -> ServiceResult<ExportReport> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(VaultError::InvalidTarget(root.to_path_buf()).into());
    }
    let mut documents = Vec::new();
    collect_documents(root, &mut documents)?;
    documents.sort();

    let mut report = ExportReport::default();
    for path in documents {
        let out = path.with_extension(SNAPSHOT_EXTENSION);
        match open_document(&path).and_then(|document| export_document(&document, &out)) {
            Ok(()) => report.exported.push(out),
            Err(err) => {
                warn!(
                    "event=vault_export module=service status=error path={} error={err}",
                    path.display()
                );
                report.failed.push((path, err));
            }
        }
    }
    info!(
        "event=vault_export module=service status=ok root={} exported={} failed={}",
        root.display(),
        report.exported.len(),
        report.failed.len()
    );
    Ok(report)
}

fn collect_documents(dir: &Path, out: &mut Vec<PathBuf>) -> ServiceResult<()> {
    let read_err = |source| ServiceError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        let hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.'));
        if hidden {
            continue;
        }
        if path.is_dir() {
            collect_documents(&path, out)?;
        } else if path
            .extension()
            .is_some_and(|extension| extension == DOCUMENT_EXTENSION)
        {
            out.push(path);
        }
    }
    Ok(())
}
