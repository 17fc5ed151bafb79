//! `blockpad` command line entry point.
//!
//! # Responsibility
//! - Parse arguments, start logging and load the user configuration.
//! - Run `init` / `export` one-shots or hand a session to the terminal host.

mod tui;

use blockpad_core::config::{config_path, load_config, AppConfig};
use blockpad_core::logging::{default_log_dir, default_log_level, init_logging};
use blockpad_core::service::{
    export_document, export_vault, new_document, open_document, quickstart_document,
    register_vault, save_document, InitOutcome, ServiceError,
};
use blockpad_core::store::SNAPSHOT_EXTENSION;
use blockpad_core::vault::VaultIndex;
use blockpad_core::Session;
use clap::{Parser, Subcommand};
use log::info;
use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "blockpad", version, about = "Block editor that hands each block to your own editor")]
struct Cli {
    /// Document to open; created when it does not exist.
    file: Option<PathBuf>,
    /// Fill a new document with a short tour.
    #[arg(short, long)]
    quickstart: bool,
    /// Log level: trace, debug, info, warn or error.
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register the current directory as a vault.
    Init,
    /// Write `.docv` snapshots of one document, or of every document in the
    /// current vault.
    Export {
        file: Option<PathBuf>,
        /// Snapshot path; defaults to FILE with a `.docv` extension.
        #[arg(long, requires = "file")]
        out: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let load = load_config();
    start_logging(&cli, &load.config);
    if let Some(err) = &load.error {
        eprintln!("blockpad: {err}; using default settings");
    }

    let result = match cli.command {
        Some(Command::Init) => run_init(),
        Some(Command::Export { file, out }) => run_export(&load.config, file, out),
        None => run_editor(&load.config, cli.file, cli.quickstart),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("blockpad: {err}");
            ExitCode::FAILURE
        }
    }
}

fn start_logging(cli: &Cli, config: &AppConfig) {
    let level = cli
        .log_level
        .clone()
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| default_log_level().to_string());
    let dir = config.log_dir.clone().unwrap_or_else(default_log_dir);
    if let Err(err) = init_logging(&level, &dir) {
        eprintln!("blockpad: logging disabled: {err}");
    }
}

fn run_init() -> CliResult {
    let cwd = env::current_dir()?;
    match register_vault(&config_path()?, &cwd)? {
        InitOutcome::Registered(root) => {
            println!("Registered vault {}", root.display());
        }
        InitOutcome::AlreadyRegistered(root) => {
            println!("Already a vault: {}", root.display());
        }
    }
    Ok(())
}

fn run_export(config: &AppConfig, file: Option<PathBuf>, out: Option<PathBuf>) -> CliResult {
    if let Some(file) = file {
        let document = open_document(&file)?;
        let out = out.unwrap_or_else(|| file.with_extension(SNAPSHOT_EXTENSION));
        export_document(&document, &out)?;
        println!("Exported {}", out.display());
        return Ok(());
    }

    let cwd = env::current_dir()?;
    let index = VaultIndex::from_roots(&config.vaults);
    let root = index
        .vault_for_path(&cwd)
        .ok_or("not inside a registered vault; run `blockpad init` or pass a FILE")?;
    let report = export_vault(root)?;
    for path in &report.exported {
        println!("Exported {}", path.display());
    }
    for (path, err) in &report.failed {
        eprintln!("blockpad: skipped {}: {err}", path.display());
    }
    if report.failed.is_empty() {
        Ok(())
    } else {
        Err(format!("{} document(s) could not be exported", report.failed.len()).into())
    }
}

fn run_editor(config: &AppConfig, file: Option<PathBuf>, quickstart: bool) -> CliResult {
    let starter = || {
        if quickstart {
            quickstart_document()
        } else {
            new_document()
        }
    };
    let (document, path) = match file {
        Some(path) if path.exists() => {
            if quickstart {
                return Err(ServiceError::QuickstartExisting(path).into());
            }
            (open_document(&path)?, Some(path))
        }
        Some(path) => {
            let mut document = starter();
            save_document(&path, &mut document)?;
            (document, Some(path))
        }
        None => (starter(), None),
    };
    info!(
        "event=editor_start module=cli status=ok path={} quickstart={quickstart}",
        path.as_ref()
            .map_or_else(|| "-".to_string(), |path| path.display().to_string())
    );
    tui::run(Session::from_config(config, document, path))
}
