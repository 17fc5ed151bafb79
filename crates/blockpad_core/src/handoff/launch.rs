//! Editor process launching.
//!
//! # Responsibility
//! - Expand editor/terminal argv templates around a scratch file path.
//! - Offer every usable terminal, in preference order, as a launch candidate.
//! - Spawn detached processes and expose non-blocking exit checks.
//!
//! # Invariants
//! - Spawned processes get null stdin/stdout/stderr.
//! - Nothing here ever blocks waiting for a child.

use std::env;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// Placeholder replaced by the scratch file path in editor templates.
pub const FILE_PLACEHOLDER: &str = "{file}";
/// Placeholder replaced by the editor command in terminal templates.
pub const CMD_PLACEHOLDER: &str = "{cmd}";

const EDITOR_CANDIDATES: &[&str] = &["nvim", "vim", "vi"];
const TERMINAL_CANDIDATES: &[&str] = &[
    "alacritty",
    "foot",
    "kitty",
    "wezterm",
    "gnome-terminal",
    "xterm",
];

/// Exit report of a finished editor process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub success: bool,
    pub code: Option<i32>,
}

/// Running editor process, polled without blocking.
pub trait EditorProcess {
    /// Returns `Some` once the process has exited.
    fn try_wait(&mut self) -> io::Result<Option<ExitOutcome>>;
}

/// Process spawning seam, replaced by fakes in tests.
pub trait EditorLauncher {
    fn launch(&self, argv: &[String]) -> io::Result<Box<dyn EditorProcess>>;
}

impl EditorProcess for Child {
    fn try_wait(&mut self) -> io::Result<Option<ExitOutcome>> {
        Ok(Child::try_wait(self)?.map(|status| ExitOutcome {
            success: status.success(),
            code: status.code(),
        }))
    }
}

/// Launcher backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl EditorLauncher for ProcessLauncher {
    fn launch(&self, argv: &[String]) -> io::Result<Box<dyn EditorProcess>> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty launch command"))?;
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(Box::new(child))
    }
}

/// Editor and terminal argv templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchTemplate {
    /// Editor argv; `{file}` marks the scratch path, appended when absent.
    pub editor: Vec<String>,
    /// Terminal argv; `{cmd}` marks the editor command, `-e` is used when
    /// absent. Empty runs the editor without a terminal.
    pub terminal: Vec<String>,
    /// Terminals tried in order when `terminal` cannot be spawned.
    pub fallback_terminals: Vec<Vec<String>>,
}

impl LaunchTemplate {
    pub fn new(editor: Vec<String>, terminal: Vec<String>) -> Self {
        Self {
            editor,
            terminal,
            fallback_terminals: Vec::new(),
        }
    }

    pub fn with_fallback_terminals(mut self, fallbacks: Vec<Vec<String>>) -> Self {
        self.fallback_terminals = fallbacks;
        self
    }

    /// Full argv that opens `file`.
    pub fn argv(&self, file: &Path) -> Vec<String> {
        self.argv_in(&self.terminal, file)
    }

    /// Argv for the primary terminal followed by one per fallback terminal.
    pub fn argv_candidates(&self, file: &Path) -> Vec<Vec<String>> {
        let mut candidates = vec![self.argv(file)];
        if !self.terminal.is_empty() {
            candidates.extend(
                self.fallback_terminals
                    .iter()
                    .filter(|terminal| !terminal.is_empty())
                    .map(|terminal| self.argv_in(terminal, file)),
            );
        }
        candidates
    }

    fn argv_in(&self, terminal: &[String], file: &Path) -> Vec<String> {
        let file = file.to_string_lossy();
        let mut editor: Vec<String> = self
            .editor
            .iter()
            .map(|token| token.replace(FILE_PLACEHOLDER, &file))
            .collect();
        if !self.editor.iter().any(|token| token.contains(FILE_PLACEHOLDER)) {
            editor.push(file.into_owned());
        }

        if terminal.is_empty() {
            return editor;
        }
        if !terminal.iter().any(|token| token.contains(CMD_PLACEHOLDER)) {
            let mut argv = terminal.to_vec();
            argv.push("-e".to_string());
            argv.extend(editor);
            return argv;
        }

        let joined = editor
            .iter()
            .map(|token| shell_quote(token))
            .collect::<Vec<_>>()
            .join(" ");
        let mut argv = Vec::with_capacity(terminal.len() + editor.len());
        for token in terminal {
            if token == CMD_PLACEHOLDER {
                argv.extend(editor.iter().cloned());
            } else {
                argv.push(token.replace(CMD_PLACEHOLDER, &joined));
            }
        }
        argv
    }
}

/// Editor from `$VISUAL`/`$EDITOR`, else the first of nvim, vim, vi on `PATH`.
pub fn default_editor_command() -> Vec<String> {
    for var in ["VISUAL", "EDITOR"] {
        if let Some(command) = env::var(var).ok().and_then(|value| split_command(&value)) {
            return command;
        }
    }
    EDITOR_CANDIDATES
        .iter()
        .find_map(|name| find_on_path(name))
        .map(|path| vec![path.to_string_lossy().into_owned()])
        .unwrap_or_else(|| vec!["vi".to_string()])
}

/// Every usable terminal in preference order: `$TERMINAL` first, then the
/// known emulators found on `PATH`. Empty when none is found, which runs
/// the editor directly.
pub fn detect_terminal_commands() -> Vec<Vec<String>> {
    let mut commands = Vec::new();
    if let Some(command) = env::var("TERMINAL").ok().and_then(|value| split_command(&value)) {
        if find_on_path(&command[0]).is_some() {
            commands.push(command);
        }
    }
    for name in TERMINAL_CANDIDATES {
        let known = commands.iter().any(|command| command[0] == *name);
        if !known && find_on_path(name).is_some() {
            commands.push(vec![(*name).to_string()]);
        }
    }
    commands
}

fn split_command(value: &str) -> Option<Vec<String>> {
    let tokens: Vec<String> = value.split_whitespace().map(str::to_string).collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens)
    }
}

/// Resolves a program name against `PATH`; paths with a separator are
/// checked as given.
pub fn find_on_path(program: impl AsRef<OsStr>) -> Option<PathBuf> {
    let program = Path::new(program.as_ref());
    if program.components().count() > 1 {
        return is_executable(program).then(|| program.to_path_buf());
    }
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn shell_quote(token: &str) -> String {
    let plain = !token.is_empty()
        && token
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "-_./=:,+@%".contains(ch));
    if plain {
        token.to_string()
    } else {
        format!("'{}'", token.replace('\'', r"'\''"))
    }
}
