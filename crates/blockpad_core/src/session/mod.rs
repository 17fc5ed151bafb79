//! Editing session: the single owner of all interactive state.
//!
//! # Responsibility
//! - Own the open document, key router, vault index, clipboard and editor
//!   handoffs, and pass them explicitly to each component.
//! - Turn routed actions into model, vault and handoff calls.
//! - Surface every recoverable failure as a status message.
//!
//! # Invariants
//! - No action error escapes `handle_chord`; it becomes the status line.
//! - The selection always points at an existing block.
//! - The open document is never replaced while a block is checked out.

use crate::config::AppConfig;
use crate::handoff::{HandoffController, HandoffError, HandoffEvent};
use crate::keymap::{build_help_lines, Action, Chord, Mode, ModeRouter, RouteOutcome};
use crate::model::block::{Block, BlockId, BlockKind, Metadata, TextKind};
use crate::model::document::{Document, DocumentError};
use crate::render::{default_body, describe, render_blocks, RenderAdapter, RenderError};
use crate::service::{export_document, open_document, save_document, ServiceError};
use crate::store::SNAPSHOT_EXTENSION;
use crate::vault::{ClipOp, ClipboardSlot, VaultEntry, VaultError, VaultIndex};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;

mod browser;
mod outline;

pub use browser::{BrowseOutcome, VaultBrowser};
pub use outline::{OutlineRow, OutlineView};

/// Failures of one session action.
#[derive(Debug)]
pub enum SessionError {
    Document(DocumentError),
    Handoff(HandoffError),
    Vault(VaultError),
    Service(ServiceError),
    /// Explicit save failed; the in-memory document is unchanged.
    Save(ServiceError),
    Render(RenderError),
    /// Save or export of a document that has no file yet.
    NoPath,
    /// Opening another document would discard unsaved edits.
    UnsavedChanges,
    /// Blocks are still open in external editors.
    BlocksCheckedOut(usize),
    /// The action needs a folder but the browser lists the vault roots.
    NotInFolder,
    NoEntrySelected,
    NoBlockInClipboard,
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document(err) => write!(f, "{err}"),
            Self::Handoff(err) => write!(f, "{err}"),
            Self::Vault(err) => write!(f, "{err}"),
            Self::Service(err) => write!(f, "{err}"),
            Self::Save(err) => write!(f, "save failed: {err}"),
            Self::Render(err) => write!(f, "render failed: {err}"),
            Self::NoPath => write!(f, "document has no file; open it from a vault first"),
            Self::UnsavedChanges => {
                write!(f, "unsaved changes; save before opening another document")
            }
            Self::BlocksCheckedOut(count) => {
                write!(f, "{count} block(s) still open in an editor")
            }
            Self::NotInFolder => write!(f, "enter a vault folder first"),
            Self::NoEntrySelected => write!(f, "no entry selected"),
            Self::NoBlockInClipboard => write!(f, "clipboard holds no block"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Document(err) => Some(err),
            Self::Handoff(err) => Some(err),
            Self::Vault(err) => Some(err),
            Self::Service(err) | Self::Save(err) => Some(err),
            Self::Render(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DocumentError> for SessionError {
    fn from(value: DocumentError) -> Self {
        Self::Document(value)
    }
}

impl From<HandoffError> for SessionError {
    fn from(value: HandoffError) -> Self {
        Self::Handoff(value)
    }
}

impl From<VaultError> for SessionError {
    fn from(value: VaultError) -> Self {
        Self::Vault(value)
    }
}

impl From<RenderError> for SessionError {
    fn from(value: RenderError) -> Self {
        Self::Render(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Error,
}

/// One line of user-facing feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Error,
            text: text.into(),
        }
    }
}

/// A vault action waiting for the host to ask the user for a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameRequest {
    NewDocument { dir: PathBuf },
    NewFolder { dir: PathBuf },
    Rename { entry: VaultEntry },
}

impl NameRequest {
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::NewDocument { .. } => "New document name",
            Self::NewFolder { .. } => "New folder name",
            Self::Rename { .. } => "Rename to",
        }
    }

    /// Pre-filled answer.
    pub fn initial(&self) -> String {
        match self {
            Self::Rename { entry } => entry.name(),
            _ => String::new(),
        }
    }
}

/// What the host loop should do after a chord.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    Continue,
    Quit,
    NeedsName(NameRequest),
}

/// Interactive state of one running editor.
pub struct Session {
    document: Document,
    path: Option<PathBuf>,
    router: ModeRouter,
    vault: VaultIndex,
    clipboard: ClipboardSlot,
    handoff: HandoffController,
    selected: usize,
    outline: OutlineView,
    browser: VaultBrowser,
    help_lines: Vec<String>,
    help_scroll: usize,
    help_return: Mode,
    status: Option<StatusMessage>,
    renderer: Option<Box<dyn RenderAdapter>>,
    quit_armed: bool,
}

impl Session {
    pub fn new(
        document: Document,
        path: Option<PathBuf>,
        router: ModeRouter,
        vault: VaultIndex,
        handoff: HandoffController,
    ) -> Self {
        let help_lines = build_help_lines(router.keymap());
        Self {
            document,
            path,
            router,
            vault,
            clipboard: ClipboardSlot::default(),
            handoff,
            selected: 0,
            outline: OutlineView::default(),
            browser: VaultBrowser::default(),
            help_lines,
            help_scroll: 0,
            help_return: Mode::Document,
            status: None,
            renderer: None,
            quit_armed: false,
        }
    }

    /// Session wired from the user configuration with a real editor
    /// launcher. Keymap problems are logged and summarised in the status.
    pub fn from_config(config: &AppConfig, document: Document, path: Option<PathBuf>) -> Self {
        let (keymap, issues) = config.resolve_keymap();
        for issue in &issues {
            warn!("event=keymap_load module=session status=error issue={issue}");
        }
        let router = ModeRouter::new(keymap, config.pending_timeout());
        let handoff = HandoffController::with_process_launcher(
            config.launch_template(),
            config.editor.reintegrate,
        );
        let mut session = Self::new(
            document,
            path,
            router,
            VaultIndex::from_roots(&config.vaults),
            handoff,
        );
        if let Some(first) = issues.first() {
            session.status = Some(StatusMessage::error(format!(
                "keymap: {first} ({} problem(s), defaults used)",
                issues.len()
            )));
        }
        session
    }

    pub fn set_render_adapter(&mut self, adapter: Box<dyn RenderAdapter>) {
        self.renderer = Some(adapter);
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn mode(&self) -> Mode {
        self.router.mode()
    }

    pub fn pending(&self) -> &[Chord] {
        self.router.pending()
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_block(&self) -> Option<&Block> {
        self.document.block_at(self.selected)
    }

    pub fn outline(&self) -> &OutlineView {
        &self.outline
    }

    pub fn browser(&self) -> &VaultBrowser {
        &self.browser
    }

    pub fn vault(&self) -> &VaultIndex {
        &self.vault
    }

    pub fn clipboard(&self) -> &ClipboardSlot {
        &self.clipboard
    }

    pub fn handoff(&self) -> &HandoffController {
        &self.handoff
    }

    /// Help lines from the current scroll offset on.
    pub fn help_lines(&self) -> &[String] {
        &self.help_lines[self.help_scroll.min(self.help_lines.len())..]
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn handle_chord(&mut self, chord: Chord) -> SessionSignal {
        self.handle_chord_at(chord, Instant::now())
    }

    /// Routes `chord` as if it arrived at `now` and runs the fired action.
    pub fn handle_chord_at(&mut self, chord: Chord, now: Instant) -> SessionSignal {
        let mode = self.router.mode();
        let action = match self.router.handle_chord_at(chord, now) {
            RouteOutcome::Fired(action) => action,
            RouteOutcome::Pending | RouteOutcome::Dropped | RouteOutcome::Cancelled => {
                return SessionSignal::Continue;
            }
        };
        if action != Action::Quit {
            self.quit_armed = false;
        }
        match self.dispatch(mode, action) {
            Ok(signal) => signal,
            Err(err) => {
                self.report(&err);
                SessionSignal::Continue
            }
        }
    }

    /// Completes a vault action that asked for a name. Returns whether it
    /// succeeded; failures land in the status line.
    pub fn submit_name(&mut self, request: NameRequest, name: &str) -> bool {
        let name = name.trim();
        let result = match &request {
            NameRequest::NewDocument { dir } => self.vault.create_document(dir, name),
            NameRequest::NewFolder { dir } => self.vault.create_folder(dir, name),
            NameRequest::Rename { entry } => self.vault.rename(entry, name).map(|renamed| {
                self.follow_move(&entry.path, &renamed.path);
                renamed
            }),
        };
        match result {
            Ok(entry) => {
                if let Err(err) = self.browser.refresh(&self.vault) {
                    self.report(&err.into());
                    return false;
                }
                self.browser.select_path(&entry.path);
                let verb = match request {
                    NameRequest::Rename { .. } => "Renamed to",
                    _ => "Created",
                };
                self.status = Some(StatusMessage::info(format!("{verb} {}", entry.name())));
                true
            }
            Err(err) => {
                self.report(&err.into());
                false
            }
        }
    }

    /// Replaces the open document with the file at `path`.
    ///
    /// # Errors
    /// - `BlocksCheckedOut` while any handoff is running.
    /// - `UnsavedChanges` when the current document is dirty.
    /// - `Service` when the file cannot be read or decoded; the current
    ///   document stays open.
    pub fn open_path(&mut self, path: &Path) -> Result<(), SessionError> {
        if self.document.has_checkouts() {
            return Err(SessionError::BlocksCheckedOut(self.handoff.active_count()));
        }
        if self.document.is_dirty() {
            return Err(SessionError::UnsavedChanges);
        }
        let document = open_document(path).map_err(SessionError::Service)?;
        self.document = document;
        self.path = Some(path.to_path_buf());
        self.selected = 0;
        self.outline = OutlineView::default();
        self.router.set_mode(Mode::Document);
        self.status = Some(StatusMessage::info(format!("Opened {}", path.display())));
        self.render_surfaces();
        Ok(())
    }

    /// Collects finished editor sessions and applies their results.
    /// Returns how many sessions finished.
    pub fn poll_handoffs(&mut self) -> usize {
        let events = self.handoff.poll(&mut self.document);
        let count = events.len();
        for event in events {
            match event {
                HandoffEvent::Reintegrated { block_id, changed } => {
                    if changed {
                        self.status = Some(StatusMessage::info("Block updated"));
                        self.render_block(block_id);
                    } else {
                        self.status = Some(StatusMessage::info("Block unchanged"));
                    }
                }
                HandoffEvent::Failed { error, .. } => self.report(&error.into()),
            }
        }
        count
    }

    /// Runs the render adapter over every surface block.
    pub fn render_surfaces(&mut self) {
        let Some(adapter) = self.renderer.as_mut() else {
            return;
        };
        let failures = render_blocks(self.document.ordered(), adapter.as_mut());
        for failure in &failures {
            warn!("event=render module=session status=error error={failure}");
        }
        if let Some(first) = failures.into_iter().next() {
            self.status = Some(StatusMessage::error(SessionError::Render(first).to_string()));
        }
    }

    /// Abandons running editor sessions without waiting on them.
    pub fn shutdown(&mut self) {
        self.handoff.shutdown(&mut self.document);
        info!("event=session_shutdown module=session status=ok");
    }

    fn dispatch(&mut self, mode: Mode, action: Action) -> Result<SessionSignal, SessionError> {
        match mode {
            Mode::Document => self.document_action(action),
            Mode::Outline => self.outline_action(action).map(|()| SessionSignal::Continue),
            Mode::Vault => self.vault_action(action),
            Mode::Help => {
                self.help_action(action);
                Ok(SessionSignal::Continue)
            }
        }
    }

    fn document_action(&mut self, action: Action) -> Result<SessionSignal, SessionError> {
        match action {
            Action::MoveDown => self.select_index(self.selected + 1),
            Action::MoveUp => self.select_index(self.selected.saturating_sub(1)),
            Action::FirstBlock => self.select_index(0),
            Action::LastBlock => self.select_index(self.document.block_count()),
            Action::MoveBlockDown => {
                let id = self.selected_id()?;
                self.document.move_down(id)?;
                self.selected = self.document.position(id)?;
            }
            Action::MoveBlockUp => {
                let id = self.selected_id()?;
                self.document.move_up(id)?;
                self.selected = self.document.position(id)?;
            }
            Action::OpenEditor => self.open_selected()?,
            Action::Save => self.save()?,
            Action::Quit => return Ok(self.request_quit()),
            Action::Export => self.export()?,
            Action::HelpToggle => self.enter_help(),
            Action::PasteBlock => {
                let block = self
                    .clipboard
                    .block()
                    .map(Block::duplicate)
                    .ok_or(SessionError::NoBlockInClipboard)?;
                self.insert_after_selected(block)?;
            }
            Action::DeleteBlock => {
                let id = self.selected_id()?;
                let removed = self.document.remove(id)?;
                self.clipboard.hold_block(removed, ClipOp::Cut);
                self.select_index(self.selected);
            }
            Action::YankBlock => {
                let block = self.document.get(self.selected_id()?)?.clone();
                self.clipboard.hold_block(block, ClipOp::Copy);
                self.status = Some(StatusMessage::info("Block copied"));
            }
            Action::OpenVault => self.enter_vault()?,
            Action::OpenOutline => self.open_outline()?,
            Action::InsertText => self.insert_text(TextKind::Body)?,
            Action::InsertTitle => self.insert_text(TextKind::Title)?,
            Action::InsertHeading(level) => {
                if let Some(kind) = TextKind::heading(level) {
                    self.insert_text(kind)?;
                }
            }
            Action::InsertToc => {
                self.insert_after_selected(Block::new(BlockKind::Toc, Metadata::new(), ""))?;
            }
            Action::InsertThree => self.insert_surface(BlockKind::Three)?,
            Action::InsertPyImage => self.insert_surface(BlockKind::PyImage)?,
            Action::InsertLatex => self.insert_surface(BlockKind::Latex)?,
            Action::InsertMap => self.insert_surface(BlockKind::Map)?,
            _ => {}
        }
        Ok(SessionSignal::Continue)
    }

    fn outline_action(&mut self, action: Action) -> Result<(), SessionError> {
        match action {
            Action::MoveDown => self.outline.move_down(),
            Action::MoveUp => self.outline.move_up(),
            Action::CollapseOrParent => self.outline.collapse_or_parent(),
            Action::ExpandOrChild => self.outline.expand_or_child(),
            Action::ExpandAll => self.outline.expand_all(),
            Action::CollapseAll => self.outline.collapse_all(),
            Action::ToggleSelected => self.outline.toggle_selected(),
            Action::Open => {
                if let Some(id) = self.outline.selected() {
                    self.selected = self.document.position(id)?;
                }
                self.router.set_mode(Mode::Document);
            }
            Action::Close => self.router.set_mode(Mode::Document),
            Action::HelpToggle => self.enter_help(),
            _ => {}
        }
        Ok(())
    }

    fn vault_action(&mut self, action: Action) -> Result<SessionSignal, SessionError> {
        match action {
            Action::MoveDown => self.browser.move_down(),
            Action::MoveUp => self.browser.move_up(),
            Action::Up => self.browser.up(&self.vault)?,
            Action::EnterOrOpen => {
                if let BrowseOutcome::OpenDocument(path) = self.browser.enter(&self.vault)? {
                    self.open_path(&path)?;
                }
            }
            Action::Close => self.router.set_mode(Mode::Document),
            Action::HelpToggle => self.enter_help(),
            Action::Copy | Action::Cut => {
                let entry = self
                    .browser
                    .selected()
                    .cloned()
                    .ok_or(SessionError::NoEntrySelected)?;
                let name = entry.name();
                if action == Action::Cut {
                    self.vault.cut(&mut self.clipboard, entry)?;
                    self.status = Some(StatusMessage::info(format!("Cut {name}")));
                } else {
                    self.vault.copy(&mut self.clipboard, entry)?;
                    self.status = Some(StatusMessage::info(format!("Copied {name}")));
                }
            }
            Action::Paste => self.paste_entry()?,
            Action::NewDocument => {
                let dir = self.browser_dir()?;
                return Ok(SessionSignal::NeedsName(NameRequest::NewDocument { dir }));
            }
            Action::NewFolder => {
                let dir = self.browser_dir()?;
                return Ok(SessionSignal::NeedsName(NameRequest::NewFolder { dir }));
            }
            Action::Rename => {
                let entry = self
                    .browser
                    .selected()
                    .cloned()
                    .ok_or(SessionError::NoEntrySelected)?;
                return Ok(SessionSignal::NeedsName(NameRequest::Rename { entry }));
            }
            _ => {}
        }
        Ok(SessionSignal::Continue)
    }

    fn help_action(&mut self, action: Action) {
        match action {
            Action::ScrollDown => {
                if self.help_scroll + 1 < self.help_lines.len() {
                    self.help_scroll += 1;
                }
            }
            Action::ScrollUp => self.help_scroll = self.help_scroll.saturating_sub(1),
            Action::Close => self.router.set_mode(self.help_return),
            _ => {}
        }
    }

    fn select_index(&mut self, index: usize) {
        self.selected = index.min(self.document.block_count().saturating_sub(1));
    }

    fn selected_id(&self) -> Result<BlockId, SessionError> {
        self.selected_block()
            .map(|block| block.id)
            .ok_or(SessionError::Document(DocumentError::Empty))
    }

    fn insert_after_selected(&mut self, block: Block) -> Result<BlockId, SessionError> {
        let after = self.selected_block().map(|block| block.id);
        let id = self.document.insert_block(after, block)?;
        self.selected = self.document.position(id)?;
        Ok(id)
    }

    fn insert_text(&mut self, kind: TextKind) -> Result<(), SessionError> {
        self.insert_after_selected(Block::text(kind, ""))?;
        Ok(())
    }

    /// Inserts a surface block with its template and opens it right away.
    fn insert_surface(&mut self, kind: BlockKind) -> Result<(), SessionError> {
        let body = default_body(&kind);
        let id = self.insert_after_selected(Block::new(kind, Metadata::new(), body))?;
        self.render_block(id);
        self.handoff.begin(&mut self.document, id)?;
        self.status = Some(StatusMessage::info("Editing new block externally"));
        Ok(())
    }

    fn open_selected(&mut self) -> Result<(), SessionError> {
        let block = self
            .selected_block()
            .ok_or(SessionError::Document(DocumentError::Empty))?;
        let id = block.id;
        if block.kind == BlockKind::Toc {
            self.enter_outline();
            return Ok(());
        }
        self.handoff.begin(&mut self.document, id)?;
        self.status = Some(StatusMessage::info("Editing block externally"));
        Ok(())
    }

    /// Enters the outline, adding a toc block below the title when the
    /// document has none.
    fn open_outline(&mut self) -> Result<(), SessionError> {
        let has_toc = self
            .document
            .ordered()
            .iter()
            .any(|block| block.kind == BlockKind::Toc);
        if !has_toc {
            let after = self
                .document
                .block_at(0)
                .filter(|block| block.text_kind() == Some(TextKind::Title))
                .map(|block| block.id);
            let toc = Block::new(BlockKind::Toc, Metadata::new(), "");
            let id = self.document.insert_block(after, toc)?;
            if self.document.position(id)? <= self.selected {
                self.selected += 1;
            }
        }
        self.enter_outline();
        Ok(())
    }

    fn enter_outline(&mut self) {
        self.outline.refresh(self.document.outline());
        let upto = self
            .selected
            .min(self.document.block_count().saturating_sub(1));
        let heading = self.document.ordered()[..=upto]
            .iter()
            .rev()
            .find(|block| block.heading_level().is_some())
            .map(|block| block.id);
        if let Some(id) = heading {
            self.outline.select(id);
        }
        self.router.set_mode(Mode::Outline);
    }

    fn enter_vault(&mut self) -> Result<(), SessionError> {
        self.browser.refresh(&self.vault)?;
        self.router.set_mode(Mode::Vault);
        if self.vault.roots().is_empty() {
            self.status = Some(StatusMessage::info(
                "No vaults registered; run `blockpad init` in a folder",
            ));
        }
        Ok(())
    }

    fn enter_help(&mut self) {
        let current = self.router.mode();
        if current != Mode::Help {
            self.help_return = current;
        }
        self.help_scroll = 0;
        self.router.set_mode(Mode::Help);
    }

    fn browser_dir(&self) -> Result<PathBuf, SessionError> {
        self.browser
            .dir()
            .map(Path::to_path_buf)
            .ok_or(SessionError::NotInFolder)
    }

    fn paste_entry(&mut self) -> Result<(), SessionError> {
        let dir = self.browser_dir()?;
        let moved_from = self
            .clipboard
            .entry()
            .filter(|(_, op)| *op == ClipOp::Cut)
            .map(|(entry, _)| entry.path.clone());
        let pasted = self.vault.paste(&mut self.clipboard, &dir)?;
        if let Some(source) = moved_from {
            self.follow_move(&source, &pasted.path);
        }
        self.browser.refresh(&self.vault)?;
        self.browser.select_path(&pasted.path);
        self.status = Some(StatusMessage::info(format!("Pasted {}", pasted.name())));
        Ok(())
    }

    /// Keeps the open document's path valid after `from` (the file itself
    /// or one of its folders) moved to `to`.
    fn follow_move(&mut self, from: &Path, to: &Path) {
        let rebased = self
            .path
            .as_deref()
            .and_then(|open| open.strip_prefix(from).ok())
            .map(|rest| {
                if rest.as_os_str().is_empty() {
                    to.to_path_buf()
                } else {
                    to.join(rest)
                }
            });
        if rebased.is_some() {
            self.path = rebased;
        }
    }

    fn save(&mut self) -> Result<(), SessionError> {
        let path = self.path.clone().ok_or(SessionError::NoPath)?;
        save_document(&path, &mut self.document).map_err(SessionError::Save)?;
        self.status = Some(StatusMessage::info(format!("Saved {}", path.display())));
        Ok(())
    }

    fn export(&mut self) -> Result<(), SessionError> {
        let path = self.path.as_ref().ok_or(SessionError::NoPath)?;
        let out = path.with_extension(SNAPSHOT_EXTENSION);
        export_document(&self.document, &out).map_err(SessionError::Service)?;
        self.status = Some(StatusMessage::info(format!("Exported {}", out.display())));
        Ok(())
    }

    fn request_quit(&mut self) -> SessionSignal {
        if self.document.is_dirty() && !self.quit_armed {
            self.quit_armed = true;
            self.status = Some(StatusMessage::error(
                "Unsaved changes; quit again to discard them",
            ));
            return SessionSignal::Continue;
        }
        SessionSignal::Quit
    }

    fn render_block(&mut self, block_id: BlockId) {
        let Some(adapter) = self.renderer.as_mut() else {
            return;
        };
        let Ok(block) = self.document.get(block_id) else {
            return;
        };
        let outcome = describe(block).and_then(|surface| match surface {
            Some(surface) => adapter.render(&surface),
            None => Ok(()),
        });
        if let Err(err) = outcome {
            self.report(&err.into());
        }
    }

    fn report(&mut self, err: &SessionError) {
        error!("event=session_action module=session status=error error={err}");
        self.status = Some(StatusMessage::error(err.to_string()));
    }
}
