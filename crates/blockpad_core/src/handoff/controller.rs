//! Per-block handoff session lifecycle.
//!
//! A session moves `Dispatched -> Awaiting -> Reintegrating` and is removed
//! afterwards, so an absent session reads as `Idle`. Spawn failures and
//! unsuccessful exits release the block untouched.

use super::launch::{EditorLauncher, EditorProcess, LaunchTemplate, ProcessLauncher};
use super::{HandoffError, HandoffResult};
use crate::model::block::BlockId;
use crate::model::document::{BlockLease, Document};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;
use tempfile::NamedTempFile;

const SCRATCH_PREFIX: &str = "blockpad-block-";

/// Lifecycle state of one block's handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffState {
    Idle,
    Dispatched,
    Awaiting,
    Reintegrating,
    Failed,
}

/// When scratch content is written back after a successful exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReintegratePolicy {
    /// Only when the content differs from what was handed out.
    #[default]
    OnChange,
    /// Every successful exit, marking the document dirty.
    Always,
}

/// Outcome of one finished session, reported by [`HandoffController::poll`].
#[derive(Debug)]
pub enum HandoffEvent {
    Reintegrated { block_id: BlockId, changed: bool },
    Failed { block_id: BlockId, error: HandoffError },
}

impl HandoffEvent {
    pub fn block_id(&self) -> BlockId {
        match self {
            Self::Reintegrated { block_id, .. } | Self::Failed { block_id, .. } => *block_id,
        }
    }
}

struct HandoffSession {
    lease: BlockLease,
    scratch: NamedTempFile,
    baseline: String,
    kind_tag: String,
    /// `None` while `Dispatched`.
    process: Option<Box<dyn EditorProcess>>,
    state: HandoffState,
    started_at: Instant,
}

/// Owner of every running handoff session.
pub struct HandoffController {
    launcher: Box<dyn EditorLauncher>,
    template: LaunchTemplate,
    policy: ReintegratePolicy,
    sessions: BTreeMap<BlockId, HandoffSession>,
}

impl HandoffController {
    pub fn new(
        launcher: Box<dyn EditorLauncher>,
        template: LaunchTemplate,
        policy: ReintegratePolicy,
    ) -> Self {
        Self {
            launcher,
            template,
            policy,
            sessions: BTreeMap::new(),
        }
    }

    /// Controller spawning real processes.
    pub fn with_process_launcher(template: LaunchTemplate, policy: ReintegratePolicy) -> Self {
        Self::new(Box::new(ProcessLauncher), template, policy)
    }

    pub fn policy(&self) -> ReintegratePolicy {
        self.policy
    }

    pub fn state(&self, block_id: BlockId) -> HandoffState {
        self.sessions
            .get(&block_id)
            .map_or(HandoffState::Idle, |session| session.state)
    }

    pub fn is_editing(&self, block_id: BlockId) -> bool {
        self.sessions.contains_key(&block_id)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Leases `block_id`, writes its body to a scratch file and launches the
    /// editor on it: [`dispatch`](Self::dispatch) then
    /// [`launch`](Self::launch).
    ///
    /// # Errors
    /// - `AlreadyEditing` when a session for the block is running.
    /// - `Document` when the block is unknown, read-only or busy.
    /// - `Scratch` / `EditorSpawnFailed`; the lease is released and the
    ///   scratch file removed before returning.
    pub fn begin(&mut self, document: &mut Document, block_id: BlockId) -> HandoffResult<()> {
        self.dispatch(document, block_id)?;
        self.launch(document, block_id)
    }

    /// Leases `block_id` and writes its body to a scratch file. The session
    /// is `Dispatched` until [`launch`](Self::launch) starts the editor.
    ///
    /// Returns the scratch file path.
    pub fn dispatch(
        &mut self,
        document: &mut Document,
        block_id: BlockId,
    ) -> HandoffResult<PathBuf> {
        if self.sessions.contains_key(&block_id) {
            return Err(HandoffError::AlreadyEditing(block_id));
        }
        let block = document.get(block_id)?;
        let baseline = block.body.clone();
        let suffix = block.kind.scratch_suffix();
        let kind_tag = block.kind.tag().to_string();
        let lease = document.checkout(block_id)?;

        let scratch = match write_scratch(&baseline, suffix) {
            Ok(scratch) => scratch,
            Err(err) => {
                document.release(lease);
                error!(
                    "event=handoff_begin module=handoff status=error block_id={block_id} error_code=scratch_failed error={err}"
                );
                return Err(HandoffError::Scratch(err));
            }
        };

        let path = scratch.path().to_path_buf();
        self.sessions.insert(
            block_id,
            HandoffSession {
                lease,
                scratch,
                baseline,
                kind_tag,
                process: None,
                state: HandoffState::Dispatched,
                started_at: Instant::now(),
            },
        );
        Ok(path)
    }

    /// Starts the editor for a `Dispatched` session and moves it to
    /// `Awaiting`. Fallback terminals are tried in order; the session ends
    /// only when every candidate failed to spawn.
    ///
    /// # Errors
    /// - `NotDispatched` when the block has no session waiting for launch.
    /// - `EditorSpawnFailed` for the last candidate tried; the lease is
    ///   released and the scratch file removed before returning.
    pub fn launch(&mut self, document: &mut Document, block_id: BlockId) -> HandoffResult<()> {
        let Some(session) = self
            .sessions
            .get_mut(&block_id)
            .filter(|session| session.state == HandoffState::Dispatched)
        else {
            return Err(HandoffError::NotDispatched(block_id));
        };

        let mut last_failure = None;
        for argv in self.template.argv_candidates(session.scratch.path()) {
            let program = argv.first().cloned().unwrap_or_default();
            match self.launcher.launch(&argv) {
                Ok(process) => {
                    info!(
                        "event=handoff_begin module=handoff status=ok block_id={block_id} kind={} program={program}",
                        session.kind_tag
                    );
                    session.process = Some(process);
                    session.state = HandoffState::Awaiting;
                    return Ok(());
                }
                Err(source) => {
                    warn!(
                        "event=handoff_launch module=handoff status=error block_id={block_id} program={program} error={source}"
                    );
                    last_failure = Some((program, source));
                }
            }
        }

        if let Some(session) = self.sessions.remove(&block_id) {
            document.release(session.lease);
        }
        let (program, source) = last_failure.unwrap_or_else(|| {
            (
                String::new(),
                io::Error::new(io::ErrorKind::InvalidInput, "empty launch command"),
            )
        });
        error!(
            "event=handoff_begin module=handoff status=error block_id={block_id} error_code=spawn_failed program={program} error={source}"
        );
        Err(HandoffError::EditorSpawnFailed { program, source })
    }

    /// Checks every running editor without blocking and reintegrates the
    /// ones that exited.
    pub fn poll(&mut self, document: &mut Document) -> Vec<HandoffEvent> {
        let mut finished = Vec::new();
        for (block_id, session) in self.sessions.iter_mut() {
            let Some(process) = session.process.as_mut() else {
                continue;
            };
            match process.try_wait() {
                Ok(None) => {}
                Ok(Some(outcome)) => {
                    session.state = if outcome.success {
                        HandoffState::Reintegrating
                    } else {
                        HandoffState::Failed
                    };
                    finished.push((*block_id, Ok(outcome)));
                }
                Err(err) => {
                    session.state = HandoffState::Failed;
                    finished.push((*block_id, Err(err)));
                }
            }
        }

        let mut events = Vec::with_capacity(finished.len());
        for (block_id, outcome) in finished {
            let Some(session) = self.sessions.remove(&block_id) else {
                continue;
            };
            let event = match outcome {
                Ok(outcome) if outcome.success => self.reintegrate(document, block_id, session),
                Ok(outcome) => {
                    document.release(session.lease);
                    warn!(
                        "event=handoff_finish module=handoff status=error block_id={block_id} error_code=editor_exit code={:?}",
                        outcome.code
                    );
                    HandoffEvent::Failed {
                        block_id,
                        error: HandoffError::EditorExitedNonZero {
                            block_id,
                            code: outcome.code,
                        },
                    }
                }
                Err(err) => {
                    document.release(session.lease);
                    error!(
                        "event=handoff_finish module=handoff status=error block_id={block_id} error_code=wait_failed error={err}"
                    );
                    HandoffEvent::Failed {
                        block_id,
                        error: HandoffError::Wait(err),
                    }
                }
            };
            events.push(event);
        }
        events
    }

    fn reintegrate(
        &self,
        document: &mut Document,
        block_id: BlockId,
        session: HandoffSession,
    ) -> HandoffEvent {
        let HandoffSession {
            lease,
            scratch,
            baseline,
            started_at,
            ..
        } = session;

        let content = match fs::read_to_string(scratch.path()) {
            Ok(content) => normalize_editor_output(content, &baseline),
            Err(err) => {
                document.release(lease);
                error!(
                    "event=handoff_finish module=handoff status=error block_id={block_id} error_code=scratch_read_failed error={err}"
                );
                return HandoffEvent::Failed {
                    block_id,
                    error: HandoffError::Scratch(err),
                };
            }
        };
        drop(scratch);

        let changed = content != baseline;
        let apply = changed || self.policy == ReintegratePolicy::Always;
        let result = if apply {
            document.apply_lease(&lease, content)
        } else {
            Ok(())
        };
        document.release(lease);

        match result {
            Ok(()) => {
                info!(
                    "event=handoff_finish module=handoff status=ok block_id={block_id} changed={changed} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                HandoffEvent::Reintegrated { block_id, changed }
            }
            Err(err) => {
                error!(
                    "event=handoff_finish module=handoff status=error block_id={block_id} error_code=apply_failed error={err}"
                );
                HandoffEvent::Failed {
                    block_id,
                    error: HandoffError::Document(err),
                }
            }
        }
    }

    /// Abandons every session: leases are released and scratch files
    /// removed; editors are left running and never waited on.
    pub fn shutdown(&mut self, document: &mut Document) {
        let sessions = std::mem::take(&mut self.sessions);
        let count = sessions.len();
        for (_, session) in sessions {
            document.release(session.lease);
        }
        if count > 0 {
            warn!("event=handoff_shutdown module=handoff status=ok abandoned={count}");
        }
    }
}

fn write_scratch(body: &str, suffix: &str) -> std::io::Result<NamedTempFile> {
    let mut scratch = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .suffix(suffix)
        .tempfile()?;
    scratch.write_all(body.as_bytes())?;
    scratch.flush()?;
    Ok(scratch)
}

/// Line editors terminate the last line on save; drop that newline when the
/// handed-out body did not end with one.
fn normalize_editor_output(mut content: String, baseline: &str) -> String {
    if content.ends_with('\n') && !baseline.ends_with('\n') {
        content.pop();
    }
    content
}

#[cfg(test)]
mod tests {
    use super::{
        normalize_editor_output, HandoffController, HandoffEvent, HandoffState, ReintegratePolicy,
    };
    use crate::handoff::launch::{EditorLauncher, EditorProcess, ExitOutcome, LaunchTemplate};
    use crate::handoff::HandoffError;
    use crate::model::block::{Block, TextKind};
    use crate::model::document::{Document, DocumentError};
    use std::cell::RefCell;
    use std::io;
    use std::path::PathBuf;
    use std::rc::Rc;

    /// Shared state between a test and its fake editor.
    #[derive(Default)]
    struct Script {
        exit: Option<ExitOutcome>,
        write: Option<String>,
        scratch: Option<PathBuf>,
        fail_spawn: bool,
        missing_programs: Vec<String>,
        attempts: Vec<String>,
    }

    struct FakeProcess {
        script: Rc<RefCell<Script>>,
    }

    impl EditorProcess for FakeProcess {
        fn try_wait(&mut self) -> io::Result<Option<ExitOutcome>> {
            let script = self.script.borrow();
            if let (Some(_), Some(text), Some(path)) =
                (script.exit, script.write.as_ref(), script.scratch.as_ref())
            {
                std::fs::write(path, text)?;
            }
            Ok(script.exit)
        }
    }

    struct FakeLauncher {
        script: Rc<RefCell<Script>>,
    }

    impl EditorLauncher for FakeLauncher {
        fn launch(&self, argv: &[String]) -> io::Result<Box<dyn EditorProcess>> {
            let mut script = self.script.borrow_mut();
            let program = argv.first().cloned().unwrap_or_default();
            script.attempts.push(program.clone());
            if script.fail_spawn || script.missing_programs.contains(&program) {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such editor"));
            }
            script.scratch = argv.last().map(PathBuf::from);
            Ok(Box::new(FakeProcess {
                script: Rc::clone(&self.script),
            }))
        }
    }

    fn setup(policy: ReintegratePolicy) -> (HandoffController, Rc<RefCell<Script>>) {
        let script = Rc::new(RefCell::new(Script::default()));
        let controller = HandoffController::new(
            Box::new(FakeLauncher {
                script: Rc::clone(&script),
            }),
            LaunchTemplate::new(vec!["fake-editor".to_string()], Vec::new()),
            policy,
        );
        (controller, script)
    }

    fn one_block_doc() -> (Document, uuid::Uuid) {
        let block = Block::text(TextKind::Body, "before");
        let id = block.id;
        (Document::from_blocks(vec![block]).unwrap(), id)
    }

    #[test]
    fn successful_exit_writes_back_once() {
        let (mut controller, script) = setup(ReintegratePolicy::OnChange);
        let (mut doc, id) = one_block_doc();
        controller.begin(&mut doc, id).unwrap();
        assert_eq!(controller.state(id), HandoffState::Awaiting);
        assert!(controller.poll(&mut doc).is_empty());
        assert!(doc.is_checked_out(id));

        let scratch = script.borrow().scratch.clone().unwrap();
        assert_eq!(std::fs::read_to_string(&scratch).unwrap(), "before");
        {
            let mut script = script.borrow_mut();
            script.write = Some("after\n".to_string());
            script.exit = Some(ExitOutcome {
                success: true,
                code: Some(0),
            });
        }

        let events = controller.poll(&mut doc);
        assert!(matches!(
            events.as_slice(),
            [HandoffEvent::Reintegrated { changed: true, .. }]
        ));
        assert_eq!(doc.get(id).unwrap().body, "after");
        assert!(!doc.is_checked_out(id));
        assert!(!scratch.exists());
        assert_eq!(controller.state(id), HandoffState::Idle);
        assert!(controller.poll(&mut doc).is_empty());
    }

    #[test]
    fn unchanged_content_keeps_document_clean_under_on_change() {
        let (mut controller, script) = setup(ReintegratePolicy::OnChange);
        let (mut doc, id) = one_block_doc();
        controller.begin(&mut doc, id).unwrap();
        script.borrow_mut().exit = Some(ExitOutcome {
            success: true,
            code: Some(0),
        });
        let events = controller.poll(&mut doc);
        assert!(matches!(
            events.as_slice(),
            [HandoffEvent::Reintegrated { changed: false, .. }]
        ));
        assert!(!doc.is_dirty());
    }

    #[test]
    fn always_policy_marks_dirty_even_without_change() {
        let (mut controller, script) = setup(ReintegratePolicy::Always);
        let (mut doc, id) = one_block_doc();
        controller.begin(&mut doc, id).unwrap();
        script.borrow_mut().exit = Some(ExitOutcome {
            success: true,
            code: Some(0),
        });
        controller.poll(&mut doc);
        assert!(doc.is_dirty());
    }

    #[test]
    fn non_zero_exit_leaves_block_untouched() {
        let (mut controller, script) = setup(ReintegratePolicy::OnChange);
        let (mut doc, id) = one_block_doc();
        controller.begin(&mut doc, id).unwrap();
        let scratch = script.borrow().scratch.clone().unwrap();
        {
            let mut script = script.borrow_mut();
            script.write = Some("garbage".to_string());
            script.exit = Some(ExitOutcome {
                success: false,
                code: Some(1),
            });
        }
        let events = controller.poll(&mut doc);
        assert!(matches!(
            events.as_slice(),
            [HandoffEvent::Failed {
                error: HandoffError::EditorExitedNonZero { code: Some(1), .. },
                ..
            }]
        ));
        assert_eq!(doc.get(id).unwrap().body, "before");
        assert!(!doc.is_checked_out(id));
        assert!(!scratch.exists());
    }

    #[test]
    fn session_moves_through_dispatched_and_awaiting() {
        let (mut controller, script) = setup(ReintegratePolicy::OnChange);
        let (mut doc, id) = one_block_doc();
        assert_eq!(controller.state(id), HandoffState::Idle);

        let scratch = controller.dispatch(&mut doc, id).unwrap();
        assert_eq!(controller.state(id), HandoffState::Dispatched);
        assert!(doc.is_checked_out(id));
        assert_eq!(std::fs::read_to_string(&scratch).unwrap(), "before");
        assert!(script.borrow().scratch.is_none());
        assert!(controller.poll(&mut doc).is_empty());
        assert_eq!(controller.state(id), HandoffState::Dispatched);

        controller.launch(&mut doc, id).unwrap();
        assert_eq!(controller.state(id), HandoffState::Awaiting);
        assert_eq!(script.borrow().scratch.as_ref(), Some(&scratch));
        assert!(matches!(
            controller.launch(&mut doc, id).unwrap_err(),
            HandoffError::NotDispatched(_)
        ));

        script.borrow_mut().exit = Some(ExitOutcome {
            success: true,
            code: Some(0),
        });
        controller.poll(&mut doc);
        assert_eq!(controller.state(id), HandoffState::Idle);
        assert!(!scratch.exists());
    }

    #[test]
    fn spawn_failure_after_dispatch_ends_session() {
        let (mut controller, script) = setup(ReintegratePolicy::OnChange);
        let (mut doc, id) = one_block_doc();
        let scratch = controller.dispatch(&mut doc, id).unwrap();
        script.borrow_mut().fail_spawn = true;
        assert!(matches!(
            controller.launch(&mut doc, id).unwrap_err(),
            HandoffError::EditorSpawnFailed { .. }
        ));
        assert_eq!(controller.state(id), HandoffState::Idle);
        assert!(!doc.is_checked_out(id));
        assert!(!scratch.exists());
    }

    fn with_terminals(script: &Rc<RefCell<Script>>, terminals: &[&str]) -> HandoffController {
        let mut terminals = terminals.iter().map(|name| vec![name.to_string()]);
        let primary = terminals.next().unwrap_or_default();
        let template = LaunchTemplate::new(vec!["vim".to_string()], primary)
            .with_fallback_terminals(terminals.collect());
        HandoffController::new(
            Box::new(FakeLauncher {
                script: Rc::clone(script),
            }),
            template,
            ReintegratePolicy::OnChange,
        )
    }

    #[test]
    fn spawn_failure_moves_on_to_next_terminal() {
        let script = Rc::new(RefCell::new(Script::default()));
        script.borrow_mut().missing_programs = vec!["foot".to_string(), "kitty".to_string()];
        let mut controller = with_terminals(&script, &["foot", "kitty", "xterm"]);
        let (mut doc, id) = one_block_doc();

        controller.begin(&mut doc, id).unwrap();
        assert_eq!(controller.state(id), HandoffState::Awaiting);
        assert_eq!(script.borrow().attempts, ["foot", "kitty", "xterm"]);
    }

    #[test]
    fn spawn_failure_reported_after_every_terminal_failed() {
        let script = Rc::new(RefCell::new(Script::default()));
        script.borrow_mut().fail_spawn = true;
        let mut controller = with_terminals(&script, &["foot", "xterm"]);
        let (mut doc, id) = one_block_doc();

        let err = controller.begin(&mut doc, id).unwrap_err();
        assert!(matches!(
            err,
            HandoffError::EditorSpawnFailed { ref program, .. } if program == "xterm"
        ));
        assert_eq!(script.borrow().attempts, ["foot", "xterm"]);
        assert!(!doc.is_checked_out(id));
        assert_eq!(controller.active_count(), 0);
    }

    #[test]
    fn spawn_failure_releases_lease() {
        let (mut controller, script) = setup(ReintegratePolicy::OnChange);
        script.borrow_mut().fail_spawn = true;
        let (mut doc, id) = one_block_doc();
        let err = controller.begin(&mut doc, id).unwrap_err();
        assert!(matches!(err, HandoffError::EditorSpawnFailed { .. }));
        assert!(!doc.is_checked_out(id));
        assert_eq!(controller.active_count(), 0);
    }

    #[test]
    fn second_begin_on_same_block_is_rejected() {
        let (mut controller, _script) = setup(ReintegratePolicy::OnChange);
        let (mut doc, id) = one_block_doc();
        controller.begin(&mut doc, id).unwrap();
        assert!(matches!(
            controller.begin(&mut doc, id).unwrap_err(),
            HandoffError::AlreadyEditing(_)
        ));
        assert_eq!(doc.remove(id).unwrap_err(), DocumentError::BlockBusy(id));
    }

    #[test]
    fn shutdown_releases_and_cleans_scratch() {
        let (mut controller, script) = setup(ReintegratePolicy::OnChange);
        let (mut doc, id) = one_block_doc();
        controller.begin(&mut doc, id).unwrap();
        let scratch = script.borrow().scratch.clone().unwrap();
        controller.shutdown(&mut doc);
        assert!(!scratch.exists());
        assert!(!doc.has_checkouts());
        assert_eq!(controller.active_count(), 0);
    }

    #[test]
    fn trailing_newline_is_dropped_only_when_added_by_editor() {
        assert_eq!(normalize_editor_output("x\n".into(), "x"), "x");
        assert_eq!(normalize_editor_output("x\n".into(), "x\n"), "x\n");
        assert_eq!(normalize_editor_output("x".into(), ""), "x");
    }
}
