//! Terminal host: draws the session and feeds it chords.
//!
//! The loop never blocks on an editor process; it polls for input with a
//! short timeout and collects finished handoffs between keys.

use blockpad_core::keymap::{display_sequence, Chord, Key, Modifiers, Mode};
use blockpad_core::render::{describe, SurfaceKind};
use blockpad_core::session::{NameRequest, Session, SessionSignal, StatusLevel};
use blockpad_core::vault::EntryKind;
use blockpad_core::{Block, BlockKind};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{
    self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{cursor, execute, queue};
use std::error::Error;
use std::io::{self, stdout, Write};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const BODY_PREVIEW_LINES: usize = 6;

/// Name being typed for a vault action.
struct Prompt {
    request: NameRequest,
    input: String,
}

enum PromptStep {
    Editing,
    Cancel,
    Submit,
}

/// Runs the interactive loop until the session asks to quit.
pub fn run(mut session: Session) -> Result<(), Box<dyn Error>> {
    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen, cursor::Hide)?;

    let result = event_loop(&mut session);
    session.shutdown();

    disable_raw_mode()?;
    execute!(stdout(), cursor::Show, LeaveAlternateScreen)?;
    result.map_err(Into::into)
}

fn event_loop(session: &mut Session) -> io::Result<()> {
    let mut prompt: Option<Prompt> = None;
    let mut redraw = true;
    loop {
        if session.poll_handoffs() > 0 {
            redraw = true;
        }
        if redraw {
            draw(session, prompt.as_ref())?;
            redraw = false;
        }
        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        match event::read()? {
            Event::Key(key) if key.kind != KeyEventKind::Release => {
                redraw = true;
                if let Some(active) = prompt.as_mut() {
                    match edit_prompt(active, key) {
                        PromptStep::Editing => {}
                        PromptStep::Cancel => prompt = None,
                        PromptStep::Submit => {
                            if let Some(done) = prompt.take() {
                                session.submit_name(done.request, &done.input);
                            }
                        }
                    }
                    continue;
                }
                let Some(chord) = to_chord(key) else {
                    continue;
                };
                match session.handle_chord(chord) {
                    SessionSignal::Continue => {}
                    SessionSignal::Quit => return Ok(()),
                    SessionSignal::NeedsName(request) => {
                        let input = request.initial();
                        prompt = Some(Prompt { request, input });
                    }
                }
            }
            Event::Resize(..) => redraw = true,
            _ => {}
        }
    }
}

fn edit_prompt(prompt: &mut Prompt, key: KeyEvent) -> PromptStep {
    match key.code {
        KeyCode::Esc => PromptStep::Cancel,
        KeyCode::Enter => PromptStep::Submit,
        KeyCode::Backspace => {
            prompt.input.pop();
            PromptStep::Editing
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            prompt.input.push(ch);
            PromptStep::Editing
        }
        _ => PromptStep::Editing,
    }
}

fn to_chord(key: KeyEvent) -> Option<Chord> {
    let code = match key.code {
        KeyCode::Char(ch) => Key::Char(ch),
        KeyCode::Esc => Key::Esc,
        KeyCode::Enter => Key::Enter,
        KeyCode::Tab => Key::Tab,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        _ => return None,
    };
    let mut modifiers = Modifiers::empty();
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        modifiers |= Modifiers::CTRL;
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        modifiers |= Modifiers::ALT;
    }
    if key.modifiers.contains(KeyModifiers::SHIFT) {
        modifiers |= Modifiers::SHIFT;
    }
    Chord::from_host(code, modifiers)
}

fn draw(session: &Session, prompt: Option<&Prompt>) -> io::Result<()> {
    let (width, height) = terminal::size()?;
    let body_rows = usize::from(height.saturating_sub(2));
    let lines = match session.mode() {
        Mode::Document => document_lines(session, body_rows),
        Mode::Outline => outline_lines(session),
        Mode::Vault => vault_lines(session),
        Mode::Help => session.help_lines().to_vec(),
    };

    let mut out = stdout();
    queue!(out, Clear(ClearType::All))?;
    for (row, line) in lines.iter().take(body_rows).enumerate() {
        queue!(
            out,
            cursor::MoveTo(0, row as u16),
            Print(clip(line, usize::from(width)))
        )?;
    }

    let status_row = height.saturating_sub(2);
    queue!(
        out,
        cursor::MoveTo(0, status_row),
        SetAttribute(Attribute::Reverse),
        Print(clip(&status_bar(session), usize::from(width))),
        SetAttribute(Attribute::Reset)
    )?;

    let message = match prompt {
        Some(prompt) => format!("{}: {}", prompt.request.prompt(), prompt.input),
        None => session
            .status()
            .map(|status| match status.level {
                StatusLevel::Info => status.text.clone(),
                StatusLevel::Error => format!("error: {}", status.text),
            })
            .unwrap_or_default(),
    };
    queue!(
        out,
        cursor::MoveTo(0, height.saturating_sub(1)),
        Print(clip(&message, usize::from(width)))
    )?;
    out.flush()
}

fn status_bar(session: &Session) -> String {
    let file = session
        .path()
        .map_or_else(|| "[no file]".to_string(), |path| path.display().to_string());
    let dirty = if session.document().is_dirty() { " +" } else { "" };
    let editing = session.handoff().active_count();
    let editing = if editing > 0 {
        format!("  editing:{editing}")
    } else {
        String::new()
    };
    format!(
        " {} | {file}{dirty}{editing}  {}",
        session.mode(),
        display_sequence(session.pending())
    )
}

/// Document view scrolled so the selected block stays on screen.
fn document_lines(session: &Session, rows: usize) -> Vec<String> {
    let document = session.document();
    let mut lines = Vec::new();
    let mut selected_top = 0;
    for (index, block) in document.ordered().iter().enumerate() {
        let selected = index == session.selected_index();
        if selected {
            selected_top = lines.len();
        }
        let marker = if selected { '>' } else { ' ' };
        let busy = if session.handoff().is_editing(block.id) {
            " (editing)"
        } else {
            ""
        };
        lines.push(format!("{marker} [{}]{busy}", block_heading(block)));
        if block.kind == BlockKind::Toc {
            for entry in document.outline() {
                let indent = "  ".repeat(usize::from(entry.level));
                lines.push(format!("    {indent}{}", entry.label));
            }
        } else {
            let body: Vec<&str> = block.body.lines().collect();
            for line in body.iter().take(BODY_PREVIEW_LINES) {
                lines.push(format!("    {line}"));
            }
            if body.len() > BODY_PREVIEW_LINES {
                lines.push(format!("    ... {} more line(s)", body.len() - BODY_PREVIEW_LINES));
            }
        }
    }
    let skip = (selected_top + 1).saturating_sub(rows.max(1));
    lines.split_off(skip.min(lines.len()))
}

fn block_heading(block: &Block) -> String {
    if let Some(kind) = block.text_kind() {
        return format!("text {}", kind.as_str());
    }
    match describe(block) {
        Ok(Some(surface)) => match surface.kind {
            SurfaceKind::SceneScript => "3d scene".to_string(),
            SurfaceKind::RenderScript(format) => format!("render script -> {}", format.as_str()),
            SurfaceKind::MathMarkup => "math".to_string(),
            SurfaceKind::MapScript => "map".to_string(),
            SurfaceKind::Passthrough => format!("unknown kind `{}`", surface.tag),
        },
        Ok(None) => block.kind.tag().to_string(),
        Err(err) => format!("{}: {err}", block.kind.tag()),
    }
}

fn outline_lines(session: &Session) -> Vec<String> {
    let outline = session.outline();
    if outline.is_empty() {
        return vec!["  (no headings)".to_string()];
    }
    outline
        .rows()
        .into_iter()
        .map(|row| {
            let marker = if row.selected { '>' } else { ' ' };
            let fold = match (row.has_children, row.collapsed) {
                (false, _) => ' ',
                (true, true) => '+',
                (true, false) => '-',
            };
            format!(
                "{marker} {}{fold} {}",
                "  ".repeat(row.depth),
                row.entry.label
            )
        })
        .collect()
}

fn vault_lines(session: &Session) -> Vec<String> {
    let browser = session.browser();
    let header = browser.dir().map_or_else(
        || "Vaults".to_string(),
        |dir| dir.display().to_string(),
    );
    let mut lines = vec![header];
    if browser.entries().is_empty() {
        lines.push("  (empty)".to_string());
    }
    for (index, entry) in browser.entries().iter().enumerate() {
        let marker = if index == browser.cursor() { '>' } else { ' ' };
        let name = match (browser.dir(), entry.kind) {
            (None, _) => entry.path.display().to_string(),
            (Some(_), EntryKind::Folder) => format!("{}/", entry.name()),
            (Some(_), EntryKind::Document) => entry.name(),
        };
        lines.push(format!("{marker} {name}"));
    }
    lines
}

fn clip(line: &str, width: usize) -> String {
    line.chars().take(width).collect()
}
