//! Built-in bindings and keymap resolution.
//!
//! # Responsibility
//! - Define every mode, action and its default key sequence.
//! - Merge user overrides over the defaults without ever failing.
//!
//! # Invariants
//! - Every action of every mode has exactly one resolved sequence.
//! - Within one mode no sequence equals or strictly prefixes another.
//! - Invalid input is reported as [`KeymapIssue`] and replaced by the
//!   built-in default of the affected action only.

use super::chord::{expand_sequence, is_printable, Chord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Leader used when none or an invalid one is configured.
pub const DEFAULT_LEADER: char = ',';

/// Interaction mode; exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mode {
    Document,
    Outline,
    Vault,
    Help,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Document, Mode::Outline, Mode::Vault, Mode::Help];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Outline => "outline",
            Self::Vault => "vault",
            Self::Help => "help",
        }
    }

    /// Config key of a mode; `toc` is accepted for the outline.
    pub fn from_config_name(name: &str) -> Option<Self> {
        match name {
            "document" => Some(Self::Document),
            "outline" | "toc" => Some(Self::Outline),
            "vault" => Some(Self::Vault),
            "help" => Some(Self::Help),
            _ => None,
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action fired by a resolved key sequence. Meaning depends on the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    MoveDown,
    MoveUp,
    MoveBlockDown,
    MoveBlockUp,
    FirstBlock,
    LastBlock,
    OpenEditor,
    Save,
    Quit,
    Export,
    HelpToggle,
    PasteBlock,
    DeleteBlock,
    YankBlock,
    OpenVault,
    OpenOutline,
    InsertText,
    InsertTitle,
    InsertHeading(u8),
    InsertToc,
    InsertThree,
    InsertPyImage,
    InsertLatex,
    InsertMap,
    CollapseOrParent,
    ExpandOrChild,
    Open,
    Close,
    ExpandAll,
    ToggleSelected,
    CollapseAll,
    Up,
    EnterOrOpen,
    Copy,
    Cut,
    Paste,
    NewDocument,
    NewFolder,
    Rename,
    ScrollDown,
    ScrollUp,
}

/// One row of the built-in binding table.
#[derive(Debug, Clone, Copy)]
pub struct DefaultBinding {
    pub mode: Mode,
    /// Config key of the action inside its mode.
    pub name: &'static str,
    pub action: Action,
    pub sequence: &'static str,
}

const fn bind(mode: Mode, name: &'static str, action: Action, sequence: &'static str) -> DefaultBinding {
    DefaultBinding {
        mode,
        name,
        action,
        sequence,
    }
}

use Action as A;
use Mode::{Document as D, Help as H, Outline as O, Vault as V};

/// Built-in keymap.
pub const DEFAULT_BINDINGS: &[DefaultBinding] = &[
    bind(D, "move_down", A::MoveDown, "j"),
    bind(D, "move_up", A::MoveUp, "k"),
    bind(D, "move_block_down", A::MoveBlockDown, "<C-j>"),
    bind(D, "move_block_up", A::MoveBlockUp, "<C-k>"),
    bind(D, "first_block", A::FirstBlock, "gg"),
    bind(D, "last_block", A::LastBlock, "G"),
    bind(D, "open_editor", A::OpenEditor, "<CR>"),
    bind(D, "save", A::Save, "<C-s>"),
    bind(D, "quit", A::Quit, "q"),
    bind(D, "export", A::Export, "<C-e>"),
    bind(D, "help_toggle", A::HelpToggle, "?"),
    bind(D, "paste_block", A::PasteBlock, "p"),
    bind(D, "delete_block", A::DeleteBlock, "dd"),
    bind(D, "yank_block", A::YankBlock, "yy"),
    bind(D, "open_vault", A::OpenVault, "<leader>v"),
    bind(D, "open_toc", A::OpenOutline, "<leader>i"),
    bind(D, "insert_text", A::InsertText, "<leader>bn"),
    bind(D, "insert_title", A::InsertTitle, "<leader>bht"),
    bind(D, "insert_h1", A::InsertHeading(1), "<leader>bh1"),
    bind(D, "insert_h2", A::InsertHeading(2), "<leader>bh2"),
    bind(D, "insert_h3", A::InsertHeading(3), "<leader>bh3"),
    bind(D, "insert_h4", A::InsertHeading(4), "<leader>bh4"),
    bind(D, "insert_h5", A::InsertHeading(5), "<leader>bh5"),
    bind(D, "insert_h6", A::InsertHeading(6), "<leader>bh6"),
    bind(D, "insert_toc", A::InsertToc, "<leader>bi"),
    bind(D, "insert_three", A::InsertThree, "<leader>bjs"),
    bind(D, "insert_pyimage", A::InsertPyImage, "<leader>bpy"),
    bind(D, "insert_latex", A::InsertLatex, "<leader>bltx"),
    bind(D, "insert_map", A::InsertMap, "<leader>bmap"),
    bind(O, "move_down", A::MoveDown, "j"),
    bind(O, "move_up", A::MoveUp, "k"),
    bind(O, "collapse_or_parent", A::CollapseOrParent, "h"),
    bind(O, "expand_or_child", A::ExpandOrChild, "l"),
    bind(O, "open", A::Open, "<CR>"),
    bind(O, "close", A::Close, "<Esc>"),
    bind(O, "help_toggle", A::HelpToggle, "?"),
    bind(O, "expand_all", A::ExpandAll, "<leader>xar"),
    bind(O, "toggle_selected", A::ToggleSelected, "<leader>xr"),
    bind(O, "collapse_all", A::CollapseAll, "<leader>xc"),
    bind(V, "move_down", A::MoveDown, "j"),
    bind(V, "move_up", A::MoveUp, "k"),
    bind(V, "up", A::Up, "h"),
    bind(V, "enter_or_open", A::EnterOrOpen, "l"),
    bind(V, "close", A::Close, "<Esc>"),
    bind(V, "copy", A::Copy, "yy"),
    bind(V, "cut", A::Cut, "dd"),
    bind(V, "paste", A::Paste, "p"),
    bind(V, "new_document", A::NewDocument, "<leader>n"),
    bind(V, "new_folder", A::NewFolder, "<leader>f"),
    bind(V, "rename", A::Rename, "<leader>rn"),
    bind(H, "scroll_down", A::ScrollDown, "j"),
    bind(H, "scroll_up", A::ScrollUp, "k"),
    bind(H, "close", A::Close, "?"),
];

fn default_for(mode: Mode, name: &str) -> Option<&'static DefaultBinding> {
    DEFAULT_BINDINGS
        .iter()
        .find(|binding| binding.mode == mode && binding.name == name)
}

/// User keymap section as stored in the config file.
///
/// Mode tables and values stay untyped so that a wrong type is reported per
/// mode or action instead of rejecting the whole configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeymapOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leader: Option<Value>,
    pub modes: BTreeMap<String, Value>,
}

/// Problem found while resolving user overrides. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeymapIssue {
    InvalidLeader { value: String },
    UnknownMode { mode: String },
    /// Mode entry is not a table of actions; the whole mode keeps defaults.
    InvalidMode { mode: Mode, value: String },
    UnknownAction { mode: Mode, action: String },
    InvalidBinding {
        mode: Mode,
        action: String,
        value: String,
        reason: String,
    },
    /// Overrides colliding by equality or strict prefix; reverted to defaults.
    Collision {
        mode: Mode,
        first: String,
        second: String,
    },
    /// Leader makes built-in bindings collide; the default leader is used.
    LeaderShadowsKey {
        leader: char,
        mode: Mode,
        first: String,
        second: String,
    },
}

impl Display for KeymapIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLeader { value } => write!(
                f,
                "leader {value} must be one printable character; using `{DEFAULT_LEADER}`"
            ),
            Self::UnknownMode { mode } => write!(f, "unknown keymap mode `{mode}` ignored"),
            Self::InvalidMode { mode, value } => write!(
                f,
                "keymap for mode {mode} must be an object, got {value}; using defaults"
            ),
            Self::UnknownAction { mode, action } => {
                write!(f, "unknown action `{action}` in mode {mode} ignored")
            }
            Self::InvalidBinding {
                mode,
                action,
                value,
                reason,
            } => write!(
                f,
                "binding {value} for {mode}.{action} is invalid ({reason}); using default"
            ),
            Self::Collision {
                mode,
                first,
                second,
            } => write!(
                f,
                "bindings for {mode}.{first} and {mode}.{second} collide; using defaults"
            ),
            Self::LeaderShadowsKey {
                leader,
                mode,
                first,
                second,
            } => write!(
                f,
                "leader `{leader}` makes {mode}.{first} and {mode}.{second} collide; using `{DEFAULT_LEADER}`"
            ),
        }
    }
}

/// One resolved binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: &'static str,
    pub action: Action,
    pub chords: Vec<Chord>,
}

/// Result of looking up a pending chord buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Exact(Action),
    Prefix,
    NoMatch,
}

/// Fully resolved keymap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keymap {
    leader: char,
    modes: BTreeMap<Mode, Vec<Binding>>,
}

impl Default for Keymap {
    fn default() -> Self {
        Self::resolve(&KeymapOverrides::default()).0
    }
}

struct Override {
    raw: String,
    chords: Vec<Chord>,
}

impl Keymap {
    /// Merges `overrides` over the built-in table.
    pub fn resolve(overrides: &KeymapOverrides) -> (Self, Vec<KeymapIssue>) {
        let mut issues = Vec::new();
        let leader = match &overrides.leader {
            None => DEFAULT_LEADER,
            Some(value) => match leader_from_value(value) {
                Some(leader) => leader,
                None => {
                    issues.push(KeymapIssue::InvalidLeader {
                        value: value.to_string(),
                    });
                    DEFAULT_LEADER
                }
            },
        };

        let mut attempt_issues = Vec::new();
        match Self::resolve_with_leader(overrides, leader, &mut attempt_issues) {
            Ok(keymap) => {
                issues.extend(attempt_issues);
                (keymap, issues)
            }
            Err(shadow) => {
                issues.push(shadow);
                let mut fallback_issues = Vec::new();
                let keymap =
                    match Self::resolve_with_leader(overrides, DEFAULT_LEADER, &mut fallback_issues)
                    {
                        Ok(keymap) => keymap,
                        // Built-in table with the default leader is collision free.
                        Err(_) => Self::builtin(DEFAULT_LEADER),
                    };
                issues.extend(fallback_issues);
                (keymap, issues)
            }
        }
    }

    fn builtin(leader: char) -> Self {
        let mut modes: BTreeMap<Mode, Vec<Binding>> = BTreeMap::new();
        for default in DEFAULT_BINDINGS {
            if let Ok(chords) = expand_sequence(default.sequence, leader) {
                modes.entry(default.mode).or_default().push(Binding {
                    name: default.name,
                    action: default.action,
                    chords,
                });
            }
        }
        Self { leader, modes }
    }

    fn resolve_with_leader(
        overrides: &KeymapOverrides,
        leader: char,
        issues: &mut Vec<KeymapIssue>,
    ) -> Result<Self, KeymapIssue> {
        let mut parsed: BTreeMap<(Mode, &'static str), Override> = BTreeMap::new();
        for (mode_name, table) in &overrides.modes {
            let Some(mode) = Mode::from_config_name(mode_name) else {
                issues.push(KeymapIssue::UnknownMode {
                    mode: mode_name.clone(),
                });
                continue;
            };
            let Some(actions) = table.as_object() else {
                issues.push(KeymapIssue::InvalidMode {
                    mode,
                    value: table.to_string(),
                });
                continue;
            };
            for (action_name, value) in actions {
                let Some(default) = default_for(mode, action_name) else {
                    issues.push(KeymapIssue::UnknownAction {
                        mode,
                        action: action_name.clone(),
                    });
                    continue;
                };
                let invalid = |reason: String| KeymapIssue::InvalidBinding {
                    mode,
                    action: action_name.clone(),
                    value: value.to_string(),
                    reason,
                };
                let Some(raw) = sequence_from_value(value) else {
                    issues.push(invalid("expected a string".to_string()));
                    continue;
                };
                match expand_sequence(raw, leader) {
                    Ok(chords) => {
                        parsed.insert(
                            (mode, default.name),
                            Override {
                                raw: raw.to_string(),
                                chords,
                            },
                        );
                    }
                    Err(err) => issues.push(invalid(err.to_string())),
                }
            }
        }

        let mut keymap = Self::builtin(leader);
        for (mode, bindings) in keymap.modes.iter_mut() {
            for binding in bindings.iter_mut() {
                if let Some(custom) = parsed.get(&(*mode, binding.name)) {
                    binding.chords = custom.chords.clone();
                }
            }
        }

        for (mode, bindings) in keymap.modes.iter_mut() {
            loop {
                let Some((i, j)) = find_collision(bindings, |index| {
                    parsed.contains_key(&(*mode, bindings[index].name))
                        && bindings[index].chords != default_chords(*mode, bindings[index].name, leader)
                }) else {
                    break;
                };
                let first = bindings[i].name;
                let second = bindings[j].name;
                issues.push(KeymapIssue::Collision {
                    mode: *mode,
                    first: first.to_string(),
                    second: second.to_string(),
                });
                for index in [i, j] {
                    let name = bindings[index].name;
                    let default = default_chords(*mode, name, leader);
                    if bindings[index].chords != default {
                        parsed.remove(&(*mode, name));
                        bindings[index].chords = default;
                    }
                }
            }
            if let Some((i, j)) = find_collision(bindings, |_| true) {
                return Err(KeymapIssue::LeaderShadowsKey {
                    leader,
                    mode: *mode,
                    first: bindings[i].name.to_string(),
                    second: bindings[j].name.to_string(),
                });
            }
        }
        Ok(keymap)
    }

    pub fn leader(&self) -> char {
        self.leader
    }

    pub fn bindings(&self, mode: Mode) -> &[Binding] {
        self.modes.get(&mode).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolved sequence of one action by its config name.
    pub fn sequence(&self, mode: Mode, name: &str) -> Option<&[Chord]> {
        self.bindings(mode)
            .iter()
            .find(|binding| binding.name == name)
            .map(|binding| binding.chords.as_slice())
    }

    pub fn lookup(&self, mode: Mode, pending: &[Chord]) -> Lookup {
        let mut prefix = false;
        for binding in self.bindings(mode) {
            if binding.chords == pending {
                return Lookup::Exact(binding.action);
            }
            if binding.chords.len() > pending.len() && binding.chords.starts_with(pending) {
                prefix = true;
            }
        }
        if prefix {
            Lookup::Prefix
        } else {
            Lookup::NoMatch
        }
    }

    /// Override section equivalent to this keymap, used to write back a
    /// normalised config.
    pub fn to_overrides(&self, raw: &KeymapOverrides) -> KeymapOverrides {
        let mut normalized = KeymapOverrides {
            leader: Some(Value::String(self.leader.to_string())),
            modes: BTreeMap::new(),
        };
        for mode in Mode::ALL {
            let mut actions = serde_json::Map::new();
            for binding in self.bindings(mode) {
                let default = default_chords(mode, binding.name, self.leader);
                if binding.chords == default {
                    continue;
                }
                let text = raw_override(raw, mode, binding.name)
                    .unwrap_or_else(|| binding.chords.iter().map(chord_source).collect());
                actions.insert(binding.name.to_string(), Value::String(text));
            }
            if !actions.is_empty() {
                normalized
                    .modes
                    .insert(mode.as_str().to_string(), Value::Object(actions));
            }
        }
        normalized
    }
}

fn raw_override(raw: &KeymapOverrides, mode: Mode, name: &str) -> Option<String> {
    raw.modes
        .iter()
        .filter(|(mode_name, _)| Mode::from_config_name(mode_name) == Some(mode))
        .find_map(|(_, actions)| actions.as_object()?.get(name))
        .and_then(sequence_from_value)
        .map(str::to_string)
}

fn chord_source(chord: &Chord) -> String {
    use super::chord::{Key, Modifiers};
    let base = match chord.key {
        Key::Char(ch) if chord.modifiers.is_empty() => return ch.to_string(),
        Key::Char(ch) => ch.to_string(),
        Key::Esc => "Esc".to_string(),
        Key::Enter => "CR".to_string(),
        Key::Tab => "Tab".to_string(),
        Key::Backspace => "BS".to_string(),
        Key::Up => "Up".to_string(),
        Key::Down => "Down".to_string(),
        Key::Left => "Left".to_string(),
        Key::Right => "Right".to_string(),
        Key::Home => "Home".to_string(),
        Key::End => "End".to_string(),
        Key::PageUp => "PageUp".to_string(),
        Key::PageDown => "PageDown".to_string(),
    };
    if chord.modifiers.contains(Modifiers::CTRL) {
        format!("<C-{base}>")
    } else if chord.modifiers.contains(Modifiers::ALT) {
        format!("<A-{base}>")
    } else {
        format!("<{base}>")
    }
}

fn default_chords(mode: Mode, name: &str, leader: char) -> Vec<Chord> {
    default_for(mode, name)
        .and_then(|default| expand_sequence(default.sequence, leader).ok())
        .unwrap_or_default()
}

/// First pair of colliding bindings where `eligible` holds for either side.
fn find_collision(
    bindings: &[Binding],
    eligible: impl Fn(usize) -> bool,
) -> Option<(usize, usize)> {
    for i in 0..bindings.len() {
        for j in (i + 1)..bindings.len() {
            if !(eligible(i) || eligible(j)) {
                continue;
            }
            let (a, b) = (&bindings[i].chords, &bindings[j].chords);
            if a.starts_with(b) || b.starts_with(a) {
                return Some((i, j));
            }
        }
    }
    None
}

fn leader_from_value(value: &Value) -> Option<char> {
    let text = value.as_str()?;
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if is_printable(ch) => Some(ch),
        _ => None,
    }
}

/// A binding is a string, or a list whose first entry is a string.
fn sequence_from_value(value: &Value) -> Option<&str> {
    match value {
        Value::String(text) => Some(text.as_str()),
        Value::Array(items) => items.first().and_then(Value::as_str),
        _ => None,
    }
}
