//! Help sheet built from the resolved keymap.

use super::bindings::{Keymap, Mode};
use super::chord::display_sequence;

enum HelpItem {
    Single(Mode, &'static str, &'static str),
    Pair(Mode, &'static str, &'static str, &'static str),
    Multi(Mode, &'static [&'static str], &'static str),
}

use HelpItem::{Multi, Pair, Single};

const SECTIONS: &[(&str, &[HelpItem])] = &[
    (
        "Navigation",
        &[
            Pair(Mode::Document, "move_down", "move_up", "move selection"),
            Pair(Mode::Document, "move_block_down", "move_block_up", "move block"),
            Pair(Mode::Document, "first_block", "last_block", "first/last block"),
            Single(Mode::Document, "open_toc", "outline"),
            Single(Mode::Document, "open_vault", "vault"),
            Single(Mode::Document, "delete_block", "cut selected block"),
            Single(Mode::Document, "yank_block", "yank selected block"),
            Single(Mode::Document, "paste_block", "paste clipboard block"),
            Single(Mode::Document, "open_editor", "edit selected block"),
            Single(Mode::Document, "save", "save"),
            Single(Mode::Document, "quit", "quit"),
        ],
    ),
    (
        "Outline",
        &[
            Pair(Mode::Outline, "collapse_or_parent", "expand_or_child", "collapse/expand"),
            Single(Mode::Outline, "open", "jump to heading"),
            Single(Mode::Outline, "expand_all", "expand all"),
            Single(Mode::Outline, "collapse_all", "collapse all"),
            Single(Mode::Outline, "toggle_selected", "toggle selected"),
            Single(Mode::Outline, "close", "back to document"),
        ],
    ),
    (
        "Vault",
        &[
            Pair(Mode::Vault, "move_down", "move_up", "move selection"),
            Pair(Mode::Vault, "up", "enter_or_open", "up/enter"),
            Single(Mode::Vault, "new_document", "new document"),
            Single(Mode::Vault, "new_folder", "new folder"),
            Single(Mode::Vault, "rename", "rename"),
            Single(Mode::Vault, "copy", "copy"),
            Single(Mode::Vault, "cut", "cut"),
            Single(Mode::Vault, "paste", "paste"),
            Single(Mode::Vault, "close", "back to document"),
        ],
    ),
    (
        "Blocks",
        &[
            Single(Mode::Document, "insert_text", "normal text"),
            Single(Mode::Document, "insert_title", "title"),
            Multi(
                Mode::Document,
                &[
                    "insert_h1",
                    "insert_h2",
                    "insert_h3",
                    "insert_h4",
                    "insert_h5",
                    "insert_h6",
                ],
                "headings",
            ),
            Single(Mode::Document, "insert_toc", "outline block"),
            Single(Mode::Document, "insert_three", "3D scene block"),
            Single(Mode::Document, "insert_pyimage", "render script block"),
            Single(Mode::Document, "insert_latex", "math block"),
            Single(Mode::Document, "insert_map", "map block"),
        ],
    ),
    (
        "Other",
        &[
            Single(Mode::Document, "export", "export snapshot"),
            Single(Mode::Document, "help_toggle", "toggle this help"),
        ],
    ),
];

fn keys(keymap: &Keymap, mode: Mode, name: &str) -> Option<String> {
    keymap.sequence(mode, name).map(display_sequence)
}

/// Help lines: one title per section, `  <keys> <label>` rows, a blank
/// line between sections.
pub fn build_help_lines(keymap: &Keymap) -> Vec<String> {
    let mut lines = Vec::new();
    for (title, items) in SECTIONS {
        lines.push((*title).to_string());
        for item in *items {
            let row = match item {
                Single(mode, name, label) => keys(keymap, *mode, name).map(|keys| (keys, *label)),
                Pair(mode, first, second, label) => keys(keymap, *mode, first)
                    .zip(keys(keymap, *mode, second))
                    .map(|(a, b)| (format!("{a}/{b}"), *label)),
                Multi(mode, names, label) => {
                    let all: Vec<String> = names
                        .iter()
                        .filter_map(|name| keys(keymap, *mode, name))
                        .collect();
                    (!all.is_empty()).then(|| (all.join(" "), *label))
                }
            };
            if let Some((keys, label)) = row {
                lines.push(format!("  {keys:10} {label}"));
            }
        }
        lines.push(String::new());
    }
    if lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::build_help_lines;
    use crate::keymap::bindings::{Keymap, KeymapOverrides};

    #[test]
    fn help_uses_display_forms() {
        let lines = build_help_lines(&Keymap::default());
        assert_eq!(lines[0], "Navigation");
        assert!(lines.contains(&"  j/k        move selection".to_string()));
        assert!(lines.contains(&"  Ctrl+J/Ctrl+K move block".to_string()));
        assert!(lines.contains(&"  Enter      edit selected block".to_string()));
        assert!(!lines.last().unwrap().is_empty());
    }

    #[test]
    fn help_follows_configured_leader() {
        let overrides: KeymapOverrides =
            serde_json::from_str(r#"{"leader": " "}"#).expect("fixture");
        let (keymap, _) = Keymap::resolve(&overrides);
        let lines = build_help_lines(&keymap);
        assert!(lines.contains(&"  Space v    vault".to_string()));
    }
}
