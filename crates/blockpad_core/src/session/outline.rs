//! Collapsible outline over the document headings.

use crate::model::block::BlockId;
use crate::model::document::OutlineEntry;
use std::collections::BTreeSet;

/// Outline drill state: entries, collapsed headings and the cursor.
///
/// A heading's children are the entries after it with a deeper level, up to
/// the next entry at its own level or above.
#[derive(Debug, Clone, Default)]
pub struct OutlineView {
    entries: Vec<OutlineEntry>,
    collapsed: BTreeSet<BlockId>,
    /// Index into `entries`; always a visible entry when any exist.
    cursor: usize,
}

/// One visible outline row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineRow<'a> {
    pub entry: &'a OutlineEntry,
    pub depth: usize,
    pub has_children: bool,
    pub collapsed: bool,
    pub selected: bool,
}

impl OutlineView {
    /// Replaces the entries, keeping collapse state and the cursor heading
    /// where they still exist.
    pub fn refresh(&mut self, entries: Vec<OutlineEntry>) {
        let current = self.selected();
        self.collapsed
            .retain(|id| entries.iter().any(|entry| entry.block_id == *id));
        self.entries = entries;
        self.cursor = current
            .and_then(|id| self.entries.iter().position(|entry| entry.block_id == id))
            .unwrap_or(0);
        self.cursor = self.nearest_visible(self.cursor);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Heading block under the cursor.
    pub fn selected(&self) -> Option<BlockId> {
        self.entries.get(self.cursor).map(|entry| entry.block_id)
    }

    /// Moves the cursor onto `block_id` if it is a visible heading.
    pub fn select(&mut self, block_id: BlockId) -> bool {
        match self.entries.iter().position(|entry| entry.block_id == block_id) {
            Some(index) if self.is_visible(index) => {
                self.cursor = index;
                true
            }
            _ => false,
        }
    }

    pub fn rows(&self) -> Vec<OutlineRow<'_>> {
        self.visible_indices()
            .into_iter()
            .map(|index| OutlineRow {
                entry: &self.entries[index],
                depth: self.ancestors(index).len(),
                has_children: self.has_children(index),
                collapsed: self.collapsed.contains(&self.entries[index].block_id),
                selected: index == self.cursor,
            })
            .collect()
    }

    pub fn move_down(&mut self) {
        let visible = self.visible_indices();
        if let Some(next) = visible.iter().find(|index| **index > self.cursor) {
            self.cursor = *next;
        }
    }

    pub fn move_up(&mut self) {
        let visible = self.visible_indices();
        if let Some(previous) = visible.iter().rev().find(|index| **index < self.cursor) {
            self.cursor = *previous;
        }
    }

    /// Collapses an expanded heading, otherwise moves to its parent.
    pub fn collapse_or_parent(&mut self) {
        let Some(entry) = self.entries.get(self.cursor) else {
            return;
        };
        if self.has_children(self.cursor) && !self.collapsed.contains(&entry.block_id) {
            self.collapsed.insert(entry.block_id);
        } else if let Some(parent) = self.ancestors(self.cursor).last() {
            self.cursor = *parent;
        }
    }

    /// Expands a collapsed heading, otherwise moves to its first child.
    pub fn expand_or_child(&mut self) {
        let Some(entry) = self.entries.get(self.cursor) else {
            return;
        };
        if !self.has_children(self.cursor) {
            return;
        }
        if !self.collapsed.remove(&entry.block_id) {
            self.cursor += 1;
        }
    }

    pub fn toggle_selected(&mut self) {
        let Some(entry) = self.entries.get(self.cursor) else {
            return;
        };
        if !self.has_children(self.cursor) {
            return;
        }
        let id = entry.block_id;
        if !self.collapsed.remove(&id) {
            self.collapsed.insert(id);
        }
    }

    pub fn expand_all(&mut self) {
        self.collapsed.clear();
    }

    pub fn collapse_all(&mut self) {
        self.collapsed = (0..self.entries.len())
            .filter(|index| self.has_children(*index))
            .map(|index| self.entries[index].block_id)
            .collect();
        self.cursor = self.nearest_visible(self.cursor);
    }

    fn has_children(&self, index: usize) -> bool {
        match (self.entries.get(index), self.entries.get(index + 1)) {
            (Some(entry), Some(next)) => next.level > entry.level,
            _ => false,
        }
    }

    /// Indices of the enclosing headings, outermost first.
    fn ancestors(&self, index: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let Some(entry) = self.entries.get(index) else {
            return chain;
        };
        let mut level = entry.level;
        for candidate in (0..index).rev() {
            if self.entries[candidate].level < level {
                level = self.entries[candidate].level;
                chain.push(candidate);
            }
        }
        chain.reverse();
        chain
    }

    fn is_visible(&self, index: usize) -> bool {
        self.ancestors(index)
            .iter()
            .all(|ancestor| !self.collapsed.contains(&self.entries[*ancestor].block_id))
    }

    fn visible_indices(&self) -> Vec<usize> {
        (0..self.entries.len())
            .filter(|index| self.is_visible(*index))
            .collect()
    }

    /// `index` itself when visible, else its outermost collapsed ancestor.
    fn nearest_visible(&self, index: usize) -> usize {
        if self.entries.is_empty() || self.is_visible(index) {
            return index;
        }
        self.ancestors(index)
            .into_iter()
            .find(|ancestor| self.collapsed.contains(&self.entries[*ancestor].block_id))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::OutlineView;
    use crate::model::document::OutlineEntry;
    use uuid::Uuid;

    fn entry(level: u8, label: &str) -> OutlineEntry {
        OutlineEntry {
            block_id: Uuid::new_v4(),
            level,
            label: label.to_string(),
        }
    }

    fn labels(view: &OutlineView) -> Vec<String> {
        view.rows().iter().map(|row| row.entry.label.clone()).collect()
    }

    fn sample() -> OutlineView {
        let mut view = OutlineView::default();
        view.refresh(vec![
            entry(1, "A"),
            entry(2, "A.1"),
            entry(3, "A.1.a"),
            entry(2, "A.2"),
            entry(1, "B"),
        ]);
        view
    }

    #[test]
    fn collapse_hides_descendants_and_moves_to_parent() {
        let mut view = sample();
        view.collapse_or_parent();
        assert_eq!(labels(&view), ["A", "B"]);

        view.expand_or_child();
        view.expand_or_child();
        assert!(view.rows()[1].selected);
        view.collapse_or_parent();
        assert_eq!(labels(&view), ["A", "A.1", "A.2", "B"]);
        view.collapse_or_parent();
        assert!(view.rows()[0].selected);
    }

    #[test]
    fn moves_skip_hidden_rows() {
        let mut view = sample();
        view.move_down();
        view.toggle_selected();
        view.move_down();
        assert_eq!(view.rows()[2].entry.label, "A.2");
        assert!(view.rows()[2].selected);
        view.move_up();
        assert!(view.rows()[1].selected);
    }

    #[test]
    fn collapse_all_keeps_cursor_visible() {
        let mut view = sample();
        view.move_down();
        view.move_down();
        view.collapse_all();
        assert_eq!(labels(&view), ["A", "B"]);
        assert!(view.rows()[0].selected);
        view.expand_all();
        assert_eq!(labels(&view).len(), 5);
    }

    #[test]
    fn refresh_keeps_selection_by_block() {
        let mut view = sample();
        view.move_down();
        let selected = view.selected().unwrap();
        let mut entries: Vec<_> = view.rows().iter().map(|row| row.entry.clone()).collect();
        entries.insert(0, entry(0, "Title"));
        view.refresh(entries);
        assert_eq!(view.selected(), Some(selected));
    }
}
