//! File selection built from a status query.
//!
//! A [`FileSelection`] is the editable list of candidate paths shown before
//! an operation starts: one row per reported path, each with its text and
//! property status plus independent `selected` / `enabled` flags. Once the
//! user confirms, [`FileSelection::selected_paths`] becomes the operation's
//! target set and the selection has no further meaning.

use bitflags::bitflags;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Which entries a status query should report.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct StatusFlags: u8 {
        const MODIFIED = 1 << 0;
        const UNCHANGED = 1 << 1;
        const IGNORED = 1 << 2;
        const UNVERSIONED = 1 << 3;
        const CONFLICTED = 1 << 4;
        const RECURSIVE = 1 << 5;
    }
}

/// Status of a working copy item (text or properties).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    None,
    Normal,
    Added,
    Missing,
    Deleted,
    Replaced,
    Modified,
    Merged,
    Conflicted,
    Ignored,
    Obstructed,
    External,
    Incomplete,
    Unversioned,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::None => "None",
            ItemStatus::Normal => "Normal",
            ItemStatus::Added => "Added",
            ItemStatus::Missing => "Missing",
            ItemStatus::Deleted => "Deleted",
            ItemStatus::Replaced => "Replaced",
            ItemStatus::Modified => "Modified",
            ItemStatus::Merged => "Merged",
            ItemStatus::Conflicted => "Conflicted",
            ItemStatus::Ignored => "Ignored",
            ItemStatus::Obstructed => "Obstructed",
            ItemStatus::External => "External",
            ItemStatus::Incomplete => "Incomplete",
            ItemStatus::Unversioned => "Unversioned",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row reported by a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub path: Utf8PathBuf,
    pub text_status: ItemStatus,
    pub prop_status: ItemStatus,
    /// Whether the item is under version control.
    pub versioned: bool,
}

impl StatusRecord {
    pub fn is_conflicted(&self) -> bool {
        self.text_status == ItemStatus::Conflicted || self.prop_status == ItemStatus::Conflicted
    }

    /// Whether a query run with `flags` should list this record.
    ///
    /// Conflicts count as modifications.
    pub fn matches(&self, flags: StatusFlags) -> bool {
        if self.is_conflicted() {
            return flags.intersects(StatusFlags::CONFLICTED | StatusFlags::MODIFIED);
        }

        let unchanged = |status: ItemStatus| matches!(status, ItemStatus::None | ItemStatus::Normal);
        match self.text_status {
            ItemStatus::Unversioned => flags.contains(StatusFlags::UNVERSIONED),
            ItemStatus::Ignored => flags.contains(StatusFlags::IGNORED),
            text if unchanged(text) && unchanged(self.prop_status) => {
                flags.contains(StatusFlags::UNCHANGED)
            }
            _ => flags.contains(StatusFlags::MODIFIED),
        }
    }
}

/// A selectable row of a [`FileSelection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionEntry {
    pub path: Utf8PathBuf,
    pub text_status: ItemStatus,
    pub prop_status: ItemStatus,
    pub selected: bool,
    pub enabled: bool,
}

/// Presentation tree of a selection, grouped by path component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionNode {
    pub name: String,
    pub path: Utf8PathBuf,
    /// `None` for intermediate directories the query did not report.
    pub entry: Option<SelectionEntry>,
    pub children: Vec<SelectionNode>,
}

/// Ordered, user-editable set of status rows.
#[derive(Debug, Clone, Default)]
pub struct FileSelection {
    entries: IndexMap<Utf8PathBuf, SelectionEntry>,
    all: Option<bool>,
}

impl FileSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a selection from status records, keeping those matching `flags`.
    ///
    /// Rows keep first-seen order; a repeated path updates its row in place.
    pub fn from_records<I>(records: I, flags: StatusFlags) -> Self
    where
        I: IntoIterator<Item = StatusRecord>,
    {
        let mut selection = Self::new();
        for record in records {
            if record.matches(flags) {
                selection.insert(record);
            }
        }

        tracing::debug!("File selection built with {} entries", selection.len());
        selection
    }

    /// Insert or update a row; new and updated rows become selected and enabled.
    pub fn insert(&mut self, record: StatusRecord) {
        let entry = SelectionEntry {
            path: record.path.clone(),
            text_status: record.text_status,
            prop_status: record.prop_status,
            selected: true,
            enabled: true,
        };
        self.entries.insert(record.path, entry);
        self.all = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &Utf8Path) -> Option<&SelectionEntry> {
        self.entries.get(path)
    }

    pub fn entries(&self) -> impl Iterator<Item = &SelectionEntry> {
        self.entries.values()
    }

    /// Flip the selection of one row. Returns the new value, or `None` when
    /// the row does not exist or is disabled.
    pub fn toggle(&mut self, path: &Utf8Path) -> Option<bool> {
        let entry = self.entries.get_mut(path).filter(|e| e.enabled)?;
        entry.selected = !entry.selected;
        self.all = None;
        Some(entry.selected)
    }

    pub fn set_selected(&mut self, path: &Utf8Path, selected: bool) -> bool {
        match self.entries.get_mut(path).filter(|e| e.enabled) {
            Some(entry) => {
                entry.selected = selected;
                self.all = None;
                true
            }
            None => false,
        }
    }

    pub fn set_enabled(&mut self, path: &Utf8Path, enabled: bool) -> bool {
        match self.entries.get_mut(path) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Select or unselect every enabled row.
    pub fn set_all(&mut self, selected: bool) {
        for entry in self.entries.values_mut().filter(|e| e.enabled) {
            entry.selected = selected;
        }
        self.all = Some(selected);
    }

    /// State of the "select all" toggle; `None` means inconsistent.
    pub fn all_state(&self) -> Option<bool> {
        self.all
    }

    /// Selected paths in row order.
    pub fn selected_paths(&self) -> Vec<Utf8PathBuf> {
        self.entries
            .values()
            .filter(|e| e.selected)
            .map(|e| e.path.clone())
            .collect()
    }

    /// Group rows into a tree by path component.
    pub fn tree(&self) -> Vec<SelectionNode> {
        let mut roots: Vec<SelectionNode> = Vec::new();

        for entry in self.entries.values() {
            let mut level = &mut roots;
            let mut prefix = Utf8PathBuf::new();
            let components: Vec<_> = entry.path.components().collect();
            let last = components.len().saturating_sub(1);

            for (index, component) in components.iter().enumerate() {
                prefix.push(component.as_str());
                let name = component.as_str().to_string();

                let position = match level.iter().position(|n| n.name == name) {
                    Some(position) => position,
                    None => {
                        level.push(SelectionNode {
                            name,
                            path: prefix.clone(),
                            entry: None,
                            children: Vec::new(),
                        });
                        level.len() - 1
                    }
                };

                if index == last {
                    level[position].entry = Some(entry.clone());
                }
                level = &mut level[position].children;
            }
        }

        roots
    }
}
