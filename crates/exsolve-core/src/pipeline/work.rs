//! Work items and the index-addressed result table.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prefix that marks a result body as a per-item failure.
pub const ERROR_PREFIX: &str = "Error: ";

/// One image to answer, in its original position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Position in the caller's input list
    pub index: usize,
    /// Image file to send
    pub input: PathBuf,
    /// Free text appended to the prompt for this image only
    pub instructions: Option<String>,
}

impl WorkItem {
    pub fn new(index: usize, input: impl Into<PathBuf>) -> Self {
        Self {
            index,
            input: input.into(),
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        let instructions = instructions.into();
        self.instructions = (!instructions.trim().is_empty()).then_some(instructions);
        self
    }

    /// File name for progress messages.
    pub fn display_name(&self) -> String {
        self.input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.display().to_string())
    }
}

/// The outcome for one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkResult {
    pub index: usize,
    /// Exercise title (currently always empty; the answer carries its own heading)
    pub title: String,
    /// Answer text, or an `"Error: ..."` marker
    pub body: String,
}

impl WorkResult {
    pub fn answer(index: usize, body: impl Into<String>) -> Self {
        Self {
            index,
            title: String::new(),
            body: body.into(),
        }
    }

    pub fn error(index: usize, message: impl std::fmt::Display) -> Self {
        Self::answer(index, format!("{ERROR_PREFIX}{message}"))
    }

    pub fn is_error(&self) -> bool {
        self.body.starts_with(ERROR_PREFIX)
    }
}

/// Results addressed by original input position, never by completion order.
///
/// Pre-sized to the input count; each slot is filled at most once.
#[derive(Debug, Clone)]
pub struct ResultTable {
    slots: Vec<Option<WorkResult>>,
}

impl ResultTable {
    pub fn with_len(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Store `result` at its index.
    ///
    /// Returns `false` (and leaves the table untouched) if the index is out of
    /// range or already filled.
    pub fn fill(&mut self, result: WorkResult) -> bool {
        match self.slots.get_mut(result.index) {
            Some(slot) if slot.is_none() => {
                *slot = Some(result);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, index: usize) -> Option<&WorkResult> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Whether every slot holds a result.
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Number of slots holding an error marker.
    pub fn error_count(&self) -> usize {
        self.results().filter(|r| r.is_error()).count()
    }

    /// Filled results in index order.
    pub fn results(&self) -> impl Iterator<Item = &WorkResult> {
        self.slots.iter().flatten()
    }

    /// Ordered `(title, body)` pairs for document output.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.results()
            .map(|r| (r.title.clone(), r.body.clone()))
            .collect()
    }

    /// Consume the table, returning results in index order.
    ///
    /// Returns `None` if any slot is still empty.
    pub fn into_results(self) -> Option<Vec<WorkResult>> {
        self.slots.into_iter().collect()
    }
}
