//! The user's selection for one run: images, instructions, document header.
//!
//! A `Session` is edited freely and then frozen into work items with
//! [`Session::snapshot`]; the pipeline never reads it while running.

use crate::pipeline::WorkItem;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub student_name: String,
    pub group: String,
    images: Vec<PathBuf>,
    /// Applies to every image without instructions of its own
    instructions: Option<String>,
    per_image: HashMap<PathBuf, String>,
}

impl Session {
    pub fn new(student_name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            student_name: student_name.into(),
            group: group.into(),
            ..Self::default()
        }
    }

    /// Append an image. Returns `false` if it is already selected.
    pub fn add_image(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.images.contains(&path) {
            return false;
        }
        self.images.push(path);
        true
    }

    /// Remove an image along with its instructions.
    pub fn remove_image(&mut self, path: &Path) -> bool {
        let before = self.images.len();
        self.images.retain(|p| p != path);
        self.per_image.remove(path);
        self.images.len() != before
    }

    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }

    pub fn set_instructions(&mut self, text: impl Into<String>) {
        self.instructions = non_blank(text.into());
    }

    /// Instructions for one image. Blank text clears them.
    pub fn set_image_instructions(&mut self, path: impl Into<PathBuf>, text: impl Into<String>) {
        let path = path.into();
        match non_blank(text.into()) {
            Some(text) => {
                self.per_image.insert(path, text);
            }
            None => {
                self.per_image.remove(&path);
            }
        }
    }

    /// Effective instructions for `path`: its own if set, else the global ones.
    pub fn instructions_for(&self, path: &Path) -> Option<&str> {
        self.per_image
            .get(path)
            .map(String::as_str)
            .or(self.instructions.as_deref())
    }

    /// Freeze the selection into ordered work items.
    pub fn snapshot(&self) -> Vec<WorkItem> {
        self.images
            .iter()
            .enumerate()
            .map(|(index, path)| {
                let item = WorkItem::new(index, path.clone());
                match self.instructions_for(path) {
                    Some(text) => item.with_instructions(text),
                    None => item,
                }
            })
            .collect()
    }
}

fn non_blank(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_preserves_order_and_instructions() {
        let mut session = Session::new("Ana Pop", "10B");
        session.add_image("/tmp/b.png");
        session.add_image("/tmp/a.png");
        session.add_image("/tmp/c.png");
        session.set_instructions("Answer in English.");
        session.set_image_instructions("/tmp/a.png", "Only exercise 3.");

        let items = session.snapshot();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].input, PathBuf::from("/tmp/b.png"));
        assert_eq!(items[0].instructions.as_deref(), Some("Answer in English."));
        assert_eq!(items[1].index, 1);
        assert_eq!(items[1].instructions.as_deref(), Some("Only exercise 3."));
        assert_eq!(items[2].index, 2);
    }

    #[test]
    fn test_remove_image_drops_its_instructions() {
        let mut session = Session::default();
        session.add_image("/tmp/a.png");
        session.set_image_instructions("/tmp/a.png", "x");
        assert!(session.remove_image(Path::new("/tmp/a.png")));
        assert!(!session.remove_image(Path::new("/tmp/a.png")));

        session.add_image("/tmp/a.png");
        assert_eq!(session.instructions_for(Path::new("/tmp/a.png")), None);
    }

    #[test]
    fn test_duplicates_and_blank_text_ignored() {
        let mut session = Session::default();
        assert!(session.add_image("/tmp/a.png"));
        assert!(!session.add_image("/tmp/a.png"));
        session.set_instructions("   ");
        session.set_image_instructions("/tmp/a.png", "\n");

        let items = session.snapshot();
        assert_eq!(items.len(), 1);
        assert!(items[0].instructions.is_none());
    }

    #[test]
    fn test_snapshot_is_detached_from_later_edits() {
        let mut session = Session::default();
        session.add_image("/tmp/a.png");
        let items = session.snapshot();
        session.add_image("/tmp/b.png");
        session.set_instructions("late");
        assert_eq!(items.len(), 1);
        assert!(items[0].instructions.is_none());
    }
}
