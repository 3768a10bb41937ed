//! Input discovery: expand files and directories into an ordered image list.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions accepted as exercise images.
pub const DEFAULT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "webp", "gif"];

/// Information about a discovered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Full path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// Discovers image files from a list of inputs.
pub struct FileDiscovery {
    extensions: Vec<String>,
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS.iter().copied())
    }
}

impl FileDiscovery {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Expand `inputs` into image files.
    ///
    /// Files keep the order they were given in. Directories are walked
    /// recursively with entries sorted by path. Unsupported or missing files
    /// are skipped, and a file reached twice is listed once.
    pub fn discover(&self, inputs: &[PathBuf]) -> Vec<DiscoveredFile> {
        let mut files: Vec<DiscoveredFile> = Vec::new();

        for input in inputs {
            for file in self.discover_one(input) {
                if files.iter().any(|f| f.path == file.path) {
                    tracing::debug!("Skipping duplicate input {:?}", file.path);
                    continue;
                }
                files.push(file);
            }
        }
        files
    }

    fn discover_one(&self, path: &Path) -> Vec<DiscoveredFile> {
        if path.is_file() {
            if !self.is_supported(path) {
                tracing::warn!("Skipping unsupported file {:?}", path);
                return vec![];
            }
            return match std::fs::metadata(path) {
                Ok(meta) => vec![DiscoveredFile {
                    path: path.to_path_buf(),
                    size: meta.len(),
                }],
                Err(e) => {
                    tracing::warn!("Cannot read {:?}: {e}", path);
                    vec![]
                }
            };
        }
        if !path.is_dir() {
            tracing::warn!("Input not found: {:?}", path);
            return vec![];
        }

        WalkDir::new(path)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && self.is_supported(e.path()))
            .filter_map(|e| {
                let size = e.metadata().ok()?.len();
                Some(DiscoveredFile {
                    path: e.into_path(),
                    size,
                })
            })
            .collect()
    }

    /// Check if a file has a supported extension.
    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext_lower = ext.to_lowercase();
                self.extensions.iter().any(|e| *e == ext_lower)
            })
            .unwrap_or(false)
    }

    /// Get total size of all discovered files.
    pub fn total_size(files: &[DiscoveredFile]) -> u64 {
        files.iter().map(|f| f.size).sum()
    }
}

/// Expand `inputs` into image paths using the given extensions.
pub fn discover_images(inputs: &[PathBuf], extensions: &[&str]) -> Vec<PathBuf> {
    FileDiscovery::new(extensions.iter().copied())
        .discover(inputs)
        .into_iter()
        .map(|f| f.path)
        .collect()
}
