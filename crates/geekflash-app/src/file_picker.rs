//! File selection boundary
//!
//! The orchestrator asks a [`FilePicker`] for one file matching an extension
//! filter. `None` (cancelled, rejected, unavailable) leaves the configuration
//! untouched.

use std::path::{Path, PathBuf};

use geekflash_core::prelude::*;
use geekflash_core::FileFilter;

/// Single-file picker
pub trait FilePicker {
    fn pick(&self, filter: &FileFilter) -> Option<PathBuf>;
}

/// Picker backed by a path given on the command line
#[derive(Debug, Clone)]
pub struct PathArgPicker {
    candidate: PathBuf,
}

impl PathArgPicker {
    pub fn new(candidate: impl Into<PathBuf>) -> Self {
        Self {
            candidate: candidate.into(),
        }
    }

    /// Validate the candidate against `filter` and canonicalize it
    pub fn check(&self, filter: &FileFilter) -> Result<PathBuf> {
        let path = self.candidate.as_path();
        if !path.is_file() {
            return Err(Error::invalid_selection(path, "not an existing file"));
        }
        if !filter.accepts(path) {
            return Err(Error::invalid_selection(
                path,
                format!("expected {} ({})", filter.name, describe(filter)),
            ));
        }
        dunce::canonicalize(path).map_err(|e| Error::invalid_selection(path, e.to_string()))
    }

    pub fn candidate(&self) -> &Path {
        &self.candidate
    }
}

fn describe(filter: &FileFilter) -> String {
    filter
        .extensions
        .iter()
        .map(|e| format!("*.{}", e))
        .collect::<Vec<_>>()
        .join(", ")
}

impl FilePicker for PathArgPicker {
    fn pick(&self, filter: &FileFilter) -> Option<PathBuf> {
        self.check(filter)
            .inspect_err(|e| warn!("Selection rejected: {}", e))
            .ok()
    }
}

/// Picker that always cancels
#[derive(Debug, Clone, Copy, Default)]
pub struct CancelledPicker;

impl FilePicker for CancelledPicker {
    fn pick(&self, _filter: &FileFilter) -> Option<PathBuf> {
        None
    }
}
