//! # Resources
//!
//! Location of on-disk data: cross-section tables and detector models.
//!
//! ```text
//! <root>/
//!   CrossSections/<model>/*.json
//!   Detectors/<experiment>.json
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{InjectorError, InjectorResult};

/// Root of the resource tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRoot {
    root: PathBuf,
}

impl ResourceRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resources shipped with the crate
    pub fn bundled() -> Self {
        Self::new(concat!(env!("CARGO_MANIFEST_DIR"), "/resources"))
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Directory holding the tables of one cross-section model
    pub fn cross_section_dir(&self, model: &str) -> PathBuf {
        self.root.join("CrossSections").join(model)
    }

    /// Detector description file for an experiment
    pub fn detector_file(&self, experiment: &str) -> PathBuf {
        self.root.join("Detectors").join(format!("{}.json", experiment))
    }

    /// One table of a cross-section model, which must exist
    pub fn cross_section_table(&self, model: &str, file: &str) -> InjectorResult<PathBuf> {
        existing(self.cross_section_dir(model).join(file))
    }

    /// Existing file under the root, or a resource error naming it
    pub fn require(&self, relative: impl AsRef<Path>) -> InjectorResult<PathBuf> {
        existing(self.root.join(relative))
    }
}

fn existing(path: PathBuf) -> InjectorResult<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(InjectorError::resource(path, "file not found"))
    }
}

impl Default for ResourceRoot {
    fn default() -> Self {
        Self::bundled()
    }
}
