use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File name looked up inside [`TechnologyConfig::app_folder`].
pub const DEFAULT_TECHNOLOGY_FILE: &str = "technologies.yaml";

/// Where technology tables are read from.
///
/// If `app_folder` contains a [`DEFAULT_TECHNOLOGY_FILE`] it replaces the
/// embedded table; `technology_filename`, when set, names an extra table
/// whose entries are merged over the base one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnologyConfig {
    pub app_folder: PathBuf,
    pub technology_filename: Option<PathBuf>,
}

impl TechnologyConfig {
    #[must_use]
    pub fn new(app_folder: impl Into<PathBuf>) -> Self {
        Self {
            app_folder: app_folder.into(),
            technology_filename: None,
        }
    }

    #[must_use]
    pub fn with_technology_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.technology_filename = Some(path.into());
        self
    }

    /// The replacement table path inside the application folder.
    #[must_use]
    pub fn app_technology_file(&self) -> PathBuf {
        self.app_folder.join(DEFAULT_TECHNOLOGY_FILE)
    }

    #[must_use]
    pub fn additional_file(&self) -> Option<&Path> {
        self.technology_filename.as_deref()
    }
}
