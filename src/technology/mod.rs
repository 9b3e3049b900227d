//! Technology kinds and their boolean attribute bags.
//!
//! A technology may name a parent whose attributes it inherits. Inheritance
//! is flattened once per table with [`TechnologyMap::propagate_attributes`];
//! rule evaluation only ever sees the flattened bags.

mod config;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub use config::{TechnologyConfig, DEFAULT_TECHNOLOGY_FILE};

const DEFAULT_TECHNOLOGIES: &str = include_str!("technologies.yaml");

#[derive(Debug, Error)]
pub enum TechnologyError {
    #[error("unknown technology '{name}'")]
    Unknown { name: String },

    #[error("technology '{name}' has unknown parent '{parent}'")]
    UnknownParent { name: String, parent: String },

    #[error("cyclic technology inheritance: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("error reading technologies from '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error parsing technologies from '{}'", path.display())]
    ParseFile {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("error parsing technologies")]
    Parse(#[source] serde_yaml::Error),
}

/// A named technology kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Technology {
    pub name: String,
    pub parent: String,
    pub description: String,
    pub attributes: BTreeMap<String, bool>,
}

impl Technology {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = parent.into();
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: bool) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Attribute value; absent attributes are `false`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> bool {
        self.attributes.get(name).copied().unwrap_or(false)
    }
}

/// Technologies keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TechnologyMap {
    technologies: BTreeMap<String, Technology>,
}

impl TechnologyMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The embedded default table. Parsed on first use, cloned afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`TechnologyError::Parse`] if the embedded table is malformed.
    pub fn load_default() -> Result<Self, TechnologyError> {
        static DEFAULT: OnceLock<TechnologyMap> = OnceLock::new();
        if let Some(map) = DEFAULT.get() {
            return Ok(map.clone());
        }
        let map = Self::load_from_str(DEFAULT_TECHNOLOGIES)?;
        debug!(technologies = map.len(), "default technology table loaded");
        Ok(DEFAULT.get_or_init(|| map).clone())
    }

    /// # Errors
    ///
    /// Returns [`TechnologyError::Parse`] on malformed YAML.
    pub fn load_from_str(text: &str) -> Result<Self, TechnologyError> {
        let mut map: TechnologyMap = serde_yaml::from_str(text).map_err(TechnologyError::Parse)?;
        map.fill_names();
        Ok(map)
    }

    /// # Errors
    ///
    /// Returns [`TechnologyError::Io`] or [`TechnologyError::ParseFile`], both carrying `path`.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, TechnologyError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TechnologyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut map: TechnologyMap =
            serde_yaml::from_str(&text).map_err(|source| TechnologyError::ParseFile {
                path: path.to_path_buf(),
                source,
            })?;
        map.fill_names();
        Ok(map)
    }

    /// Load the application table (or the embedded default if the application
    /// folder has none), then merge the additional file if one is configured.
    ///
    /// # Errors
    ///
    /// Returns the first load error encountered.
    pub fn load_with_config(config: &TechnologyConfig) -> Result<Self, TechnologyError> {
        let app_file = config.app_technology_file();
        let mut map = if app_file.is_file() {
            info!(path = %app_file.display(), "loading technologies");
            Self::load_from_file(&app_file)?
        } else {
            Self::load_default()?
        };
        if let Some(extra) = config.additional_file() {
            info!(path = %extra.display(), "merging additional technologies");
            map.merge(Self::load_from_file(extra)?);
        }
        Ok(map)
    }

    fn fill_names(&mut self) {
        for (name, technology) in &mut self.technologies {
            if technology.name.is_empty() {
                technology.name.clone_from(name);
            }
        }
    }

    /// Insert or replace every technology of `other`.
    pub fn merge(&mut self, other: TechnologyMap) {
        self.technologies.extend(other.technologies);
    }

    pub fn insert(&mut self, technology: Technology) {
        self.technologies
            .insert(technology.name.clone(), technology);
    }

    #[must_use]
    pub fn with(mut self, technology: Technology) -> Self {
        self.insert(technology);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Technology> {
        self.technologies.get(name)
    }

    /// Resolve every name, in order.
    ///
    /// # Errors
    ///
    /// Returns [`TechnologyError::Unknown`] for the first name not in the map.
    pub fn get_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&Technology>, TechnologyError> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.get(name).ok_or_else(|| TechnologyError::Unknown {
                    name: name.to_owned(),
                })
            })
            .collect()
    }

    /// Technology names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.technologies.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.technologies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.technologies.is_empty()
    }

    /// Flatten parent inheritance into every technology's attribute bag.
    ///
    /// Parents are resolved before children, each once. A technology's own
    /// attributes override inherited ones and its own name becomes a `true`
    /// attribute of that technology alone; descendants do not inherit it.
    /// On error the map is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`TechnologyError::UnknownParent`] for a dangling parent name or
    /// [`TechnologyError::Cycle`] when a parent chain revisits a technology.
    pub fn propagate_attributes(&mut self) -> Result<(), TechnologyError> {
        let mut resolved: BTreeMap<String, BTreeMap<String, bool>> = BTreeMap::new();
        let mut stack: Vec<&str> = Vec::new();
        for name in self.technologies.keys() {
            self.resolve(name, &mut resolved, &mut stack)?;
        }
        for (name, mut attributes) in resolved {
            if let Some(technology) = self.technologies.get_mut(&name) {
                attributes.insert(name, true);
                technology.attributes = attributes;
            }
        }
        debug!(technologies = self.len(), "technology attributes propagated");
        Ok(())
    }

    fn resolve<'m>(
        &'m self,
        name: &'m str,
        resolved: &mut BTreeMap<String, BTreeMap<String, bool>>,
        stack: &mut Vec<&'m str>,
    ) -> Result<(), TechnologyError> {
        if resolved.contains_key(name) {
            return Ok(());
        }
        if let Some(pos) = stack.iter().position(|&n| n == name) {
            let mut path: Vec<String> = stack[pos..].iter().map(|&s| s.to_owned()).collect();
            path.push(name.to_owned());
            return Err(TechnologyError::Cycle { path });
        }
        let Some(technology) = self.technologies.get(name) else {
            return Err(TechnologyError::Unknown {
                name: name.to_owned(),
            });
        };

        let mut attributes = BTreeMap::new();
        if !technology.parent.is_empty() {
            if !self.technologies.contains_key(&technology.parent) {
                return Err(TechnologyError::UnknownParent {
                    name: name.to_owned(),
                    parent: technology.parent.clone(),
                });
            }
            stack.push(name);
            self.resolve(&technology.parent, resolved, stack)?;
            stack.pop();
            if let Some(inherited) = resolved.get(&technology.parent) {
                attributes.clone_from(inherited);
            }
        }
        // A technology's own name marks only itself, never its descendants.
        attributes.extend(
            technology
                .attributes
                .iter()
                .filter(|(k, _)| k.as_str() != name)
                .map(|(k, &v)| (k.clone(), v)),
        );
        resolved.insert(name.to_owned(), attributes);
        Ok(())
    }
}
