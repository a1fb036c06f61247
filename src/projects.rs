//! Recent projects
//!
//! Most-recently-opened folders, persisted as JSON. Used to seed the welcome
//! screen.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum number of remembered projects
pub const MAX_RECENT_PROJECTS: usize = 8;

/// File name inside the data directory
pub const RECENT_PROJECTS_FILE: &str = "recent-projects.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentProject {
    pub path: PathBuf,
    pub name: String,
    pub last_opened: DateTime<Utc>,
}

/// Recent project store errors
#[derive(Debug, thiserror::Error)]
pub enum ProjectsError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode recent projects: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type ProjectsResult<T> = Result<T, ProjectsError>;

/// Persisted recent project list, newest first
#[derive(Debug)]
pub struct RecentProjects {
    file: PathBuf,
    entries: Vec<RecentProject>,
}

impl RecentProjects {
    /// Load the list from a data directory. A missing or unreadable file
    /// gives an empty list.
    pub fn load(data_dir: &Path) -> Self {
        let file = data_dir.join(RECENT_PROJECTS_FILE);
        let entries = match fs::read_to_string(&file) {
            Ok(text) => match serde_json::from_str::<Vec<RecentProject>>(&text) {
                Ok(mut entries) => {
                    entries.truncate(MAX_RECENT_PROJECTS);
                    entries
                }
                Err(e) => {
                    warn!("Ignoring corrupt recent projects file {:?}: {}", file, e);
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("Could not read recent projects file {:?}: {}", file, e);
                Vec::new()
            }
        };
        debug!("Loaded {} recent projects", entries.len());
        Self { file, entries }
    }

    pub fn entries(&self) -> &[RecentProject] {
        &self.entries
    }

    /// Record that a folder was opened: move or insert it at the front and
    /// drop the oldest entries beyond the cap.
    pub fn add(&mut self, path: impl Into<PathBuf>, name: Option<String>) -> ProjectsResult<()> {
        let path = path.into();
        let name = name.unwrap_or_else(|| display_name(&path));

        self.entries.retain(|entry| entry.path != path);
        self.entries.insert(
            0,
            RecentProject {
                path,
                name,
                last_opened: Utc::now(),
            },
        );
        self.entries.truncate(MAX_RECENT_PROJECTS);
        self.save()
    }

    pub fn remove(&mut self, path: &Path) -> ProjectsResult<bool> {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.path != path);
        if self.entries.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn clear(&mut self) -> ProjectsResult<()> {
        self.entries.clear();
        self.save()
    }

    fn save(&self) -> ProjectsResult<()> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent).map_err(|source| ProjectsError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.file, json).map_err(|source| ProjectsError::Write {
            path: self.file.clone(),
            source,
        })
    }
}

/// Folder name used when no explicit name is given
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
