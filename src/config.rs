use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_PAGE_SIZE, PAGE_SIZE_CHOICES};

fn default_api_port() -> u16 {
    3000
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("tmp")
}

fn default_true() -> bool {
    true
}

/// Viewer configuration file structure
///
/// ```toml
/// corpus = "data/hedges.json"
/// profiles = "https://example.org/data/profiles.json"
/// state_dir = "tmp"
/// export_dir = "exports"
/// api_port = 3000
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ViewerConfig {
    /// Sentence collection: file path or http(s) URL (required)
    pub corpus: String,
    /// Profile collection: file path or http(s) URL (optional)
    pub profiles: Option<String>,
    /// Directory holding the persisted edit slot (default: tmp)
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Directory receiving exported snapshots (default: same as state_dir)
    pub export_dir: Option<PathBuf>,
    /// API server port (default: 3000)
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Cards per page when a request does not specify one (default: 25)
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Directory with a prebuilt frontend to serve at `/` (optional)
    pub frontend_dir: Option<PathBuf>,
    /// Write a backup export on shutdown when edits exist (default: true)
    #[serde(default = "default_true")]
    pub export_on_shutdown: bool,
}

impl ViewerConfig {
    /// Read and parse a TOML config file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: ViewerConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate values that serde cannot check on its own
    pub fn validate(&self) -> Result<(), String> {
        if self.corpus.trim().is_empty() {
            return Err("corpus must not be empty".to_string());
        }

        if !PAGE_SIZE_CHOICES.contains(&self.page_size) {
            return Err(format!(
                "page_size {} is not one of {:?}",
                self.page_size, PAGE_SIZE_CHOICES
            ));
        }

        if let Some(dir) = &self.frontend_dir {
            if !dir.is_dir() {
                return Err(format!("frontend_dir '{}' is not a directory", dir.display()));
            }
        }

        Ok(())
    }

    /// Directory receiving exports, falling back to the state directory
    pub fn export_dir(&self) -> &Path {
        self.export_dir.as_deref().unwrap_or(&self.state_dir)
    }
}
