use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// One request for the whole story.
    #[default]
    Batch,
    /// One request per page, sequential.
    PerPage,
    /// Degraded fallback for backends without per-page completion
    /// reporting: poll the static image path until every output exists.
    Polling,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    #[serde(default)]
    pub mode: Mode,

    /// Pause between per-page requests, to avoid hammering the backend.
    #[serde(default)]
    pub page_delay_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_poll_attempts")]
    pub poll_max_attempts: u32,

    /// Ceiling for a whole generation run.
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,

    #[serde(default)]
    pub unattended: bool,
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_output() -> String {
    "output".to_string()
}
fn default_max_pages() -> usize {
    15
}
fn default_poll_interval() -> u64 {
    2
}
fn default_poll_attempts() -> u32 {
    150
}
fn default_session_timeout() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            output_folder: default_output(),
            max_pages: default_max_pages(),
            mode: Mode::default(),
            page_delay_secs: 0,
            poll_interval_secs: default_poll_interval(),
            poll_max_attempts: default_poll_attempts(),
            session_timeout_secs: default_session_timeout(),
            unattended: false,
        }
    }
}

impl Config {
    /// Load `config.yml` from the working directory, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.yml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("{} not found, using defaults", path.display());
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Path::new("config.yml"))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_secs(self.page_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }
}
