//! Configuration loaded from `.stageboard/config.toml`.
//!
//! Every section and key is optional:
//!
//! ```toml
//! [board]
//! name = "Default Board"
//!
//! [board.columns]
//! START = "Start"
//! DEV = "Dev"
//! QA = "QA"
//! FINISH = "Finish"
//!
//! [tickets]
//! max_title_len = 200
//! max_engineer_name_len = 100
//! max_attachment_bytes = 5242880
//! allowed_attachment_types = ["image/jpeg", "image/png", "image/gif", "image/webp"]
//!
//! [dashboard]
//! upcoming_days = 7
//!
//! [storage]
//! backend = "file"
//! path = ".stageboard"
//!
//! [logging]
//! filter = "info"
//! ```

use crate::domain::Stage;
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_DATA_DIR: &str = ".stageboard";

/// Display labels for the four stage columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnLabels {
    #[serde(rename = "START")]
    pub start: String,
    #[serde(rename = "DEV")]
    pub dev: String,
    #[serde(rename = "QA")]
    pub qa: String,
    #[serde(rename = "FINISH")]
    pub finish: String,
}

impl Default for ColumnLabels {
    fn default() -> Self {
        Self {
            start: "Start".to_string(),
            dev: "Dev".to_string(),
            qa: "QA".to_string(),
            finish: "Finish".to_string(),
        }
    }
}

impl ColumnLabels {
    pub fn label(&self, stage: Stage) -> &str {
        match stage {
            Stage::Start => &self.start,
            Stage::Dev => &self.dev,
            Stage::Qa => &self.qa,
            Stage::Finish => &self.finish,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardSection {
    pub name: String,
    pub columns: ColumnLabels,
}

impl Default for BoardSection {
    fn default() -> Self {
        Self {
            name: "Default Board".to_string(),
            columns: ColumnLabels::default(),
        }
    }
}

/// Limits enforced on ticket, engineer and attachment input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketsSection {
    pub max_title_len: usize,
    pub max_engineer_name_len: usize,
    pub max_attachment_bytes: u64,
    pub allowed_attachment_types: Vec<String>,
}

impl Default for TicketsSection {
    fn default() -> Self {
        Self {
            max_title_len: 200,
            max_engineer_name_len: 100,
            max_attachment_bytes: 5 * 1024 * 1024,
            allowed_attachment_types: ["image/jpeg", "image/png", "image/gif", "image/webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSection {
    /// Days after today covered by the "upcoming" bucket
    pub upcoming_days: u32,
}

impl Default for DashboardSection {
    fn default() -> Self {
        Self { upcoming_days: 7 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub backend: StorageBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StorageSection {
    /// Data directory; relative paths resolve against `project_root`
    pub fn resolve_path(&self, project_root: &Path) -> PathBuf {
        let path = self
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        if path.is_relative() {
            project_root.join(path)
        } else {
            path
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageboardConfig {
    pub board: BoardSection,
    pub tickets: TicketsSection,
    pub dashboard: DashboardSection,
    pub storage: StorageSection,
    pub logging: LoggingSection,
}

impl StageboardConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Load `config.toml` from a data directory, or defaults if absent.
    pub fn load_or_default(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.tickets.max_title_len > 0, "tickets.max_title_len must be positive");
        ensure!(
            self.tickets.max_engineer_name_len > 0,
            "tickets.max_engineer_name_len must be positive"
        );
        ensure!(
            !self.tickets.allowed_attachment_types.is_empty(),
            "tickets.allowed_attachment_types cannot be empty"
        );
        Ok(())
    }
}
