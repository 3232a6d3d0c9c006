//! Layered configuration: `.taskdeck/taskdeck.toml`, then environment, then CLI flags.
//!
//! ```toml
//! [storage]
//! db_path = ".taskdeck/taskdeck.db"
//!
//! [session]
//! unknown_id_policy = "tolerate"   # or "reject"
//! save_retries = 2
//! retry_backoff_ms = 250
//!
//! [generator]
//! command = "claude"
//! args = ["--print"]
//! timeout_secs = 120
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::board::autosave::AutosaveConfig;
use crate::board::generator::CommandGenerator;
use crate::board::mutator::UnknownIdPolicy;
use crate::board::session::SessionConfig;

pub const DECK_DIR: &str = ".taskdeck";
pub const CONFIG_FILE: &str = "taskdeck.toml";
pub const DEFAULT_DB_FILE: &str = "taskdeck.db";

/// Overrides `[storage] db_path`.
pub const DB_ENV: &str = "TASKDECK_DB";
/// Overrides `[generator] command`.
pub const GENERATOR_CMD_ENV: &str = "TASKDECK_GENERATOR_CMD";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StorageSection {
    /// Relative paths resolve against the project directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSection {
    #[serde(default)]
    pub unknown_id_policy: UnknownIdPolicy,
    #[serde(default = "default_save_retries")]
    pub save_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_save_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    250
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            unknown_id_policy: UnknownIdPolicy::default(),
            save_retries: default_save_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratorSection {
    /// Empty disables generation; requests then yield a configuration notice.
    #[serde(default = "default_generator_command")]
    pub command: String,
    #[serde(default = "default_generator_args")]
    pub args: Vec<String>,
    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
}

fn default_generator_command() -> String {
    "claude".to_string()
}

fn default_generator_args() -> Vec<String> {
    vec!["--print".to_string()]
}

fn default_generator_timeout() -> u64 {
    120
}

impl Default for GeneratorSection {
    fn default() -> Self {
        Self {
            command: default_generator_command(),
            args: default_generator_args(),
            timeout_secs: default_generator_timeout(),
        }
    }
}

/// The complete taskdeck.toml structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DeckToml {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub generator: GeneratorSection,
}

impl DeckToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse taskdeck.toml")
    }

    /// Missing file means defaults.
    pub fn load_or_default(deck_dir: &Path) -> Result<Self> {
        let config_path = deck_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize taskdeck.toml")
    }

    /// Non-fatal problems worth showing to the user.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.generator.command.trim().is_empty() {
            warnings.push("generator.command is empty; task generation is disabled".to_string());
        }
        if self.generator.timeout_secs == 0 {
            warnings.push("generator.timeout_secs is 0; every generation will time out".to_string());
        }
        if self.session.save_retries > 10 {
            warnings.push(format!(
                "session.save_retries = {} is unusually high",
                self.session.save_retries
            ));
        }
        warnings
    }
}

/// Effective configuration for one CLI invocation.
#[derive(Debug, Clone)]
pub struct DeckConfig {
    pub project_dir: PathBuf,
    pub deck_dir: PathBuf,
    pub toml: DeckToml,
    /// CLI `--db`, wins over env and file.
    pub cli_db_path: Option<PathBuf>,
}

impl DeckConfig {
    /// Read the config file and apply environment overrides.
    pub fn load(project_dir: &Path) -> Result<Self> {
        Self::load_with_env(project_dir, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<F>(project_dir: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let deck_dir = project_dir.join(DECK_DIR);
        let mut toml = DeckToml::load_or_default(&deck_dir)?;

        if let Some(db) = env(DB_ENV).filter(|v| !v.trim().is_empty()) {
            toml.storage.db_path = Some(PathBuf::from(db));
        }
        if let Some(cmd) = env(GENERATOR_CMD_ENV) {
            toml.generator.command = cmd;
        }

        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            deck_dir,
            toml,
            cli_db_path: None,
        })
    }

    pub fn with_cli_db(mut self, db_path: Option<PathBuf>) -> Self {
        self.cli_db_path = db_path;
        self
    }

    pub fn config_path(&self) -> PathBuf {
        self.deck_dir.join(CONFIG_FILE)
    }

    /// CLI flag, then env/file value, then `.taskdeck/taskdeck.db`.
    pub fn resolved_db_path(&self) -> PathBuf {
        let configured = self
            .cli_db_path
            .clone()
            .or_else(|| self.toml.storage.db_path.clone());
        match configured {
            Some(path) if path.is_absolute() => path,
            Some(path) => self.project_dir.join(path),
            None => self.deck_dir.join(DEFAULT_DB_FILE),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            unknown_id_policy: self.toml.session.unknown_id_policy,
            autosave: AutosaveConfig {
                retries: self.toml.session.save_retries,
                backoff: Duration::from_millis(self.toml.session.retry_backoff_ms),
            },
        }
    }

    pub fn generator(&self) -> CommandGenerator {
        CommandGenerator::new(
            &self.toml.generator.command,
            self.toml.generator.args.clone(),
            Duration::from_secs(self.toml.generator.timeout_secs),
        )
    }
}
