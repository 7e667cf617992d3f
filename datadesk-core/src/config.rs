//! Configuration system for datadesk.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from the user config dir (`config.toml`) and/or
//! `.datadesk/config.toml` in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the workspace-local config directory.
pub const WORKSPACE_DIR: &str = ".datadesk";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeskConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the record store lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; relative paths resolve against the workspace.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".datadesk/datadesk.db"),
        }
    }
}

/// Where model artifacts are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub artifacts_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from(".datadesk/models"),
        }
    }
}

/// Defaults applied to newly created jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobsConfig {
    pub default_queue: String,
    pub default_priority: i64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            default_queue: crate::jobs::DEFAULT_QUEUE.to_string(),
            default_priority: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Actor recorded on audit entries when none is given.
    #[serde(default)]
    pub default_actor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter used when no verbosity flag is given.
    pub level: String,
    /// Whether to also write a daily-rolling JSON log file.
    pub json_file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_file: true,
        }
    }
}

impl DeskConfig {
    /// Database path resolved against `workspace`.
    pub fn database_path(&self, workspace: &Path) -> PathBuf {
        resolve(workspace, &self.database.path)
    }

    /// Artifacts directory resolved against `workspace`.
    pub fn artifacts_dir(&self, workspace: &Path) -> PathBuf {
        resolve(workspace, &self.storage.artifacts_dir)
    }

    /// Check for obviously unusable values.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.database.path.as_os_str().is_empty() {
            problems.push("database.path must not be empty".to_string());
        }
        if self.storage.artifacts_dir.as_os_str().is_empty() {
            problems.push("storage.artifacts_dir must not be empty".to_string());
        }
        if self.jobs.default_queue.trim().is_empty() {
            problems.push("jobs.default_queue must not be empty".to_string());
        }
        problems
    }

    /// [`DeskConfig::validate`] as a `Result`, joining every problem.
    pub fn ensure_valid(&self) -> crate::error::Result<()> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(crate::error::CoreError::Config {
                message: problems.join("; "),
            })
        }
    }
}

fn resolve(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "datadesk", "datadesk")
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(WORKSPACE_DIR).join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `DATADESK_`)
/// 3. Workspace-local config (`.datadesk/config.toml`)
/// 4. User config (`<config dir>/datadesk/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&DeskConfig>,
) -> Result<DeskConfig, Box<figment::Error>> {
    load_config_with_file(workspace, None, overrides)
}

/// [`load_config`] with one more TOML file merged above the environment.
///
/// Keys the file leaves out keep the value from the lower layers.
pub fn load_config_with_file(
    workspace: Option<&Path>,
    extra_file: Option<&Path>,
    overrides: Option<&DeskConfig>,
) -> Result<DeskConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(DeskConfig::default()));

    if let Some(dirs) = project_dirs() {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // DATADESK_DATABASE__PATH, DATADESK_JOBS__DEFAULT_QUEUE, ...
    figment = figment.merge(Env::prefixed("DATADESK_").split("__"));

    if let Some(path) = extra_file {
        figment = figment.merge(Toml::file(path));
    }

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Check whether any datadesk configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if let Some(dirs) = project_dirs() {
        if dirs.config_dir().join("config.toml").exists() {
            return true;
        }
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}

/// Directory for rolling log files, if a home directory is known.
pub fn log_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("logs"))
}
