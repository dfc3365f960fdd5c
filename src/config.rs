use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::render::OutputFormat;
use crate::validators::{validate_affirmative, validate_log_level, validate_output_format};

/// Name of the per-project override file.
pub const PROJECT_CONFIG_FILE: &str = ".asktag";

/// Status of config file loading
#[derive(Debug, Clone)]
pub enum ConfigLoadStatus {
    /// Config loaded successfully from existing file
    Loaded,
    /// Created default config file (first run)
    Created,
    /// Error occurred during loading, using defaults.
    Error(String),
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Reply output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// `markdown` or `json`.
    pub format: String,
    /// Print each section's guidance line under its heading when the body
    /// comes from real content.
    pub show_guidance: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "markdown".to_string(),
            show_guidance: true,
        }
    }
}

/// Design flow configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignConfig {
    /// Phrases accepted as confirmation in addition to the built-in ones.
    pub extra_affirmatives: Vec<String>,
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub design: DesignConfig,
}

impl Config {
    /// Replace invalid values with defaults, logging each replacement.
    pub fn normalize(&mut self) {
        if let Some(err) = validate_log_level(&self.logging.level) {
            warn!(level = %self.logging.level, error = %err, "config_invalid_log_level");
            self.logging.level = LoggingConfig::default().level;
        }

        if let Some(err) = validate_output_format(&self.output.format) {
            warn!(format = %self.output.format, error = %err, "config_invalid_output_format");
            self.output.format = OutputConfig::default().format;
        }

        self.design.extra_affirmatives.retain(|phrase| {
            match validate_affirmative(phrase) {
                Some(err) => {
                    warn!(phrase = %phrase, error = %err, "config_invalid_affirmative");
                    false
                }
                None => true,
            }
        });
    }

    /// Parsed output format. Falls back to markdown.
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from_str(&self.output.format).unwrap_or_default()
    }

    /// Expand `~` to home directory in a path string
    pub fn expand_tilde(path: &str) -> PathBuf {
        if let Some(stripped) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(stripped);
        }
        PathBuf::from(path)
    }
}

/// Partial logging configuration for project overrides.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PartialLoggingConfig {
    pub level: Option<String>,
}

/// Partial output configuration for project overrides.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PartialOutputConfig {
    pub format: Option<String>,
    pub show_guidance: Option<bool>,
}

/// Partial design configuration for project overrides.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PartialDesignConfig {
    pub extra_affirmatives: Option<Vec<String>>,
}

/// Project-specific configuration where every field is optional.
/// Parsed from `.asktag` files. Fields that are `None` inherit from the global config.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PartialConfig {
    pub logging: PartialLoggingConfig,
    pub output: PartialOutputConfig,
    pub design: PartialDesignConfig,
}

/// Merge a global config with a project-level partial config.
/// Project values override global values where present.
pub fn merge_config(global: &Config, project: &PartialConfig) -> Config {
    Config {
        logging: LoggingConfig {
            level: project
                .logging
                .level
                .clone()
                .unwrap_or_else(|| global.logging.level.clone()),
        },
        output: OutputConfig {
            format: project
                .output
                .format
                .clone()
                .unwrap_or_else(|| global.output.format.clone()),
            show_guidance: project
                .output
                .show_guidance
                .unwrap_or(global.output.show_guidance),
        },
        design: DesignConfig {
            extra_affirmatives: project
                .design
                .extra_affirmatives
                .clone()
                .unwrap_or_else(|| global.design.extra_affirmatives.clone()),
        },
    }
}

/// Loaded configuration with metadata
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub config_path: PathBuf,
    pub project_config_path: Option<PathBuf>,
    pub status: ConfigLoadStatus,
}

/// Get the platform-appropriate config directory
fn get_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("dev", "asktag", "asktag").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the full path to the config file
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.asktag in current working directory).
pub fn get_project_config_path() -> Option<PathBuf> {
    let path = std::env::current_dir().ok()?.join(PROJECT_CONFIG_FILE);
    if path.exists() { Some(path) } else { None }
}

/// Load a project config (.asktag) from the given path.
/// Returns Ok(PartialConfig) on success, Err(String) on parse/read failure.
fn load_project_config(path: &Path) -> Result<PartialConfig, String> {
    let contents = fs::read_to_string(path).map_err(|e| {
        warn!(path = ?path, error = %e, "project_config_read_failed");
        format!("Failed to read {}: {}", PROJECT_CONFIG_FILE, e)
    })?;

    toml::from_str::<PartialConfig>(&contents).map_err(|e| {
        warn!(path = ?path, error = %e, "project_config_parse_failed");
        format!("Invalid {}: {}", PROJECT_CONFIG_FILE, e)
    })
}

/// Load configuration from file, environment, and defaults
pub fn load_config() -> LoadedConfig {
    let config_path = match get_config_path() {
        Some(path) => path,
        None => {
            warn!("Could not determine config directory, using defaults");
            let mut config = apply_env_overrides(Config::default());
            config.normalize();
            return LoadedConfig {
                config,
                config_path: PathBuf::from("config.toml"),
                project_config_path: None,
                status: ConfigLoadStatus::Error("Could not determine config directory".to_string()),
            };
        }
    };

    load_config_at(config_path, get_project_config_path())
}

/// Load the global config at `config_path`, merge the project file if given,
/// then apply environment overrides.
pub fn load_config_at(config_path: PathBuf, project_config_path: Option<PathBuf>) -> LoadedConfig {
    debug!("Config path: {:?}", config_path);

    let (mut config, status) = load_or_create_config(&config_path);

    if let Some(ref project_path) = project_config_path {
        match load_project_config(project_path) {
            Ok(partial) => {
                config = merge_config(&config, &partial);
                info!(path = ?project_path, "project_config_loaded");
            }
            Err(e) => {
                warn!(path = ?project_path, error = %e, "project_config_error");
                // Keep using global config only
            }
        }
    }

    let mut config = apply_env_overrides(config);
    config.normalize();

    LoadedConfig {
        config,
        config_path,
        project_config_path,
        status,
    }
}

/// Load config from file, or create default if not exists
fn load_or_create_config(config_path: &Path) -> (Config, ConfigLoadStatus) {
    match fs::read_to_string(config_path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(config) => {
                info!("Loaded config from {:?}", config_path);
                (config, ConfigLoadStatus::Loaded)
            }
            Err(e) => {
                warn!(
                    "Config file malformed at {:?}: {}. Using defaults.",
                    config_path, e
                );
                (
                    Config::default(),
                    ConfigLoadStatus::Error(format!("Malformed TOML: {}", e)),
                )
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => create_default_config(config_path),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            warn!(
                "Permission denied reading config at {:?}. Using defaults.",
                config_path
            );
            (
                Config::default(),
                ConfigLoadStatus::Error("Permission denied reading config".to_string()),
            )
        }
        Err(e) => {
            warn!(
                "Error reading config at {:?}: {}. Using defaults.",
                config_path, e
            );
            (
                Config::default(),
                ConfigLoadStatus::Error(format!("Read error: {}", e)),
            )
        }
    }
}

/// Create the default config file
fn create_default_config(config_path: &Path) -> (Config, ConfigLoadStatus) {
    let config = Config::default();

    if let Some(parent) = config_path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!(
            "Could not create config directory {:?}: {}. Continuing without file.",
            parent, e
        );
        return (
            config,
            ConfigLoadStatus::Error(format!("Could not create config directory: {}", e)),
        );
    }

    let toml_content = match toml::to_string_pretty(&config) {
        Ok(s) => s,
        Err(e) => {
            warn!("Could not serialize default config: {}", e);
            return (
                config,
                ConfigLoadStatus::Error(format!("Serialization error: {}", e)),
            );
        }
    };

    match fs::write(config_path, &toml_content) {
        Ok(()) => {
            info!("Created default config at {:?}", config_path);
            (config, ConfigLoadStatus::Created)
        }
        Err(e) => {
            warn!(
                "Could not write default config to {:?}: {}. Continuing without file.",
                config_path, e
            );
            (
                config,
                ConfigLoadStatus::Error(format!("Write error: {}", e)),
            )
        }
    }
}

/// Apply environment variable overrides to config
fn apply_env_overrides(config: Config) -> Config {
    apply_overrides(config, env::var("ASKTAG_LOG").ok(), env::var("ASKTAG_FORMAT").ok())
}

fn apply_overrides(mut config: Config, level: Option<String>, format: Option<String>) -> Config {
    if let Some(level) = level {
        debug!("Overriding logging.level from ASKTAG_LOG");
        config.logging.level = level;
    }

    if let Some(format) = format {
        debug!("Overriding output.format from ASKTAG_FORMAT");
        config.output.format = format;
    }

    config
}
