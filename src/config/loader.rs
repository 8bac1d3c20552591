//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/novelweave/config.toml)
//! 3. Project config (.novelweave/config.toml)
//! 4. Environment variables (NOVELWEAVE_* prefix, `__` between nested keys)

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{NovelError, Result};

const ENV_PREFIX: &str = "NOVELWEAVE_";
const PROJECT_DIR: &str = ".novelweave";
const CONFIG_FILE: &str = "config.toml";

/// Output format for `config show`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    #[default]
    Toml,
    Json,
    Yaml,
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        Self::load_with(Self::global_config_path(), &Self::project_config_path())
    }

    /// Same chain with explicit file locations
    pub fn load_with(global: Option<PathBuf>, project: &Path) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = global
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        if project.exists() {
            debug!("Loading project config from: {}", project.display());
            figment = figment.merge(Toml::file(project));
        }

        // NOVELWEAVE_NOVEL__VOLUME_COUNT -> novel.volume_count
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| NovelError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| NovelError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Global config directory (~/.config/novelweave/ on Linux)
    pub fn global_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "novelweave").map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join(CONFIG_FILE))
    }

    pub fn project_dir() -> PathBuf {
        PathBuf::from(PROJECT_DIR)
    }

    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join(CONFIG_FILE)
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Render configuration in the requested format
    pub fn render(config: &Config, format: ConfigFormat) -> Result<String> {
        Ok(match format {
            ConfigFormat::Json => serde_json::to_string_pretty(config)?,
            ConfigFormat::Yaml => serde_yaml::to_string(config)?,
            ConfigFormat::Toml => {
                toml::to_string_pretty(config).map_err(|e| NovelError::Config(e.to_string()))?
            }
        })
    }

    /// Show current effective configuration
    pub fn show_config(format: ConfigFormat) -> Result<()> {
        let config = Self::load()?;
        println!("{}", Self::render(&config, format)?);
        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            NovelError::Config("Cannot determine global config directory".to_string())
        })?;
        Self::write_default(&global_dir, force)
    }

    /// Initialize project configuration in the current directory
    pub fn init_project(force: bool) -> Result<PathBuf> {
        Self::write_default(&Self::project_dir(), force)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn write_default(dir: &Path, force: bool) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;

        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_config_toml())?;
            info!("Created config: {}", config_path.display());
        } else {
            info!("Config exists: {}", config_path.display());
        }

        Ok(config_path)
    }

    /// Default config content (TOML)
    fn default_config_toml() -> &'static str {
        r#"# NovelWeave Configuration
# Project settings in .novelweave/config.toml override ~/.config/novelweave/config.toml.
# Any key can also be set as NOVELWEAVE_<SECTION>__<KEY>, e.g. NOVELWEAVE_NOVEL__VOLUME_COUNT=2

version = "1.0"

[llm]
provider = "openai"
# model = "gpt-4o-mini"
# base_url = "https://api.openai.com/v1"
max_tokens = 1000
temperature = 0.7
timeout_secs = 300
max_retries = 3
input_cost_per_1k = 0.0
output_cost_per_1k = 0.0
# fallback_provider = "ollama"
# fallback_model = "qwen2.5"

[novel]
volume_count = 1
chapter_count_per_volume = 3
section_word_count = 1000
sliding_window_size = 3
need_optimize = false
summarize_volumes = false
workspace = "workspace"
"#
    }
}
