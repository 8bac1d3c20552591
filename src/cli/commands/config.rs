//! Config Command
//!
//! Manage NovelWeave configuration.
//!
//! Usage:
//!   novelweave config show [-f toml|json|yaml]
//!   novelweave config path
//!   novelweave config init [-g] [--force]

use crate::cli::ui::Output;
use crate::config::{ConfigFormat, ConfigLoader};
use crate::types::{NovelError, Result};

pub fn parse_format(format: &str) -> Result<ConfigFormat> {
    match format.to_lowercase().as_str() {
        "toml" | "text" => Ok(ConfigFormat::Toml),
        "json" => Ok(ConfigFormat::Json),
        "yaml" | "yml" => Ok(ConfigFormat::Yaml),
        other => Err(NovelError::Config(format!(
            "Invalid format '{}'. Valid values: toml, json, yaml",
            other
        ))),
    }
}

/// Show the merged effective configuration
pub fn show(format: &str) -> Result<()> {
    ConfigLoader::show_config(parse_format(format)?)
}

/// Show configuration paths
pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

/// Write a default config file
pub fn init(global: bool, force: bool) -> Result<()> {
    let path = if global {
        ConfigLoader::init_global(force)?
    } else {
        ConfigLoader::init_project(force)?
    };

    let out = Output::new();
    out.success(&format!(
        "Initialized {} configuration",
        if global { "global" } else { "project" }
    ));
    out.field("Config", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("JSON").unwrap(), ConfigFormat::Json);
        assert_eq!(parse_format("yml").unwrap(), ConfigFormat::Yaml);
        assert_eq!(parse_format("text").unwrap(), ConfigFormat::Toml);
        assert!(parse_format("xml").is_err());
    }
}
