use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::anim::OptimizeMode;
use crate::io::IoError;

/// Settings read from `config.json`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub mode: OptimizeMode,
    /// Inserted before `.gif` in generated output names.
    pub output_suffix: String,
    pub write_manifest: bool,
    pub loop_forever: bool,
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            mode: OptimizeMode::Optimize,
            output_suffix: "optimized".to_string(),
            write_manifest: false,
            loop_forever: true,
            log_filter: "info".to_string(),
        }
    }
}

impl OptimizerConfig {
    /// `<config dir>/animopt/config.json`, e.g. `~/.config/animopt/config.json` on Linux.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("animopt").join("config.json"))
    }

    /// Load `explicit` if given (it must exist), otherwise the default path if present,
    /// otherwise built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, IoError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path().filter(|path| path.is_file()) {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        let content = fs::read_to_string(&path)?;
        Self::parse(&content).map_err(|source| IoError::Config { path, source })
    }

    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = OptimizerConfig::parse(r#"{ "mode": "remove-backdrop" }"#).unwrap();
        assert_eq!(config.mode, OptimizeMode::RemoveBackdrop);
        assert_eq!(config.output_suffix, "optimized");
        assert!(config.loop_forever);
    }

    #[test]
    fn empty_object_is_default() {
        assert_eq!(OptimizerConfig::parse("{}").unwrap(), OptimizerConfig::default());
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(OptimizerConfig::parse(r#"{ "mode": "shrink" }"#).is_err());
    }
}
