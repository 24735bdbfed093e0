//! Configuration system: TOML file + env var overrides + defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SpyError};

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "spyglass.toml";

/// Full run configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct RunConfig {
    pub runner: RunnerConfig,
    pub log: LogConfig,
}

/// Test-execution knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct RunnerConfig {
    /// Keep running a test body after its first failed assertion.
    pub continue_on_failure: bool,
    /// Stop the suite after the first failed test.
    pub fail_fast: bool,
    /// Only run tests whose label matches this regex.
    pub only: Option<String>,
}

/// Run-log destination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// JSONL file receiving lifecycle events. `None` disables file logging.
    pub path: Option<PathBuf>,
    /// Fall back to stderr when the file can not be written.
    pub stderr_fallback: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: None,
            stderr_fallback: true,
        }
    }
}

impl RunConfig {
    /// Default configuration path (relative to the working directory).
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| SpyError::io(&path_buf, source))?;
            Self::from_toml_str(&raw)?
        } else if path.is_some() {
            return Err(SpyError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides_from(|name| env::var(name).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without consulting the environment.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let parsed: Self = toml::from_str(raw)?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Deterministic fingerprint of the effective config for the run log.
    ///
    /// FNV-1a over canonical JSON so the value is stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Compiled `runner.only` filter, if any.
    pub fn only_matcher(&self) -> Result<Option<Regex>> {
        self.runner
            .only
            .as_deref()
            .map(|raw| {
                Regex::new(raw).map_err(|error| SpyError::InvalidConfig {
                    details: format!("runner.only is not a valid pattern: {error}"),
                })
            })
            .transpose()
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut var = |name: &str| lookup(name).filter(|raw| !raw.trim().is_empty());

        if let Some(raw) = var("SPYGLASS_CONTINUE_ON_FAILURE") {
            self.runner.continue_on_failure = parse_env_bool("SPYGLASS_CONTINUE_ON_FAILURE", &raw)?;
        }
        if let Some(raw) = var("SPYGLASS_FAIL_FAST") {
            self.runner.fail_fast = parse_env_bool("SPYGLASS_FAIL_FAST", &raw)?;
        }
        if let Some(raw) = var("SPYGLASS_ONLY") {
            self.runner.only = Some(raw);
        }
        if let Some(raw) = var("SPYGLASS_LOG_PATH") {
            self.log.path = Some(PathBuf::from(raw));
        }
        if let Some(raw) = var("SPYGLASS_LOG_STDERR") {
            self.log.stderr_fallback = parse_env_bool("SPYGLASS_LOG_STDERR", &raw)?;
        }
        Ok(())
    }

    /// Reject settings the engine can not use.
    pub fn validate(&self) -> Result<()> {
        if let Some(only) = &self.runner.only
            && only.trim().is_empty()
        {
            return Err(SpyError::InvalidConfig {
                details: "runner.only must not be blank".to_string(),
            });
        }
        self.only_matcher()?;

        if let Some(path) = &self.log.path
            && path.as_os_str().is_empty()
        {
            return Err(SpyError::InvalidConfig {
                details: "log.path must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SpyError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: expected a boolean"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{RunConfig, SpyError};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = RunConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(!cfg.runner.continue_on_failure);
        assert!(cfg.log.path.is_none());
    }

    #[test]
    fn toml_sections_are_parsed() {
        let cfg = RunConfig::from_toml_str(
            r#"
            [runner]
            continue_on_failure = true
            only = "^cart"

            [log]
            path = "/tmp/spyglass.jsonl"
            "#,
        )
        .unwrap();
        assert!(cfg.runner.continue_on_failure);
        assert_eq!(cfg.runner.only.as_deref(), Some("^cart"));
        assert_eq!(cfg.log.path, Some(PathBuf::from("/tmp/spyglass.jsonl")));
        assert!(cfg.log.stderr_fallback);
    }

    #[test]
    fn invalid_only_pattern_rejected() {
        let err = RunConfig::from_toml_str("[runner]\nonly = \"(unclosed\"").unwrap_err();
        assert!(matches!(err, SpyError::InvalidConfig { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let env = vars(&[
            ("SPYGLASS_CONTINUE_ON_FAILURE", "yes"),
            ("SPYGLASS_FAIL_FAST", "1"),
            ("SPYGLASS_LOG_PATH", "/tmp/run.jsonl"),
            ("SPYGLASS_ONLY", "stub"),
        ]);
        let mut cfg = RunConfig::default();
        cfg.apply_env_overrides_from(|name| env.get(name).cloned())
            .unwrap();
        assert!(cfg.runner.continue_on_failure);
        assert!(cfg.runner.fail_fast);
        assert_eq!(cfg.runner.only.as_deref(), Some("stub"));
        assert_eq!(cfg.log.path, Some(PathBuf::from("/tmp/run.jsonl")));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let env = vars(&[("SPYGLASS_ONLY", "   ")]);
        let mut cfg = RunConfig::default();
        cfg.apply_env_overrides_from(|name| env.get(name).cloned())
            .unwrap();
        assert!(cfg.runner.only.is_none());
    }

    #[test]
    fn env_invalid_boolean_rejected() {
        let env = vars(&[("SPYGLASS_FAIL_FAST", "maybe")]);
        let mut cfg = RunConfig::default();
        let err = cfg
            .apply_env_overrides_from(|name| env.get(name).cloned())
            .unwrap_err();
        assert!(matches!(err, SpyError::ConfigParse { context: "env", .. }));
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let err = RunConfig::load(Some(Path::new("/nonexistent/spyglass.toml"))).unwrap_err();
        assert!(matches!(err, SpyError::MissingConfig { .. }));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spyglass.toml");
        std::fs::write(&path, "[runner]\nfail_fast = true\n").unwrap();
        let cfg = RunConfig::load(Some(&path)).unwrap();
        assert!(cfg.runner.fail_fast);
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let a = RunConfig::default();
        let mut b = RunConfig::default();
        b.runner.continue_on_failure = true;
        assert_ne!(a.stable_hash().unwrap(), b.stable_hash().unwrap());
        assert_eq!(a.stable_hash().unwrap(), RunConfig::default().stable_hash().unwrap());
    }
}
