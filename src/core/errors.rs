//! SPY-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, SpyError>;

/// Top-level error type for spyglass.
///
/// Errors raised *by intercepted members* are not represented here; those are
/// [`Signal`](crate::object::value::Signal)s captured into the journal and
/// re-raised unchanged.
#[derive(Debug, Error)]
pub enum SpyError {
    #[error("[SPY-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[SPY-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[SPY-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[SPY-2001] usage error in `{operation}`: {details}")]
    Usage {
        operation: &'static str,
        details: String,
    },

    #[error(
        "[SPY-2002] {target} does not respond to {method}; can not intercept an absent member"
    )]
    CapabilityAbsent { target: String, method: String },

    #[error("[SPY-2003] unknown object #{id} (released or never spawned)")]
    UnknownObject { id: u64 },

    #[error("[SPY-2004] test body panicked: {details}")]
    Panicked { details: String },

    #[error("[SPY-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[SPY-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SpyError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "SPY-1001",
            Self::MissingConfig { .. } => "SPY-1002",
            Self::ConfigParse { .. } => "SPY-1003",
            Self::Usage { .. } => "SPY-2001",
            Self::CapabilityAbsent { .. } => "SPY-2002",
            Self::UnknownObject { .. } => "SPY-2003",
            Self::Panicked { .. } => "SPY-2004",
            Self::Serialization { .. } => "SPY-2101",
            Self::Io { .. } => "SPY-3001",
        }
    }

    /// Whether this error comes from misuse of the declaration API.
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(self, Self::Usage { .. })
    }

    /// Whether this error aborts the current test body (but never the suite).
    #[must_use]
    pub const fn aborts_test(&self) -> bool {
        matches!(
            self,
            Self::Usage { .. }
                | Self::CapabilityAbsent { .. }
                | Self::UnknownObject { .. }
                | Self::Panicked { .. }
        )
    }

    /// Convenience constructor for declaration-time misuse.
    #[must_use]
    pub fn usage(operation: &'static str, details: impl Into<String>) -> Self {
        Self::Usage {
            operation,
            details: details.into(),
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for SpyError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for SpyError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<SpyError> {
        vec![
            SpyError::InvalidConfig {
                details: String::new(),
            },
            SpyError::MissingConfig {
                path: PathBuf::new(),
            },
            SpyError::ConfigParse {
                context: "",
                details: String::new(),
            },
            SpyError::usage("with", ""),
            SpyError::CapabilityAbsent {
                target: String::new(),
                method: String::new(),
            },
            SpyError::UnknownObject { id: 0 },
            SpyError::Panicked {
                details: String::new(),
            },
            SpyError::Serialization {
                context: "",
                details: String::new(),
            },
            SpyError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = all_variants();
        let codes: Vec<&str> = errors.iter().map(SpyError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_display_includes_code() {
        for err in all_variants() {
            let msg = err.to_string();
            assert!(
                msg.contains(err.code()),
                "display should contain error code: {msg}"
            );
        }
    }

    #[test]
    fn capability_absent_names_target_and_method() {
        let err = SpyError::CapabilityAbsent {
            target: "#<Account:3>".to_string(),
            method: ":deposit".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("#<Account:3>"));
        assert!(msg.contains(":deposit"));
        assert!(err.aborts_test());
        assert!(!err.is_usage());
    }

    #[test]
    fn usage_errors_abort_the_test() {
        let err = SpyError::usage("ordered", "works only with multiple messages");
        assert!(err.is_usage());
        assert!(err.aborts_test());
        assert!(err.to_string().contains("`ordered`"));
    }

    #[test]
    fn io_convenience_constructor() {
        let err = SpyError::io(
            "/tmp/spyglass.toml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "SPY-3001");
        assert!(err.to_string().contains("/tmp/spyglass.toml"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: SpyError = json_err.into();
        assert_eq!(err.code(), "SPY-2101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: SpyError = toml_err.into();
        assert_eq!(err.code(), "SPY-1003");
    }
}
