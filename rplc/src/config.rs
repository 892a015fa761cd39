//! Checker Configuration
//!
//! Selects the default scheme used when annotations are missing, the call
//! shapes recognized as fork-join, and optional checks. Loaded from TOML:
//!
//! ```toml
//! default_scheme = "param"
//! check_assignments = true
//!
//! [[fork_join]]
//! callee = "tbb::parallel_invoke"
//! shape = "invoke"
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or interpreting a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown default scheme `{0}` (expected one of: {schemes})", schemes = DefaultScheme::names().join(", "))]
    UnknownScheme(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// How missing region arguments and effect summaries are filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultScheme {
    /// Everything defaults to `Global`.
    Global,
    /// Region slots default to the first region parameter in scope;
    /// summaries write every parameter in scope and `Global`.
    Param,
    /// Like `Global`, but automatic variables point into `Local`.
    Simple,
    /// Region slots as `Global`; summaries are inferred.
    EffectInference,
    /// Region slots are inferred; summaries as `Global`.
    RegionInference,
    /// Both region slots and summaries are inferred.
    Inference,
}

impl DefaultScheme {
    pub const ALL: [DefaultScheme; 6] = [
        Self::Global,
        Self::Param,
        Self::Simple,
        Self::EffectInference,
        Self::RegionInference,
        Self::Inference,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Param => "param",
            Self::Simple => "simple",
            Self::EffectInference => "effect-inference",
            Self::RegionInference => "region-inference",
            Self::Inference => "inference",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|s| s.as_str()).collect()
    }

    /// Whether unannotated summaries are inferred.
    pub fn infers_effects(self) -> bool {
        matches!(self, Self::EffectInference | Self::Inference)
    }

    /// Whether unannotated region slots get inference variables.
    pub fn infers_regions(self) -> bool {
        matches!(self, Self::RegionInference | Self::Inference)
    }
}

impl FromStr for DefaultScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scheme| scheme.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownScheme(s.to_string()))
    }
}

impl fmt::Display for DefaultScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a fork-join call passes its concurrent operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForkJoinShape {
    /// Every argument runs concurrently with every other.
    Invoke,
    /// The last argument runs concurrently with itself.
    ParallelFor,
}

/// A callee recognized as a fork-join primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkJoinPattern {
    /// Qualified callee name, as written at call sites.
    pub callee: String,
    pub shape: ForkJoinShape,
}

/// Configuration for one checker run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Name of the default scheme. Validated when a run starts.
    pub default_scheme: String,

    /// Check region compatibility of assignments and argument passing.
    pub check_assignments: bool,

    /// Recognized fork-join calls.
    pub fork_join: Vec<ForkJoinPattern>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            default_scheme: DefaultScheme::Global.as_str().to_string(),
            check_assignments: true,
            fork_join: vec![
                ForkJoinPattern {
                    callee: "tbb::parallel_invoke".to_string(),
                    shape: ForkJoinShape::Invoke,
                },
                ForkJoinPattern {
                    callee: "tbb::parallel_for".to_string(),
                    shape: ForkJoinShape::ParallelFor,
                },
            ],
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default configuration with another scheme.
    pub fn with_scheme(scheme: DefaultScheme) -> Self {
        Self {
            default_scheme: scheme.as_str().to_string(),
            ..Self::default()
        }
    }

    /// Parse the configured scheme name.
    pub fn scheme(&self) -> Result<DefaultScheme, ConfigError> {
        self.default_scheme.parse()
    }

    /// The fork-join shape of `callee`, if it is a recognized primitive.
    pub fn fork_join_shape(&self, callee: &str) -> Option<ForkJoinShape> {
        self.fork_join.iter().find(|p| p.callee == callee).map(|p| p.shape)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CheckerConfig::default();
        assert_eq!(config.scheme().unwrap(), DefaultScheme::Global);
        assert!(config.check_assignments);
        assert_eq!(config.fork_join_shape("tbb::parallel_invoke"), Some(ForkJoinShape::Invoke));
        assert_eq!(config.fork_join_shape("std::thread"), None);
    }

    #[test]
    fn test_scheme_names_round_trip() {
        for scheme in DefaultScheme::ALL {
            assert_eq!(scheme.as_str().parse::<DefaultScheme>().unwrap(), scheme);
        }
        assert!(matches!(
            "regional".parse::<DefaultScheme>(),
            Err(ConfigError::UnknownScheme(name)) if name == "regional"
        ));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = CheckerConfig::from_toml_str("default_scheme = \"inference\"\n").unwrap();
        assert_eq!(config.scheme().unwrap(), DefaultScheme::Inference);
        assert_eq!(config.fork_join.len(), 2);
    }

    #[test]
    fn test_custom_fork_join() {
        let text = r#"
check_assignments = false

[[fork_join]]
callee = "spawn_both"
shape = "invoke"
"#;
        let config = CheckerConfig::from_toml_str(text).unwrap();
        assert!(!config.check_assignments);
        assert_eq!(config.fork_join_shape("spawn_both"), Some(ForkJoinShape::Invoke));
        assert_eq!(config.fork_join_shape("tbb::parallel_invoke"), None);
    }

    #[test]
    fn test_toml_output_parses_back() {
        let config = CheckerConfig::with_scheme(DefaultScheme::Param);
        let text = config.to_toml_string().unwrap();
        assert_eq!(CheckerConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_scheme_capabilities() {
        assert!(DefaultScheme::Inference.infers_effects());
        assert!(DefaultScheme::Inference.infers_regions());
        assert!(DefaultScheme::EffectInference.infers_effects());
        assert!(!DefaultScheme::EffectInference.infers_regions());
        assert!(!DefaultScheme::RegionInference.infers_effects());
        assert!(!DefaultScheme::Param.infers_effects());
    }
}
