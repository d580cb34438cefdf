//! Pipeline configuration
//!
//! Every section has defaults, so an empty TOML document is a valid config.
//! Reading the file from disk is up to the host.
//!
//! ```toml
//! [languages]
//! source = "en"
//! target = "es"
//!
//! [context]
//! window = 1
//!
//! [diff]
//! context_lines = 3
//!
//! [snapshots]
//! compress_threshold = 4096
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use tandem_core::diff::DEFAULT_CONTEXT_LINES;
use tandem_snapshots::SnapshotConfig;

pub const MAX_CONTEXT_WINDOW: usize = 16;
pub const MAX_DIFF_CONTEXT_LINES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    pub source: String,
    pub target: String,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            source: "en".to_string(),
            target: "es".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Sibling units included on each side of the unit being translated
    pub window: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { window: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Unchanged lines kept around each hunk of a source diff
    pub context_lines: usize,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TandemConfig {
    pub languages: LanguageConfig,
    pub context: ContextConfig,
    pub diff: DiffConfig,
    pub snapshots: SnapshotConfig,
}

impl TandemConfig {
    /// Parse and validate
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_language("languages.source", &self.languages.source)?;
        validate_language("languages.target", &self.languages.target)?;
        if self.languages.source == self.languages.target {
            return Err(ConfigError::Invalid {
                key: "languages.target",
                reason: "must differ from languages.source".to_string(),
            });
        }

        if self.context.window > MAX_CONTEXT_WINDOW {
            return Err(ConfigError::Invalid {
                key: "context.window",
                reason: format!("must be between 0 and {}", MAX_CONTEXT_WINDOW),
            });
        }
        if self.diff.context_lines > MAX_DIFF_CONTEXT_LINES {
            return Err(ConfigError::Invalid {
                key: "diff.context_lines",
                reason: format!("must be between 0 and {}", MAX_DIFF_CONTEXT_LINES),
            });
        }
        if !(1..=22).contains(&self.snapshots.compression_level) {
            return Err(ConfigError::Invalid {
                key: "snapshots.compression_level",
                reason: "must be between 1 and 22".to_string(),
            });
        }
        Ok(())
    }
}

fn validate_language(key: &'static str, code: &str) -> Result<(), ConfigError> {
    let valid = !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            reason: format!("`{}` is not a language code", code),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = TandemConfig::from_toml_str("").unwrap();
        assert_eq!(config, TandemConfig::default());
        assert_eq!(config.context.window, 1);
        assert_eq!(config.diff.context_lines, 3);
        assert_eq!(config.snapshots.compress_threshold, 4096);
    }

    #[test]
    fn test_partial_sections() {
        let config = TandemConfig::from_toml_str(
            r#"
            [languages]
            target = "pt-BR"

            [context]
            window = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.languages.source, "en");
        assert_eq!(config.languages.target, "pt-BR");
        assert_eq!(config.context.window, 2);
        assert_eq!(config.diff.context_lines, 3);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = TandemConfig::default();
        config.languages.target = "ja".to_string();
        config.diff.context_lines = 5;

        let text = config.to_toml_string().unwrap();
        assert_eq!(TandemConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_validation_names_the_key() {
        let cases = [
            ("[context]\nwindow = 17", "context.window"),
            ("[diff]\ncontext_lines = 100", "diff.context_lines"),
            ("[languages]\nsource = \"\"", "languages.source"),
            ("[languages]\ntarget = \"es es\"", "languages.target"),
            ("[languages]\nsource = \"es\"", "languages.target"),
            ("[snapshots]\ncompression_level = 0", "snapshots.compression_level"),
        ];
        for (text, expected) in cases {
            match TandemConfig::from_toml_str(text) {
                Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, expected, "{text}"),
                other => panic!("expected invalid {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(matches!(
            TandemConfig::from_toml_str("[context\nwindow = 1"),
            Err(ConfigError::Parse(_))
        ));
    }
}
