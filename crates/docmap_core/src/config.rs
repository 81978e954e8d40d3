//! Persister configuration.

use serde::{Deserialize, Serialize};

/// Discriminator field written when a polymorphic mapping names none.
pub const DEFAULT_DISCRIMINATOR_FIELD: &str = "_class";

/// Configuration shared by the persisters of one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersisterConfig {
    /// Field used for the discriminator of polymorphic references and
    /// embedded documents whose mapping does not name one.
    pub default_discriminator_field: String,

    /// Maximum nesting of embedded documents before serialization fails.
    pub max_embed_depth: usize,
}

impl Default for PersisterConfig {
    fn default() -> Self {
        Self {
            default_discriminator_field: DEFAULT_DISCRIMINATOR_FIELD.to_string(),
            max_embed_depth: 64,
        }
    }
}

impl PersisterConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fallback discriminator field name.
    #[must_use]
    pub fn default_discriminator_field(mut self, field: impl Into<String>) -> Self {
        self.default_discriminator_field = field.into();
        self
    }

    /// Sets the maximum embedded document depth.
    #[must_use]
    pub const fn max_embed_depth(mut self, depth: usize) -> Self {
        self.max_embed_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PersisterConfig::default();
        assert_eq!(config.default_discriminator_field, "_class");
        assert_eq!(config.max_embed_depth, 64);
    }

    #[test]
    fn builder_pattern() {
        let config = PersisterConfig::new()
            .default_discriminator_field("type")
            .max_embed_depth(4);

        assert_eq!(config.default_discriminator_field, "type");
        assert_eq!(config.max_embed_depth, 4);
    }

    #[test]
    fn missing_keys_use_defaults() {
        let config: PersisterConfig = serde_json::from_str(r#"{"max_embed_depth": 8}"#).unwrap();
        assert_eq!(config.max_embed_depth, 8);
        assert_eq!(config.default_discriminator_field, "_class");
    }
}
