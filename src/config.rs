use serde::{Deserialize, Serialize};

use crate::accel::InlineHint;

/// Settings for a [`Compiler`](crate::Compiler).
///
/// Every field has a default, so a partial document is enough:
///
/// ```rust
/// use taskfuse::CompilerConfig;
///
/// let config = CompilerConfig::from_json(r#"{ "wrapper_prefix": "fused" }"#).unwrap();
/// assert_eq!(config.wrapper_prefix, "fused");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Prefix of generated wrapper names, followed by the driver's counter.
    pub wrapper_prefix: String,
    /// Hint passed to the accelerator for every task embedded in a wrapper.
    pub inline: InlineHint,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            wrapper_prefix: "subgraph".into(),
            inline: InlineHint::Always,
        }
    }
}

impl CompilerConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::from_json("{}").unwrap();
        assert_eq!(config, CompilerConfig::default());
        assert_eq!(config.wrapper_prefix, "subgraph");
        assert_eq!(config.inline, InlineHint::Always);
    }

    #[test]
    fn test_inline_hint() {
        let config = CompilerConfig::from_json(r#"{ "inline": "auto" }"#).unwrap();
        assert_eq!(config.inline, InlineHint::Auto);
        assert_eq!(config.wrapper_prefix, "subgraph");
    }

    #[test]
    fn test_rejects_unknown_hint() {
        assert!(CompilerConfig::from_json(r#"{ "inline": "sometimes" }"#).is_err());
    }
}
