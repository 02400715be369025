//! Writer configuration, with environment overrides.

use serde::{Deserialize, Serialize};

/// Prefix applied to every serialized id unless configured otherwise.
pub const DEFAULT_ID_PREFIX: &str = "0_";

pub const ENV_ID_PREFIX: &str = "ITEMXML_ID_PREFIX";
pub const ENV_ALLOW_NONE: &str = "ITEMXML_ALLOW_NONE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Prepended to every `id` and `ref_id` written.
    pub prefix: String,
    /// When false, an absent property value aborts the write.
    pub allow_none: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_ID_PREFIX.to_string(),
            allow_none: true,
        }
    }
}

impl WriterConfig {
    /// Defaults overlaid with `ITEMXML_ID_PREFIX` and `ITEMXML_ALLOW_NONE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(prefix) = lookup(ENV_ID_PREFIX) {
            config.prefix = prefix;
        }
        if let Some(val) = lookup(ENV_ALLOW_NONE) {
            let v = val.trim().to_lowercase();
            config.allow_none = !matches!(v.as_str(), "0" | "false" | "no" | "off");
        }
        config
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_allow_none(mut self, allow_none: bool) -> Self {
        self.allow_none = allow_none;
        self
    }
}
