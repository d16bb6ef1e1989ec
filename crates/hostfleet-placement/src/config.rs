//! Allocation policy configuration.
//!
//! Parsed from a TOML file such as:
//!
//! ```toml
//! spare_count = 2
//! packing = "tight_fit"
//! ```
//!
//! Every field is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::priority::PackingStrategy;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocationConfig {
    /// Number of hosts kept free as failure headroom.
    pub spare_count: usize,
    /// How free parent capacity ranks otherwise-equal candidates.
    pub packing: PackingStrategy,
}

impl AllocationConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: AllocationConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AllocationConfig::from_toml_str("").unwrap();
        assert_eq!(config.spare_count, 0);
        assert_eq!(config.packing, PackingStrategy::TightFit);
    }

    #[test]
    fn test_parse_full() {
        let toml_str = r#"
spare_count = 2
packing = "spread"
"#;
        let config = AllocationConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.spare_count, 2);
        assert_eq!(config.packing, PackingStrategy::Spread);
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        assert!(AllocationConfig::from_toml_str("packing = \"random\"").is_err());
        assert!(AllocationConfig::from_toml_str("spares = 1").is_err());
    }

    #[test]
    fn test_from_file_roundtrip() {
        let config = AllocationConfig {
            spare_count: 3,
            packing: PackingStrategy::Spread,
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes())
            .unwrap();

        let loaded = AllocationConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }
}
