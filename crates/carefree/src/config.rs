//! Engine configuration.
//!
//! Loaded from TOML; every key is optional:
//!
//! ```toml
//! tag_prefix = "carefree"
//! escape_html = true
//! default_list_limit = 10
//! default_page_size = 10
//! max_page_links = 10
//! cache_enabled = true
//! page_url = "?page=[PAGE]"
//! known_globals = ["site", "request"]
//! ```

use crate::error::{CarefreeError, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Tags are written `{prefix:name}`.
    pub tag_prefix: String,
    pub escape_html: bool,
    /// `limit` for list tags that do not set one.
    pub default_list_limit: usize,
    pub default_page_size: usize,
    /// Upper bound on the page links one pagination tag generates.
    pub max_page_links: usize,
    pub cache_enabled: bool,
    /// Page URL pattern; `[PAGE]` is replaced by the page number.
    pub page_url: String,
    /// Names that attribute values may reference without a `$`.
    pub known_globals: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tag_prefix: carefree_ast::DEFAULT_PREFIX.to_string(),
            escape_html: true,
            default_list_limit: 10,
            default_page_size: 10,
            max_page_links: 10,
            cache_enabled: true,
            page_url: "?page=[PAGE]".to_string(),
            known_globals: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_page_links == 0 {
            return Err(CarefreeError::Config(
                "max_page_links must be at least 1".to_string(),
            ));
        }
        if !carefree_ast::is_identifier(&self.tag_prefix) {
            return Err(CarefreeError::Config(format!(
                "tag_prefix '{}' is not an identifier",
                self.tag_prefix
            )));
        }
        if let Some(bad) = self
            .known_globals
            .iter()
            .find(|name| !carefree_ast::is_identifier(name))
        {
            return Err(CarefreeError::Config(format!(
                "known global '{bad}' is not an identifier"
            )));
        }
        Ok(())
    }

    pub fn is_global(&self, name: &str) -> bool {
        self.known_globals.iter().any(|g| g == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.default_list_limit, 10);
        assert!(config.escape_html);
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_toml_str(
            r#"
            tag_prefix = "cf"
            default_list_limit = 5
            known_globals = ["site"]
            "#,
        )
        .unwrap();
        assert_eq!(config.tag_prefix, "cf");
        assert_eq!(config.default_list_limit, 5);
        assert!(config.is_global("site"));
        assert_eq!(config.default_page_size, 10);
    }

    #[test]
    fn test_invalid_prefix() {
        assert!(matches!(
            EngineConfig::from_toml_str("tag_prefix = \"has space\""),
            Err(CarefreeError::Config(_))
        ));
    }

    #[test]
    fn test_zero_page_links_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("max_page_links = 0"),
            Err(CarefreeError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("tag_prefx = \"cf\""),
            Err(CarefreeError::Config(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cache_enabled = false").unwrap();
        let config = EngineConfig::from_path(file.path()).unwrap();
        assert!(!config.cache_enabled);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            EngineConfig::from_path("/nonexistent/carefree.toml"),
            Err(CarefreeError::Io(_))
        ));
    }
}
