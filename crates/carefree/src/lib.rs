//! Carefree - a tag-library template compiler for content-managed sites
//!
//! Templates mix plain markup with prefixed tags such as
//! `{carefree:arclist typeid="3" limit="5"}...{/carefree:arclist}`. A
//! template is compiled once into fragments and rendered many times against
//! page data and a set of named data providers.
//!
//! # Example
//!
//! ```rust
//! use carefree::{Carefree, Value};
//! use serde_json::json;
//!
//! let mut engine = Carefree::new();
//! engine.providers_mut().register_records(
//!     "article",
//!     vec![
//!         Value::from(json!({"id": 1, "title": "Hello"})),
//!         Value::from(json!({"id": 2, "title": "World"})),
//!     ],
//! );
//!
//! let template = engine
//!     .compile("{carefree:arclist limit=\"1\"}<li>{$article.title}</li>{/carefree:arclist}")
//!     .unwrap();
//! assert_eq!(engine.render(&template, json!({})).unwrap(), "<li>Hello</li>");
//! ```

pub mod cache;
pub mod compiler;
pub mod config;
pub mod context;
pub mod error;
pub mod fragment;
pub mod html_escape;
pub mod loop_context;
pub mod pagination;
pub mod provider;
pub mod registry;
pub mod renderer;
pub mod resolver;
pub mod value;

pub use cache::{CacheStore, MemoryCache};
pub use compiler::{TagCompiler, TagOccurrence};
pub use config::EngineConfig;
pub use error::{CarefreeError, Location, ParseError, ProviderError, Result};
pub use fragment::Fragment;
pub use provider::{
    Filter, ListProvider, MemoryProvider, MemoryValues, Providers, SingleProvider, ValueProvider,
};
pub use registry::{TagDescriptor, TagRegistry};
pub use renderer::Renderer;
pub use value::Value;

use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Engine holding everything a render needs besides the page data.
pub struct Carefree {
    config: EngineConfig,
    registry: TagRegistry,
    providers: Providers,
    cache: Arc<dyn CacheStore>,
}

impl Default for Carefree {
    fn default() -> Self {
        Self::new()
    }
}

impl Carefree {
    /// Engine with the default configuration, the built-in tags, no providers
    /// and an in-memory render cache.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            registry: TagRegistry::builtin(),
            providers: Providers::new(),
            cache: Arc::new(MemoryCache::new()),
        }
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Engine configured from a TOML file.
    ///
    /// ```rust,ignore
    /// let engine = carefree::Carefree::from_config_file("carefree.toml")?;
    /// ```
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(EngineConfig::from_path(path)?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    /// Register project tags or replace built-in ones.
    pub fn registry_mut(&mut self) -> &mut TagRegistry {
        &mut self.registry
    }

    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    pub fn providers_mut(&mut self) -> &mut Providers {
        &mut self.providers
    }

    pub fn set_providers(&mut self, providers: Providers) {
        self.providers = providers;
    }

    /// Replace the render cache used by `{carefree:cache}` regions.
    pub fn set_cache(&mut self, cache: Arc<dyn CacheStore>) {
        self.cache = cache;
    }

    /// Parse and compile a template. Syntax and grammar errors are reported
    /// here; no provider is called.
    pub fn compile(&self, source: &str) -> Result<CompiledTemplate> {
        let template = carefree_ast::parse_with_prefix(source, &self.config.tag_prefix)?;
        let fragments = compiler::compile(&template, &self.registry, &self.config)?;
        debug!(fragments = fragments.len(), "compiled template");
        Ok(CompiledTemplate { fragments })
    }

    /// Render a compiled template against page data (an object, or null).
    pub fn render(&self, template: &CompiledTemplate, data: serde_json::Value) -> Result<String> {
        self.render_value(template, Value::from(data))
    }

    pub fn render_value(&self, template: &CompiledTemplate, data: Value) -> Result<String> {
        Renderer::new(&self.providers, &self.config)
            .with_cache(self.cache.as_ref())
            .render(&template.fragments, data)
    }

    /// Compile and render in one call.
    pub fn render_str(&self, source: &str, data: serde_json::Value) -> Result<String> {
        let template = self.compile(source)?;
        self.render(&template, data)
    }
}

/// A template lowered to fragments, reusable across renders.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    fragments: Vec<Fragment>,
}

impl CompiledTemplate {
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }
}

/// Convenience function: compile and render with a default engine.
///
/// Only tags that need no provider can render this way.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
///
/// let result = carefree::render(
///     "Hello, {$name}!",
///     json!({"name": "World"}),
/// ).unwrap();
///
/// assert_eq!(result, "Hello, World!");
/// ```
pub fn render(source: &str, data: serde_json::Value) -> Result<String> {
    Carefree::new().render_str(source, data)
}
