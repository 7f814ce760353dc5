//! Attribute grammar registry: which tags exist, which attributes each
//! accepts, and whether it wraps a body.

use crate::compiler::{self, TagCompiler};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDescriptor {
    pub name: String,
    pub attributes: BTreeSet<String>,
    /// Paired tags wrap a body; void tags are self-closing.
    pub paired: bool,
}

impl TagDescriptor {
    pub fn new(name: impl Into<String>, attributes: &[&str], paired: bool) -> Self {
        Self {
            name: name.into(),
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
            paired,
        }
    }

    pub fn accepts(&self, attribute: &str) -> bool {
        self.attributes.contains(attribute)
    }
}

/// A descriptor and the compiler that lowers its occurrences.
#[derive(Clone)]
pub struct RegisteredTag {
    pub descriptor: TagDescriptor,
    pub compiler: Arc<dyn TagCompiler>,
}

impl fmt::Debug for RegisteredTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTag")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    tags: HashMap<String, RegisteredTag>,
}

impl TagRegistry {
    /// A registry with no tags.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry holding every built-in tag.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        compiler::list::register(&mut registry);
        compiler::single::register(&mut registry);
        compiler::scalar::register(&mut registry);
        compiler::control::register(&mut registry);
        registry
    }

    /// Register a tag, replacing any tag of the same name.
    pub fn register(&mut self, descriptor: TagDescriptor, compiler: impl TagCompiler + 'static) {
        self.tags.insert(
            descriptor.name.clone(),
            RegisteredTag {
                descriptor,
                compiler: Arc::new(compiler),
            },
        );
    }

    pub fn lookup(&self, name: &str) -> Option<&TagDescriptor> {
        self.tags.get(name).map(|tag| &tag.descriptor)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&RegisteredTag> {
        self.tags.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalogue() {
        let registry = TagRegistry::builtin();
        for name in [
            "arclist", "category", "sql", "position", "arcinfo", "prev", "config", "seo", "if",
            "cache", "group", "foreach", "loop", "assign", "date", "pagination", "pagelist",
        ] {
            assert!(registry.contains(name), "missing builtin tag '{name}'");
        }
        assert!(registry.len() >= 48);
    }

    #[test]
    fn test_lookup_shapes() {
        let registry = TagRegistry::builtin();
        let arclist = registry.lookup("arclist").unwrap();
        assert!(arclist.paired);
        assert!(arclist.accepts("typeid"));
        assert!(arclist.accepts("limit"));
        assert!(!arclist.accepts("bogus"));

        let config = registry.lookup("config").unwrap();
        assert!(!config.paired);
        assert!(registry.lookup("nope").is_none());
    }
}
