//! Lowering from syntax tree to fragments.
//!
//! Substrate constructs (`{$x}`, `{if}`, `{foreach}`) lower directly. Each tag
//! occurrence is checked against its registry descriptor, its attributes are
//! resolved, its body is compiled with the tag's bindings in scope, and then
//! the tag's own [`TagCompiler`] builds the fragment.
//!
//! Built-in compilers follow four patterns, one module each: [`list`],
//! [`single`], [`scalar`] and [`control`].

pub mod control;
pub mod list;
pub mod scalar;
pub mod single;

use crate::config::EngineConfig;
use crate::error::{CarefreeError, Location, Result};
use crate::fragment::{Condition, Fragment, LoopFragment};
use crate::registry::TagRegistry;
use crate::resolver::{self, AttributeValue, Literal};
use carefree_ast::{AstNode, ForeachBlock, IfBlock, TagNode, Template};
use indexmap::IndexMap;
use tracing::{debug, warn};

/// Lowers one tag occurrence into a fragment.
pub trait TagCompiler: Send + Sync {
    /// Names bound while the body renders (or, for void tags, for the rest
    /// of the enclosing body). Bare attribute values rooted at these names
    /// resolve as references.
    fn bindings(&self, _occurrence: &TagOccurrence<'_>) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// `body` is empty for void tags.
    fn compile(&self, occurrence: &TagOccurrence<'_>, body: Vec<Fragment>) -> Result<Fragment>;
}

/// A tag as written in the template, with attributes resolved.
#[derive(Debug, Clone)]
pub struct TagOccurrence<'a> {
    name: &'a str,
    location: Location,
    attributes: IndexMap<String, (String, AttributeValue)>,
}

impl<'a> TagOccurrence<'a> {
    pub fn new(name: &'a str, location: Location) -> Self {
        Self {
            name,
            location,
            attributes: IndexMap::new(),
        }
    }

    /// Add an attribute: the text as written and its resolved value.
    pub fn with_attribute(mut self, name: &str, raw: &str, value: AttributeValue) -> Self {
        self.attributes
            .insert(name.to_string(), (raw.to_string(), value));
        self
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn get(&self, attribute: &str) -> Option<&AttributeValue> {
        self.attributes.get(attribute).map(|(_, value)| value)
    }

    /// The attribute text as written, before resolution.
    pub fn raw(&self, attribute: &str) -> Option<&str> {
        self.attributes.get(attribute).map(|(raw, _)| raw.as_str())
    }

    pub fn has(&self, attribute: &str) -> bool {
        self.attributes.contains_key(attribute)
    }

    pub fn require(&self, attribute: &str) -> Result<AttributeValue> {
        self.get(attribute)
            .cloned()
            .ok_or_else(|| self.error(format!("missing required attribute '{attribute}'")))
    }

    /// First of `attributes` present, in the order given.
    pub fn first_of<'n>(&self, attributes: &[&'n str]) -> Option<(&'n str, &AttributeValue)> {
        attributes
            .iter()
            .find_map(|name| self.get(name).map(|value| (*name, value)))
    }

    /// A binding name from a literal attribute, or `default` when absent.
    pub fn binding(&self, attribute: &str, default: &str) -> Result<String> {
        match self.raw(attribute) {
            None => Ok(default.to_string()),
            Some(name) if carefree_ast::is_binding_name(name) => Ok(name.to_string()),
            Some(name) => Err(self.error(format!(
                "'{attribute}' must be a plain name not starting with '_', got '{name}'"
            ))),
        }
    }

    /// A literal `true`/`false` attribute.
    pub fn flag(&self, attribute: &str) -> Result<Option<bool>> {
        match self.get(attribute) {
            None => Ok(None),
            Some(AttributeValue::Literal(Literal::Bool(b))) => Ok(Some(*b)),
            Some(_) => Err(self.error(format!("'{attribute}' must be true or false"))),
        }
    }

    /// Grammar error pointing at this occurrence.
    pub fn error(&self, message: impl Into<String>) -> CarefreeError {
        CarefreeError::grammar(self.name, message, self.location)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes
            .iter()
            .map(|(name, (_, value))| (name.as_str(), value))
    }
}

/// Compile a parsed template into fragments.
pub fn compile(
    template: &Template,
    registry: &TagRegistry,
    config: &EngineConfig,
) -> Result<Vec<Fragment>> {
    let mut compiler = Compiler {
        registry,
        config,
        frames: vec![Vec::new()],
    };
    compiler.compile_nodes(template.nodes())
}

struct Compiler<'a> {
    registry: &'a TagRegistry,
    config: &'a EngineConfig,
    /// Binding names visible at the current point, one frame per open body.
    frames: Vec<Vec<String>>,
}

impl<'a> Compiler<'a> {
    fn compile_nodes(&mut self, nodes: &[AstNode]) -> Result<Vec<Fragment>> {
        nodes.iter().map(|node| self.compile_node(node)).collect()
    }

    fn compile_node(&mut self, node: &AstNode) -> Result<Fragment> {
        match node {
            AstNode::Text(n) => Ok(Fragment::Literal(n.content.clone())),
            AstNode::Output(n) => Ok(Fragment::VariableRef {
                value: AttributeValue::Reference(n.path.segments().to_vec()),
                escape: !n.raw,
            }),
            AstNode::If(n) => self.compile_if(n),
            AstNode::Foreach(n) => self.compile_foreach(n),
            AstNode::Tag(n) => self.compile_tag(n),
        }
    }

    fn compile_if(&mut self, node: &IfBlock) -> Result<Fragment> {
        let mut test = Condition::Truthy(AttributeValue::Reference(
            node.condition.segments().to_vec(),
        ));
        if node.negated {
            test = Condition::Not(Box::new(test));
        }
        let then = self.compile_nodes(&node.then_branch)?;
        let otherwise = match &node.else_branch {
            Some(branch) => self.compile_nodes(branch)?,
            None => Vec::new(),
        };
        Ok(Fragment::Conditional {
            test,
            then,
            otherwise,
        })
    }

    fn compile_foreach(&mut self, node: &ForeachBlock) -> Result<Fragment> {
        let body = self.with_frame(vec![node.item_ident.clone()], |c| {
            c.compile_nodes(&node.body)
        })?;
        Ok(Fragment::Loop(Box::new(LoopFragment {
            source: AttributeValue::Reference(node.collection.segments().to_vec()),
            bind: node.item_ident.clone(),
            key_bind: None,
            offset: None,
            limit: None,
            modulo: None,
            body,
            empty: None,
        })))
    }

    fn compile_tag(&mut self, node: &TagNode) -> Result<Fragment> {
        let registry = self.registry;
        let registered = registry.get(&node.name).ok_or_else(|| {
            CarefreeError::grammar(&node.name, "unknown tag", node.location)
        })?;
        let descriptor = &registered.descriptor;

        match (&node.body, descriptor.paired) {
            (Some(_), false) => {
                return Err(CarefreeError::grammar(
                    &node.name,
                    "void tag cannot wrap a body; write it self-closing",
                    node.location,
                ))
            }
            (None, true) => {
                return Err(CarefreeError::grammar(
                    &node.name,
                    "paired tag cannot be self-closing",
                    node.location,
                ))
            }
            _ => {}
        }

        let mut occurrence = TagOccurrence::new(&node.name, node.location);
        for attribute in &node.attributes {
            if !descriptor.accepts(&attribute.name) {
                warn!(
                    tag = %node.name,
                    attribute = %attribute.name,
                    line = attribute.location.line,
                    "ignoring unknown attribute"
                );
                continue;
            }
            let value = resolver::resolve_with(&attribute.value, |root| self.is_known(root))
                .map_err(|err| {
                    CarefreeError::grammar(&node.name, err.to_string(), attribute.location)
                })?;
            occurrence = occurrence.with_attribute(&attribute.name, &attribute.value, value);
        }

        let compiler = registered.compiler.clone();
        let bindings = compiler.bindings(&occurrence)?;

        let body = match &node.body {
            Some(nodes) => self.with_frame(bindings, |c| c.compile_nodes(nodes))?,
            None => {
                if let Some(frame) = self.frames.last_mut() {
                    frame.extend(bindings);
                }
                Vec::new()
            }
        };

        debug!(
            tag = %node.name,
            line = node.location.line,
            column = node.location.column,
            attributes = occurrence.attributes.len(),
            "compiled tag occurrence"
        );
        compiler.compile(&occurrence, body)
    }

    fn with_frame<T>(
        &mut self,
        names: Vec<String>,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.frames.push(names);
        let result = f(self);
        self.frames.pop();
        result
    }

    fn is_known(&self, name: &str) -> bool {
        self.config.is_global(name) || self.frames.iter().flatten().any(|bound| bound == name)
    }
}

/// Attribute value, or a literal default when the attribute is absent.
pub(crate) fn or_default(
    occurrence: &TagOccurrence<'_>,
    attribute: &str,
    default: AttributeValue,
) -> AttributeValue {
    occurrence.get(attribute).cloned().unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TagDescriptor;
    use carefree_ast::parse;

    fn compile_source(source: &str) -> Result<Vec<Fragment>> {
        let template = parse(source)?;
        compile(&template, &TagRegistry::builtin(), &EngineConfig::default())
    }

    #[test]
    fn test_unknown_tag_is_grammar_error() {
        let err = compile_source("{carefree:nosuchtag /}").unwrap_err();
        assert!(matches!(err, CarefreeError::Grammar { ref tag, .. } if tag == "nosuchtag"));
    }

    #[test]
    fn test_void_with_body_rejected() {
        let err = compile_source("{carefree:config name=\"x\"}body{/carefree:config}").unwrap_err();
        assert!(err.is_grammar());
    }

    #[test]
    fn test_paired_self_closed_rejected() {
        assert!(compile_source("{carefree:arclist /}").unwrap_err().is_grammar());
    }

    #[test]
    fn test_unknown_attribute_dropped() {
        let fragments = compile_source("{carefree:config name=\"x\" colour=\"red\" /}").unwrap();
        assert_eq!(fragments.len(), 1);
    }

    #[test]
    fn test_bare_binding_resolves_inside_body() {
        let fragments = compile_source(
            "{carefree:arclist id=\"post\"}{carefree:taglist aid=post.id}{/carefree:taglist}{/carefree:arclist}",
        )
        .unwrap();
        let Fragment::ProviderCall(outer) = &fragments[0] else {
            panic!("expected provider call");
        };
        let crate::fragment::CallKind::List(list) = &outer.kind else {
            panic!("expected list call");
        };
        let Fragment::ProviderCall(inner) = &list.body[0] else {
            panic!("expected nested provider call");
        };
        let crate::fragment::CallKind::List(inner_list) = &inner.kind else {
            panic!("expected list call");
        };
        assert_eq!(
            inner_list.filters,
            vec![("aid".to_string(), AttributeValue::reference(&["post", "id"]))]
        );
    }

    #[test]
    fn test_binding_scope_ends_with_body() {
        let fragments = compile_source(
            "{carefree:arclist id=\"post\"}{/carefree:arclist}{carefree:taglist aid=post.id}{/carefree:taglist}",
        )
        .unwrap();
        let Fragment::ProviderCall(call) = &fragments[1] else {
            panic!("expected provider call");
        };
        let crate::fragment::CallKind::List(list) = &call.kind else {
            panic!("expected list call");
        };
        assert_eq!(list.filters[0].1, AttributeValue::string("post.id"));
    }

    #[test]
    fn test_malformed_reference_is_grammar_error() {
        assert!(compile_source("{carefree:arclist typeid=$a..b}{/carefree:arclist}")
            .unwrap_err()
            .is_grammar());
    }

    #[test]
    fn test_reserved_binding_rejected() {
        assert!(compile_source("{carefree:arclist id=\"__x\"}{/carefree:arclist}")
            .unwrap_err()
            .is_grammar());
    }

    struct Shout;

    impl TagCompiler for Shout {
        fn compile(
            &self,
            occurrence: &TagOccurrence<'_>,
            _body: Vec<Fragment>,
        ) -> Result<Fragment> {
            let text = occurrence
                .get("text")
                .map(|value| match value {
                    AttributeValue::Literal(Literal::Str(s)) => s.to_uppercase(),
                    _ => String::new(),
                })
                .unwrap_or_default();
            Ok(Fragment::Literal(text))
        }
    }

    #[test]
    fn test_custom_tag_registration() {
        let mut registry = TagRegistry::builtin();
        registry.register(TagDescriptor::new("shout", &["text"], false), Shout);
        let template = parse("{carefree:shout text=\"hi\" /}").unwrap();
        let fragments = compile(&template, &registry, &EngineConfig::default()).unwrap();
        assert!(matches!(&fragments[0], Fragment::Literal(s) if s == "HI"));
    }
}
