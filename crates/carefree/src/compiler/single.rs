//! Single-entity tags: look one record up and render the body with it bound.

use super::{TagCompiler, TagOccurrence};
use crate::error::Result;
use crate::fragment::{CallKind, Fragment, ProviderCall, SingleCall};
use crate::registry::{TagDescriptor, TagRegistry};

#[derive(Debug, Clone, Copy)]
pub struct SingleTag {
    pub name: &'static str,
    pub provider: &'static str,
    pub bind: &'static str,
    /// `(attribute, lookup field)`; the first attribute present wins.
    pub keys: &'static [(&'static str, &'static str)],
}

impl SingleTag {
    pub fn descriptor(&self) -> TagDescriptor {
        let mut attributes = vec!["id", "empty"];
        attributes.extend(self.keys.iter().map(|(attribute, _)| *attribute));
        TagDescriptor::new(self.name, &attributes, true)
    }
}

#[rustfmt::skip]
pub const SINGLE_TAGS: &[SingleTag] = &[
    SingleTag { name: "arcinfo", provider: "article", bind: "article", keys: &[("aid", "id"), ("alias", "alias")] },
    SingleTag { name: "catinfo", provider: "category", bind: "category", keys: &[("typeid", "id"), ("alias", "alias")] },
    SingleTag { name: "taginfo", provider: "tag", bind: "tag", keys: &[("tagid", "id"), ("name", "name")] },
    SingleTag { name: "topicinfo", provider: "topic", bind: "topic", keys: &[("topicid", "id"), ("alias", "alias")] },
    SingleTag { name: "page", provider: "page", bind: "page", keys: &[("pageid", "id"), ("alias", "alias")] },
    SingleTag { name: "userinfo", provider: "user", bind: "user", keys: &[("uid", "id"), ("username", "username")] },
    SingleTag { name: "prev", provider: "article_prev", bind: "prev", keys: &[("aid", "id")] },
    SingleTag { name: "next", provider: "article_next", bind: "next", keys: &[("aid", "id")] },
];

#[derive(Debug, Clone, Copy)]
pub struct SingleCompiler {
    tag: SingleTag,
}

impl SingleCompiler {
    pub fn new(tag: SingleTag) -> Self {
        Self { tag }
    }
}

impl TagCompiler for SingleCompiler {
    fn bindings(&self, occurrence: &TagOccurrence<'_>) -> Result<Vec<String>> {
        Ok(vec![occurrence.binding("id", self.tag.bind)?])
    }

    fn compile(&self, occurrence: &TagOccurrence<'_>, body: Vec<Fragment>) -> Result<Fragment> {
        let attributes: Vec<&str> = self.tag.keys.iter().map(|(attribute, _)| *attribute).collect();
        let (attribute, key) = occurrence.first_of(&attributes).ok_or_else(|| {
            occurrence.error(format!("requires one of: {}", attributes.join(", ")))
        })?;
        let field = self
            .tag
            .keys
            .iter()
            .find(|(name, _)| *name == attribute)
            .map(|(_, field)| *field)
            .unwrap_or("id");

        Ok(Fragment::ProviderCall(Box::new(ProviderCall {
            tag: occurrence.name().to_string(),
            provider: self.tag.provider.to_string(),
            kind: CallKind::Single(SingleCall {
                key: key.clone(),
                field: field.to_string(),
                bind: occurrence.binding("id", self.tag.bind)?,
                body,
                empty: occurrence.get("empty").cloned(),
            }),
        })))
    }
}

pub(crate) fn register(registry: &mut TagRegistry) {
    for tag in SINGLE_TAGS {
        registry.register(tag.descriptor(), SingleCompiler::new(*tag));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;
    use carefree_ast::Location;

    fn single_call(occurrence: TagOccurrence<'_>) -> Result<SingleCall> {
        let fragment = SingleCompiler::new(SINGLE_TAGS[0]).compile(&occurrence, Vec::new())?;
        match fragment {
            Fragment::ProviderCall(call) => match call.kind {
                CallKind::Single(single) => Ok(single),
                other => panic!("expected single call, got {other:?}"),
            },
            other => panic!("expected provider call, got {other:?}"),
        }
    }

    #[test]
    fn test_alias_lookup_field() {
        let call = single_call(
            TagOccurrence::new("arcinfo", Location::default())
                .with_attribute("alias", "about", resolve("about").unwrap()),
        )
        .unwrap();
        assert_eq!(call.field, "alias");
        assert_eq!(call.bind, "article");
    }

    #[test]
    fn test_key_required() {
        let err = single_call(TagOccurrence::new("arcinfo", Location::default())).unwrap_err();
        assert!(err.is_grammar());
    }
}
