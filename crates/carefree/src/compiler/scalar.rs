//! Value-output tags: void tags that write one provider value.

use super::{TagCompiler, TagOccurrence};
use crate::error::Result;
use crate::fragment::{CallKind, Fragment, ProviderCall, ValueCall};
use crate::registry::{TagDescriptor, TagRegistry};
use crate::resolver::AttributeValue;

#[derive(Debug, Clone, Copy)]
pub struct ScalarTag {
    pub name: &'static str,
    pub provider: &'static str,
    /// Attribute naming the value to fetch.
    pub name_attribute: &'static str,
    /// Used when `name_attribute` is absent; `None` makes it required.
    pub default_name: Option<&'static str>,
    pub params: &'static [&'static str],
    pub escape: bool,
}

impl ScalarTag {
    pub fn descriptor(&self) -> TagDescriptor {
        let mut attributes = vec![self.name_attribute, "default", "escape"];
        attributes.extend(self.params.iter().copied());
        TagDescriptor::new(self.name, &attributes, false)
    }
}

#[rustfmt::skip]
pub const SCALAR_TAGS: &[ScalarTag] = &[
    ScalarTag { name: "config", provider: "config", name_attribute: "name", default_name: None, params: &[], escape: true },
    ScalarTag { name: "stats", provider: "stats", name_attribute: "type", default_name: Some("articles"), params: &["typeid"], escape: true },
    ScalarTag { name: "seo", provider: "seo", name_attribute: "type", default_name: Some("meta"), params: &["aid", "typeid"], escape: false },
    ScalarTag { name: "qrcode", provider: "qrcode", name_attribute: "text", default_name: None, params: &["size"], escape: false },
    ScalarTag { name: "captcha", provider: "captcha", name_attribute: "type", default_name: Some("image"), params: &["width", "height"], escape: false },
    ScalarTag { name: "weather", provider: "weather", name_attribute: "city", default_name: None, params: &["format"], escape: true },
    ScalarTag { name: "counter", provider: "counter", name_attribute: "aid", default_name: None, params: &[], escape: true },
];

#[derive(Debug, Clone, Copy)]
pub struct ScalarCompiler {
    tag: ScalarTag,
}

impl ScalarCompiler {
    pub fn new(tag: ScalarTag) -> Self {
        Self { tag }
    }
}

impl TagCompiler for ScalarCompiler {
    fn compile(&self, occurrence: &TagOccurrence<'_>, _body: Vec<Fragment>) -> Result<Fragment> {
        let name = match (occurrence.get(self.tag.name_attribute), self.tag.default_name) {
            (Some(value), _) => value.clone(),
            (None, Some(default)) => AttributeValue::string(default),
            (None, None) => return Err(occurrence.error(format!(
                "missing required attribute '{}'",
                self.tag.name_attribute
            ))),
        };

        let params = self
            .tag
            .params
            .iter()
            .filter_map(|param| {
                occurrence
                    .get(param)
                    .map(|value| (param.to_string(), value.clone()))
            })
            .collect();

        Ok(Fragment::ProviderCall(Box::new(ProviderCall {
            tag: occurrence.name().to_string(),
            provider: self.tag.provider.to_string(),
            kind: CallKind::Value(ValueCall {
                name,
                params,
                default: occurrence.get("default").cloned(),
                escape: occurrence.flag("escape")?.unwrap_or(self.tag.escape),
            }),
        })))
    }
}

pub(crate) fn register(registry: &mut TagRegistry) {
    for tag in SCALAR_TAGS {
        registry.register(tag.descriptor(), ScalarCompiler::new(*tag));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;
    use carefree_ast::Location;

    fn tag(name: &str) -> ScalarTag {
        *SCALAR_TAGS.iter().find(|t| t.name == name).unwrap()
    }

    fn value_call(tag: ScalarTag, occurrence: TagOccurrence<'_>) -> Result<ValueCall> {
        match ScalarCompiler::new(tag).compile(&occurrence, Vec::new())? {
            Fragment::ProviderCall(call) => match call.kind {
                CallKind::Value(value) => Ok(value),
                other => panic!("expected value call, got {other:?}"),
            },
            other => panic!("expected provider call, got {other:?}"),
        }
    }

    #[test]
    fn test_default_name() {
        let occurrence = TagOccurrence::new("stats", Location::default());
        let call = value_call(tag("stats"), occurrence).unwrap();
        assert_eq!(call.name, AttributeValue::string("articles"));
        assert!(call.escape);
    }

    #[test]
    fn test_required_name() {
        let err = value_call(tag("config"), TagOccurrence::new("config", Location::default()))
            .unwrap_err();
        assert!(err.is_grammar());
    }

    #[test]
    fn test_escape_override() {
        let occurrence = TagOccurrence::new("config", Location::default())
            .with_attribute("name", "footer", resolve("footer").unwrap())
            .with_attribute("escape", "false", resolve("false").unwrap());
        assert!(!value_call(tag("config"), occurrence).unwrap().escape);

        let bad = TagOccurrence::new("config", Location::default())
            .with_attribute("name", "footer", resolve("footer").unwrap())
            .with_attribute("escape", "maybe", resolve("maybe").unwrap());
        assert!(value_call(tag("config"), bad).is_err());
    }
}
