//! List-iteration tags: query a list provider and render the body once per record.

use super::{TagCompiler, TagOccurrence};
use crate::error::Result;
use crate::fragment::{CallKind, Fragment, ListCall, ProviderCall};
use crate::registry::{TagDescriptor, TagRegistry};

/// Attributes every list tag accepts besides its filters.
pub const COMMON_ATTRIBUTES: &[&str] = &[
    "id", "limit", "offset", "order", "empty", "mod", "page", "pagesize",
];

#[derive(Debug, Clone, Copy)]
pub struct ListTag {
    pub name: &'static str,
    pub provider: &'static str,
    /// Binding name when `id` is not given.
    pub bind: &'static str,
    /// Attributes forwarded to the provider under the same name.
    pub filters: &'static [&'static str],
}

impl ListTag {
    pub fn descriptor(&self) -> TagDescriptor {
        let attributes: Vec<&str> = COMMON_ATTRIBUTES
            .iter()
            .chain(self.filters)
            .copied()
            .collect();
        TagDescriptor::new(self.name, &attributes, true)
    }
}

#[rustfmt::skip]
pub const LIST_TAGS: &[ListTag] = &[
    ListTag { name: "arclist", provider: "article", bind: "article", filters: &["typeid", "tagid", "flag", "author", "keyword", "exclude", "hasimg"] },
    ListTag { name: "category", provider: "category", bind: "category", filters: &["parentid", "typeid", "level"] },
    ListTag { name: "taglist", provider: "tag", bind: "tag", filters: &["aid", "hot"] },
    ListTag { name: "comment", provider: "comment", bind: "comment", filters: &["aid", "uid", "status"] },
    ListTag { name: "author", provider: "author", bind: "author", filters: &["role"] },
    ListTag { name: "gallery", provider: "gallery", bind: "image", filters: &["aid", "albumid"] },
    ListTag { name: "rank", provider: "article_rank", bind: "article", filters: &["typeid", "period", "by"] },
    ListTag { name: "link", provider: "link", bind: "link", filters: &["group", "haslogo"] },
    ListTag { name: "slider", provider: "slider", bind: "slide", filters: &["group"] },
    ListTag { name: "nav", provider: "nav", bind: "nav", filters: &["parentid", "position"] },
    ListTag { name: "related", provider: "related", bind: "article", filters: &["aid", "by"] },
    ListTag { name: "topic", provider: "topic", bind: "topic", filters: &["status"] },
    ListTag { name: "breadcrumb", provider: "breadcrumb", bind: "crumb", filters: &["typeid", "aid"] },
    ListTag { name: "archive", provider: "archive", bind: "archive", filters: &["by", "typeid"] },
    ListTag { name: "ad", provider: "ad", bind: "ad", filters: &["position"] },
    ListTag { name: "search", provider: "search", bind: "article", filters: &["keyword", "typeid"] },
    ListTag { name: "userlist", provider: "user", bind: "user", filters: &["role", "status"] },
    ListTag { name: "notice", provider: "notice", bind: "notice", filters: &["typeid"] },
    ListTag { name: "download", provider: "download", bind: "file", filters: &["typeid", "aid"] },
    ListTag { name: "video", provider: "video", bind: "video", filters: &["typeid"] },
    ListTag { name: "message", provider: "message", bind: "message", filters: &["status"] },
    ListTag { name: "sql", provider: "sql", bind: "row", filters: &["sql"] },
    ListTag { name: "position", provider: "position", bind: "item", filters: &["name"] },
];

#[derive(Debug, Clone, Copy)]
pub struct ListCompiler {
    tag: ListTag,
}

impl ListCompiler {
    pub fn new(tag: ListTag) -> Self {
        Self { tag }
    }
}

impl TagCompiler for ListCompiler {
    fn bindings(&self, occurrence: &TagOccurrence<'_>) -> Result<Vec<String>> {
        Ok(vec![occurrence.binding("id", self.tag.bind)?])
    }

    fn compile(&self, occurrence: &TagOccurrence<'_>, body: Vec<Fragment>) -> Result<Fragment> {
        let filters = self
            .tag
            .filters
            .iter()
            .filter_map(|name| occurrence.get(name).map(|value| (name.to_string(), value.clone())))
            .collect();

        Ok(Fragment::ProviderCall(Box::new(ProviderCall {
            tag: occurrence.name().to_string(),
            provider: self.tag.provider.to_string(),
            kind: CallKind::List(ListCall {
                filters,
                limit: occurrence.get("limit").cloned(),
                offset: occurrence.get("offset").cloned(),
                order: occurrence.get("order").cloned(),
                page: occurrence.get("page").cloned(),
                page_size: occurrence.get("pagesize").cloned(),
                modulo: occurrence.get("mod").cloned(),
                bind: occurrence.binding("id", self.tag.bind)?,
                body,
                empty: occurrence.get("empty").cloned(),
            }),
        })))
    }
}

pub(crate) fn register(registry: &mut TagRegistry) {
    for tag in LIST_TAGS {
        registry.register(tag.descriptor(), ListCompiler::new(*tag));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{resolve, AttributeValue};
    use carefree_ast::Location;

    #[test]
    fn test_filters_follow_table_order() {
        let occurrence = TagOccurrence::new("arclist", Location::default())
            .with_attribute("flag", "hot", resolve("hot").unwrap())
            .with_attribute("typeid", "$cat.id", resolve("$cat.id").unwrap())
            .with_attribute("limit", "5", resolve("5").unwrap());
        let compiler = ListCompiler::new(LIST_TAGS[0]);
        let Fragment::ProviderCall(call) = compiler.compile(&occurrence, Vec::new()).unwrap() else {
            panic!("expected provider call");
        };
        assert_eq!(call.provider, "article");
        let CallKind::List(list) = call.kind else {
            panic!("expected list call");
        };
        assert_eq!(list.bind, "article");
        assert_eq!(list.limit, Some(AttributeValue::integer(5)));
        let names: Vec<&str> = list.filters.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["typeid", "flag"]);
    }

    #[test]
    fn test_every_tag_has_unique_name() {
        let mut names: Vec<&str> = LIST_TAGS.iter().map(|t| t.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), LIST_TAGS.len());
    }
}
