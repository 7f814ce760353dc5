//! Control-flow tags. These work on data already in scope and never call a provider.

use super::{or_default, TagCompiler, TagOccurrence};
use crate::error::Result;
use crate::fragment::{CompareOp, Condition, Fragment, LinkLoop, LoopFragment, PagingFragment};
use crate::registry::{TagDescriptor, TagRegistry};
use crate::resolver::{AttributeValue, Literal};
use chrono::format::{Item, StrftimeItems};

/// Cache lifetime when neither `ttl` nor `expire` is given.
pub const DEFAULT_CACHE_TTL: i64 = 3600;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// `{carefree:if test=$x eq="1"}`: every comparison given must hold; with
/// none, the truthiness of `test` decides.
pub struct IfCompiler;

impl TagCompiler for IfCompiler {
    fn compile(&self, occurrence: &TagOccurrence<'_>, body: Vec<Fragment>) -> Result<Fragment> {
        let left = occurrence.require("test")?;
        let comparisons: Vec<Condition> = CompareOp::ATTRIBUTES
            .iter()
            .filter_map(|(attribute, op)| {
                occurrence.get(attribute).map(|right| Condition::Compare {
                    left: left.clone(),
                    op: *op,
                    right: right.clone(),
                })
            })
            .collect();

        let test = if comparisons.is_empty() {
            Condition::Truthy(left)
        } else {
            Condition::All(comparisons)
        };

        Ok(Fragment::Conditional {
            test,
            then: body,
            otherwise: Vec::new(),
        })
    }
}

pub struct NotEmptyCompiler;

impl TagCompiler for NotEmptyCompiler {
    fn compile(&self, occurrence: &TagOccurrence<'_>, body: Vec<Fragment>) -> Result<Fragment> {
        Ok(Fragment::Conditional {
            test: Condition::Truthy(occurrence.require("name")?),
            then: body,
            otherwise: Vec::new(),
        })
    }
}

pub struct CacheCompiler;

impl TagCompiler for CacheCompiler {
    fn compile(&self, occurrence: &TagOccurrence<'_>, body: Vec<Fragment>) -> Result<Fragment> {
        let key = occurrence.require("key")?;
        if matches!(&key, AttributeValue::Literal(Literal::Str(s)) if s.is_empty()) {
            return Err(occurrence.error("'key' must not be empty"));
        }
        let ttl = occurrence
            .get("ttl")
            .or_else(|| occurrence.get("expire"))
            .cloned()
            .unwrap_or(AttributeValue::integer(DEFAULT_CACHE_TTL));

        Ok(Fragment::Cached { key, ttl, body })
    }
}

/// Buckets `from` by the field named in `by`, keeping first-seen order.
pub struct GroupCompiler;

impl TagCompiler for GroupCompiler {
    fn bindings(&self, occurrence: &TagOccurrence<'_>) -> Result<Vec<String>> {
        Ok(vec![occurrence.binding("id", "group")?])
    }

    fn compile(&self, occurrence: &TagOccurrence<'_>, body: Vec<Fragment>) -> Result<Fragment> {
        let source = occurrence.require("from")?;
        let by = occurrence
            .raw("by")
            .filter(|by| !by.is_empty())
            .ok_or_else(|| occurrence.error("missing required attribute 'by'"))?;
        let by = by.trim_start_matches('$').split('.').map(str::to_string).collect();

        Ok(Fragment::Group {
            source,
            by,
            bind: occurrence.binding("id", "group")?,
            body,
        })
    }
}

/// `foreach` and `loop`: iteration over arrays or objects already in scope.
pub struct LoopCompiler;

impl LoopCompiler {
    fn key_binding(occurrence: &TagOccurrence<'_>) -> Result<Option<String>> {
        if occurrence.has("key") {
            occurrence.binding("key", "key").map(Some)
        } else {
            Ok(None)
        }
    }
}

impl TagCompiler for LoopCompiler {
    fn bindings(&self, occurrence: &TagOccurrence<'_>) -> Result<Vec<String>> {
        let mut names = vec![occurrence.binding("id", "item")?];
        names.extend(Self::key_binding(occurrence)?);
        Ok(names)
    }

    fn compile(&self, occurrence: &TagOccurrence<'_>, body: Vec<Fragment>) -> Result<Fragment> {
        Ok(Fragment::Loop(Box::new(LoopFragment {
            source: occurrence.require("from")?,
            bind: occurrence.binding("id", "item")?,
            key_bind: Self::key_binding(occurrence)?,
            offset: occurrence.get("offset").cloned(),
            limit: occurrence.get("limit").cloned(),
            modulo: occurrence.get("mod").cloned(),
            body,
            empty: occurrence.get("empty").cloned(),
        })))
    }
}

/// Binds `value` under `name` for the rest of the enclosing body.
pub struct AssignCompiler;

impl TagCompiler for AssignCompiler {
    fn bindings(&self, occurrence: &TagOccurrence<'_>) -> Result<Vec<String>> {
        Ok(vec![Self::name(occurrence)?])
    }

    fn compile(&self, occurrence: &TagOccurrence<'_>, _body: Vec<Fragment>) -> Result<Fragment> {
        Ok(Fragment::Assign {
            name: Self::name(occurrence)?,
            value: or_default(occurrence, "value", AttributeValue::string("")),
        })
    }
}

impl AssignCompiler {
    fn name(occurrence: &TagOccurrence<'_>) -> Result<String> {
        if !occurrence.has("name") {
            return Err(occurrence.error("missing required attribute 'name'"));
        }
        occurrence.binding("name", "")
    }
}

pub struct DateCompiler;

impl TagCompiler for DateCompiler {
    fn compile(&self, occurrence: &TagOccurrence<'_>, _body: Vec<Fragment>) -> Result<Fragment> {
        let format = match occurrence.get("format") {
            None => DEFAULT_DATE_FORMAT.to_string(),
            Some(AttributeValue::Literal(Literal::Str(format))) => format.clone(),
            Some(_) => return Err(occurrence.error("'format' must be a literal")),
        };
        if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
            return Err(occurrence.error(format!("invalid date format '{format}'")));
        }

        Ok(Fragment::Date {
            value: occurrence.require("value")?,
            format,
            default: occurrence.get("default").cloned(),
        })
    }
}

/// `pagination` iterates page links; `pagelist` writes them as markup.
/// Both default to the bindings a paged list tag leaves in scope.
pub struct PagingCompiler {
    links: bool,
}

impl PagingCompiler {
    fn fragment(
        &self,
        occurrence: &TagOccurrence<'_>,
        body: Vec<Fragment>,
    ) -> Result<PagingFragment> {
        let links = if self.links {
            Some(LinkLoop {
                bind: occurrence.binding("id", "link")?,
                body,
            })
        } else {
            None
        };

        Ok(PagingFragment {
            total: or_default(occurrence, "total", AttributeValue::reference(&["__TOTAL__"])),
            page_size: or_default(
                occurrence,
                "pagesize",
                AttributeValue::reference(&["__PAGESIZE__"]),
            ),
            page: or_default(occurrence, "page", AttributeValue::reference(&["__PAGE__"])),
            url: occurrence.get("url").cloned(),
            size: occurrence.get("size").cloned(),
            links,
        })
    }
}

impl TagCompiler for PagingCompiler {
    fn bindings(&self, occurrence: &TagOccurrence<'_>) -> Result<Vec<String>> {
        if self.links {
            Ok(vec![occurrence.binding("id", "link")?])
        } else {
            Ok(Vec::new())
        }
    }

    fn compile(&self, occurrence: &TagOccurrence<'_>, body: Vec<Fragment>) -> Result<Fragment> {
        Ok(Fragment::Paging(Box::new(self.fragment(occurrence, body)?)))
    }
}

const COMPARISONS: [&str; 8] = ["test", "eq", "neq", "gt", "lt", "egt", "elt", "in"];
const LOOP_ATTRIBUTES: [&str; 7] = ["from", "id", "key", "limit", "offset", "empty", "mod"];
const PAGING_ATTRIBUTES: [&str; 5] = ["total", "pagesize", "page", "url", "size"];

pub(crate) fn register(registry: &mut TagRegistry) {
    registry.register(TagDescriptor::new("if", &COMPARISONS, true), IfCompiler);
    registry.register(TagDescriptor::new("notempty", &["name"], true), NotEmptyCompiler);
    registry.register(TagDescriptor::new("cache", &["key", "ttl", "expire"], true), CacheCompiler);
    registry.register(TagDescriptor::new("group", &["from", "by", "id"], true), GroupCompiler);
    registry.register(TagDescriptor::new("foreach", &LOOP_ATTRIBUTES, true), LoopCompiler);
    registry.register(TagDescriptor::new("loop", &LOOP_ATTRIBUTES, true), LoopCompiler);
    registry.register(TagDescriptor::new("assign", &["name", "value"], false), AssignCompiler);
    registry.register(
        TagDescriptor::new("date", &["value", "format", "default"], false),
        DateCompiler,
    );

    let mut pagination: Vec<&str> = PAGING_ATTRIBUTES.to_vec();
    pagination.push("id");
    registry.register(
        TagDescriptor::new("pagination", &pagination, true),
        PagingCompiler { links: true },
    );
    registry.register(
        TagDescriptor::new("pagelist", &PAGING_ATTRIBUTES, false),
        PagingCompiler { links: false },
    );
}
