//! Renderer for compiled fragments.
//!
//! Fragments render depth-first in document order. Every body that binds a
//! name runs inside its own scope, popped before any error propagates.

use crate::cache::{with_cache, CacheStore};
use crate::config::EngineConfig;
use crate::context::Context;
use crate::error::{CarefreeError, ProviderError, Result};
use crate::fragment::{
    CallKind, Fragment, ListCall, LoopFragment, PagingFragment, ProviderCall, SingleCall, ValueCall,
};
use crate::html_escape;
use crate::loop_context::{self, LoopContext};
use crate::pagination::{page_links, paginate, render_page_list};
use crate::provider::{Filter, Providers, LIMIT, OFFSET, ORDER};
use crate::resolver::AttributeValue;
use crate::value::Value;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use indexmap::IndexMap;
use std::fmt::Write;
use tracing::{debug, trace};

pub struct Renderer<'a> {
    providers: &'a Providers,
    config: &'a EngineConfig,
    cache: Option<&'a dyn CacheStore>,
}

impl<'a> Renderer<'a> {
    pub fn new(providers: &'a Providers, config: &'a EngineConfig) -> Self {
        Self {
            providers,
            config,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: &'a dyn CacheStore) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Render fragments against root data, which must be an object (or null).
    pub fn render(&self, fragments: &[Fragment], data: Value) -> Result<String> {
        let mut context = Context::new(data)?;
        self.render_fragments(fragments, &mut context)
    }

    pub fn render_fragments(
        &self,
        fragments: &[Fragment],
        context: &mut Context,
    ) -> Result<String> {
        let mut output = String::new();

        for fragment in fragments {
            match fragment {
                Fragment::Literal(text) => output.push_str(text),
                Fragment::VariableRef { value, escape } => {
                    output.push_str(&self.write_value(&value.evaluate(context), *escape))
                }
                Fragment::Conditional {
                    test,
                    then,
                    otherwise,
                } => {
                    let branch = if test.evaluate(context) { then } else { otherwise };
                    output.push_str(&self.render_fragments(branch, context)?);
                }
                Fragment::Loop(node) => output.push_str(&self.render_loop(node, context)?),
                Fragment::ProviderCall(call) => output.push_str(&self.render_call(call, context)?),
                Fragment::Cached { key, ttl, body } => {
                    output.push_str(&self.render_cached(key, ttl, body, context)?)
                }
                Fragment::Group {
                    source,
                    by,
                    bind,
                    body,
                } => output.push_str(&self.render_group(source, by, bind, body, context)?),
                Fragment::Assign { name, value } => {
                    let value = value.evaluate(context);
                    context.assign(name.clone(), value);
                }
                Fragment::Date {
                    value,
                    format,
                    default,
                } => output.push_str(&self.render_date(value, format, default.as_ref(), context)),
                Fragment::Paging(node) => output.push_str(&self.render_paging(node, context)?),
            }
        }

        Ok(output)
    }

    fn write_value(&self, value: &Value, escape: bool) -> String {
        let text = value.stringify();
        if escape && self.config.escape_html {
            html_escape::escape(&text)
        } else {
            text
        }
    }

    /// `empty=` content: literals are written as is, references escaped.
    fn render_fallback(&self, empty: Option<&AttributeValue>, context: &Context) -> String {
        match empty {
            None => String::new(),
            Some(AttributeValue::Literal(literal)) => literal.to_value().stringify(),
            Some(reference) => self.write_value(&reference.evaluate(context), true),
        }
    }

    fn render_iterations(
        &self,
        entries: Vec<(Value, Value)>,
        bind: &str,
        key_bind: Option<&str>,
        modulo: Option<u64>,
        body: &[Fragment],
        context: &mut Context,
    ) -> Result<String> {
        let count = entries.len();
        let mut output = String::new();

        for (index, (key, item)) in entries.into_iter().enumerate() {
            let meta = LoopContext::new(index, key, count).with_modulo(modulo);
            context.push_scope(meta.bindings(bind, key_bind, item));
            let iteration = self.render_fragments(body, context);
            context.pop_scope();
            output.push_str(&iteration?);
        }

        Ok(output)
    }

    fn render_loop(&self, node: &LoopFragment, context: &mut Context) -> Result<String> {
        let source = node.source.evaluate(context);
        let mut entries = loop_context::entries(&source);

        let offset = non_negative(node.offset.as_ref(), context).unwrap_or(0);
        entries.drain(..offset.min(entries.len()));
        if let Some(limit) = positive(node.limit.as_ref(), context) {
            entries.truncate(limit);
        }

        if entries.is_empty() {
            return Ok(self.render_fallback(node.empty.as_ref(), context));
        }

        let modulo = positive(node.modulo.as_ref(), context).map(|m| m as u64);
        self.render_iterations(
            entries,
            &node.bind,
            node.key_bind.as_deref(),
            modulo,
            &node.body,
            context,
        )
    }

    // ------------------------------------------------------------------------
    // Provider calls
    // ------------------------------------------------------------------------

    fn render_call(&self, call: &ProviderCall, context: &mut Context) -> Result<String> {
        match &call.kind {
            CallKind::List(list) => self.render_list(call, list, context),
            CallKind::Single(single) => self.render_single(call, single, context),
            CallKind::Value(value) => self.render_value(call, value, context),
        }
    }

    fn render_list(
        &self,
        call: &ProviderCall,
        list: &ListCall,
        context: &mut Context,
    ) -> Result<String> {
        let provider = self
            .providers
            .list(&call.provider)
            .map_err(|err| provider_error(call, err))?;

        let mut filter = evaluate_params(&list.filters, context);
        if let Some(order) = list.order.as_ref().map(|o| o.evaluate(context)) {
            if !order.is_blank() {
                filter.insert(ORDER, Value::String(order.stringify()));
            }
        }

        let mut offset = non_negative(list.offset.as_ref(), context).unwrap_or(0);
        let mut limit = match list.limit.as_ref().map(|l| l.evaluate(context).as_i64()) {
            None | Some(None) => Some(self.config.default_list_limit),
            Some(Some(n)) => usize::try_from(n).ok(),
        }
        .filter(|n| *n > 0);

        if let Some(page) = &list.page {
            let current = page.evaluate(context).as_i64().unwrap_or(1);
            let page_size = list
                .page_size
                .as_ref()
                .and_then(|size| size.evaluate(context).as_i64())
                .or_else(|| limit.and_then(|n| i64::try_from(n).ok()))
                .unwrap_or(self.config.default_page_size as i64);

            let total = provider
                .count(&filter)
                .map_err(|err| provider_error(call, err))?
                .saturating_sub(offset);
            let state = paginate(total as i64, page_size, current);
            debug!(
                tag = %call.tag,
                total,
                page = state.current_page,
                pages = state.total_pages,
                "paging list"
            );

            context.assign("__TOTAL__", Value::from(total));
            context.assign("__PAGE__", Value::from(state.current_page));
            context.assign("__PAGES__", Value::from(state.total_pages));
            context.assign("__PAGESIZE__", Value::Integer(page_size.max(0)));

            if state.take == 0 {
                return Ok(self.render_fallback(list.empty.as_ref(), context));
            }
            offset += state.skip;
            limit = Some(state.take);
        }

        if offset > 0 {
            filter.insert(OFFSET, Value::from(offset));
        }
        if let Some(limit) = limit {
            filter.insert(LIMIT, Value::from(limit));
        }

        debug!(tag = %call.tag, provider = %call.provider, filter = %filter, "list provider call");
        let mut items = provider
            .get_list(&filter)
            .map_err(|err| provider_error(call, err))?;
        debug!(tag = %call.tag, count = items.len(), "list provider returned");

        if let Some(limit) = limit {
            items.truncate(limit);
        }
        if items.is_empty() {
            return Ok(self.render_fallback(list.empty.as_ref(), context));
        }

        let entries = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (Value::from(index), item))
            .collect();
        let modulo = positive(list.modulo.as_ref(), context).map(|m| m as u64);
        self.render_iterations(entries, &list.bind, None, modulo, &list.body, context)
    }

    fn render_single(
        &self,
        call: &ProviderCall,
        single: &SingleCall,
        context: &mut Context,
    ) -> Result<String> {
        let provider = self
            .providers
            .single(&call.provider)
            .map_err(|err| provider_error(call, err))?;

        let key = single.key.evaluate(context);
        if key.is_blank() {
            trace!(tag = %call.tag, "lookup key is empty, skipping provider");
            return Ok(self.render_fallback(single.empty.as_ref(), context));
        }

        debug!(
            tag = %call.tag,
            provider = %call.provider,
            key = %key.stringify(),
            field = %single.field,
            "single provider call"
        );
        let record = provider
            .get_one(&key, &single.field)
            .map_err(|err| provider_error(call, err))?;

        match record {
            Some(record) if !record.is_null() => {
                let mut scope = IndexMap::new();
                scope.insert(single.bind.clone(), record);
                context.push_scope(scope);
                let rendered = self.render_fragments(&single.body, context);
                context.pop_scope();
                rendered
            }
            _ => Ok(self.render_fallback(single.empty.as_ref(), context)),
        }
    }

    fn render_value(
        &self,
        call: &ProviderCall,
        value: &ValueCall,
        context: &mut Context,
    ) -> Result<String> {
        let provider = self
            .providers
            .value(&call.provider)
            .map_err(|err| provider_error(call, err))?;

        let name = value.name.evaluate(context).stringify();
        let params = evaluate_params(&value.params, context);
        let default = value
            .default
            .as_ref()
            .map(|d| d.evaluate(context))
            .unwrap_or_default();

        debug!(tag = %call.tag, provider = %call.provider, name = %name, "value provider call");
        let result = provider
            .get_value(&name, &params, &default)
            .map_err(|err| provider_error(call, err))?;
        let result = if result.is_blank() { default } else { result };

        Ok(self.write_value(&result, value.escape))
    }

    // ------------------------------------------------------------------------
    // Control flow
    // ------------------------------------------------------------------------

    fn render_cached(
        &self,
        key: &AttributeValue,
        ttl: &AttributeValue,
        body: &[Fragment],
        context: &mut Context,
    ) -> Result<String> {
        let key = key.evaluate(context).stringify();
        let ttl = ttl.evaluate(context).as_i64().unwrap_or(0);

        // Bindings made inside the region stay inside it, so a hit and a miss
        // leave the surrounding scope identical.
        context.push_scope(IndexMap::new());
        let rendered = match self.cache {
            Some(store) if self.config.cache_enabled && !key.is_empty() => {
                with_cache(store, &key, ttl, || self.render_fragments(body, context))
            }
            _ => self.render_fragments(body, context),
        };
        context.pop_scope();
        rendered
    }

    fn render_group(
        &self,
        source: &AttributeValue,
        by: &[String],
        bind: &str,
        body: &[Fragment],
        context: &mut Context,
    ) -> Result<String> {
        let source = source.evaluate(context);
        let mut buckets: IndexMap<String, Vec<Value>> = IndexMap::new();
        for (_, item) in loop_context::entries(&source) {
            let key = item.get_path(by).map(Value::stringify).unwrap_or_default();
            buckets.entry(key).or_default().push(item);
        }

        let grouped = buckets
            .into_iter()
            .map(|(key, items)| (key, Value::Array(items)))
            .collect();
        let mut scope = IndexMap::new();
        scope.insert(bind.to_string(), Value::Object(grouped));

        context.push_scope(scope);
        let rendered = self.render_fragments(body, context);
        context.pop_scope();
        rendered
    }

    fn render_date(
        &self,
        value: &AttributeValue,
        format: &str,
        default: Option<&AttributeValue>,
        context: &Context,
    ) -> String {
        let fallback = || {
            default
                .map(|d| self.write_value(&d.evaluate(context), true))
                .unwrap_or_default()
        };

        let Some(datetime) = parse_datetime(&value.evaluate(context)) else {
            return fallback();
        };
        let mut formatted = String::new();
        if write!(formatted, "{}", datetime.format(format)).is_err() {
            return fallback();
        }
        self.write_value(&Value::String(formatted), true)
    }

    fn render_paging(&self, node: &PagingFragment, context: &mut Context) -> Result<String> {
        let total = node.total.evaluate(context).as_i64().unwrap_or(0);
        let page_size = node
            .page_size
            .evaluate(context)
            .as_i64()
            .unwrap_or(self.config.default_page_size as i64);
        let current = node.page.evaluate(context).as_i64().unwrap_or(1);
        let url = node
            .url
            .as_ref()
            .map(|u| u.evaluate(context).stringify())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.config.page_url.clone());
        let max_links = self.config.max_page_links;
        let size = positive(node.size.as_ref(), context).map_or(max_links, |n| n.min(max_links));

        let page = paginate(total, page_size, current);
        let Some(links) = &node.links else {
            return Ok(render_page_list(&page, &url, size));
        };
        if page.total_pages == 0 {
            return Ok(String::new());
        }

        let entries = page_links(&page, &url, size)
            .iter()
            .enumerate()
            .map(|(index, link)| (Value::from(index), link.to_value()))
            .collect();
        self.render_iterations(entries, &links.bind, None, None, &links.body, context)
    }
}

fn provider_error(call: &ProviderCall, source: ProviderError) -> CarefreeError {
    CarefreeError::Provider {
        tag: call.tag.clone(),
        provider: call.provider.clone(),
        source,
    }
}

/// Evaluate named parameters, leaving out the ones that resolve to null.
fn evaluate_params(params: &[(String, AttributeValue)], context: &Context) -> Filter {
    let mut filter = Filter::new();
    for (name, value) in params {
        let value = value.evaluate(context);
        if !value.is_null() {
            filter.insert(name.clone(), value);
        }
    }
    filter
}

fn non_negative(value: Option<&AttributeValue>, context: &Context) -> Option<usize> {
    value
        .and_then(|v| v.evaluate(context).as_i64())
        .and_then(|n| usize::try_from(n).ok())
}

fn positive(value: Option<&AttributeValue>, context: &Context) -> Option<usize> {
    non_negative(value, context).filter(|n| *n > 0)
}

/// Unix timestamps (number or numeric string), RFC 3339, `%Y-%m-%d %H:%M:%S`
/// or `%Y-%m-%d`. Timestamps and naive values are taken as UTC.
fn parse_datetime(value: &Value) -> Option<DateTime<FixedOffset>> {
    let utc = FixedOffset::east_opt(0)?;
    let from_timestamp =
        |secs: i64| DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.with_timezone(&utc));

    match value {
        Value::Integer(secs) => from_timestamp(*secs),
        Value::Float(secs) if secs.is_finite() => from_timestamp(secs.trunc() as i64),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(secs) = s.parse::<i64>() {
                return from_timestamp(secs);
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                        .ok()
                        .map(|naive| utc.from_utc_datetime(&naive))
                })
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                        .map(|naive| utc.from_utc_datetime(&naive))
                })
        }
        _ => None,
    }
}
