//! Behavioural properties of tag rendering that fixtures cannot express:
//! provider call counts, requested windows and cache reuse.

use carefree::pagination::paginate;
use carefree::resolver::{resolve, AttributeValue, Literal};
use carefree::{Carefree, CarefreeError, Filter, ProviderError, Value};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn records(n: usize) -> Vec<Value> {
    (1..=n)
        .map(|id| Value::from(json!({"id": id, "title": format!("t{id}")})))
        .collect()
}

/// List provider serving `n` records that remembers every filter it saw.
fn recording_provider(
    n: usize,
) -> (
    impl Fn(&Filter) -> Result<Vec<Value>, ProviderError> + Send + Sync,
    Arc<Mutex<Vec<Filter>>>,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let provider = move |filter: &Filter| -> Result<Vec<Value>, ProviderError> {
        log.lock().unwrap().push(filter.clone());
        let take = filter.limit().unwrap_or(usize::MAX);
        Ok(records(n).into_iter().skip(filter.offset()).take(take).collect())
    };
    (provider, seen)
}

#[test]
fn test_last_flag_set_exactly_once() {
    for n in 1..=6 {
        let mut engine = Carefree::new();
        engine.providers_mut().register_records("article", records(n));
        let out = engine
            .render_str(
                "{carefree:arclist limit=\"0\"}{if $article.__last__}L{else}.{/if}{/carefree:arclist}",
                json!({}),
            )
            .unwrap();
        assert_eq!(out.matches('L').count(), 1, "n = {n}");
        assert!(out.ends_with('L'));
        assert_eq!(out.len(), n);
    }
}

#[test]
fn test_limit_is_forwarded_and_enforced() {
    let mut engine = Carefree::new();
    let (provider, seen) = recording_provider(50);
    engine.providers_mut().register_list("article", provider);

    let out = engine
        .render_str(
            "{carefree:arclist limit=\"3\" typeid=\"7\"}{$article.id},{/carefree:arclist}",
            json!({}),
        )
        .unwrap();
    assert_eq!(out, "1,2,3,");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].limit(), Some(3));
    assert_eq!(seen[0].get("typeid"), Some(&Value::Integer(7)));
}

#[test]
fn test_oversized_provider_result_is_truncated() {
    let mut engine = Carefree::new();
    engine.providers_mut().register_list(
        "article",
        |_: &Filter| -> Result<Vec<Value>, ProviderError> { Ok(records(20)) },
    );
    let out = engine
        .render_str("{carefree:arclist limit=\"2\"}x{/carefree:arclist}", json!({}))
        .unwrap();
    assert_eq!(out, "xx");
}

#[test]
fn test_null_filter_is_not_forwarded() {
    let mut engine = Carefree::new();
    let (provider, seen) = recording_provider(1);
    engine.providers_mut().register_list("article", provider);

    engine
        .render_str("{carefree:arclist typeid=$missing}x{/carefree:arclist}", json!({}))
        .unwrap();
    assert_eq!(seen.lock().unwrap()[0].get("typeid"), None);
}

#[test]
fn test_paginate_clamps_into_range() {
    for (total, size, current) in [(0, 10, 1), (95, 20, -4), (95, 20, 1), (95, 20, 99), (7, 3, 3)] {
        let page = paginate(total, size, current);
        assert!(page.current_page >= 1);
        assert!(page.current_page <= page.total_pages.max(1));
        assert!(page.take <= size as usize);
        assert!(page.skip + page.take <= total as usize);
    }
    let page = paginate(95, 20, 99);
    assert_eq!((page.total_pages, page.current_page, page.take), (5, 5, 15));
}

#[test]
fn test_attribute_resolution() {
    assert_eq!(resolve("$a.b").unwrap(), AttributeValue::reference(&["a", "b"]));
    assert_eq!(resolve("12").unwrap(), AttributeValue::integer(12));
    assert_eq!(resolve("true").unwrap(), AttributeValue::Literal(Literal::Bool(true)));
    assert_eq!(resolve("hello world").unwrap(), AttributeValue::string("hello world"));
    assert!(resolve("$a..b").is_err());
}

#[test]
fn test_empty_result_never_renders_body() {
    let body_hits = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&body_hits);

    let mut engine = Carefree::new();
    engine.providers_mut().register_list(
        "article",
        |_: &Filter| -> Result<Vec<Value>, ProviderError> { Ok(Vec::new()) },
    );
    engine.providers_mut().register_value(
        "counter",
        move |_: &str, _: &Filter, _: &Value| -> Result<Value, ProviderError> {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(Value::from("hit"))
        },
    );

    let out = engine
        .render_str(
            "{carefree:arclist empty=\"-\"}{carefree:counter aid=\"1\" /}{/carefree:arclist}",
            json!({}),
        )
        .unwrap();
    assert_eq!(out, "-");
    assert_eq!(body_hits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_cache_reuses_first_render() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut engine = Carefree::new();
    engine.providers_mut().register_value(
        "counter",
        move |_: &str, _: &Filter, _: &Value| -> Result<Value, ProviderError> {
            Ok(Value::from(counter.fetch_add(1, Ordering::SeqCst) + 1))
        },
    );

    let source =
        "{carefree:cache key=\"hits\" ttl=\"60\"}{carefree:counter aid=\"1\" /}{/carefree:cache}";
    let cached = engine.compile(source).unwrap();
    assert_eq!(engine.render(&cached, json!({})).unwrap(), "1");
    assert_eq!(engine.render(&cached, json!({})).unwrap(), "1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let source =
        "{carefree:cache key=\"hits\" ttl=\"0\"}{carefree:counter aid=\"1\" /}{/carefree:cache}";
    let uncached = engine.compile(source).unwrap();
    assert_eq!(engine.render(&uncached, json!({})).unwrap(), "2");
    assert_eq!(engine.render(&uncached, json!({})).unwrap(), "3");
}

#[test]
fn test_cache_key_from_data_separates_entries() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut engine = Carefree::new();
    engine.providers_mut().register_value(
        "counter",
        move |_: &str, _: &Filter, _: &Value| -> Result<Value, ProviderError> {
            Ok(Value::from(counter.fetch_add(1, Ordering::SeqCst) + 1))
        },
    );
    let tmpl = engine
        .compile("{carefree:cache key=$lang}{carefree:counter aid=\"1\" /}{/carefree:cache}")
        .unwrap();

    assert_eq!(engine.render(&tmpl, json!({"lang": "en"})).unwrap(), "1");
    assert_eq!(engine.render(&tmpl, json!({"lang": "ja"})).unwrap(), "2");
    assert_eq!(engine.render(&tmpl, json!({"lang": "en"})).unwrap(), "1");
}

#[test]
fn test_grammar_error_calls_no_provider() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut engine = Carefree::new();
    engine.providers_mut().register_list(
        "article",
        move |_: &Filter| -> Result<Vec<Value>, ProviderError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        },
    );

    let err = engine
        .render_str(
            "{carefree:arclist}x{/carefree:arclist}{carefree:nosuch /}",
            json!({}),
        )
        .unwrap_err();
    assert!(matches!(err, CarefreeError::Grammar { ref tag, .. } if tag == "nosuch"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_grammar_error_reports_location() {
    let err = Carefree::new()
        .compile("line one\n  {carefree:arclist /}")
        .unwrap_err();
    let CarefreeError::Grammar { location, .. } = err else {
        panic!("expected grammar error, got {err:?}");
    };
    assert_eq!((location.line, location.column), (2, 3));
}

#[test]
fn test_provider_error_names_tag_and_provider() {
    let mut engine = Carefree::new();
    engine.providers_mut().register_single(
        "article",
        |_: &Value, _: &str| -> Result<Option<Value>, ProviderError> {
            Err(ProviderError::Failed("timeout".to_string()))
        },
    );
    let err = engine
        .render_str("{carefree:arcinfo aid=\"1\"}x{/carefree:arcinfo}", json!({}))
        .unwrap_err();
    match err {
        CarefreeError::Provider { tag, provider, .. } => {
            assert_eq!(tag, "arcinfo");
            assert_eq!(provider, "article");
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[test]
fn test_nested_scopes_shadow_and_restore() {
    let mut engine = Carefree::new();
    engine.providers_mut().register_records(
        "article",
        vec![Value::from(json!({"id": 1, "title": "inner"}))],
    );
    let out = engine
        .render_str(
            "{$article.title}|{carefree:arclist}{$article.title}{/carefree:arclist}|{$article.title}",
            json!({"article": {"title": "outer"}}),
        )
        .unwrap();
    assert_eq!(out, "outer|inner|outer");
}

#[test]
fn test_cache_accepts_huge_ttl() {
    let engine = Carefree::new();
    let tmpl = engine
        .compile("{carefree:cache key=\"k\" ttl=\"9223372036854775807\"}x{/carefree:cache}")
        .unwrap();
    assert_eq!(engine.render(&tmpl, json!({})).unwrap(), "x");
    assert_eq!(engine.render(&tmpl, json!({})).unwrap(), "x");
}

#[test]
fn test_cached_region_bindings_stay_inside() {
    let mut engine = Carefree::new();
    engine.providers_mut().register_records("article", records(5));
    let tmpl = engine
        .compile(concat!(
            "{carefree:cache key=\"list\"}",
            "{carefree:arclist page=\"1\" pagesize=\"2\"}{$article.id}{/carefree:arclist}",
            "{carefree:assign name=\"seen\" value=\"yes\" /}",
            "{carefree:pagelist /}",
            "{/carefree:cache}",
            "|{$__TOTAL__}|{$seen}|{carefree:pagelist /}",
        ))
        .unwrap();

    let first = engine.render(&tmpl, json!({})).unwrap();
    let second = engine.render(&tmpl, json!({})).unwrap();
    assert_eq!(first, second);
    assert!(first.starts_with("12<ul class=\"pagination\">"));
    assert!(first.ends_with("</ul>|||"));
}

#[test]
fn test_concurrent_cached_renders_agree() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut engine = Carefree::new();
    engine.providers_mut().register_value(
        "counter",
        move |_: &str, _: &Filter, _: &Value| -> Result<Value, ProviderError> {
            Ok(Value::from(counter.fetch_add(1, Ordering::SeqCst) + 1))
        },
    );
    let source = concat!(
        "{carefree:cache key=\"hits\" ttl=\"60\"}",
        "[{carefree:counter aid=\"1\" /}]",
        "{/carefree:cache}",
    );
    let tmpl = engine.compile(source).unwrap();

    let outputs: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|_| scope.spawn(|| engine.render(&tmpl, json!({})).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let produced = calls.load(Ordering::SeqCst);
    for out in &outputs {
        let n: usize = out.trim_matches(|c| c == '[' || c == ']').parse().unwrap();
        assert!((1..=produced).contains(&n), "unexpected output {out}");
    }
    let settled = engine.render(&tmpl, json!({})).unwrap();
    assert_eq!(engine.render(&tmpl, json!({})).unwrap(), settled);
    assert_eq!(calls.load(Ordering::SeqCst), produced);
}
