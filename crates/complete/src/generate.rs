//! Completion candidates from the cached fetcher state.

#![forbid(unsafe_code)]

use kubefzf_core::columns::{self, ColumnKind, POD_NODE, POD_STATUS};
use kubefzf_core::{resources, CompletionError, FetcherState, LiteObj, ResourceCache, Verb};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::parse::{parse_args, ParsedArgs, Target};
use crate::{Candidate, CompletionResultSet};

/// Produce the ordered candidates for `(verb, args)`. Marks the kind it served
/// from as accessed in `state`; the caller decides whether to persist that.
pub fn generate(
    verb: Verb,
    args: &[String],
    state: &mut FetcherState,
    now: i64,
) -> Result<CompletionResultSet, CompletionError> {
    let parsed = parse_args(verb, args)?;
    debug!(verb = %verb, target = ?parsed.target, resource = ?parsed.resource, ns = ?parsed.namespace, "args parsed");

    let (kind, header, candidates) = match parsed.target {
        Target::ResourceType => {
            let header = vec!["Resource".to_string(), "Objects".to_string(), "Fetched".to_string()];
            let rows = state
                .kinds
                .values()
                .map(|c| Candidate {
                    value: c.kind.clone(),
                    namespace: None,
                    cells: vec![c.kind.clone(), c.items.len().to_string(), render_age(c.fetched_at, now)],
                })
                .collect();
            (None, header, rows)
        }
        Target::Namespace => {
            let cache = cached(state, "namespaces")?;
            let (header, rows) = object_rows(cache, None, now);
            (Some(cache.kind.clone()), header, rows)
        }
        Target::Resource => {
            let cache = cached(state, resource_of(&parsed))?;
            let (header, rows) = object_rows(cache, namespace_filter(&parsed, cache), now);
            (Some(cache.kind.clone()), header, rows)
        }
        Target::Label => {
            let cache = cached(state, resource_of(&parsed))?;
            let rows = occurrence_rows(filtered(cache, namespace_filter(&parsed, cache)).flat_map(|o| {
                o.labels.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>()
            }));
            (Some(cache.kind.clone()), vec!["Label".to_string(), "Occurrences".to_string()], rows)
        }
        Target::FieldSelector => {
            let cache = cached(state, resource_of(&parsed))?;
            let rows = occurrence_rows(filtered(cache, namespace_filter(&parsed, cache)).flat_map(|o| field_selectors(&cache.kind, o)));
            (Some(cache.kind.clone()), vec!["Field".to_string(), "Occurrences".to_string()], rows)
        }
    };

    if let Some(kind) = &kind {
        if let Some(cache) = state.kind_mut(kind) {
            cache.touch(now);
        }
    }
    debug!(candidates = candidates.len(), kind = ?kind, "candidates generated");
    Ok(CompletionResultSet { target: parsed.target, kind, header, candidates, query: parsed.query })
}

fn resource_of(parsed: &ParsedArgs) -> &str {
    parsed.resource.as_deref().unwrap_or_default()
}

fn cached<'a>(state: &'a FetcherState, name: &str) -> Result<&'a ResourceCache, CompletionError> {
    let key = resources::cache_key(name, state).ok_or_else(|| CompletionError::unknown_resource(name))?;
    state
        .kind(&key)
        .ok_or_else(|| CompletionError::unknown_resource(format!("{} (never fetched)", key)))
}

fn namespace_filter<'a>(parsed: &'a ParsedArgs, cache: &ResourceCache) -> Option<&'a str> {
    if !cache.namespaced || parsed.all_namespaces {
        return None;
    }
    parsed.namespace.as_deref()
}

fn filtered<'a>(cache: &'a ResourceCache, namespace: Option<&'a str>) -> impl Iterator<Item = &'a LiteObj> + 'a {
    cache.items.iter().filter(move |o| namespace.map(|ns| o.namespace.as_deref() == Some(ns)).unwrap_or(true))
}

fn object_rows(cache: &ResourceCache, namespace: Option<&str>, now: i64) -> (Vec<String>, Vec<Candidate>) {
    let cols = columns::columns_for(&cache.kind, cache.namespaced);
    let header = cols.iter().map(|c| c.label.to_string()).collect();
    let mut items: Vec<&LiteObj> = filtered(cache, namespace).collect();
    items.sort_by(|a, b| {
        a.namespace.cmp(&b.namespace).then_with(|| a.name.cmp(&b.name)).then_with(|| a.uid.cmp(&b.uid))
    });
    let rows = items
        .into_iter()
        .map(|o| Candidate {
            value: o.name.clone(),
            namespace: o.namespace.clone(),
            cells: cols
                .iter()
                .map(|c| match c.kind {
                    ColumnKind::Namespace => o.namespace.clone().unwrap_or_default(),
                    ColumnKind::Name => o.name.clone(),
                    ColumnKind::Age => render_age(o.creation_ts, now),
                    ColumnKind::Labels => o.labels.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join(","),
                    ColumnKind::Projected(id) => o.projected(id).unwrap_or_default().to_string(),
                })
                .collect(),
        })
        .collect();
    (header, rows)
}

fn field_selectors(kind: &str, o: &LiteObj) -> Vec<String> {
    let mut out = vec![format!("metadata.name={}", o.name)];
    if let Some(ns) = &o.namespace {
        out.push(format!("metadata.namespace={}", ns));
    }
    if kind == "pods" {
        if let Some(node) = o.projected(POD_NODE) {
            out.push(format!("spec.nodeName={}", node));
        }
        if let Some(phase) = o.projected(POD_STATUS) {
            out.push(format!("status.phase={}", phase));
        }
    }
    out
}

/// Count distinct values; most frequent first, ties by value.
fn occurrence_rows(values: impl Iterator<Item = String>) -> Vec<Candidate> {
    let mut counts: FxHashMap<String, usize> = FxHashMap::default();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    let mut pairs: Vec<(String, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    pairs
        .into_iter()
        .map(|(value, n)| Candidate { cells: vec![value.clone(), n.to_string()], value, namespace: None })
        .collect()
}

/// kubectl-style age: `3d4h`, `2h5m`, `7m`, `12s`; `-` when unknown.
pub fn render_age(ts: i64, now: i64) -> String {
    if ts <= 0 {
        return "-".to_string();
    }
    let mut secs = (now - ts).max(0) as u64;
    let days = secs / 86_400;
    secs %= 86_400;
    let hours = secs / 3600;
    secs %= 3600;
    let mins = secs / 60;
    secs %= 60;
    if days > 0 {
        format!("{}d{}h", days, hours)
    } else if hours > 0 {
        format!("{}h{}m", hours, mins)
    } else if mins > 0 {
        format!("{}m", mins)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ages() {
        assert_eq!(render_age(0, 100), "-");
        assert_eq!(render_age(100, 112), "12s");
        assert_eq!(render_age(100, 100 + 7 * 60 + 3), "7m");
        assert_eq!(render_age(100, 100 + 2 * 3600 + 5 * 60), "2h5m");
        assert_eq!(render_age(100, 100 + 3 * 86_400 + 4 * 3600), "3d4h");
        assert_eq!(render_age(200, 100), "0s");
    }

    #[test]
    fn occurrences_order_is_stable() {
        let rows = occurrence_rows(["b=1", "a=1", "c=2", "c=2", "b=1"].iter().map(|s| s.to_string()));
        let values: Vec<_> = rows.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["b=1", "c=2", "a=1"]);
        assert_eq!(rows[0].cells, vec!["b=1".to_string(), "2".to_string()]);
    }
}
