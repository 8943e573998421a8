#![forbid(unsafe_code)]

use kubefzf_complete::{format_output, generate, resolve, Target};
use kubefzf_core::columns::{POD_NODE, POD_STATUS};
use kubefzf_core::{CompletionErrorKind, FetcherState, LiteObj, ResourceCache, Verb};
use smallvec::smallvec;

const NOW: i64 = 1_700_000_000;

fn uid(n: u8) -> [u8; 16] { let mut u = [0u8; 16]; u[0] = n; u }

fn pod(n: u8, name: &str, ns: &str, app: &str) -> LiteObj {
    LiteObj {
        uid: uid(n),
        namespace: Some(ns.to_string()),
        name: name.to_string(),
        creation_ts: NOW - 120,
        projected: smallvec![(POD_STATUS, "Running".to_string()), (POD_NODE, "node-1".to_string())],
        labels: smallvec![("app".to_string(), app.to_string())],
    }
}

fn state() -> FetcherState {
    let mut st = FetcherState::default();
    st.upsert(ResourceCache {
        kind: "pods".into(),
        namespaced: true,
        // stored out of order on purpose
        items: vec![pod(3, "dns", "kube-system", "dns"), pod(2, "pod-b", "default", "web"), pod(1, "pod-a", "default", "web")],
        fetched_at: NOW - 60,
        ..Default::default()
    });
    st
}

fn args(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn values(verb: Verb, a: &[&str], st: &mut FetcherState) -> Vec<String> {
    generate(verb, &args(a), st, NOW).unwrap().candidates.into_iter().map(|c| c.value).collect()
}

#[test]
fn pods_round_trip() {
    let mut st = FetcherState::default();
    st.upsert(ResourceCache {
        kind: "pods".into(),
        namespaced: true,
        items: vec![pod(1, "pod-a", "default", "web"), pod(2, "pod-b", "default", "web")],
        ..Default::default()
    });
    let set = generate(Verb::Get, &args(&["po", ""]), &mut st, NOW).unwrap();
    let names: Vec<_> = set.candidates.iter().map(|c| c.value.as_str()).collect();
    assert_eq!(names, vec!["pod-a", "pod-b"]);

    let text = format_output(&set);
    let lines: Vec<&str> = text.lines().collect();
    // header + two candidates
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("pod-a"));
    assert!(lines[2].contains("pod-b"));

    let out = resolve(Verb::Get, &args(&["po", ""]), &st, lines[1]).unwrap();
    assert_eq!(out, "pod-a");
}

#[test]
fn order_is_deterministic() {
    let mut st = state();
    let first = values(Verb::Get, &["pods", ""], &mut st);
    assert_eq!(first, vec!["pod-a", "pod-b", "dns"]);
    for _ in 0..5 {
        assert_eq!(values(Verb::Get, &["pods", ""], &mut st), first);
    }
}

#[test]
fn namespace_flag_filters() {
    let mut st = state();
    assert_eq!(values(Verb::Logs, &["-n", "kube-system", ""], &mut st), vec!["dns"]);
    assert_eq!(values(Verb::Logs, &["-n", "kube-system", "-A", ""], &mut st).len(), 3);
}

#[test]
fn labels_and_fields() {
    let mut st = state();
    let set = generate(Verb::Get, &args(&["pods", "-l", ""]), &mut st, NOW).unwrap();
    assert_eq!(set.target, Target::Label);
    let labels: Vec<_> = set.candidates.iter().map(|c| (c.value.as_str(), c.cells[1].as_str())).collect();
    assert_eq!(labels, vec![("app=web", "2"), ("app=dns", "1")]);

    let fields = values(Verb::Get, &["pods", "--field-selector", ""], &mut st);
    assert_eq!(fields[0], "spec.nodeName=node-1");
    assert_eq!(fields[1], "status.phase=Running");
    assert!(fields.contains(&"metadata.namespace=default".to_string()));
    assert!(fields.contains(&"metadata.name=dns".to_string()));
}

#[test]
fn resource_types_list_cached_kinds() {
    let mut st = state();
    let set = generate(Verb::Get, &args(&[""]), &mut st, NOW).unwrap();
    assert_eq!(set.target, Target::ResourceType);
    assert_eq!(set.candidates.len(), 1);
    assert_eq!(set.candidates[0].cells, vec!["pods".to_string(), "3".to_string(), "1m".to_string()]);
}

#[test]
fn unknown_and_uncached_kinds() {
    let mut st = state();
    let err = generate(Verb::Get, &args(&["widgets", ""]), &mut st, NOW).unwrap_err();
    assert_eq!(err.kind, CompletionErrorKind::UnknownResource);
    // a real kind that was never ingested
    let err = generate(Verb::Get, &args(&["deploy", ""]), &mut st, NOW).unwrap_err();
    assert_eq!(err.kind, CompletionErrorKind::UnknownResource);
    let err = generate(Verb::Get, &args(&["pods", "-n", ""]), &mut st, NOW).unwrap_err();
    assert_eq!(err.kind, CompletionErrorKind::UnknownResource);
    let err = generate(Verb::Get, &args(&["pods", "-o", ""]), &mut st, NOW).unwrap_err();
    assert_eq!(err.kind, CompletionErrorKind::UnmanagedFlag);
}

#[test]
fn serving_touches_the_kind() {
    let mut st = state();
    generate(Verb::Describe, &args(&["po", ""]), &mut st, NOW).unwrap();
    let pods = st.kind("pods").unwrap();
    assert_eq!(pods.last_access, NOW);
    assert_eq!(pods.completions, 1);
}

#[test]
fn query_is_the_value_part_of_inline_flags() {
    let mut st = state();
    st.upsert(ResourceCache { kind: "namespaces".into(), namespaced: false, fetched_at: NOW, ..Default::default() });
    let set = generate(Verb::Get, &args(&["pods", "--namespace=kub"]), &mut st, NOW).unwrap();
    assert_eq!(set.target, Target::Namespace);
    assert_eq!(set.query, "kub");
    assert_eq!(generate(Verb::Get, &args(&["pods", "pod-"]), &mut st, NOW).unwrap().query, "pod-");
}

#[test]
fn empty_namespace_gives_no_candidates() {
    let mut st = state();
    let set = generate(Verb::Get, &args(&["-n", "nowhere", "pods", ""]), &mut st, NOW).unwrap();
    assert!(set.is_empty());
}
