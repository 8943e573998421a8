#![forbid(unsafe_code)]

use kubefzf_core::columns::{POD_NODE, POD_READY};
use kubefzf_store::CacheBuilder;

fn pod(name: &str, ns: &str, uid_tail: u32, ts: &str) -> serde_json::Value {
    serde_json::json!({
        "metadata": {
            "name": name,
            "namespace": ns,
            "uid": format!("00000000-0000-0000-0000-{:012}", uid_tail),
            "creationTimestamp": ts,
            "labels": {"app": name, "tier": "web"},
        },
        "spec": {"nodeName": "node-1"},
        "status": {"phase": "Running", "containerStatuses": [{"ready": true, "restartCount": 0}]}
    })
}

#[test]
fn list_is_shaped_and_sorted() {
    let list = serde_json::json!({
        "apiVersion": "v1",
        "kind": "List",
        "metadata": {"resourceVersion": "1234"},
        "items": [
            pod("pod-b", "default", 2, "2020-01-01T00:00:01Z"),
            pod("pod-a", "default", 1, "2020-01-01T00:00:00Z"),
            pod("api", "app", 3, "2020-01-01T00:00:00Z"),
        ]
    });
    let mut b = CacheBuilder::new("pods", true);
    b.apply_list(&list).unwrap();
    assert_eq!(b.len(), 3);
    let cache = b.freeze(1_700_000_000);

    assert_eq!(cache.kind, "pods");
    assert_eq!(cache.resource_version.as_deref(), Some("1234"));
    assert_eq!(cache.fetched_at, 1_700_000_000);
    let names: Vec<_> = cache.items.iter().map(|o| (o.namespace.as_deref().unwrap_or(""), o.name.as_str())).collect();
    assert_eq!(names, vec![("app", "api"), ("default", "pod-a"), ("default", "pod-b")]);

    let a = &cache.items[1];
    assert_eq!(a.creation_ts, 1_577_836_800);
    assert_eq!(a.projected(POD_READY), Some("1/1"));
    assert_eq!(a.projected(POD_NODE), Some("node-1"));
    assert_eq!(a.labels[0], ("app".to_string(), "pod-a".to_string()));
}

#[test]
fn same_uid_replaces() {
    let mut b = CacheBuilder::new("pods", true);
    b.apply(&pod("a", "ns", 1, "2020-01-01T00:00:00Z"));
    b.apply(&pod("a2", "ns", 1, "2020-01-01T00:00:00Z"));
    let cache = b.freeze(0);
    assert_eq!(cache.items.len(), 1);
    assert_eq!(cache.items[0].name, "a2");
}

#[test]
fn rejects_garbage() {
    let mut b = CacheBuilder::new("pods", true);
    assert!(b.apply_list(&serde_json::json!({"items": 3})).is_err());
    assert!(b.apply_list(&serde_json::json!([1, 2])).is_err());
}
