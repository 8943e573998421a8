//! kubefzf store: shapes `kubectl get -o json` output into cached kinds.

#![forbid(unsafe_code)]

use anyhow::{anyhow, Context, Result};
use kubefzf_core::{columns, LiteObj, ResourceCache, Uid};
use smallvec::SmallVec;
use tracing::{debug, warn};
use uuid::Uuid;

/// Builds one `ResourceCache` from raw Kubernetes objects.
pub struct CacheBuilder {
    kind: String,
    namespaced: bool,
    resource_version: Option<String>,
    items: Vec<LiteObj>,
    skipped: usize,
}

impl CacheBuilder {
    pub fn new(kind: impl Into<String>, namespaced: bool) -> Self {
        Self { kind: kind.into(), namespaced, resource_version: None, items: Vec::new(), skipped: 0 }
    }

    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn skipped(&self) -> usize { self.skipped }

    /// Apply a `List` object (`{"items": [...], "metadata": {"resourceVersion": ..}}`).
    /// A single object is accepted as a one-item list.
    pub fn apply_list(&mut self, list: &serde_json::Value) -> Result<()> {
        if let Some(rv) = list.pointer("/metadata/resourceVersion").and_then(|v| v.as_str()) {
            if !rv.is_empty() {
                self.resource_version = Some(rv.to_string());
            }
        }
        match list.get("items") {
            Some(serde_json::Value::Array(items)) => {
                for raw in items {
                    self.apply(raw);
                }
                Ok(())
            }
            Some(_) => Err(anyhow!("`items` is not an array")),
            None if list.get("metadata").is_some() => {
                self.apply(list);
                Ok(())
            }
            None => Err(anyhow!("input is neither a List nor an object")),
        }
    }

    /// Insert or replace a single raw object. Objects without a name are skipped.
    pub fn apply(&mut self, raw: &serde_json::Value) {
        match lite_from(&self.kind, raw) {
            Ok(lo) => {
                if let Some(idx) = self.items.iter().position(|x| x.uid == lo.uid) {
                    self.items[idx] = lo;
                } else {
                    self.items.push(lo);
                }
            }
            Err(e) => {
                self.skipped += 1;
                warn!(kind = %self.kind, error = %e, "skipping object");
            }
        }
    }

    /// Freeze into a cache entry with a stable (namespace, name, uid) order.
    pub fn freeze(mut self, now: i64) -> ResourceCache {
        self.items.sort_by(|a, b| {
            a.namespace.cmp(&b.namespace).then_with(|| a.name.cmp(&b.name)).then_with(|| a.uid.cmp(&b.uid))
        });
        debug!(kind = %self.kind, items = self.items.len(), skipped = self.skipped, "cache frozen");
        ResourceCache {
            kind: self.kind,
            namespaced: self.namespaced,
            items: self.items,
            resource_version: self.resource_version,
            fetched_at: now,
            last_access: 0,
            completions: 0,
        }
    }
}

fn to_uid(meta: &serde_json::Value, name: &str, namespace: Option<&str>) -> Result<Uid> {
    match meta.get("uid").and_then(|v| v.as_str()) {
        Some(s) => {
            let u = Uuid::parse_str(s).context("parsing metadata.uid as uuid")?;
            Ok(*u.as_bytes())
        }
        // Hand-written manifests have no uid; derive one from the object key
        None => {
            let key = format!("{}/{}", namespace.unwrap_or(""), name);
            Ok(*Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).as_bytes())
        }
    }
}

fn lite_from(kind: &str, raw: &serde_json::Value) -> Result<LiteObj> {
    let meta = raw.get("metadata").ok_or_else(|| anyhow!("object missing metadata"))?;
    let name = meta
        .get("name")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("object missing metadata.name"))?
        .to_string();
    let namespace = meta.get("namespace").and_then(|v| v.as_str()).map(|s| s.to_string());
    let uid = to_uid(meta, &name, namespace.as_deref())?;
    let creation_ts = meta
        .get("creationTimestamp")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp())
        .unwrap_or(0);
    let mut labels: SmallVec<[(String, String); 8]> = meta
        .get("labels")
        .and_then(|v| v.as_object())
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.as_str().unwrap_or("").to_string())).collect())
        .unwrap_or_default();
    labels.sort();
    Ok(LiteObj { uid, namespace, name, creation_ts, projected: columns::project(kind, raw), labels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_uid_is_derived_from_key() {
        let raw = json!({"metadata": {"name": "a", "namespace": "ns"}});
        let one = lite_from("pods", &raw).unwrap();
        let two = lite_from("pods", &raw).unwrap();
        assert_eq!(one.uid, two.uid);
        let other = lite_from("pods", &json!({"metadata": {"name": "a", "namespace": "ns2"}})).unwrap();
        assert_ne!(one.uid, other.uid);
    }

    #[test]
    fn nameless_objects_are_skipped() {
        let mut b = CacheBuilder::new("pods", true);
        b.apply(&json!({"metadata": {"namespace": "ns"}}));
        assert!(b.is_empty());
        assert_eq!(b.skipped(), 1);
    }
}
