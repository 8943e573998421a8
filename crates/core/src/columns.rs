//! Built-in columns and projectors for core Kubernetes kinds.
//!
//! Columns are what the selector shows next to each name; the projector fills
//! `LiteObj.projected` from raw JSON at ingest time so completions never touch
//! the full object again.

#![forbid(unsafe_code)]

use smallvec::SmallVec;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Namespace,
    Name,
    Age,
    Labels,
    Projected(u32),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSpec {
    pub kind: ColumnKind,
    pub label: &'static str,
}

// Column ids are persisted with the cache; never renumber.
pub const POD_READY: u32 = 10_001;
pub const POD_STATUS: u32 = 10_002;
pub const POD_RESTARTS: u32 = 10_003;
pub const POD_NODE: u32 = 10_004;
pub const POD_IP: u32 = 10_005;

pub const DEP_READY: u32 = 11_001;
pub const DEP_AVAILABLE: u32 = 11_002;

pub const STS_READY: u32 = 12_001;

pub const SVC_TYPE: u32 = 13_001;
pub const SVC_CLUSTER_IP: u32 = 13_002;
pub const SVC_PORTS: u32 = 13_003;

pub const DS_DESIRED: u32 = 15_001;
pub const DS_READY: u32 = 15_002;

pub const JOB_COMPLETIONS: u32 = 16_001;

pub const CJ_SCHEDULE: u32 = 17_001;
pub const CJ_SUSPEND: u32 = 17_002;

pub const PVC_STATUS: u32 = 18_001;
pub const PVC_CAPACITY: u32 = 18_002;

pub const NODE_STATUS: u32 = 19_001;
pub const NODE_ROLES: u32 = 19_002;
pub const NODE_VERSION: u32 = 19_003;

pub const NS_STATUS: u32 = 20_001;

/// Projections that are a single JSON pointer lookup, per kind.
const POINTER_FIELDS: &[(&str, u32, &str)] = &[
    ("pods", POD_STATUS, "/status/phase"),
    ("pods", POD_NODE, "/spec/nodeName"),
    ("pods", POD_IP, "/status/podIP"),
    ("services", SVC_TYPE, "/spec/type"),
    ("services", SVC_CLUSTER_IP, "/spec/clusterIP"),
    ("daemonsets", DS_DESIRED, "/status/desiredNumberScheduled"),
    ("daemonsets", DS_READY, "/status/numberReady"),
    ("cronjobs", CJ_SCHEDULE, "/spec/schedule"),
    ("cronjobs", CJ_SUSPEND, "/spec/suspend"),
    ("persistentvolumeclaims", PVC_STATUS, "/status/phase"),
    ("persistentvolumeclaims", PVC_CAPACITY, "/status/capacity/storage"),
    ("nodes", NODE_VERSION, "/status/nodeInfo/kubeletVersion"),
    ("namespaces", NS_STATUS, "/status/phase"),
];

fn col(kind: ColumnKind, label: &'static str) -> ColumnSpec {
    ColumnSpec { kind, label }
}

/// Full column set for a cached kind. Unknown kinds get Namespace/Name/Age/Labels.
pub fn columns_for(kind: &str, namespaced: bool) -> Vec<ColumnSpec> {
    let mut cols = Vec::new();
    if namespaced {
        cols.push(col(ColumnKind::Namespace, "Namespace"));
    }
    cols.push(col(ColumnKind::Name, "Name"));
    let extra: &[(u32, &'static str)] = match kind {
        "pods" => &[(POD_READY, "Ready"), (POD_STATUS, "Status"), (POD_RESTARTS, "Restarts"), (POD_IP, "IP"), (POD_NODE, "Node")],
        "deployments" => &[(DEP_READY, "Ready"), (DEP_AVAILABLE, "Available")],
        "statefulsets" => &[(STS_READY, "Ready")],
        "daemonsets" => &[(DS_DESIRED, "Desired"), (DS_READY, "Ready")],
        "services" => &[(SVC_TYPE, "Type"), (SVC_CLUSTER_IP, "ClusterIP"), (SVC_PORTS, "Ports")],
        "jobs" => &[(JOB_COMPLETIONS, "Completions")],
        "cronjobs" => &[(CJ_SCHEDULE, "Schedule"), (CJ_SUSPEND, "Suspend")],
        "persistentvolumeclaims" => &[(PVC_STATUS, "Status"), (PVC_CAPACITY, "Capacity")],
        "nodes" => &[(NODE_STATUS, "Status"), (NODE_ROLES, "Roles"), (NODE_VERSION, "Version")],
        "namespaces" => &[(NS_STATUS, "Status")],
        _ => &[],
    };
    cols.extend(extra.iter().map(|(id, label)| col(ColumnKind::Projected(*id), label)));
    cols.push(col(ColumnKind::Age, "Age"));
    cols.push(col(ColumnKind::Labels, "Labels"));
    cols
}

fn scalar(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn u64_at(raw: &serde_json::Value, ptr: &str) -> u64 {
    raw.pointer(ptr).and_then(|v| v.as_u64()).unwrap_or(0)
}

/// Project the columns of `kind` out of a raw object.
pub fn project(kind: &str, raw: &serde_json::Value) -> SmallVec<[(u32, String); 8]> {
    let mut out: SmallVec<[(u32, String); 8]> = POINTER_FIELDS
        .iter()
        .filter(|(k, _, _)| *k == kind)
        .filter_map(|(_, id, ptr)| raw.pointer(ptr).and_then(scalar).map(|v| (*id, v)))
        .collect();
    match kind {
        "pods" => {
            let statuses = raw.pointer("/status/containerStatuses").and_then(|v| v.as_array());
            let total = statuses.map(|s| s.len()).unwrap_or(0);
            let ready = statuses
                .map(|s| s.iter().filter(|c| c.get("ready").and_then(|v| v.as_bool()).unwrap_or(false)).count())
                .unwrap_or(0);
            let restarts: u64 = statuses
                .map(|s| s.iter().filter_map(|c| c.get("restartCount").and_then(|v| v.as_u64())).sum())
                .unwrap_or(0);
            out.push((POD_READY, format!("{}/{}", ready, total)));
            out.push((POD_RESTARTS, restarts.to_string()));
            // A reason (Evicted, NodeLost) says more than the phase
            if let Some(reason) = raw.pointer("/status/reason").and_then(scalar) {
                out.retain(|(id, _)| *id != POD_STATUS);
                out.push((POD_STATUS, reason));
            }
        }
        "deployments" => {
            let replicas = u64_at(raw, "/status/replicas");
            out.push((DEP_READY, format!("{}/{}", u64_at(raw, "/status/readyReplicas"), replicas)));
            out.push((DEP_AVAILABLE, u64_at(raw, "/status/availableReplicas").to_string()));
        }
        "statefulsets" => {
            let replicas = u64_at(raw, "/status/replicas");
            out.push((STS_READY, format!("{}/{}", u64_at(raw, "/status/readyReplicas"), replicas)));
        }
        "jobs" => {
            let desired = raw.pointer("/spec/completions").and_then(|v| v.as_u64()).unwrap_or(1);
            out.push((JOB_COMPLETIONS, format!("{}/{}", u64_at(raw, "/status/succeeded"), desired)));
        }
        "services" => {
            if let Some(ports) = raw.pointer("/spec/ports").and_then(|v| v.as_array()) {
                let v: Vec<String> = ports
                    .iter()
                    .take(4)
                    .map(|p| {
                        let port = p.get("port").and_then(|v| v.as_u64()).unwrap_or(0);
                        let proto = p.get("protocol").and_then(|v| v.as_str()).unwrap_or("TCP");
                        format!("{}/{}", port, proto)
                    })
                    .collect();
                if !v.is_empty() {
                    out.push((SVC_PORTS, v.join(",")));
                }
            }
        }
        "nodes" => {
            let ready = raw
                .pointer("/status/conditions")
                .and_then(|v| v.as_array())
                .and_then(|conds| conds.iter().find(|c| c.get("type").and_then(|v| v.as_str()) == Some("Ready")))
                .map(|c| c.get("status").and_then(|v| v.as_str()) == Some("True"));
            let status = match ready {
                Some(true) => "Ready",
                Some(false) => "NotReady",
                None => "Unknown",
            };
            out.push((NODE_STATUS, status.to_string()));
            let mut roles: Vec<&str> = raw
                .pointer("/metadata/labels")
                .and_then(|v| v.as_object())
                .map(|l| l.keys().filter_map(|k| k.strip_prefix("node-role.kubernetes.io/")).collect())
                .unwrap_or_default();
            roles.sort_unstable();
            let roles = if roles.is_empty() { "none".to_string() } else { roles.join(",") };
            out.push((NODE_ROLES, roles));
        }
        _ => {}
    }
    out
}
