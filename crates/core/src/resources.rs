//! Registry of built-in resource kinds and the names kubectl accepts for them.

#![forbid(unsafe_code)]

use crate::FetcherState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDef {
    /// Canonical plural; also the cache key.
    pub name: &'static str,
    pub singular: &'static str,
    pub short: &'static [&'static str],
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    pub namespaced: bool,
}

impl ResourceDef {
    pub fn gvk_key(&self) -> String {
        if self.group.is_empty() {
            format!("{}/{}", self.version, self.kind)
        } else {
            format!("{}/{}/{}", self.group, self.version, self.kind)
        }
    }

    fn matches(&self, name: &str) -> bool {
        if name == self.name || name == self.singular || self.short.contains(&name) {
            return true;
        }
        // `deployments.apps`, `pods.v1` style qualified names
        match name.split_once('.') {
            Some((res, qual)) => {
                (res == self.name || res == self.singular)
                    && (qual == self.group || qual == self.version || qual == format!("{}.{}", self.version, self.group))
            }
            None => false,
        }
    }
}

const fn def(
    name: &'static str,
    singular: &'static str,
    short: &'static [&'static str],
    group: &'static str,
    kind: &'static str,
    namespaced: bool,
) -> ResourceDef {
    ResourceDef { name, singular, short, group, version: "v1", kind, namespaced }
}

pub static BUILTIN: &[ResourceDef] = &[
    def("pods", "pod", &["po"], "", "Pod", true),
    def("services", "service", &["svc"], "", "Service", true),
    def("configmaps", "configmap", &["cm"], "", "ConfigMap", true),
    def("secrets", "secret", &[], "", "Secret", true),
    def("serviceaccounts", "serviceaccount", &["sa"], "", "ServiceAccount", true),
    def("persistentvolumeclaims", "persistentvolumeclaim", &["pvc"], "", "PersistentVolumeClaim", true),
    def("persistentvolumes", "persistentvolume", &["pv"], "", "PersistentVolume", false),
    def("endpoints", "endpoints", &["ep"], "", "Endpoints", true),
    def("events", "event", &["ev"], "", "Event", true),
    def("namespaces", "namespace", &["ns"], "", "Namespace", false),
    def("nodes", "node", &["no"], "", "Node", false),
    def("deployments", "deployment", &["deploy"], "apps", "Deployment", true),
    def("replicasets", "replicaset", &["rs"], "apps", "ReplicaSet", true),
    def("statefulsets", "statefulset", &["sts"], "apps", "StatefulSet", true),
    def("daemonsets", "daemonset", &["ds"], "apps", "DaemonSet", true),
    def("jobs", "job", &[], "batch", "Job", true),
    def("cronjobs", "cronjob", &["cj"], "batch", "CronJob", true),
    def("ingresses", "ingress", &["ing"], "networking.k8s.io", "Ingress", true),
    def("horizontalpodautoscalers", "horizontalpodautoscaler", &["hpa"], "autoscaling", "HorizontalPodAutoscaler", true),
    def("storageclasses", "storageclass", &["sc"], "storage.k8s.io", "StorageClass", false),
];

/// Look up a built-in kind by any name kubectl accepts (case-insensitive).
pub fn lookup(name: &str) -> Option<&'static ResourceDef> {
    let name = name.to_ascii_lowercase();
    BUILTIN.iter().find(|d| d.matches(&name))
}

/// Resolve a user-typed resource name to its cache key: built-ins first, then
/// kinds ingested under their own name (CRDs).
pub fn cache_key(name: &str, state: &FetcherState) -> Option<String> {
    if let Some(d) = lookup(name) {
        return Some(d.name.to_string());
    }
    let lower = name.to_ascii_lowercase();
    state.kinds.contains_key(&lower).then_some(lower)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResourceCache;

    #[test]
    fn aliases_resolve_to_plural() {
        for n in ["po", "pod", "pods", "Pods", "pods.v1"] {
            assert_eq!(lookup(n).map(|d| d.name), Some("pods"), "{}", n);
        }
        assert_eq!(lookup("deploy").map(|d| d.name), Some("deployments"));
        assert_eq!(lookup("deployments.apps").map(|d| d.name), Some("deployments"));
        assert_eq!(lookup("deployments.batch"), None);
        assert_eq!(lookup("widgets"), None);
    }

    #[test]
    fn custom_kinds_come_from_cache() {
        let mut st = FetcherState::default();
        assert_eq!(cache_key("certificates", &st), None);
        st.upsert(ResourceCache { kind: "certificates".into(), namespaced: true, ..Default::default() });
        assert_eq!(cache_key("Certificates", &st).as_deref(), Some("certificates"));
        assert_eq!(cache_key("svc", &st).as_deref(), Some("services"));
    }
}
