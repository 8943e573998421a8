//! kubefzf core types: verbs, cached objects, fetcher state and the error tags
//! shared by the completion pipeline.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub mod columns;
pub mod resources;

pub use resources::ResourceDef;

pub type Uid = [u8; 16];

/// kubectl verbs the completion helper knows how to complete.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Get,
    Exec,
    Logs,
    Label,
    Describe,
    Delete,
    Annotate,
    Edit,
}

impl Verb {
    pub const ALL: [Verb; 8] = [
        Verb::Get,
        Verb::Exec,
        Verb::Logs,
        Verb::Label,
        Verb::Describe,
        Verb::Delete,
        Verb::Annotate,
        Verb::Edit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Exec => "exec",
            Verb::Logs => "logs",
            Verb::Label => "label",
            Verb::Describe => "describe",
            Verb::Delete => "delete",
            Verb::Annotate => "annotate",
            Verb::Edit => "edit",
        }
    }

    /// Verbs that always operate on pods, whatever the positional arguments say.
    pub fn implies_pods(&self) -> bool {
        matches!(self, Verb::Exec | Verb::Logs)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported verb: {0}")]
pub struct UnknownVerb(pub String);

impl FromStr for Verb {
    type Err = UnknownVerb;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVerb(s.to_string()))
    }
}

/// Shaped object kept in the cache: just enough to list, filter and resolve.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiteObj {
    pub uid: Uid,
    pub namespace: Option<String>,
    pub name: String,
    pub creation_ts: i64,
    /// Kind-specific columns, keyed by the ids in [`columns`].
    pub projected: SmallVec<[(u32, String); 8]>,
    /// Kubernetes labels as key/value pairs.
    pub labels: SmallVec<[(String, String); 8]>,
}

impl LiteObj {
    pub fn projected(&self, id: u32) -> Option<&str> {
        self.projected.iter().find(|(k, _)| *k == id).map(|(_, v)| v.as_str())
    }
}

/// One cached resource kind plus its bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResourceCache {
    /// Canonical plural name, e.g. `pods` or `certificates.cert-manager.io`.
    pub kind: String,
    pub namespaced: bool,
    pub items: Vec<LiteObj>,
    /// List resourceVersion the items were taken at.
    pub resource_version: Option<String>,
    /// Seconds since epoch of the last fetch/ingest.
    pub fetched_at: i64,
    /// Seconds since epoch of the last completion served from this kind (0 = never).
    pub last_access: i64,
    pub completions: u64,
}

impl ResourceCache {
    /// Record that a completion was served from this kind.
    pub fn touch(&mut self, now: i64) {
        self.last_access = now;
        self.completions = self.completions.saturating_add(1);
    }
}

/// Persisted snapshot of everything the completion pipeline knows about the cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FetcherState {
    /// kubeconfig context the cache was taken from.
    pub context: Option<String>,
    /// Namespace of that context; `default` when unset.
    pub namespace: Option<String>,
    pub kinds: BTreeMap<String, ResourceCache>,
}

impl FetcherState {
    pub fn current_namespace(&self) -> &str {
        self.namespace.as_deref().filter(|ns| !ns.is_empty()).unwrap_or("default")
    }

    pub fn kind(&self, kind: &str) -> Option<&ResourceCache> {
        self.kinds.get(kind)
    }

    pub fn kind_mut(&mut self, kind: &str) -> Option<&mut ResourceCache> {
        self.kinds.get_mut(kind)
    }

    /// Replace a cached kind wholesale, keeping its access counters.
    pub fn upsert(&mut self, mut cache: ResourceCache) {
        if let Some(prev) = self.kinds.get(&cache.kind) {
            cache.last_access = prev.last_access;
            cache.completions = prev.completions;
        }
        self.kinds.insert(cache.kind.clone(), cache);
    }
}

/// Closed set of reasons the completion generator can fail.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompletionErrorKind {
    /// The arguments name a resource kind with no cache.
    UnknownResource,
    /// The in-progress token is the value of a flag we cannot complete.
    UnmanagedFlag,
    Other,
}

impl CompletionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionErrorKind::UnknownResource => "unknown_resource",
            CompletionErrorKind::UnmanagedFlag => "unmanaged_flag",
            CompletionErrorKind::Other => "other",
        }
    }
}

/// Tagged completion failure; callers branch on `kind`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CompletionError {
    pub kind: CompletionErrorKind,
    pub message: String,
}

impl CompletionError {
    pub fn unknown_resource(name: impl Into<String>) -> Self {
        Self { kind: CompletionErrorKind::UnknownResource, message: name.into() }
    }

    pub fn unmanaged_flag(flag: impl Into<String>) -> Self {
        Self { kind: CompletionErrorKind::UnmanagedFlag, message: flag.into() }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self { kind: CompletionErrorKind::Other, message: message.into() }
    }
}

/// Process exit codes; the contract with the shell integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitSignal {
    Success,
    /// Pipeline ran but produced no candidates.
    NoCompletion,
    /// State, resource, flag or generation error; reported as a warning.
    Handled,
    /// Selector or resolver failure.
    Fatal,
}

impl ExitSignal {
    pub fn code(&self) -> u8 {
        match self {
            ExitSignal::Success => 0,
            ExitSignal::Fatal => 1,
            ExitSignal::NoCompletion => 5,
            ExitSignal::Handled => 6,
        }
    }
}

pub mod prelude {
    pub use super::{
        CompletionError, CompletionErrorKind, ExitSignal, FetcherState, LiteObj, ResourceCache, Uid, Verb,
    };
}
