//! Raw kubectl arguments → what the in-progress token is asking for.

#![forbid(unsafe_code)]

use kubefzf_core::{CompletionError, Verb};
use serde::Serialize;

/// What is being completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Target {
    /// No resource type typed yet: complete the type itself.
    ResourceType,
    /// Object names of the resource type.
    Resource,
    /// Value of `-n/--namespace`.
    Namespace,
    /// Value of `-l/--selector`.
    Label,
    /// Value of `--field-selector`.
    FieldSelector,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedArgs {
    pub target: Target,
    /// Resource type as typed (`po`, `deploy`), `pods` for exec/logs.
    pub resource: Option<String>,
    /// Explicit namespace from `-n/--namespace`.
    pub namespace: Option<String>,
    pub all_namespaces: bool,
    /// The in-progress token (flag value part for `--flag=value`).
    pub query: String,
}

const NAMESPACE_FLAGS: &[&str] = &["-n", "--namespace"];
const SELECTOR_FLAGS: &[&str] = &["-l", "--selector"];
const FIELD_SELECTOR_FLAGS: &[&str] = &["--field-selector"];
const ALL_NAMESPACES_FLAGS: &[&str] = &["-A", "--all-namespaces"];

/// kubectl flags that take a value we have no completion for.
const UNMANAGED_VALUE_FLAGS: &[&str] = &[
    "-o", "--output",
    "-c", "--container",
    "-f", "--filename",
    "-k", "--kustomize",
    "-L", "--label-columns",
    "-p", "--pod-running-timeout",
    "-s", "--server",
    "--as", "--as-group", "--cache-dir", "--certificate-authority", "--chunk-size",
    "--client-certificate", "--client-key", "--cluster", "--context", "--field-manager",
    "--grace-period", "--kubeconfig", "--limit-bytes", "--max-log-requests",
    "--output-watch-events", "--request-timeout", "--resource-version", "--since",
    "--since-time", "--sort-by", "--subresource", "--tail", "--template", "--timeout",
    "--tls-server-name", "--token", "--user",
];

/// `kubectl logs -f/-p` are `--follow/--previous`, not `--filename/--pod-running-timeout`.
const LOGS_SWITCHES: &[&str] = &["-f", "-p"];

fn takes_value(verb: Verb, flag: &str) -> bool {
    if verb == Verb::Logs && LOGS_SWITCHES.contains(&flag) {
        return false;
    }
    NAMESPACE_FLAGS.contains(&flag)
        || SELECTOR_FLAGS.contains(&flag)
        || FIELD_SELECTOR_FLAGS.contains(&flag)
        || UNMANAGED_VALUE_FLAGS.contains(&flag)
}

fn flag_target(flag: &str) -> Option<Target> {
    if NAMESPACE_FLAGS.contains(&flag) {
        Some(Target::Namespace)
    } else if SELECTOR_FLAGS.contains(&flag) {
        Some(Target::Label)
    } else if FIELD_SELECTOR_FLAGS.contains(&flag) {
        Some(Target::FieldSelector)
    } else {
        None
    }
}

/// Walk the raw arguments exactly as the shell passed them. The last one is
/// the token being completed; everything before it is already typed.
pub fn parse_args(verb: Verb, args: &[String]) -> Result<ParsedArgs, CompletionError> {
    let (last, done) = match args.split_last() {
        Some((last, done)) => (last.as_str(), done),
        None => ("", &[][..]),
    };

    let mut positionals: Vec<&str> = Vec::new();
    let mut namespace: Option<String> = None;
    let mut all_namespaces = false;
    let mut pending: Option<&str> = None;

    for arg in done {
        if let Some(flag) = pending.take() {
            if NAMESPACE_FLAGS.contains(&flag) {
                namespace = Some(arg.clone());
            }
            continue;
        }
        if arg == "--" {
            return Err(CompletionError::other("nothing to complete after `--`"));
        }
        if arg.len() > 1 && arg.starts_with('-') {
            let (name, inline) = match arg.split_once('=') {
                Some((n, v)) => (n, Some(v)),
                None => (arg.as_str(), None),
            };
            if ALL_NAMESPACES_FLAGS.contains(&name) {
                all_namespaces = true;
            } else if takes_value(verb, name) {
                match inline {
                    Some(v) if NAMESPACE_FLAGS.contains(&name) => namespace = Some(v.to_string()),
                    Some(_) => {}
                    None => pending = Some(name),
                }
            }
            // any other flag is a boolean switch
            continue;
        }
        positionals.push(arg.as_str());
    }

    // The token being completed is a flag value, either `-n <tok>` or `--namespace=<tok>`
    let flag_value = match pending {
        Some(flag) => Some((flag, last)),
        None if last.starts_with('-') => match last.split_once('=') {
            Some((flag, value)) => Some((flag, value)),
            None => return Err(CompletionError::unmanaged_flag(last)),
        },
        None => None,
    };

    let resource = if verb.implies_pods() {
        Some("pods".to_string())
    } else {
        positionals.first().map(|p| p.split('/').next().unwrap_or(*p).to_string())
    };

    let (target, query) = match flag_value {
        Some((flag, value)) => {
            let target = flag_target(flag).ok_or_else(|| CompletionError::unmanaged_flag(flag))?;
            if matches!(target, Target::Label | Target::FieldSelector) && resource.is_none() {
                return Err(CompletionError::other(format!("{} needs a resource type first", flag)));
            }
            (target, value.to_string())
        }
        None if verb.implies_pods() => {
            if let Some(pod) = positionals.first() {
                return Err(CompletionError::other(format!("pod already given for {}: {}", verb, pod)));
            }
            (Target::Resource, last.to_string())
        }
        None if resource.is_none() => (Target::ResourceType, last.to_string()),
        None => (Target::Resource, last.to_string()),
    };

    Ok(ParsedArgs { target, resource, namespace, all_namespaces, query })
}
