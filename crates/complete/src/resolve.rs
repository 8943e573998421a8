#![forbid(unsafe_code)]

use kubefzf_core::{resources, CompletionError, FetcherState, Verb};

use crate::parse::{parse_args, Target};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("re-parsing arguments: {0}")]
    Args(#[from] CompletionError),
    #[error("empty selection")]
    Empty,
    #[error("malformed selection line: {0:?}")]
    Malformed(String),
}

/// Turn the line picked in the selector into the text spliced into the shell.
pub fn resolve(verb: Verb, args: &[String], state: &FetcherState, line: &str) -> Result<String, ResolveError> {
    let parsed = parse_args(verb, args)?;
    let mut fields = line.split_whitespace();
    let first = fields.next().ok_or(ResolveError::Empty)?;

    if parsed.target != Target::Resource {
        return Ok(first.to_string());
    }

    let namespaced = parsed
        .resource
        .as_deref()
        .and_then(|r| resources::cache_key(r, state))
        .and_then(|k| state.kind(&k).map(|c| c.namespaced))
        .ok_or_else(|| CompletionError::unknown_resource(parsed.resource.clone().unwrap_or_default()))?;
    if !namespaced {
        return Ok(first.to_string());
    }

    let name = fields.next().ok_or_else(|| ResolveError::Malformed(line.to_string()))?;
    // kubectl needs `-n` when the object lives outside the current namespace
    if parsed.namespace.is_none() && first != "-" && first != state.current_namespace() {
        Ok(format!("{} -n {}", name, first))
    } else {
        Ok(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubefzf_core::ResourceCache;

    fn state() -> FetcherState {
        let mut st = FetcherState { namespace: Some("app".into()), ..Default::default() };
        st.upsert(ResourceCache { kind: "pods".into(), namespaced: true, ..Default::default() });
        st.upsert(ResourceCache { kind: "nodes".into(), namespaced: false, ..Default::default() });
        st
    }

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn same_namespace_gives_bare_name() {
        let out = resolve(Verb::Get, &args(&["po", ""]), &state(), "app  web-1  1/1  Running").unwrap();
        assert_eq!(out, "web-1");
    }

    #[test]
    fn other_namespace_adds_flag() {
        let out = resolve(Verb::Exec, &args(&["-it", ""]), &state(), "kube-system  coredns-1  1/1").unwrap();
        assert_eq!(out, "coredns-1 -n kube-system");
        let out = resolve(Verb::Get, &args(&["-n", "kube-system", "po", ""]), &state(), "kube-system  coredns-1").unwrap();
        assert_eq!(out, "coredns-1");
    }

    #[test]
    fn first_cell_for_everything_else() {
        assert_eq!(resolve(Verb::Get, &args(&["nodes", ""]), &state(), "node-1  Ready").unwrap(), "node-1");
        assert_eq!(resolve(Verb::Get, &args(&["po", "-l", ""]), &state(), "app=web  3").unwrap(), "app=web");
        assert_eq!(resolve(Verb::Get, &args(&["po", "-n", ""]), &state(), "kube-system  Active").unwrap(), "kube-system");
        assert_eq!(resolve(Verb::Get, &args(&[""]), &state(), "pods  3  1m").unwrap(), "pods");
    }

    #[test]
    fn bad_lines() {
        assert_eq!(resolve(Verb::Get, &args(&["po", ""]), &state(), "   "), Err(ResolveError::Empty));
        assert!(matches!(resolve(Verb::Get, &args(&["po", ""]), &state(), "app"), Err(ResolveError::Malformed(_))));
    }
}
