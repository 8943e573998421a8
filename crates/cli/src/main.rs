#![forbid(unsafe_code)]

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::{ArgAction, Parser, Subcommand};
use kubefzf_api::{render_stats, CompletionPipeline, CompletionRequest, KubectlCompleter};
use kubefzf_core::{resources, ExitSignal, Verb};
use kubefzf_persist::{default_state_path, now_ts, SqliteStateStore, StateStore};
use kubefzf_select::FzfSelector;
use kubefzf_store::CacheBuilder;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "kubectl-fzf-completion", about = "Interactive kubectl completion backed by a local resource cache")]
struct Cli {
    /// Log filter for stderr output (tracing EnvFilter syntax)
    #[arg(long = "log-level", env = "KUBEFZF_LOG", default_value = "warn")]
    log_level: String,

    /// Fetcher state database (default: ~/.kubectl-fzf/state.db)
    #[arg(long = "state-path", env = "KUBEFZF_STATE_PATH")]
    state_path: Option<PathBuf>,

    /// Selector binary
    #[arg(long = "fzf-bin", env = "KUBEFZF_FZF_BIN", default_value = "fzf")]
    fzf_bin: String,

    /// Extra selector options, whitespace separated
    #[arg(long = "fzf-opts", env = "KUBEFZF_FZF_OPTS", allow_hyphen_values = true)]
    fzf_opts: Option<String>,

    /// Pre-fill the selector query with the word being completed
    #[arg(long = "seed-query", env = "KUBEFZF_SEED_QUERY", action = ArgAction::Set, default_value_t = false)]
    seed_query: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Complete a kubectl command line: pick a candidate and print it
    #[command(name = "k8s_completion", disable_help_flag = true)]
    K8sCompletion {
        #[arg(value_parser = verb_parser())]
        verb: Verb,
        /// Words after the verb as typed, the last one being completed
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Load `kubectl get <kind> -A -o json` output into the cache
    Ingest {
        /// Resource name as kubectl accepts it (pods, po, deploy, ...)
        kind: String,
        /// Read the List from this file instead of stdin
        #[arg(long = "file", short = 'f')]
        file: Option<PathBuf>,
        /// kubeconfig context the List was taken from
        #[arg(long = "context")]
        context: Option<String>,
        /// Namespace completions should treat as current
        #[arg(long = "current-namespace")]
        current_namespace: Option<String>,
        /// Kind is not namespaced (only needed for custom resources)
        #[arg(long = "cluster-scoped", action = ArgAction::SetTrue)]
        cluster_scoped: bool,
    },
    /// Per-kind cache report
    Stats,
    /// Build information
    Version,
}

fn verb_parser() -> impl TypedValueParser<Value = Verb> {
    PossibleValuesParser::new(Verb::ALL.map(|v| v.as_str())).try_map(|s| Verb::from_str(&s))
}

#[derive(Debug, Clone, Copy)]
struct BuildInfo {
    version: &'static str,
    git_commit: Option<&'static str>,
    git_branch: Option<&'static str>,
    build_date: Option<&'static str>,
    rustc: Option<&'static str>,
}

const BUILD_INFO: BuildInfo = BuildInfo {
    version: env!("CARGO_PKG_VERSION"),
    git_commit: option_env!("KUBEFZF_GIT_COMMIT"),
    git_branch: option_env!("KUBEFZF_GIT_BRANCH"),
    build_date: option_env!("KUBEFZF_BUILD_DATE"),
    rustc: option_env!("KUBEFZF_RUSTC_VERSION"),
};

impl BuildInfo {
    fn render(&self) -> String {
        let or_unknown = |v: Option<&str>| v.unwrap_or("unknown").to_string();
        format!(
            "Version: {}\nGit hash: {}\nGit branch: {}\nBuild date: {}\nRust version: {}\n",
            self.version,
            or_unknown(self.git_commit),
            or_unknown(self.git_branch),
            or_unknown(self.build_date),
            or_unknown(self.rustc),
        )
    }
}

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::from_str(level).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    // stdout carries the completion text only
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let state_path = cli.state_path.clone().unwrap_or_else(default_state_path);

    match cli.command {
        Commands::K8sCompletion { verb, args } => {
            let store = SqliteStateStore::open(&state_path);
            let completer = KubectlCompleter::new();
            let extra = cli.fzf_opts.as_deref().unwrap_or("").split_whitespace().map(str::to_string);
            let selector = FzfSelector::new(cli.fzf_bin.clone()).with_extra_args(extra);
            let pipeline = CompletionPipeline {
                store: &store,
                generator: &completer,
                formatter: &completer,
                selector: &selector,
                resolver: &completer,
                seed_query: cli.seed_query,
            };
            let req = CompletionRequest::new(verb, args);
            let mut stdout = std::io::stdout().lock();
            exit(pipeline.run(&req, &mut stdout).await)
        }
        Commands::Ingest { kind, file, context, current_namespace, cluster_scoped } => {
            match ingest(&state_path, &kind, file, context, current_namespace, cluster_scoped) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(error = ?e, "ingest failed");
                    eprintln!("ingest error: {:#}", e);
                    exit(ExitSignal::Fatal)
                }
            }
        }
        Commands::Stats => {
            let store = SqliteStateStore::open(&state_path);
            match store.stats() {
                Ok(stats) => {
                    print!("{}", render_stats(&stats, now_ts()));
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("stats error: {}", e);
                    exit(ExitSignal::Fatal)
                }
            }
        }
        Commands::Version => {
            print!("{}", BUILD_INFO.render());
            ExitCode::SUCCESS
        }
    }
}

fn exit(signal: ExitSignal) -> ExitCode {
    ExitCode::from(signal.code())
}

fn ingest(
    state_path: &Path,
    kind: &str,
    file: Option<PathBuf>,
    context: Option<String>,
    current_namespace: Option<String>,
    cluster_scoped: bool,
) -> Result<()> {
    let raw = match &file {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
            buf
        }
    };
    let list: serde_json::Value = serde_json::from_str(&raw).context("parsing kubectl JSON")?;

    let (key, namespaced) = match resources::lookup(kind) {
        Some(def) => (def.name.to_string(), def.namespaced),
        None => {
            warn!(kind = %kind, "not a built-in kind; caching as custom resource");
            (kind.to_ascii_lowercase(), !cluster_scoped)
        }
    };

    let mut builder = CacheBuilder::new(key.clone(), namespaced);
    builder.apply_list(&list)?;
    if builder.skipped() > 0 {
        warn!(kind = %key, skipped = builder.skipped(), "skipped malformed objects");
    }

    let store = SqliteStateStore::open_or_create(state_path);
    let mut state = store.load()?;
    if context.is_some() {
        state.context = context;
    }
    if current_namespace.is_some() {
        state.namespace = current_namespace;
    }
    let cache = builder.freeze(now_ts());
    let objects = cache.items.len();
    state.upsert(cache);
    store.save(&state)?;
    info!(kind = %key, objects, path = %state_path.display(), "ingested");
    println!("{}: {} objects cached", key, objects);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Cli {
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn completion_args_pass_through() {
        let cli = parse(&["kubectl-fzf-completion", "k8s_completion", "logs", "-n", "kube-system", "-f", ""]);
        match cli.command {
            Commands::K8sCompletion { verb, args } => {
                assert_eq!(verb, Verb::Logs);
                assert_eq!(args, vec!["-n", "kube-system", "-f", ""]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn selector_query_starts_empty() {
        let cli = parse(&["kubectl-fzf-completion", "k8s_completion", "get", "po", ""]);
        assert!(!cli.seed_query);
    }

    #[test]
    fn help_flag_is_a_completion_word() {
        let cli = parse(&["kubectl-fzf-completion", "k8s_completion", "get", "-h"]);
        assert!(matches!(cli.command, Commands::K8sCompletion { args, .. } if args == vec!["-h"]));
    }

    #[test]
    fn unknown_verb_is_rejected() {
        assert!(Cli::try_parse_from(["kubectl-fzf-completion", "k8s_completion", "apply", ""]).is_err());
    }

    #[test]
    fn root_flags() {
        let cli = parse(&["kubectl-fzf-completion", "--fzf-bin", "sk", "--seed-query", "true", "--fzf-opts", "--height=40%", "stats"]);
        assert_eq!(cli.fzf_bin, "sk");
        assert!(cli.seed_query);
        assert_eq!(cli.fzf_opts.as_deref(), Some("--height=40%"));
        assert!(matches!(cli.command, Commands::Stats));
    }

    #[test]
    fn version_lists_build_fields() {
        let text = BUILD_INFO.render();
        for field in ["Version:", "Git hash:", "Git branch:", "Build date:", "Rust version:"] {
            assert!(text.contains(field), "{} missing", field);
        }
    }
}
