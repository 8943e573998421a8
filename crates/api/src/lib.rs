//! kubefzf completion pipeline.
//!
//! One process invocation runs one linear pass:
//! load state → generate → save state → empty check → select → resolve → emit.
//! Every stage can end the run; the caller turns the outcome into an exit code.
//! Collaborators sit behind traits so frontends and tests can swap them.

#![forbid(unsafe_code)]

use std::io::Write;
use std::time::Instant;

use kubefzf_complete::{CompletionResultSet, ResolveError};
use kubefzf_core::{CompletionError, CompletionErrorKind, ExitSignal, FetcherState, Verb};
use metrics::{counter, histogram};
use tracing::{debug, error, info, warn};

pub use kubefzf_persist::{KindStats, StateError, StateStore};
pub use kubefzf_select::{SelectError, Selection, Selector};

mod stats;

pub use stats::render_stats;

/// Immutable (verb, raw args) pair as handed over by the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub verb: Verb,
    pub args: Vec<String>,
}

impl CompletionRequest {
    pub fn new(verb: Verb, args: Vec<String>) -> Self {
        Self { verb, args }
    }
}

pub trait CompletionGenerator {
    fn generate(&self, verb: Verb, args: &[String], state: &mut FetcherState) -> Result<CompletionResultSet, CompletionError>;
}

pub trait OutputFormatter {
    fn format(&self, set: &CompletionResultSet) -> String;
}

pub trait ResultResolver {
    fn resolve(&self, verb: Verb, args: &[String], state: &FetcherState, line: &str) -> Result<String, ResolveError>;
}

/// The kubectl completer: cache-backed generator, column formatter and resolver.
#[derive(Debug, Clone, Copy)]
pub struct KubectlCompleter {
    clock: fn() -> i64,
}

impl KubectlCompleter {
    pub fn new() -> Self {
        Self { clock: kubefzf_persist::now_ts }
    }

    /// Fixed clock, for reproducible ages.
    pub fn with_clock(clock: fn() -> i64) -> Self {
        Self { clock }
    }
}

impl Default for KubectlCompleter {
    fn default() -> Self { Self::new() }
}

impl CompletionGenerator for KubectlCompleter {
    fn generate(&self, verb: Verb, args: &[String], state: &mut FetcherState) -> Result<CompletionResultSet, CompletionError> {
        kubefzf_complete::generate(verb, args, state, (self.clock)())
    }
}

impl OutputFormatter for KubectlCompleter {
    fn format(&self, set: &CompletionResultSet) -> String {
        kubefzf_complete::format_output(set)
    }
}

impl ResultResolver for KubectlCompleter {
    fn resolve(&self, verb: Verb, args: &[String], state: &FetcherState, line: &str) -> Result<String, ResolveError> {
        kubefzf_complete::resolve(verb, args, state, line)
    }
}

/// How a run that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completed {
    /// Resolved text was written to the output.
    Emitted(String),
    NoCompletion,
    /// The user left the selector without picking anything.
    NothingSelected,
}

impl Completed {
    pub fn exit_signal(&self) -> ExitSignal {
        match self {
            Completed::Emitted(_) | Completed::NothingSelected => ExitSignal::Success,
            Completed::NoCompletion => ExitSignal::NoCompletion,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("loading fetcher state: {0}")]
    StateLoad(#[source] StateError),
    #[error(transparent)]
    Completion(CompletionError),
    #[error("saving fetcher state: {0}")]
    StateSave(#[source] StateError),
    #[error("selector: {0}")]
    Select(#[from] SelectError),
    #[error("resolving selection: {0}")]
    Resolve(#[from] ResolveError),
    #[error("writing output: {0}")]
    Output(#[from] std::io::Error),
}

impl PipelineError {
    pub fn exit_signal(&self) -> ExitSignal {
        match self {
            PipelineError::StateLoad(_) | PipelineError::Completion(_) | PipelineError::StateSave(_) => ExitSignal::Handled,
            PipelineError::Select(_) | PipelineError::Resolve(_) | PipelineError::Output(_) => ExitSignal::Fatal,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            PipelineError::StateLoad(_) => "state_load",
            PipelineError::Completion(e) => e.kind.as_str(),
            PipelineError::StateSave(_) => "state_save",
            PipelineError::Select(_) => "select",
            PipelineError::Resolve(_) => "resolve",
            PipelineError::Output(_) => "output",
        }
    }
}

/// Wires the collaborators for a single completion run.
pub struct CompletionPipeline<'a> {
    pub store: &'a dyn StateStore,
    pub generator: &'a dyn CompletionGenerator,
    pub formatter: &'a dyn OutputFormatter,
    pub selector: &'a dyn Selector,
    pub resolver: &'a dyn ResultResolver,
    /// Pre-fill the selector query with the in-progress token (value part
    /// for `--flag=value`). Off means an empty query.
    pub seed_query: bool,
}

impl<'a> CompletionPipeline<'a> {
    /// Run the stages once. Only the emit stage writes to `out`: the resolved
    /// text, no trailing newline.
    pub async fn complete(&self, req: &CompletionRequest, out: &mut dyn Write) -> Result<Completed, PipelineError> {
        let t0 = Instant::now();
        let mut state = self.store.load().map_err(PipelineError::StateLoad)?;
        debug!(kinds = state.kinds.len(), "state loaded");

        let set = self
            .generator
            .generate(req.verb, &req.args, &mut state)
            .map_err(PipelineError::Completion)?;
        histogram!("completion_candidates", set.candidates.len() as f64);

        // Persist before anything is shown so a killed selector cannot lose the refresh
        self.store.save(&state).map_err(PipelineError::StateSave)?;

        if set.candidates.is_empty() {
            return Ok(Completed::NoCompletion);
        }

        let text = self.formatter.format(&set);
        let query = if self.seed_query { set.query.as_str() } else { "" };
        let line = match self.selector.select(&text, query).await? {
            Selection::Picked(line) => line,
            Selection::Nothing => return Ok(Completed::NothingSelected),
        };

        let resolved = self.resolver.resolve(req.verb, &req.args, &state, &line)?;
        write!(out, "{}", resolved)?;
        out.flush()?;
        info!(verb = %req.verb, took_ms = %t0.elapsed().as_millis(), "completion emitted");
        Ok(Completed::Emitted(resolved))
    }

    /// `complete` plus reporting: warnings for handled errors, errors for fatal
    /// ones, all on the log channel. Returns the process exit signal.
    pub async fn run(&self, req: &CompletionRequest, out: &mut dyn Write) -> ExitSignal {
        let (outcome, signal) = match self.complete(req, out).await {
            Ok(done) => {
                if done == Completed::NoCompletion {
                    warn!(verb = %req.verb, "No completion found");
                }
                let outcome = match done {
                    Completed::Emitted(_) => "emitted",
                    Completed::NoCompletion => "no_completion",
                    Completed::NothingSelected => "nothing_selected",
                };
                (outcome, done.exit_signal())
            }
            Err(e) => {
                report(req, &e);
                (e.label(), e.exit_signal())
            }
        };
        counter!("completion_outcome_total", 1u64, "outcome" => outcome);
        signal
    }
}

fn report(req: &CompletionRequest, e: &PipelineError) {
    match e {
        PipelineError::Completion(c) => match c.kind {
            CompletionErrorKind::UnknownResource => warn!(verb = %req.verb, "Unknown resource type: {}", c.message),
            CompletionErrorKind::UnmanagedFlag => warn!(verb = %req.verb, "Unmanaged flag: {}", c.message),
            CompletionErrorKind::Other => warn!(verb = %req.verb, args = ?req.args, "Error during completion: {}", c.message),
        },
        PipelineError::StateLoad(_) | PipelineError::StateSave(_) => warn!(error = %e, "fetcher state unavailable"),
        _ => error!(verb = %req.verb, error = %e, "completion failed"),
    }
}
