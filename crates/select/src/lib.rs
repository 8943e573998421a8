//! kubefzf selector: hands candidates to `fzf` and reads back the picked line.

#![forbid(unsafe_code)]

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// What the user did in the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Picked(String),
    /// Aborted, or the query matched nothing.
    Nothing,
}

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("cannot start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("selector io: {0}")]
    Io(#[from] std::io::Error),
    #[error("{program} exited with {status}")]
    Failed { program: String, status: std::process::ExitStatus },
}

/// Interactive selection over line-oriented input.
#[async_trait::async_trait]
pub trait Selector: Send + Sync {
    async fn select(&self, input: &str, query: &str) -> Result<Selection, SelectError>;
}

/// fzf exit codes meaning "nothing chosen": no match, interrupted (Ctrl-C/Esc).
const FZF_NO_MATCH: i32 = 1;
const FZF_INTERRUPTED: i32 = 130;

const FZF_DEFAULT_ARGS: &[&str] = &[
    "--header-lines=1",
    "--layout=reverse",
    "--exact",
    "--no-hscroll",
    "--no-sort",
    "--cycle",
    "--select-1",
];

/// Runs fzf (or a compatible binary) as a child process. Candidates go to its
/// stdin, the choice comes back on stdout; fzf draws its UI on the terminal.
#[derive(Debug, Clone)]
pub struct FzfSelector {
    program: String,
    args: Vec<String>,
    pass_query: bool,
}

impl FzfSelector {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: FZF_DEFAULT_ARGS.iter().map(|s| s.to_string()).collect(), pass_query: true }
    }

    /// A selector command used verbatim: no fzf options, no `--query`.
    pub fn raw(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args, pass_query: false }
    }

    pub fn with_extra_args(mut self, extra: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(extra);
        self
    }

    pub fn command_args(&self, query: &str) -> Vec<String> {
        let mut args = self.args.clone();
        if self.pass_query {
            args.push("--query".to_string());
            args.push(query.to_string());
        }
        args
    }
}

#[async_trait::async_trait]
impl Selector for FzfSelector {
    async fn select(&self, input: &str, query: &str) -> Result<Selection, SelectError> {
        let args = self.command_args(query);
        debug!(program = %self.program, ?args, lines = input.lines().count(), "starting selector");
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SelectError::Spawn { program: self.program.clone(), source })?;

        if let Some(mut stdin) = child.stdin.take() {
            // --select-1 may exit before reading everything
            match stdin.write_all(input.as_bytes()).await {
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                other => other?,
            }
            drop(stdin);
        }

        let out = child.wait_with_output().await?;
        match out.status.code() {
            Some(0) => {
                let picked = String::from_utf8_lossy(&out.stdout);
                match picked.lines().next().map(str::trim_end).filter(|l| !l.is_empty()) {
                    Some(line) => Ok(Selection::Picked(line.to_string())),
                    None => Ok(Selection::Nothing),
                }
            }
            Some(FZF_NO_MATCH) | Some(FZF_INTERRUPTED) => {
                info!(status = %out.status, "nothing selected");
                Ok(Selection::Nothing)
            }
            _ => Err(SelectError::Failed { program: self.program.clone(), status: out.status }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fzf_args_carry_query_last() {
        let s = FzfSelector::new("fzf").with_extra_args(vec!["--height=40%".to_string()]);
        let args = s.command_args("web");
        assert_eq!(args.first().map(String::as_str), Some("--header-lines=1"));
        assert_eq!(&args[args.len() - 3..], &["--height=40%", "--query", "web"]);
        assert!(!FzfSelector::raw("sh", vec![]).command_args("web").contains(&"--query".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn picks_line_from_stdout() {
        let s = FzfSelector::raw("sh", vec!["-c".into(), "sed -n 2p".into()]);
        let got = s.select("Name\npod-a\npod-b\n", "").await.unwrap();
        assert_eq!(got, Selection::Picked("pod-a".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn abort_and_no_match_are_nothing() {
        for code in ["1", "130"] {
            let s = FzfSelector::raw("sh", vec!["-c".into(), format!("cat >/dev/null; exit {}", code)]);
            assert_eq!(s.select("x\n", "").await.unwrap(), Selection::Nothing);
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn other_failures_are_errors() {
        let s = FzfSelector::raw("sh", vec!["-c".into(), "cat >/dev/null; exit 2".into()]);
        assert!(matches!(s.select("x\n", "").await, Err(SelectError::Failed { .. })));
        let s = FzfSelector::raw("/nonexistent/fzf-binary", vec![]);
        assert!(matches!(s.select("x\n", "").await, Err(SelectError::Spawn { .. })));
    }
}
