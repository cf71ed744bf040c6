//! Blocking subprocess execution for external media tools.
//!
//! Handlers run on their job's dedicated worker thread, so blocking here
//! is confined to that job and never stalls the ledger, the progress
//! channel, or other jobs.

use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};

use crate::executor::cancel::CancelToken;

use super::ToolError;

/// How many trailing stderr lines are kept for error summaries.
const STDERR_TAIL_LINES: usize = 12;
/// Upper bound on the stderr summary carried in an error message.
const STDERR_SUMMARY_CHARS: usize = 500;

/// Collapses captured stderr into a short, single summary string.
fn summarize_stderr(lines: &[String]) -> String {
    let mut summary = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" | ");
    if summary.len() > STDERR_SUMMARY_CHARS {
        summary.truncate(STDERR_SUMMARY_CHARS);
        summary.push('…');
    }
    if summary.is_empty() {
        summary.push_str("no diagnostic output");
    }
    summary
}

/// Runs a tool to completion, feeding each stdout line to `on_line`.
///
/// The cancellation token is checked between lines; when it fires, the
/// child is killed and `ToolError::Interrupted` is returned. A non-zero
/// exit becomes `NonZeroExit` carrying a trimmed stderr summary.
pub fn run_streaming<F>(
    tool: &str,
    mut cmd: Command,
    token: &CancelToken,
    mut on_line: F,
) -> Result<(), ToolError>
where
    F: FnMut(&str),
{
    log::debug!("Running {}: {:?}", tool, cmd);

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ToolError::Spawn {
            tool: tool.to_string(),
            source: e,
        })?;

    // Drain stderr on its own thread so the child never blocks on a full
    // pipe; only a bounded tail is retained.
    let stderr = child.stderr.take();
    let stderr_thread = std::thread::spawn(move || {
        let mut tail: Vec<String> = Vec::new();
        if let Some(stderr) = stderr {
            for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.remove(0);
                }
                tail.push(line);
            }
        }
        tail
    });

    let mut interrupted = false;
    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    log::debug!("{} stdout read error: {}", tool, e);
                    break;
                }
            };

            if token.is_cancelled() {
                log::info!("Cancellation observed, terminating {}", tool);
                if let Err(e) = child.kill() {
                    log::warn!("Failed to kill {}: {}", tool, e);
                }
                interrupted = true;
                break;
            }

            on_line(&line);
        }
    }

    let status = child.wait().map_err(|e| ToolError::Io {
        tool: tool.to_string(),
        source: e,
    })?;
    let stderr_tail = stderr_thread.join().unwrap_or_default();

    if interrupted || token.is_cancelled() {
        return Err(ToolError::Interrupted {
            tool: tool.to_string(),
        });
    }

    if !status.success() {
        return Err(ToolError::NonZeroExit {
            tool: tool.to_string(),
            code: status.code().unwrap_or(-1),
            detail: summarize_stderr(&stderr_tail),
        });
    }

    Ok(())
}

/// Runs a tool to completion and returns its stdout. Used for one-shot
/// queries such as probing.
pub fn run_capture(tool: &str, mut cmd: Command) -> Result<String, ToolError> {
    log::debug!("Running {}: {:?}", tool, cmd);

    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| ToolError::Spawn {
            tool: tool.to_string(),
            source: e,
        })?;

    if !output.status.success() {
        let stderr_lines: Vec<String> = String::from_utf8_lossy(&output.stderr)
            .lines()
            .map(|l| l.to_string())
            .collect();
        return Err(ToolError::NonZeroExit {
            tool: tool.to_string(),
            code: output.status.code().unwrap_or(-1),
            detail: summarize_stderr(&stderr_lines),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Runs a tool with the given text piped to stdin and returns its stdout.
/// Used by the translator, which consumes one line per cue.
pub fn run_with_input(tool: &str, mut cmd: Command, input: &str) -> Result<String, ToolError> {
    log::debug!("Running {} with piped input: {:?}", tool, cmd);

    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ToolError::Spawn {
            tool: tool.to_string(),
            source: e,
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .map_err(|e| ToolError::Io {
                tool: tool.to_string(),
                source: e,
            })?;
        // Dropping stdin closes the pipe so the tool sees EOF.
    }

    let output = child.wait_with_output().map_err(|e| ToolError::Io {
        tool: tool.to_string(),
        source: e,
    })?;

    if !output.status.success() {
        let stderr_lines: Vec<String> = String::from_utf8_lossy(&output.stderr)
            .lines()
            .map(|l| l.to_string())
            .collect();
        return Err(ToolError::NonZeroExit {
            tool: tool.to_string(),
            code: output.status.code().unwrap_or(-1),
            detail: summarize_stderr(&stderr_lines),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn test_run_streaming_collects_lines() {
        let token = CancelToken::new();
        let mut lines = Vec::new();
        run_streaming("sh", sh("printf 'one\\ntwo\\n'"), &token, |l| {
            lines.push(l.to_string())
        })
        .unwrap();
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[test]
    fn test_run_streaming_nonzero_exit() {
        let token = CancelToken::new();
        let err = run_streaming(
            "sh",
            sh("echo 'diagnostic detail' >&2; exit 3"),
            &token,
            |_| {},
        )
        .unwrap_err();
        match err {
            ToolError::NonZeroExit { code, detail, .. } => {
                assert_eq!(code, 3);
                assert!(detail.contains("diagnostic detail"));
            }
            other => panic!("expected NonZeroExit, got {:?}", other),
        }
    }

    #[test]
    fn test_run_streaming_cancelled_between_lines() {
        let token = CancelToken::new();
        let token_inner = token.clone();
        let err = run_streaming(
            "sh",
            sh("while true; do echo tick; sleep 0.05; done"),
            &token,
            move |_| token_inner.cancel(),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::Interrupted { .. }));
    }

    #[test]
    fn test_run_streaming_missing_binary() {
        let token = CancelToken::new();
        let err = run_streaming(
            "definitely-not-installed",
            Command::new("definitely-not-installed-tool-xyz"),
            &token,
            |_| {},
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[test]
    fn test_run_capture() {
        let out = run_capture("sh", sh("printf hello")).unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn test_run_capture_failure_summarizes_stderr() {
        let err = run_capture("sh", sh("echo bad thing >&2; exit 1")).unwrap_err();
        match err {
            ToolError::NonZeroExit { detail, .. } => assert!(detail.contains("bad thing")),
            other => panic!("expected NonZeroExit, got {:?}", other),
        }
    }

    #[test]
    fn test_run_with_input_round_trips() {
        let out = run_with_input("sh", sh("cat"), "line one\nline two\n").unwrap();
        assert_eq!(out, "line one\nline two\n");
    }

    #[test]
    fn test_summarize_stderr_truncates() {
        let lines = vec!["x".repeat(1000)];
        let summary = summarize_stderr(&lines);
        assert!(summary.len() <= STDERR_SUMMARY_CHARS + '…'.len_utf8());
    }

    #[test]
    fn test_summarize_stderr_empty() {
        assert_eq!(summarize_stderr(&[]), "no diagnostic output");
    }
}
