//! External converter invocation.
//!
//! Every converter but the photo scaler is a command-line tool that reads the
//! source path and writes the derived document to stdout. A run succeeds only
//! if the process exits with status zero within the configured timeout; on
//! timeout the child is killed (via `kill_on_drop`) before the error returns,
//! so no orphaned converter keeps running after the request is gone.

use crate::error::ConversionError;
use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Longest stderr excerpt carried in [`ConversionError::ToolFailed`].
const STDERR_EXCERPT: usize = 512;

/// A fully planned tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<OsString>,
    pub envs: Vec<(String, String)>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for a in &self.args {
            line.push(' ');
            line.push_str(&a.to_string_lossy());
        }
        line
    }
}

/// Run `cmd` to completion and return its stdout.
pub async fn run_tool(cmd: &ToolCommand, timeout: Duration) -> Result<Vec<u8>, ConversionError> {
    debug!("Running: {}", cmd.display());

    let child = Command::new(&cmd.program)
        .args(&cmd.args)
        .envs(cmd.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ConversionError::Spawn {
            tool: cmd.program.clone(),
            source,
        })?;

    // Dropping the wait future on timeout drops the child, which kills it.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| ConversionError::Stream {
            tool: cmd.program.clone(),
            source,
        })?,
        Err(_) => {
            warn!(
                "'{}' exceeded {}s, killed",
                cmd.program,
                timeout.as_secs()
            );
            return Err(ConversionError::Timeout {
                tool: cmd.program.clone(),
                secs: timeout.as_secs(),
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = excerpt(stderr.trim(), STDERR_EXCERPT);
        return Err(ConversionError::ToolFailed {
            tool: cmd.program.clone(),
            status: output.status,
            stderr,
        });
    }

    debug!("'{}' produced {} bytes", cmd.program, output.stdout.len());
    Ok(output.stdout)
}

fn excerpt(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn captures_stdout() {
        let out = run_tool(&sh("printf 'hello'"), Duration::from_secs(5))
            .await
            .expect("sh runs");
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn passes_environment() {
        let cmd = sh("printf \"$SOURCE_DATE_EPOCH\"").env("SOURCE_DATE_EPOCH", "1700000000");
        let out = run_tool(&cmd, Duration::from_secs(5)).await.expect("sh runs");
        assert_eq!(out, b"1700000000");
    }

    #[tokio::test]
    async fn non_zero_exit_is_tool_failure() {
        let err = run_tool(&sh("echo broken >&2; exit 3"), Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            ConversionError::ToolFailed { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_tool_times_out_and_is_killed() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("finished");
        let script = format!("sleep 1; touch '{}'", marker.display());

        let err = run_tool(&sh(&script), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::Timeout { .. }), "got {err:?}");

        // A surviving child would create the marker after its sleep.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "converter kept running after the timeout");
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let cmd = ToolCommand::new("definitely-not-a-real-converter-binary");
        let err = run_tool(&cmd, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, ConversionError::Spawn { .. }), "got {err:?}");
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let s = "ééééé";
        let cut = excerpt(s, 3);
        assert!(cut.ends_with('…'));
        assert!(cut.starts_with('é'));
    }
}
