//! Sandboxed runner for `FILE_ACTION: RUN` commands.
//!
//! No shell is involved: the line is split on whitespace, the program must
//! be on the allow-list, and the child runs in the project root with a
//! cleared environment.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::BackendError;

const MAX_OUTPUT: usize = 8000;

/// Allow-listed command execution inside one project directory.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    root: PathBuf,
    allowed: Vec<String>,
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(root: &Path, allowed: Vec<String>, timeout: Duration) -> Self {
        Self {
            root: root.to_path_buf(),
            allowed,
            timeout,
        }
    }

    /// Run `line` and return its combined, truncated output.
    pub async fn run(&self, line: &str) -> Result<String, BackendError> {
        let mut parts = line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| BackendError::Refused("empty command".into()))?;
        if !self.allowed.iter().any(|a| a == program) {
            return Err(BackendError::Refused(format!("{program} is not on the allow-list")));
        }

        tracing::info!(command = line, cwd = %self.root.display(), "Running command");
        let mut cmd = Command::new(program);
        cmd.args(parts)
            .current_dir(&self.root)
            .env_clear()
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            cmd.env("PATH", path);
        }

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| BackendError::Timeout(self.timeout))?
            .map_err(|e| BackendError::Unavailable(format!("failed to start {program}: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut result = String::new();
        if !stdout.is_empty() {
            result.push_str(&stdout);
        }
        if !stderr.is_empty() {
            if !result.is_empty() {
                result.push('\n');
            }
            result.push_str("[stderr] ");
            result.push_str(&stderr);
        }
        if !output.status.success() {
            result.push_str(&format!("\n[exit code: {}]", output.status.code().unwrap_or(-1)));
        }

        if result.len() > MAX_OUTPUT {
            let mut cut = MAX_OUTPUT;
            while !result.is_char_boundary(cut) {
                cut -= 1;
            }
            result.truncate(cut);
            result.push_str("\n... (truncated)");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(dir: &Path, allowed: &[&str]) -> CommandRunner {
        CommandRunner::new(
            dir,
            allowed.iter().map(|s| s.to_string()).collect(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn refuses_unlisted_programs() {
        let dir = tempfile::tempdir().unwrap();
        let err = runner(dir.path(), &["ls"]).run("rm -rf /").await.unwrap_err();
        assert!(matches!(err, BackendError::Refused(_)));
        let err = runner(dir.path(), &["ls"]).run("   ").await.unwrap_err();
        assert!(matches!(err, BackendError::Refused(_)));
    }

    #[tokio::test]
    async fn runs_in_project_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        let out = runner(dir.path(), &["ls"]).run("ls").await.unwrap();
        assert!(out.contains("index.html"));
    }

    #[tokio::test]
    async fn no_shell_expansion() {
        let dir = tempfile::tempdir().unwrap();
        let out = runner(dir.path(), &["echo"]).run("echo $HOME; ls").await.unwrap();
        assert_eq!(out.trim(), "$HOME; ls");
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CommandRunner::new(dir.path(), vec!["sleep".into()], Duration::from_millis(100));
        let started = std::time::Instant::now();
        let err = runner.run("sleep 5").await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout(d) if d == Duration::from_millis(100)));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn failure_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let out = runner(dir.path(), &["ls"]).run("ls missing-file").await.unwrap();
        assert!(out.contains("[stderr]"));
        assert!(out.contains("[exit code:"));
    }
}
