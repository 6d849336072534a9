use crate::git_info::GitInfo;
use anyhow::{Result, anyhow};
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use tracing::instrument;

/// Thin, cwd-explicit wrapper around the `git` binary.
///
/// No method here ever relies on the process's current working directory:
/// every invocation takes `repository_path` and passes it to `Command::current_dir`,
/// per the global-process-state design note (a replay worker must be able to run
/// concurrently with anything else on the machine without `chdir`-ing the process).
#[derive(Clone, Debug)]
pub struct GitCommandExecutor {
  info: Arc<Mutex<Option<GitInfo>>>,
}

impl Default for GitCommandExecutor {
  fn default() -> Self {
    Self::new()
  }
}

impl GitCommandExecutor {
  #[must_use]
  pub fn new() -> Self {
    Self { info: Arc::new(Mutex::new(None)) }
  }

  #[instrument(skip(self))]
  pub fn get_info(&self) -> Result<GitInfo> {
    let mut guard = self.info.lock().map_err(|e| anyhow!("Failed to acquire lock: {}", e))?;
    if guard.is_none() {
      let info = GitInfo::discover().map_err(|e| anyhow!(e))?;
      info.validate_minimum_version().map_err(|e| anyhow!(e))?;
      tracing::info!(git_version = %info.version, git_path = %info.path, "discovered git info");
      *guard = Some(info);
    }

    guard.as_ref().ok_or_else(|| anyhow!("Git info should be initialized")).cloned()
  }

  fn validate_path(repository_path: &str) -> Result<()> {
    if repository_path.is_empty() {
      Err(anyhow!("repository path cannot be blank"))
    } else {
      Ok(())
    }
  }

  fn handle_error<T>(&self, output: &std::process::Output, args: &[&str]) -> Result<T> {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    tracing::Span::current().record("success", false);
    tracing::error!(stderr = %stderr, "git command failed");
    let git_info = self.get_info()?;
    Err(anyhow!("git command failed: {} {}\nError: {stderr}", git_info.path, args.join(" ")))
  }

  fn handle_success(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    tracing::Span::current().record("success", true);
    stdout
  }

  fn execute_command_internal(&self, args: &[&str], repository_path: &str) -> Result<std::process::Output> {
    Self::validate_path(repository_path)?;
    let git_info = self.get_info()?;

    Command::new(&git_info.path)
      .args(args)
      .current_dir(repository_path)
      .output()
      .map_err(|e| anyhow!("Failed to execute git command: {e}"))
  }

  /// Run a git command, returning trimmed stdout on success.
  #[instrument(
    skip(self),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command(&self, args: &[&str], repository_path: &str) -> Result<String> {
    let output = self.execute_command_internal(args, repository_path)?;

    if output.status.success() {
      Ok(Self::handle_success(&output))
    } else {
      self.handle_error(&output, args)
    }
  }

  /// Run a git command and return raw untrimmed stdout. Needed for commands
  /// where exact formatting matters, such as `status --porcelain`.
  #[instrument(
    skip(self),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command_raw(&self, args: &[&str], repository_path: &str) -> Result<String> {
    let output = self.execute_command_internal(args, repository_path)?;

    if output.status.success() {
      let stdout = String::from_utf8_lossy(&output.stdout).to_string();
      tracing::Span::current().record("success", true);
      Ok(stdout)
    } else {
      self.handle_error(&output, args)
    }
  }

  /// Run a git command and report success together with the exit code, instead
  /// of treating a nonzero exit as an error. Used for commands whose failure is
  /// an expected outcome to branch on (e.g. a cherry-pick that conflicts).
  #[instrument(
    skip(self),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command_with_status(&self, args: &[&str], repository_path: &str) -> Result<(String, String, i32)> {
    let output = self.execute_command_internal(args, repository_path)?;
    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    tracing::Span::current().record("success", output.status.success());
    Ok((stdout, stderr, exit_code))
  }

  /// Run a git command with `input` piped to stdin. Used to feed `commit-tree`
  /// a commit message without ever touching argv or a shell.
  #[instrument(
    skip(self, input),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      input_length = input.len(),
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command_with_input(&self, args: &[&str], repository_path: &str, input: &[u8]) -> Result<String> {
    self.execute_command_with_env_and_input(args, repository_path, &[], input)
  }

  /// Run a git command with extra environment variables set (e.g. `GIT_AUTHOR_*`).
  #[instrument(
    skip(self),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command_with_env(&self, args: &[&str], repository_path: &str, env_vars: &[(&str, &str)]) -> Result<String> {
    self.execute_command_with_env_and_input(args, repository_path, env_vars, b"")
  }

  /// Run a git command with both extra environment variables and piped stdin.
  /// `commit-tree <tree> -p <parent> <stdin=message>` needs both at once:
  /// the author/committer overrides as env vars, the message on stdin.
  #[instrument(
    skip(self, input),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      input_length = input.len(),
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command_with_env_and_input(&self, args: &[&str], repository_path: &str, env_vars: &[(&str, &str)], input: &[u8]) -> Result<String> {
    Self::validate_path(repository_path)?;
    let git_info = self.get_info()?;

    let mut cmd = Command::new(&git_info.path);
    cmd.args(args).current_dir(repository_path).stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());
    for (key, value) in env_vars {
      cmd.env(key, value);
    }

    let mut child = cmd.spawn().map_err(|e| anyhow!("Failed to spawn git command: {e}"))?;

    if let Some(mut stdin) = child.stdin.take() {
      stdin.write_all(input).map_err(|e| anyhow!("Failed to write to stdin: {e}"))?;
    }

    let output = child.wait_with_output().map_err(|e| anyhow!("Failed to execute git command: {e}"))?;

    if output.status.success() {
      Ok(Self::handle_success(&output))
    } else {
      self.handle_error(&output, args)
    }
  }

  /// Run a git command and return output split into non-empty, trimmed lines.
  #[instrument(
    skip(self),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command_lines(&self, args: &[&str], repository_path: &str) -> Result<Vec<String>> {
    let output = self.execute_command_internal(args, repository_path)?;

    if output.status.success() {
      tracing::Span::current().record("success", true);
      Ok(Self::parse_lines(&output.stdout))
    } else {
      self.handle_error(&output, args)
    }
  }

  /// Run a git command and return raw output bytes, e.g. for a blob that may
  /// not be valid UTF-8.
  #[instrument(
    skip(self),
    fields(
      git_command = args.join(" "),
      repository_path = repository_path,
      success = tracing::field::Empty,
    )
  )]
  pub fn execute_command_bytes(&self, args: &[&str], repository_path: &str) -> Result<Vec<u8>> {
    let output = self.execute_command_internal(args, repository_path)?;

    if output.status.success() {
      tracing::Span::current().record("success", true);
      Ok(output.stdout)
    } else {
      self.handle_error(&output, args)
    }
  }

  pub fn parse_lines(output: &[u8]) -> Vec<String> {
    output
      .split(|&b| b == b'\n')
      .filter_map(|line| {
        let line_str = String::from_utf8_lossy(line);
        let trimmed = line_str.trim();
        if !trimmed.is_empty() { Some(trimmed.to_string()) } else { None }
      })
      .collect()
  }
}
