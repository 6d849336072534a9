//! Repository Adapter: the only part of this crate allowed to invoke git.
//!
//! Every method takes the repository path explicitly and every subprocess is
//! spawned with that path as `current_dir` — nothing here ever mutates the
//! calling process's working directory.

use crate::commit::{CommitArena, CommitData};
use crate::error::{RepoError, Result};
use git_executor::git_command_executor::GitCommandExecutor;
use tracing::instrument;

const FIELD_SEP: char = '\x1f';
const RECORD_SEP: char = '\x1e';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
  pub name: String,
}

/// Outcome of a no-commit cherry-pick: either the changes were staged cleanly,
/// or git left the index in a conflicted state and reported `stderr`.
#[derive(Debug)]
pub enum CherryPickOutcome {
  Applied,
  Conflict { stderr: String },
}

pub struct Repository {
  executor: GitCommandExecutor,
  path: String,
}

impl Repository {
  pub fn new(executor: GitCommandExecutor, path: impl Into<String>) -> Self {
    Self { executor, path: path.into() }
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  pub fn executor(&self) -> &GitCommandExecutor {
    &self.executor
  }

  /// Fails with `DetachedHead` if HEAD does not point at a branch.
  #[instrument(skip(self))]
  pub fn active_branch(&self) -> Result<Branch> {
    match self.executor.execute_command(&["symbolic-ref", "--short", "HEAD"], &self.path) {
      Ok(name) if !name.trim().is_empty() => Ok(Branch { name: name.trim().to_string() }),
      _ => Err(RepoError::DetachedHead),
    }
  }

  #[instrument(skip(self))]
  pub fn branches(&self) -> Result<Vec<Branch>> {
    let lines = self
      .executor
      .execute_command_lines(&["branch", "--format=%(refname:short)"], &self.path)
      .map_err(RepoError::from)?;
    Ok(lines.into_iter().map(|name| Branch { name }).collect())
  }

  /// The upstream tracking branch configured for `branch`, if any.
  #[instrument(skip(self))]
  pub fn tracking_branch_tip(&self, branch: &str) -> Option<String> {
    let upstream_ref = format!("{branch}@{{u}}");
    self.executor.execute_command(&["rev-parse", &upstream_ref], &self.path).ok().filter(|s| !s.is_empty())
  }

  /// Walk commits reachable from `rev`, topological order, newest first.
  #[instrument(skip(self))]
  pub fn walk(&self, rev: &str) -> Result<CommitArena> {
    let format = format!("%H{FIELD_SEP}%P{FIELD_SEP}%T{FIELD_SEP}%an{FIELD_SEP}%ae{FIELD_SEP}%ad{FIELD_SEP}%cn{FIELD_SEP}%ce{FIELD_SEP}%cd{FIELD_SEP}%B{RECORD_SEP}");
    let format_arg = format!("--format={format}");
    let output = self
      .executor
      .execute_command_raw(&["log", "--topo-order", "--date=raw", &format_arg, rev], &self.path)
      .map_err(RepoError::from)?;

    let mut arena = CommitArena::new();
    // Two passes: first insert every commit with hexsha-keyed parents still
    // unresolved to CommitIds, then resolve once every hexsha is known.
    let mut pending: Vec<(CommitData, Vec<String>)> = Vec::new();

    for record in output.split(RECORD_SEP) {
      let record = record.trim_matches('\n');
      if record.is_empty() {
        continue;
      }
      let fields: Vec<&str> = record.splitn(10, FIELD_SEP).collect();
      if fields.len() < 10 {
        continue;
      }
      let (epoch_a, tz_a) = split_raw_date(fields[5]);
      let (epoch_c, tz_c) = split_raw_date(fields[8]);
      let parent_hexshas: Vec<String> = fields[1].split_whitespace().map(str::to_string).collect();
      let data = CommitData {
        hexsha: fields[0].to_string(),
        parents: Vec::new(),
        children: Vec::new(),
        tree: fields[2].to_string(),
        author_name: fields[3].to_string(),
        author_email: fields[4].to_string(),
        authored_date: epoch_a,
        author_tz: tz_a,
        committer_name: fields[6].to_string(),
        committer_email: fields[7].to_string(),
        committed_date: epoch_c,
        committer_tz: tz_c,
        message: fields[9].trim_start_matches('\n').to_string(),
      };
      pending.push((data, parent_hexshas));
    }

    for (data, _) in &pending {
      arena.push(data.clone());
    }
    // Resolve parent hexshas to ids now that every commit has been inserted.
    for (i, (_, parent_hexshas)) in pending.iter().enumerate() {
      let ids: Vec<_> = parent_hexshas.iter().filter_map(|h| arena.id_of(h)).collect();
      arena.set_parents(crate::commit::CommitId::from_index(i), ids);
    }
    arena.link_children();
    Ok(arena)
  }

  /// Fetch a single commit's fields without walking its ancestry.
  #[instrument(skip(self))]
  pub fn commit(&self, hexsha: &str) -> Result<CommitData> {
    let format = format!("%H{FIELD_SEP}%P{FIELD_SEP}%T{FIELD_SEP}%an{FIELD_SEP}%ae{FIELD_SEP}%ad{FIELD_SEP}%cn{FIELD_SEP}%ce{FIELD_SEP}%cd{FIELD_SEP}%B");
    let format_arg = format!("--format={format}");
    let output = self
      .executor
      .execute_command_raw(&["show", "-s", "--date=raw", &format_arg, hexsha], &self.path)
      .map_err(RepoError::from)?;

    let fields: Vec<&str> = output.trim_end_matches('\n').splitn(10, FIELD_SEP).collect();
    if fields.len() < 10 {
      return Err(RepoError::Generic(anyhow::anyhow!("unexpected `git show` output for {hexsha}")));
    }
    let (epoch_a, tz_a) = split_raw_date(fields[5]);
    let (epoch_c, tz_c) = split_raw_date(fields[8]);
    Ok(CommitData {
      hexsha: fields[0].to_string(),
      parents: Vec::new(),
      children: Vec::new(),
      tree: fields[2].to_string(),
      author_name: fields[3].to_string(),
      author_email: fields[4].to_string(),
      authored_date: epoch_a,
      author_tz: tz_a,
      committer_name: fields[6].to_string(),
      committer_email: fields[7].to_string(),
      committed_date: epoch_c,
      committer_tz: tz_c,
      message: fields[9].to_string(),
    })
  }

  #[instrument(skip(self))]
  pub fn tree_blob(&self, tree: &str, path: &str) -> Result<Vec<u8>> {
    let object = format!("{tree}:{path}");
    self.executor.execute_command_bytes(&["cat-file", "-p", &object], &self.path).map_err(RepoError::from)
  }

  #[instrument(skip(self))]
  pub fn is_dirty(&self) -> Result<bool> {
    let out = self.executor.execute_command_raw(&["status", "--porcelain"], &self.path).map_err(RepoError::from)?;
    Ok(!out.trim().is_empty())
  }

  // ---- plumbing used by the replay engine ----

  #[instrument(skip(self))]
  pub fn checkout_force(&self, sha: &str) -> Result<()> {
    self.executor.execute_command(&["checkout", "-f", sha], &self.path).map_err(RepoError::from)?;
    Ok(())
  }

  #[instrument(skip(self))]
  pub fn checkout_branch(&self, name: &str) -> Result<()> {
    self.executor.execute_command(&["checkout", name], &self.path).map_err(RepoError::from)?;
    Ok(())
  }

  /// `checkout <name>`, surfacing failure as `(false, stderr)` instead of an
  /// error so callers can tell a vanished scratch branch apart from any other
  /// git failure.
  #[instrument(skip(self))]
  pub fn try_checkout_branch(&self, name: &str) -> Result<(bool, String)> {
    let (_, stderr, exit) = self.executor.execute_command_with_status(&["checkout", name], &self.path).map_err(RepoError::from)?;
    Ok((exit == 0, stderr))
  }

  #[instrument(skip(self))]
  pub fn rev_parse(&self, rev: &str) -> Result<String> {
    self.executor.execute_command(&["rev-parse", rev], &self.path).map_err(RepoError::from)
  }

  /// Delegates ref-name syntax validation to git itself rather than
  /// reimplementing `check_ref_format`'s rules.
  #[instrument(skip(self))]
  pub fn check_ref_format(&self, refname: &str) -> bool {
    self.executor.execute_command(&["check-ref-format", refname], &self.path).is_ok()
  }

  #[instrument(skip(self))]
  pub fn checkout_new_branch(&self, sha: &str, branch: &str) -> Result<()> {
    self.executor.execute_command(&["checkout", sha, "-b", branch], &self.path).map_err(RepoError::from)?;
    Ok(())
  }

  /// `cherry-pick -n [-m <mainline>] <sha>`, classifying a failed apply as a
  /// conflict rather than a hard error.
  #[instrument(skip(self))]
  pub fn cherry_pick_no_commit(&self, sha: &str, mainline: Option<u32>) -> Result<CherryPickOutcome> {
    let mainline_str = mainline.map(|m| m.to_string());
    let mut args = vec!["cherry-pick", "-n"];
    if let Some(m) = &mainline_str {
      args.push("-m");
      args.push(m);
    }
    args.push(sha);

    let (_, stderr, exit) = self.executor.execute_command_with_status(&args, &self.path).map_err(RepoError::from)?;
    if exit == 0 {
      Ok(CherryPickOutcome::Applied)
    } else if stderr.contains("error: could not apply") || stderr.contains("after resolving the conflicts") {
      Ok(CherryPickOutcome::Conflict { stderr })
    } else {
      Err(RepoError::Generic(anyhow::anyhow!("cherry-pick -n {sha} failed: {stderr}")))
    }
  }

  #[instrument(skip(self))]
  pub fn write_tree(&self) -> Result<String> {
    self.executor.execute_command(&["write-tree"], &self.path).map_err(RepoError::from)
  }

  /// `commit-tree <tree> -p <parent> ... <message on stdin>` with the given
  /// environment overrides (`GIT_AUTHOR_*`/`GIT_COMMITTER_*`).
  #[instrument(skip(self, message, env))]
  pub fn commit_tree(&self, tree: &str, parents: &[&str], message: &[u8], env: &[(&str, &str)]) -> Result<String> {
    let mut args = vec!["commit-tree", tree];
    for p in parents {
      args.push("-p");
      args.push(p);
    }
    self.executor.execute_command_with_env_and_input(&args, &self.path, env, message).map_err(RepoError::from)
  }

  #[instrument(skip(self))]
  pub fn update_ref(&self, reference: &str, sha: &str) -> Result<()> {
    self.executor.execute_command(&["update-ref", reference, sha], &self.path).map_err(RepoError::from)?;
    Ok(())
  }

  /// Force-replaces `new_name` with the current branch (`branch -M
  /// <new_name>`). Only safe when `new_name` is the very branch being
  /// replaced (the step-4 atomic swap of the scratch branch back onto the
  /// original name) - for an actual rename to a different name use
  /// `move_current_branch`, which refuses to clobber an existing branch.
  #[instrument(skip(self))]
  pub fn rename_current_branch(&self, new_name: &str) -> Result<()> {
    self.executor.execute_command(&["branch", "-M", new_name], &self.path).map_err(RepoError::from)?;
    Ok(())
  }

  /// Renames the *current* branch to `new_name` (`branch -m <new_name>`),
  /// failing instead of clobbering if `new_name` already names another
  /// branch.
  #[instrument(skip(self))]
  pub fn move_current_branch(&self, new_name: &str) -> Result<()> {
    self.executor.execute_command(&["branch", "-m", new_name], &self.path).map_err(RepoError::from)?;
    Ok(())
  }

  #[instrument(skip(self))]
  pub fn delete_branch(&self, name: &str) -> Result<()> {
    self.executor.execute_command(&["branch", "-D", name], &self.path).map_err(RepoError::from)?;
    Ok(())
  }

  #[instrument(skip(self))]
  pub fn branch_exists(&self, name: &str) -> bool {
    let reference = format!("refs/heads/{name}");
    self.executor.execute_command(&["show-ref", "--verify", "--quiet", &reference], &self.path).is_ok()
  }

  #[instrument(skip(self))]
  pub fn reset_hard(&self) -> Result<()> {
    self.executor.execute_command(&["reset", "--hard"], &self.path).map_err(RepoError::from)?;
    Ok(())
  }

  /// `status --porcelain`, returned as raw (untrimmed-per-line) lines so two
  /// letter status prefixes stay aligned at fixed columns.
  #[instrument(skip(self))]
  pub fn status_porcelain(&self) -> Result<Vec<String>> {
    let raw = self.executor.execute_command_raw(&["status", "--porcelain"], &self.path).map_err(RepoError::from)?;
    Ok(raw.lines().map(str::to_string).collect())
  }

  #[instrument(skip(self))]
  pub fn diff(&self, a: &str, b: &str) -> Result<String> {
    self.executor.execute_command(&["diff", "--no-color", a, b], &self.path).map_err(RepoError::from)
  }

  #[instrument(skip(self))]
  pub fn rm(&self, path: &str) -> Result<()> {
    self.executor.execute_command(&["rm", path], &self.path).map_err(RepoError::from)?;
    Ok(())
  }

  #[instrument(skip(self))]
  pub fn add(&self, path: &str) -> Result<()> {
    self.executor.execute_command(&["add", path], &self.path).map_err(RepoError::from)?;
    Ok(())
  }
}

/// `--date=raw` prints `"<epoch> <±HHMM>"`; split it into the two spec fields.
fn split_raw_date(raw: &str) -> (i64, String) {
  let mut parts = raw.split_whitespace();
  let epoch = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
  let tz = parts.next().unwrap_or("+0000").to_string();
  (epoch, tz)
}
