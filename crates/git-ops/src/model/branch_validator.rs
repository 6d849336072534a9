//! Branch-name Validator (§4.F): rejects names git itself would refuse, plus
//! the handful of cases `check-ref-format` alone lets through (empty,
//! whitespace).

use crate::error::ModelError;
use crate::repo::Repository;

/// Validates `name` as a future branch name. Delegates the bulk of the rule
/// set to `git check-ref-format refs/tags/<name>` rather than reimplementing
/// it. `refs/tags/` rather than `refs/heads/` because the latter additionally
/// rejects a lone `@`, which git happily accepts as a branch name.
pub fn validate_branch_name(repo: &Repository, name: &str) -> Result<(), ModelError> {
  if name.is_empty() {
    return Err(ModelError::InvalidRefName { name: name.to_string(), reason: "must not be empty".to_string() });
  }
  if name.chars().any(char::is_whitespace) {
    return Err(ModelError::InvalidRefName { name: name.to_string(), reason: "must not contain whitespace".to_string() });
  }
  let refname = format!("refs/tags/{name}");
  if !repo.check_ref_format(&refname) {
    return Err(ModelError::InvalidRefName { name: name.to_string(), reason: "rejected by git check-ref-format".to_string() });
  }
  Ok(())
}
