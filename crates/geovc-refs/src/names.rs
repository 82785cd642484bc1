//! Ref name validation following git-style conventions.
//!
//! A valid full ref name is either a top-level name made of uppercase
//! letters and underscores (`HEAD`, `WORK_HEAD`) or a path under `refs/`.
//! Every path:
//! - Must be non-empty
//! - Must not contain whitespace, `~`, `^`, `:`, `?`, `*`, `[`, `\`
//! - Must not contain `..` or `@{`
//! - Must not start or end with `/` or end with `.`
//! - Must not end with `.lock`
//! - Must have non-empty components that do not start with `.`

use crate::error::{RefError, RefResult};
use crate::types::REFS_PREFIX;

/// Characters that are forbidden anywhere in a ref name.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a full ref name such as `refs/heads/master` or `HEAD`.
///
/// # Examples
///
/// ```
/// use geovc_refs::names::validate_ref_name;
///
/// assert!(validate_ref_name("HEAD").is_ok());
/// assert!(validate_ref_name("refs/heads/master").is_ok());
/// assert!(validate_ref_name("master").is_err());
/// assert!(validate_ref_name("refs/heads/bad..name").is_err());
/// ```
pub fn validate_ref_name(name: &str) -> RefResult<()> {
    if is_top_level(name) {
        return Ok(());
    }
    if !name.starts_with(REFS_PREFIX) {
        return Err(invalid(
            name,
            "must be an uppercase top-level name or start with 'refs/'",
        ));
    }
    validate_path(name)
}

fn is_top_level(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c == '_')
}

/// Validate a short branch name such as `topic/x`.
pub fn validate_branch_name(name: &str) -> RefResult<()> {
    validate_path(name)
}

/// Validate a short tag name. Same rules as branch names.
pub fn validate_tag_name(name: &str) -> RefResult<()> {
    validate_path(name)
}

fn validate_path(name: &str) -> RefResult<()> {
    if name.is_empty() {
        return Err(invalid(name, "must not be empty"));
    }

    if let Some(ch) = FORBIDDEN_CHARS.iter().find(|ch| name.contains(**ch)) {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }

    // parent traversal
    if name.contains("..") {
        return Err(invalid(name, "must not contain '..'"));
    }

    // reflog syntax
    if name.contains("@{") {
        return Err(invalid(name, "must not contain '@{'"));
    }

    if name.ends_with('.') {
        return Err(invalid(name, "must not end with '.'"));
    }

    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid(name, "must not start or end with '/'"));
    }

    if name.ends_with(".lock") {
        return Err(invalid(name, "must not end with '.lock'"));
    }

    for component in name.split('/') {
        if component.is_empty() {
            return Err(invalid(name, "path components must not be empty"));
        }
        if component.starts_with('.') {
            return Err(invalid(
                name,
                format!("component must not start with '.': {component:?}"),
            ));
        }
    }

    Ok(())
}
