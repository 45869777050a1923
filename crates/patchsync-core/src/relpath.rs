//! Validation of manifest and ledger relative paths.
//!
//! Every path the engine writes or deletes comes from a remote manifest or a
//! persisted ledger, so neither is trusted to stay inside the install root.

use std::path::{Path, PathBuf};

/// Why a relative path was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelPathProblem {
    Empty,
    Absolute,
    ParentSegment,
    EmptySegment,
    DotSegment,
    DrivePrefix,
    ControlChar,
}

impl std::fmt::Display for RelPathProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            RelPathProblem::Empty => "empty path",
            RelPathProblem::Absolute => "absolute path",
            RelPathProblem::ParentSegment => "contains '..'",
            RelPathProblem::EmptySegment => "contains an empty segment",
            RelPathProblem::DotSegment => "contains a '.' segment",
            RelPathProblem::DrivePrefix => "contains a drive prefix",
            RelPathProblem::ControlChar => "contains a control character",
        };
        f.write_str(msg)
    }
}

/// Checks that `rel` is a `/`-separated path that stays inside the root it is
/// joined to.
///
/// - Rejects leading `/` or `\`, `..` and `.` segments, and empty segments
/// - Rejects Windows drive prefixes (`C:`) in any segment
/// - Rejects NUL and other control characters
pub fn validate(rel: &str) -> Result<(), RelPathProblem> {
    if rel.is_empty() {
        return Err(RelPathProblem::Empty);
    }
    if rel.starts_with('/') || rel.starts_with('\\') {
        return Err(RelPathProblem::Absolute);
    }
    if rel.chars().any(|c| c.is_control()) {
        return Err(RelPathProblem::ControlChar);
    }
    for segment in rel.split(['/', '\\']) {
        match segment {
            "" => return Err(RelPathProblem::EmptySegment),
            "." => return Err(RelPathProblem::DotSegment),
            ".." => return Err(RelPathProblem::ParentSegment),
            s if s.contains(':') => return Err(RelPathProblem::DrivePrefix),
            _ => {}
        }
    }
    Ok(())
}

/// Joins a validated relative path onto `root`, one component at a time so the
/// result uses the platform separator.
pub fn join(root: &Path, rel: &str) -> Result<PathBuf, RelPathProblem> {
    validate(rel)?;
    let mut out = root.to_path_buf();
    for segment in rel.split(['/', '\\']) {
        out.push(segment);
    }
    Ok(out)
}
