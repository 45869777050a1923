//! Launch the game binary. Fire and forget: the child is not supervised.

use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use crate::error::{PatchError, PatchResult};

/// Spawn `exe` with `flag` as its only argument and the exe's directory as cwd.
pub fn launch(exe: &Path, flag: &str) -> PatchResult<Child> {
    if !exe.is_file() {
        return Err(PatchError::fs(
            exe,
            io::Error::new(io::ErrorKind::NotFound, "game executable not found"),
        ));
    }
    let mut cmd = Command::new(exe);
    if !flag.is_empty() {
        cmd.arg(flag);
    }
    if let Some(dir) = exe.parent() {
        cmd.current_dir(dir);
    }
    cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
    let child = cmd.spawn().map_err(|e| PatchError::fs(exe, e))?;
    tracing::info!(exe = %exe.display(), flag, pid = child.id(), "game launched");
    Ok(child)
}
