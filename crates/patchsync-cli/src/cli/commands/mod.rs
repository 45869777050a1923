//! CLI command handlers, one file per command.

mod apply;
mod check;
mod checksum;
mod clear;
mod completions;
mod config;
mod launch;
mod ledger;
mod locate;

pub use apply::run_apply;
#[cfg(test)]
pub(crate) use apply::progress_line;
pub use check::run_check;
pub use checksum::run_checksum;
pub use clear::run_clear;
pub use completions::run_completions;
pub use config::run_config;
pub use launch::run_launch;
pub use ledger::run_ledger;
pub use locate::run_locate;

use anyhow::{Context, Result};
use patchsync_core::config::PatcherConfig;
use patchsync_core::control::AbortToken;
use patchsync_core::patcher::resolve_install_root;
use patchsync_core::Patcher;
use std::io::{BufRead, Write};
use std::path::Path;

/// Patcher for the resolved install root (`--dir`, config, Steam, cwd).
pub(crate) fn open_patcher(cfg: &PatcherConfig, dir: Option<&Path>) -> Result<Patcher> {
    let root = resolve_install_root(cfg, dir)?;
    tracing::info!(root = %root.display(), "install root");
    Patcher::from_config(cfg, root).context("set up patcher")
}

/// Set `abort` on the first Ctrl-C. Abort the returned handle once the
/// operation is over.
pub(crate) fn cancel_on_ctrl_c(abort: AbortToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            abort.abort();
        }
    })
}

/// Ask a yes/no question on stdin; anything but y/yes is no.
pub(crate) fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

pub(crate) fn mib(bytes: u64) -> f64 {
    bytes as f64 / 1_048_576.0
}
