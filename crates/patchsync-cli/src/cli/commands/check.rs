//! `patchsync check` – fetch the manifest and show what would change.

use anyhow::Result;
use patchsync_core::config::PatcherConfig;
use patchsync_core::control::AbortToken;
use patchsync_core::planner::{FetchReason, PatchAction};
use std::path::Path;

use super::{mib, open_patcher};

pub async fn run_check(cfg: &PatcherConfig, dir: Option<&Path>) -> Result<()> {
    let patcher = open_patcher(cfg, dir)?;
    let abort = AbortToken::new();
    let check = tokio::task::spawn_blocking(move || patcher.check_for_updates(&abort)).await??;

    for action in check.plan.actions() {
        if let PatchAction::Fetch { entry, reason } = action {
            println!("{:<14} {}  ({} bytes)", describe(reason), entry.relative_path, entry.expected_size);
        }
    }
    if check.plan.is_up_to_date() {
        println!("Up to date ({} files checked).", check.manifest.len());
    } else {
        println!(
            "{} of {} file(s) need updating, {:.1} MiB to download. Run `patchsync apply`.",
            check.plan.fetch_count(),
            check.manifest.len(),
            mib(check.plan.fetch_bytes())
        );
    }
    Ok(())
}

fn describe(reason: &FetchReason) -> &'static str {
    match reason {
        FetchReason::Missing => "missing",
        FetchReason::SizeMismatch { .. } => "size differs",
        FetchReason::HashMismatch { .. } => "content differs",
        FetchReason::Unreadable(_) => "unreadable",
    }
}
