//! `patchsync clear` – remove every ledgered file (no network).

use anyhow::Result;
use patchsync_core::clear::ClearOptions;
use patchsync_core::config::PatcherConfig;
use std::path::Path;

use super::{confirm, open_patcher};

pub async fn run_clear(
    cfg: &PatcherConfig,
    dir: Option<&Path>,
    dry_run: bool,
    prune_dirs: bool,
    yes: bool,
) -> Result<()> {
    let patcher = open_patcher(cfg, dir)?;
    let tracked = patcher.ledger()?.len();
    if tracked == 0 {
        println!("No installed mod files are tracked; nothing to clear.");
        return Ok(());
    }
    if !dry_run
        && !yes
        && !confirm(&format!(
            "Delete {} installed file(s) from {}?",
            tracked,
            patcher.root().display()
        ))?
    {
        println!("Nothing changed.");
        return Ok(());
    }

    let opts = ClearOptions {
        dry_run,
        prune_empty_dirs: prune_dirs,
    };
    let report = tokio::task::spawn_blocking(move || patcher.clear_mods(opts)).await??;

    let verb = if report.dry_run { "would delete" } else { "deleted" };
    for path in &report.deleted {
        println!("  {}: {}", verb, path);
    }
    for path in &report.missing {
        println!("  already gone: {}", path);
    }
    for f in &report.failed {
        println!("  failed: {}: {}", f.path, f.reason);
    }
    if !report.pruned_dirs.is_empty() {
        println!("Removed {} empty director(ies).", report.pruned_dirs.len());
    }
    if report.dry_run {
        println!("Dry run: {} file(s) would be deleted.", report.deleted.len());
    } else {
        println!(
            "Cleared {} file(s) ({} already missing).",
            report.deleted.len(),
            report.missing.len()
        );
    }
    report.ensure_complete()?;
    Ok(())
}
