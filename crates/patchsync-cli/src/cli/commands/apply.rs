//! `patchsync apply` – check, confirm, then install outdated files with progress.

use anyhow::{bail, Result};
use patchsync_core::config::PatcherConfig;
use patchsync_core::control::AbortToken;
use patchsync_core::pipeline::ProgressEvent;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use super::{cancel_on_ctrl_c, confirm, mib, open_patcher};

const PROGRESS_INTERVAL_MS: u64 = 500;

/// One in-place progress line: starts with `\r`, never ends a line.
pub(crate) fn progress_line(ev: &ProgressEvent) -> String {
    let eta = ev
        .eta_secs()
        .map(|s| format!("{:.0}s", s))
        .unwrap_or_else(|| "?".to_string());
    format!(
        "\r  [{}/{}] {}  {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  ETA {}  ",
        ev.file_index,
        ev.file_count,
        ev.file,
        mib(ev.batch_bytes_done),
        mib(ev.batch_bytes_total),
        ev.fraction() * 100.0,
        ev.bytes_per_sec() / 1_048_576.0,
        eta
    )
}

pub async fn run_apply(cfg: &PatcherConfig, dir: Option<&Path>, yes: bool) -> Result<()> {
    let patcher = Arc::new(open_patcher(cfg, dir)?);
    let abort = AbortToken::new();
    let ctrl_c = cancel_on_ctrl_c(abort.clone());

    let check = {
        let patcher = Arc::clone(&patcher);
        let abort = abort.clone();
        tokio::task::spawn_blocking(move || patcher.check_for_updates(&abort)).await??
    };
    if check.plan.is_up_to_date() {
        ctrl_c.abort();
        println!("Up to date ({} files checked).", check.manifest.len());
        return Ok(());
    }
    println!(
        "{} file(s) to update, {:.1} MiB to download into {}",
        check.plan.fetch_count(),
        mib(check.plan.fetch_bytes()),
        patcher.root().display()
    );
    if !yes && !confirm("Apply updates?")? {
        ctrl_c.abort();
        println!("Nothing changed.");
        return Ok(());
    }

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel::<ProgressEvent>(16);
    let progress_handle = tokio::spawn(async move {
        let mut last_print: Option<Instant> = None;
        let mut stdout = std::io::stdout();
        while let Some(ev) = progress_rx.recv().await {
            let now = Instant::now();
            let due = last_print
                .map(|t| now.duration_since(t).as_millis() as u64 >= PROGRESS_INTERVAL_MS)
                .unwrap_or(true);
            if due || ev.batch_bytes_done >= ev.batch_bytes_total {
                print!("{}", progress_line(&ev));
                let _ = stdout.flush();
                last_print = Some(now);
            }
        }
        if last_print.is_some() {
            println!();
        }
    });

    let report = {
        let patcher = Arc::clone(&patcher);
        let abort = abort.clone();
        let plan = check.plan;
        tokio::task::spawn_blocking(move || patcher.apply_patches(&plan, Some(progress_tx), &abort)).await??
    };
    let _ = progress_handle.await;
    ctrl_c.abort();

    println!(
        "Installed {} file(s), {:.1} MiB.",
        report.installed.len(),
        mib(report.bytes_installed)
    );
    for f in &report.failed {
        println!("  failed: {}: {}", f.path, f.reason);
    }
    if report.cancelled {
        bail!("cancelled; run `patchsync apply` again to finish");
    }
    if !report.failed.is_empty() {
        bail!(
            "{} file(s) failed; they will be retried on the next run",
            report.failed.len()
        );
    }
    Ok(())
}
