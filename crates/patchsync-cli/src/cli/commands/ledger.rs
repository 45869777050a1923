//! `patchsync ledger` – list installed files.

use anyhow::Result;
use patchsync_core::config::PatcherConfig;
use std::path::Path;

use super::open_patcher;

pub async fn run_ledger(cfg: &PatcherConfig, dir: Option<&Path>) -> Result<()> {
    let patcher = open_patcher(cfg, dir)?;
    let ledger = patcher.ledger()?;
    if ledger.is_empty() {
        println!("No files recorded in {}.", ledger.path().display());
        return Ok(());
    }
    for rel in ledger.entries() {
        let present = patcher.root().join(rel).exists();
        println!("{}  {}", if present { "ok     " } else { "missing" }, rel);
    }
    println!("{} file(s) recorded in {}.", ledger.len(), ledger.path().display());
    Ok(())
}
