//! `patchsync launch` – start the game.

use anyhow::Result;
use patchsync_core::config::PatcherConfig;
use std::path::Path;

use super::open_patcher;

pub async fn run_launch(cfg: &PatcherConfig, dir: Option<&Path>) -> Result<()> {
    let patcher = open_patcher(cfg, dir)?;
    let child = patcher.launch_game()?;
    println!("Launched {} (pid {}).", patcher.exe_path().display(), child.id());
    Ok(())
}
