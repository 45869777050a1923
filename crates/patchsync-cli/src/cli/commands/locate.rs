//! `patchsync locate` – show the install root and Steam discovery results.

use anyhow::Result;
use patchsync_core::config::PatcherConfig;
use patchsync_core::locate::{InstallLocator, SteamLibraryLocator};
use patchsync_core::patcher::resolve_install_root;
use std::path::Path;

pub async fn run_locate(cfg: &PatcherConfig, dir: Option<&Path>) -> Result<()> {
    let steam = SteamLibraryLocator::default();
    for lib in steam.library_roots() {
        println!("steam library: {}", lib.display());
    }
    match steam.locate() {
        Some(found) => println!("steam install: {}", found.display()),
        None => println!("steam install: not found"),
    }
    if let Some(configured) = &cfg.working_dir {
        println!("configured:    {}", configured.display());
    }
    let root = resolve_install_root(cfg, dir)?;
    println!("using:         {}", root.display());
    println!("game exe:      {}", cfg.exe_path(&root).display());
    Ok(())
}
