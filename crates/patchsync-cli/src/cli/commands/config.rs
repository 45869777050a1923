//! `patchsync config` – show, locate or edit the configuration file.

use anyhow::{bail, Context, Result};
use patchsync_core::config::{self, PatcherConfig};

use crate::cli::ConfigAction;

pub async fn run_config(mut cfg: PatcherConfig, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => print!("{}", config::render(&cfg)?),
        ConfigAction::Path => println!("{}", config::config_path()?.display()),
        ConfigAction::SetDir { dir } => {
            if !dir.is_dir() {
                bail!("{} is not a directory", dir.display());
            }
            let dir = dir
                .canonicalize()
                .with_context(|| format!("resolve {}", dir.display()))?;
            cfg.working_dir = Some(dir.clone());
            let path = config::config_path()?;
            config::save_at(&cfg, &path)?;
            println!("working_dir = {} (saved to {})", dir.display(), path.display());
        }
    }
    Ok(())
}
