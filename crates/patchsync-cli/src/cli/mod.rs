//! CLI for the patchsync mod patcher.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use patchsync_core::config;
use std::path::PathBuf;

use commands::{
    run_apply, run_check, run_checksum, run_clear, run_completions, run_config, run_launch,
    run_ledger, run_locate,
};

/// Top-level CLI for the patchsync mod patcher.
#[derive(Debug, Parser)]
#[command(name = "patchsync")]
#[command(about = "patchsync: keep a game install in sync with a remote mod manifest", long_about = None)]
pub struct Cli {
    /// Game install root for this invocation (overrides `working_dir` in config).
    #[arg(long, global = true, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch the manifest and list files that are missing or outdated.
    Check,

    /// Download and install every missing or outdated file.
    Apply {
        /// Do not ask for confirmation.
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Delete every file patchsync has installed and reset the ledger.
    Clear {
        /// Only list what would be deleted.
        #[arg(long)]
        dry_run: bool,
        /// Also remove directories left empty by the deletions.
        #[arg(long)]
        prune_dirs: bool,
        /// Do not ask for confirmation.
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Start the game with the configured launch flag.
    Launch,

    /// List every file recorded as installed.
    Ledger,

    /// Show which install root would be used and what Steam discovery finds.
    Locate,

    /// Compute SHA-256 (or CRC32) and size of a file (the manifest fingerprint).
    Checksum {
        /// Path to the file.
        path: PathBuf,

        /// Print the 8-digit CRC32 instead of SHA-256.
        #[arg(long)]
        crc32: bool,
    },

    /// Show or edit the configuration file.
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration (default).
    Show,
    /// Print the configuration file location.
    Path,
    /// Persist the game install root as `working_dir`.
    SetDir {
        /// Existing directory to store.
        dir: PathBuf,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let dir = cli.dir.as_deref();

        match cli.command {
            CliCommand::Check => run_check(&cfg, dir).await?,
            CliCommand::Apply { yes } => run_apply(&cfg, dir, yes).await?,
            CliCommand::Clear {
                dry_run,
                prune_dirs,
                yes,
            } => run_clear(&cfg, dir, dry_run, prune_dirs, yes).await?,
            CliCommand::Launch => run_launch(&cfg, dir).await?,
            CliCommand::Ledger => run_ledger(&cfg, dir).await?,
            CliCommand::Locate => run_locate(&cfg, dir).await?,
            CliCommand::Checksum { path, crc32 } => run_checksum(&path, crc32).await?,
            CliCommand::Config { action } => run_config(cfg, action.unwrap_or(ConfigAction::Show)).await?,
            CliCommand::Completions { shell } => run_completions(shell)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
