//! Engine facade: the four operations a front end drives.
//!
//! `Patcher` wires the manifest client, planner, pipeline, ledger, clear
//! engine and launcher to one install root. Mutating operations hold the
//! `OperationGate` for their whole run and load the ledger fresh each time.
//! The gate locks `<ledger>.lock`, so two processes sharing a ledger exclude
//! each other as well.

use std::path::{Path, PathBuf};
use std::process::Child;

use tokio::sync::mpsc;

use crate::clear::{self, ClearOptions, ClearReport};
use crate::config::PatcherConfig;
use crate::control::{AbortToken, OperationGate};
use crate::error::{PatchError, PatchResult};
use crate::launch;
use crate::ledger::{self, Ledger};
use crate::locate::{InstallLocator, SteamLibraryLocator};
use crate::manifest::{self, Manifest};
use crate::pipeline::{BatchReport, Pipeline, ProgressEvent};
use crate::planner::{self, PatchPlan};
use crate::remote::{CurlRemote, Remote};
use crate::retry::RetryPolicy;

/// Result of CheckForUpdates: the manifest and the plan derived from it.
#[derive(Debug, Clone)]
pub struct UpdateCheck {
    pub manifest: Manifest,
    pub plan: PatchPlan,
}

pub struct Patcher {
    root: PathBuf,
    ledger_path: PathBuf,
    exe_path: PathBuf,
    launch_flag: String,
    remote: Box<dyn Remote>,
    retry: RetryPolicy,
    gate: OperationGate,
}

impl Patcher {
    /// Patcher with default launch settings; see `with_launch`.
    pub fn new(root: impl Into<PathBuf>, ledger_path: impl Into<PathBuf>, remote: Box<dyn Remote>) -> Self {
        let root = root.into();
        let ledger_path = ledger_path.into();
        let defaults = PatcherConfig::default();
        Self {
            exe_path: defaults.exe_path(&root),
            launch_flag: defaults.launch_flag,
            root,
            gate: OperationGate::with_lock_file(ledger::lock_path(&ledger_path)),
            ledger_path,
            remote,
            retry: RetryPolicy::default(),
        }
    }

    /// Build from configuration against `root` using the libcurl remote.
    pub fn from_config(cfg: &PatcherConfig, root: impl Into<PathBuf>) -> PatchResult<Self> {
        let root = root.into();
        let remote = CurlRemote::from_config(cfg)?;
        let ledger_path = cfg
            .ledger_path()
            .map_err(|e| PatchError::Config(format!("ledger path: {:#}", e)))?;
        Ok(Self::new(&root, ledger_path, Box::new(remote))
            .with_launch(cfg.exe_path(&root), &cfg.launch_flag)
            .with_retry_policy(RetryPolicy::from(&cfg.retry)))
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_launch(mut self, exe_path: impl Into<PathBuf>, flag: &str) -> Self {
        self.exe_path = exe_path.into();
        self.launch_flag = flag.to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    pub fn exe_path(&self) -> &Path {
        &self.exe_path
    }

    pub fn gate(&self) -> &OperationGate {
        &self.gate
    }

    /// Fetch the manifest and plan against the install root. Read-only.
    pub fn check_for_updates(&self, abort: &AbortToken) -> PatchResult<UpdateCheck> {
        let manifest = manifest::fetch(self.remote.as_ref())?;
        abort.check()?;
        let plan = planner::plan(&manifest, &self.root, abort)?;
        Ok(UpdateCheck { manifest, plan })
    }

    /// Run the pipeline over `plan`. Fails with `Busy` if another mutating
    /// operation is running, or with `Ledger` if the ledger is unusable.
    pub fn apply_patches(
        &self,
        plan: &PatchPlan,
        progress: Option<mpsc::Sender<ProgressEvent>>,
        abort: &AbortToken,
    ) -> PatchResult<BatchReport> {
        let _guard = self.gate.acquire()?;
        let mut ledger = Ledger::load(&self.ledger_path)?;
        let mut pipeline = Pipeline::new(self.remote.as_ref(), &self.root)
            .with_retry_policy(self.retry)
            .with_abort(abort.clone());
        if let Some(tx) = progress {
            pipeline = pipeline.with_progress(tx);
        }
        pipeline.run(plan, &mut ledger)
    }

    /// Remove every ledgered file and reset the ledger. No network.
    pub fn clear_mods(&self, opts: ClearOptions) -> PatchResult<ClearReport> {
        let _guard = self.gate.acquire()?;
        let mut ledger = Ledger::load(&self.ledger_path)?;
        clear::clear(&self.root, &mut ledger, opts)
    }

    /// Start the game. Refused while a patch or clear is running here or in
    /// another process sharing the ledger.
    pub fn launch_game(&self) -> PatchResult<Child> {
        if self.gate.is_busy() {
            return Err(PatchError::Busy);
        }
        launch::launch(&self.exe_path, &self.launch_flag)
    }

    /// Current ledger contents, loaded from disk.
    pub fn ledger(&self) -> PatchResult<Ledger> {
        Ledger::load(&self.ledger_path)
    }
}

/// Install root: explicit override, then configured `working_dir`, then a
/// Steam library that has the game, then the current directory.
pub fn resolve_install_root(cfg: &PatcherConfig, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    use anyhow::Context;

    if let Some(dir) = override_dir {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = &cfg.working_dir {
        return Ok(dir.clone());
    }
    if let Some(dir) = SteamLibraryLocator::default().locate() {
        return Ok(dir);
    }
    std::env::current_dir().context("current directory")
}
