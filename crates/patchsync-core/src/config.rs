use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per file (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff.
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_secs: 2.0,
            max_delay_secs: 30,
        }
    }
}

/// Transport timeouts and identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Seconds allowed to establish a connection.
    pub connect_timeout_secs: u64,
    /// Abort a transfer whose throughput stays below `low_speed_limit_bytes`
    /// per second for this many seconds (acts as the read timeout).
    pub low_speed_time_secs: u64,
    pub low_speed_limit_bytes: u32,
    /// Hard cap on a single request, in seconds.
    pub total_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            low_speed_time_secs: 30,
            low_speed_limit_bytes: 1024,
            total_timeout_secs: 3600,
            user_agent: format!("patchsync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Global configuration loaded from `~/.config/patchsync/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatcherConfig {
    /// Game root that manifest paths are relative to. When unset, the install
    /// locator and then the current directory are used.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Directory of the game executable, relative to `working_dir`.
    pub bin_dir: String,
    /// File name of the game executable inside `bin_dir`.
    pub exe_name: String,
    /// Flag always passed to the game executable.
    pub launch_flag: String,
    /// URL of the patch manifest.
    pub manifest_url: String,
    /// Base URL that manifest paths are resolved against.
    pub file_base_url: String,
    /// Override for the ledger location (default under the XDG state dir).
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for PatcherConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            bin_dir: "Mist/Binaries/Win64".to_string(),
            exe_name: "MistClient-Win64-Shipping.exe".to_string(),
            launch_flag: "-noeac".to_string(),
            manifest_url: "https://loc.iambvc.it/client/patchlist.txt".to_string(),
            file_base_url: "https://loc.iambvc.it/client/".to_string(),
            ledger_path: None,
            network: NetworkConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl PatcherConfig {
    /// Absolute path of the game executable under `root`.
    pub fn exe_path(&self, root: &Path) -> PathBuf {
        let mut p = root.to_path_buf();
        for segment in self.bin_dir.split(['/', '\\']).filter(|s| !s.is_empty()) {
            p.push(segment);
        }
        p.join(&self.exe_name)
    }

    /// Ledger location: configured override or `~/.local/state/patchsync/ledger.json`.
    pub fn ledger_path(&self) -> Result<PathBuf> {
        if let Some(p) = &self.ledger_path {
            return Ok(p.clone());
        }
        default_ledger_path()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("patchsync")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

pub fn default_ledger_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("patchsync")?;
    Ok(xdg_dirs.get_state_home().join("patchsync").join("ledger.json"))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PatcherConfig> {
    load_or_init_at(&config_path()?)
}

/// Like `load_or_init` but at an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<PatcherConfig> {
    if !path.exists() {
        let default_cfg = PatcherConfig::default();
        save_at(&default_cfg, path)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: PatcherConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

/// Configuration as it would be written to disk.
pub fn render(cfg: &PatcherConfig) -> Result<String> {
    toml::to_string_pretty(cfg).context("serialize config")
}

/// Persist configuration (creates parent dir if needed).
pub fn save_at(cfg: &PatcherConfig, path: &Path) -> Result<()> {
    let toml = render(cfg)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir: {}", parent.display()))?;
    }
    fs::write(path, toml).with_context(|| format!("write config: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = PatcherConfig::default();
        assert!(cfg.working_dir.is_none());
        assert_eq!(cfg.bin_dir, "Mist/Binaries/Win64");
        assert_eq!(cfg.exe_name, "MistClient-Win64-Shipping.exe");
        assert_eq!(cfg.launch_flag, "-noeac");
        assert_eq!(cfg.retry.max_attempts, 2);
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut cfg = PatcherConfig::default();
        cfg.working_dir = Some(PathBuf::from("/games/Last Oasis"));
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: PatcherConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.working_dir, cfg.working_dir);
        assert_eq!(parsed.manifest_url, cfg.manifest_url);
        assert_eq!(parsed.network.connect_timeout_secs, 15);
    }

    #[test]
    fn config_toml_minimal_uses_section_defaults() {
        let toml = r#"
            bin_dir = "bin"
            exe_name = "game"
            launch_flag = "-nolauncher"
            manifest_url = "http://127.0.0.1/patchlist.txt"
            file_base_url = "http://127.0.0.1/files/"
        "#;
        let cfg: PatcherConfig = toml::from_str(toml).unwrap();
        assert!(cfg.working_dir.is_none());
        assert!(cfg.ledger_path.is_none());
        assert_eq!(cfg.retry.max_attempts, 2);
        assert_eq!(cfg.network.low_speed_limit_bytes, 1024);
    }

    #[test]
    fn config_toml_custom_sections() {
        let toml = r#"
            working_dir = "/srv/game"
            bin_dir = "bin"
            exe_name = "game"
            launch_flag = "-x"
            manifest_url = "http://h/m.txt"
            file_base_url = "http://h/f/"
            ledger_path = "/srv/state/ledger.json"

            [network]
            connect_timeout_secs = 5
            low_speed_time_secs = 10
            low_speed_limit_bytes = 512
            total_timeout_secs = 60
            user_agent = "test"

            [retry]
            max_attempts = 3
            base_delay_secs = 0.5
            max_delay_secs = 15
        "#;
        let cfg: PatcherConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.working_dir.as_deref(), Some(Path::new("/srv/game")));
        assert_eq!(cfg.ledger_path().unwrap(), PathBuf::from("/srv/state/ledger.json"));
        assert_eq!(cfg.network.connect_timeout_secs, 5);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert!((cfg.retry.base_delay_secs - 0.5).abs() < 1e-9);
    }

    #[test]
    fn exe_path_joins_bin_dir_segments() {
        let cfg = PatcherConfig::default();
        let p = cfg.exe_path(Path::new("/g"));
        assert_eq!(
            p,
            Path::new("/g")
                .join("Mist")
                .join("Binaries")
                .join("Win64")
                .join("MistClient-Win64-Shipping.exe")
        );
    }

    #[test]
    fn load_or_init_creates_then_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let first = load_or_init_at(&path).unwrap();
        assert!(path.exists());
        let mut changed = first.clone();
        changed.exe_name = "other.exe".into();
        save_at(&changed, &path).unwrap();
        let second = load_or_init_at(&path).unwrap();
        assert_eq!(second.exe_name, "other.exe");
    }
}
