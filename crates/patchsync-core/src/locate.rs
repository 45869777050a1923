//! Install discovery: where the game root lives when it is not configured.
//!
//! `SteamLibraryLocator` reads `steamapps/libraryfolders.vdf` under each
//! candidate Steam root and returns the first library that has both the app
//! manifest and the game folder.

use std::path::{Path, PathBuf};

/// Source of a game install root.
pub trait InstallLocator {
    fn locate(&self) -> Option<PathBuf>;
}

/// Fixed path from configuration. Only reports it if it is a directory.
#[derive(Debug, Clone)]
pub struct ConfiguredLocator(pub PathBuf);

impl InstallLocator for ConfiguredLocator {
    fn locate(&self) -> Option<PathBuf> {
        self.0.is_dir().then(|| self.0.clone())
    }
}

pub const STEAM_APP_ID: &str = "903950";
pub const GAME_FOLDER: &str = "Last Oasis";

#[derive(Debug, Clone)]
pub struct SteamLibraryLocator {
    pub steam_roots: Vec<PathBuf>,
    pub app_id: String,
    pub game_folder: String,
}

impl Default for SteamLibraryLocator {
    fn default() -> Self {
        Self::with_roots(default_steam_roots())
    }
}

impl SteamLibraryLocator {
    pub fn with_roots(steam_roots: Vec<PathBuf>) -> Self {
        Self {
            steam_roots,
            app_id: STEAM_APP_ID.to_string(),
            game_folder: GAME_FOLDER.to_string(),
        }
    }

    /// Every library root: each Steam root plus the libraries its vdf lists.
    pub fn library_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = Vec::new();
        for steam in self.steam_roots.iter().filter(|p| p.is_dir()) {
            if !roots.contains(steam) {
                roots.push(steam.clone());
            }
            let vdf = steam.join("steamapps").join("libraryfolders.vdf");
            let text = match std::fs::read(&vdf) {
                Ok(b) => String::from_utf8_lossy(&b).into_owned(),
                Err(_) => continue,
            };
            for lib in parse_library_folders(&text) {
                if lib.is_dir() && !roots.contains(&lib) {
                    roots.push(lib);
                }
            }
        }
        roots
    }

    fn game_dir_in(&self, library: &Path) -> Option<PathBuf> {
        let steamapps = library.join("steamapps");
        let acf = steamapps.join(format!("appmanifest_{}.acf", self.app_id));
        let game = steamapps.join("common").join(&self.game_folder);
        (acf.is_file() && game.is_dir()).then_some(game)
    }
}

impl InstallLocator for SteamLibraryLocator {
    fn locate(&self) -> Option<PathBuf> {
        let found = self.library_roots().iter().find_map(|lib| self.game_dir_in(lib));
        match &found {
            Some(p) => tracing::info!(path = %p.display(), "found install in Steam library"),
            None => tracing::debug!(roots = self.steam_roots.len(), "no Steam library has the game"),
        }
        found
    }
}

/// Library paths from a `libraryfolders.vdf` body (`"path"  "E:\\SteamLibrary"` lines).
pub fn parse_library_folders(vdf: &str) -> Vec<PathBuf> {
    vdf.lines()
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split('"').map(str::trim).filter(|t| !t.is_empty()).collect();
            match tokens.as_slice() {
                [key, value, ..] if key.eq_ignore_ascii_case("path") => {
                    Some(PathBuf::from(value.replace("\\\\", "\\")))
                }
                _ => None,
            }
        })
        .collect()
}

/// Usual Steam install locations for this platform.
pub fn default_steam_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(xdg_dirs) = xdg::BaseDirectories::new() {
        roots.push(xdg_dirs.get_data_home().join("Steam"));
    }
    if let Some(home) = std::env::var_os("HOME") {
        roots.push(PathBuf::from(home).join(".steam").join("steam"));
    }
    if cfg!(windows) {
        roots.push(PathBuf::from(r"C:\Program Files (x86)\Steam"));
        roots.push(PathBuf::from(r"C:\Program Files\Steam"));
    }
    roots
}

/// First locator in `chain` that finds something.
pub fn locate_first(chain: &[&dyn InstallLocator]) -> Option<PathBuf> {
    chain.iter().find_map(|l| l.locate())
}
