//! Emulator configuration.
//!
//! Settings are resolved once per process from three layers, weakest
//! first: built-in defaults, TOML files (the per-user file under the
//! platform config directory, then a project-local `tau-emu.toml`),
//! and `TAU_EMU_*` environment variables. Each layer overrides the
//! previous one per field, so a file can pin the scratchpad size while
//! the environment toggles address checking for a single run.
//!
//! All fields are optional in every layer:
//!
//! ```toml
//! # tau-emu.toml
//! scratchpad_words = 32768   # 32-bit words (128 KiB)
//! check_addresses = true     # assert AGUs against the scratchpad
//! vector_dir = "vectors"     # where gen-vectors writes its suite
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Emulator settings. Fields stay optional so layers can override each
/// other per field; the accessor methods supply the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scratchpad size in 32-bit words.
    pub scratchpad_words: Option<usize>,

    /// Whether jobs assert AGU addresses against the scratchpad bounds.
    pub check_addresses: Option<bool>,

    /// Output directory for generated test vectors.
    pub vector_dir: Option<String>,
}

impl Config {
    /// The process-wide configuration, resolved on first use.
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Self::resolve)
    }

    /// Resolve all layers in order of increasing priority.
    pub fn resolve() -> Self {
        let mut config = Config::default();
        for path in Self::file_candidates() {
            if let Some(layer) = Self::read_file(&path) {
                log::info!("config: applying {}", path.display());
                config.overlay(layer);
            }
        }
        config.overlay(Self::env_layer());
        log::debug!("config: resolved to {:?}", config);
        config
    }

    /// Scratchpad size, defaulting to the 128 KiB the hardware ships with.
    pub fn scratchpad_words(&self) -> usize {
        self.scratchpad_words
            .unwrap_or(crate::device::scratchpad::DEFAULT_WORDS)
    }

    /// Address-check toggle, on by default.
    pub fn check_addresses(&self) -> bool {
        self.check_addresses.unwrap_or(true)
    }

    /// Vector output directory, `./vectors` by default.
    pub fn vector_dir(&self) -> String {
        self.vector_dir.clone().unwrap_or_else(|| "vectors".to_string())
    }

    /// Merge a higher-priority layer into this one, field by field.
    fn overlay(&mut self, layer: Self) {
        self.scratchpad_words = layer.scratchpad_words.or(self.scratchpad_words);
        self.check_addresses = layer.check_addresses.or(self.check_addresses);
        self.vector_dir = layer.vector_dir.or(self.vector_dir.take());
    }

    /// Config files in application order, weakest first. Later entries
    /// shadow earlier ones where they set a field.
    fn file_candidates() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(user) = Self::user_config_path() {
            paths.push(user);
        }
        if let Ok(manifest) = env::var("CARGO_MANIFEST_DIR") {
            paths.push(PathBuf::from(manifest).join("tau-emu.toml"));
        }
        paths.push(PathBuf::from("tau-emu.toml"));
        paths
    }

    /// Read one candidate file. A missing file is the normal case and
    /// stays quiet; a file that exists but does not parse is reported
    /// and skipped rather than aborting the run.
    fn read_file(path: &Path) -> Option<Self> {
        let text = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&text) {
            Ok(layer) => Some(layer),
            Err(e) => {
                log::warn!("config: skipping {}: {}", path.display(), e);
                None
            }
        }
    }

    /// The `TAU_EMU_*` environment layer.
    fn env_layer() -> Self {
        let scratchpad_words = env::var("TAU_EMU_SCRATCHPAD_WORDS").ok().and_then(|v| {
            v.parse().map_err(|_| {
                log::warn!("config: TAU_EMU_SCRATCHPAD_WORDS={v} is not a word count");
            })
            .ok()
        });
        let check_addresses = env::var("TAU_EMU_CHECK_ADDRESSES")
            .ok()
            .map(|v| !matches!(v.as_str(), "0" | "false" | "off"));
        let vector_dir = env::var("TAU_EMU_VECTOR_DIR").ok();

        Self { scratchpad_words, check_addresses, vector_dir }
    }

    /// Location of the per-user config file.
    pub fn user_config_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join("tau-emu").join("config.toml"))
    }

    /// Annotated sample file, printed by `tau-emu config`.
    pub fn sample() -> &'static str {
        "\
# tau-emu configuration. Copy to ~/.config/tau-emu/config.toml or to a
# project-local tau-emu.toml; every setting is optional.

# Scratchpad size in 32-bit words (default 32768 = 128 KiB)
#scratchpad_words = 32768

# Assert AGU addresses against the scratchpad on every loop frame
#check_addresses = true

# Output directory for generated test vectors
#vector_dir = \"vectors\"
"
    }
}
