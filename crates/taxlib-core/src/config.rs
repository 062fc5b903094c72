//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `TAXLIB_*` env vars.
//! Nested keys are addressed with a double underscore, so
//! `TAXLIB_SEARCH__MAX_HITS=50` overrides `[search] max_hits`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    /// Relative paths in the configuration resolve against this directory.
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load configuration files from `dir` instead of the working directory.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("TAXLIB_").split("__"));

        let config = Self { figment, base_dir: dir.to_path_buf() };
        config.search_settings()?.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment, base_dir: PathBuf::from(".") }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// The `[search]` section layered over the built-in defaults. A relative
    /// `store_root` is resolved against the configuration directory.
    pub fn search_settings(&self) -> Result<SearchSettings> {
        let mut settings: SearchSettings = Figment::from(Serialized::defaults(SearchSettings::default()))
            .merge(self.figment.focus("search"))
            .extract()
            .map_err(|e| Error::InvalidConfig(format!("Failed to read [search]: {}", e)))?;
        settings.store_root = settings
            .store_root
            .map(|root| resolve_with_base(&self.base_dir, root).to_string_lossy().into_owned());
        Ok(settings)
    }
}

/// Tunables for the indexing pipeline, the lifecycle manager and result filtering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchSettings {
    pub writer_heap_bytes: usize,
    pub commit_interval: usize,
    pub progress_interval_ms: u64,
    pub stop_timeout_ms: u64,
    pub stop_poll_interval_ms: u64,
    pub min_score: f32,
    pub max_hits: usize,
    pub phrase_slop: u32,
    pub documentation_cache_capacity: usize,
    /// Directory for on-disk stores. `None` keeps every store in memory.
    pub store_root: Option<String>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            writer_heap_bytes: 20_000_000,
            commit_interval: 2000,
            progress_interval_ms: 500,
            stop_timeout_ms: 15_000,
            stop_poll_interval_ms: 50,
            min_score: 0.0499,
            max_hits: 1000,
            phrase_slop: 6,
            documentation_cache_capacity: 4096,
            store_root: None,
        }
    }
}

impl SearchSettings {
    pub fn validate(&self) -> Result<()> {
        if self.writer_heap_bytes < 15_000_000 {
            return Err(Error::InvalidConfig(format!(
                "writer_heap_bytes must be at least 15000000, got {}",
                self.writer_heap_bytes
            )));
        }
        if self.max_hits == 0 {
            return Err(Error::InvalidConfig("max_hits must be positive".into()));
        }
        if self.progress_interval_ms == 0 || self.stop_poll_interval_ms == 0 {
            return Err(Error::InvalidConfig("polling intervals must be positive".into()));
        }
        Ok(())
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn stop_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stop_poll_interval_ms)
    }

    pub fn store_root_path(&self) -> Option<PathBuf> {
        self.store_root.as_deref().map(expand_path)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
