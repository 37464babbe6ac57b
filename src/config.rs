//! Region configuration - TOML file, environment, or code
//!
//! ```toml
//! backing = "virtual"
//! commit_page_count = 1024
//! oom = "recover"
//! slice_growth = 10
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::arena::{OomPolicy, DEFAULT_COMMIT_PAGE_COUNT, DEFAULT_SLICE_GROWTH, RESERVE_FACTOR};
use crate::error::ConfigError;

/// Where a region gets its memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackingKind {
    /// One heap buffer of `capacity` bytes, no growth
    #[default]
    Fixed,
    /// Reserved address space, committed on demand
    Virtual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub backing: BackingKind,

    /// Buffer size in bytes for fixed regions
    pub capacity: usize,

    /// Pages committed per growth step for virtual regions
    pub commit_page_count: usize,

    /// Pages reserved for virtual regions; defaults to `RESERVE_FACTOR * commit_page_count`
    pub reserve_page_count: Option<usize>,

    pub oom: OomPolicy,

    /// Minimum number of elements a slice grows by
    pub slice_growth: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            backing: BackingKind::Fixed,
            capacity: 1 << 20,
            commit_page_count: DEFAULT_COMMIT_PAGE_COUNT,
            reserve_page_count: None,
            oom: OomPolicy::default(),
            slice_growth: DEFAULT_SLICE_GROWTH,
        }
    }
}

impl ArenaConfig {
    pub fn fixed(capacity: usize) -> Self {
        Self {
            backing: BackingKind::Fixed,
            capacity,
            ..Self::default()
        }
    }

    pub fn virtual_memory() -> Self {
        Self {
            backing: BackingKind::Virtual,
            ..Self::default()
        }
    }

    pub fn with_commit_pages(mut self, pages: usize) -> Self {
        self.commit_page_count = pages;
        self
    }

    pub fn with_reserve_pages(mut self, pages: usize) -> Self {
        self.reserve_page_count = Some(pages);
        self
    }

    pub fn with_oom(mut self, oom: OomPolicy) -> Self {
        self.oom = oom;
        self
    }

    pub fn with_slice_growth(mut self, growth: usize) -> Self {
        self.slice_growth = growth;
        self
    }

    /// Effective reservation in pages
    pub fn reserve_page_count(&self) -> usize {
        self.reserve_page_count
            .unwrap_or_else(|| self.commit_page_count.saturating_mul(RESERVE_FACTOR))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Defaults overridden by `ARENA_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // ARENA_BACKING: fixed, virtual
        if let Ok(value) = std::env::var("ARENA_BACKING") {
            config.backing = match value.trim().to_ascii_lowercase().as_str() {
                "fixed" => BackingKind::Fixed,
                "virtual" => BackingKind::Virtual,
                other => {
                    return Err(ConfigError::Invalid {
                        key: "ARENA_BACKING",
                        reason: format!("expected 'fixed' or 'virtual', got '{}'", other),
                    })
                }
            };
        }

        if let Some(capacity) = env_usize("ARENA_CAPACITY")? {
            config.capacity = capacity;
        }
        if let Some(pages) = env_usize("ARENA_COMMIT_PAGES")? {
            config.commit_page_count = pages;
        }
        if let Some(pages) = env_usize("ARENA_RESERVE_PAGES")? {
            config.reserve_page_count = Some(pages);
        }
        if let Some(growth) = env_usize("ARENA_SLICE_GROWTH")? {
            config.slice_growth = growth;
        }

        // ARENA_OOM: abort, recover
        if let Ok(value) = std::env::var("ARENA_OOM") {
            config.oom = value
                .parse()
                .map_err(|reason| ConfigError::Invalid { key: "ARENA_OOM", reason })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slice_growth == 0 {
            return Err(ConfigError::Invalid {
                key: "slice_growth",
                reason: "must be positive".into(),
            });
        }

        if self.backing == BackingKind::Virtual {
            if self.commit_page_count == 0 {
                return Err(ConfigError::Invalid {
                    key: "commit_page_count",
                    reason: "must be positive".into(),
                });
            }
            if self.reserve_page_count() < self.commit_page_count {
                return Err(ConfigError::Invalid {
                    key: "reserve_page_count",
                    reason: format!(
                        "{} pages cannot hold a {}-page commit chunk",
                        self.reserve_page_count(),
                        self.commit_page_count
                    ),
                });
            }
        }

        Ok(())
    }
}

fn env_usize(key: &'static str) -> Result<Option<usize>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|err| ConfigError::Invalid {
                key,
                reason: format!("{}", err),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ArenaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reserve_page_count(), DEFAULT_COMMIT_PAGE_COUNT * RESERVE_FACTOR);
    }

    #[test]
    fn parses_toml() {
        let config = ArenaConfig::from_toml_str(
            r#"
            backing = "virtual"
            commit_page_count = 4
            reserve_page_count = 64
            oom = "abort"
            "#,
        )
        .expect("valid config");

        assert_eq!(config.backing, BackingKind::Virtual);
        assert_eq!(config.commit_page_count, 4);
        assert_eq!(config.reserve_page_count(), 64);
        assert_eq!(config.oom, OomPolicy::Abort);
        assert_eq!(config.slice_growth, DEFAULT_SLICE_GROWTH);
    }

    #[test]
    fn rejects_small_reservation() {
        let err = ArenaConfig::from_toml_str(
            r#"
            backing = "virtual"
            commit_page_count = 8
            reserve_page_count = 4
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "reserve_page_count", .. }));
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = ArenaConfig::from_toml_str(r#"oom = "ignore""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("arena.toml");
        fs::write(&path, "capacity = 4096\nslice_growth = 32\n").expect("write config");

        let config = ArenaConfig::from_file(&path).expect("config file");
        assert_eq!(config.backing, BackingKind::Fixed);
        assert_eq!(config.capacity, 4096);
        assert_eq!(config.slice_growth, 32);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ArenaConfig::from_file(Path::new("/nonexistent/arena.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
