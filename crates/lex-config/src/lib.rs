//! # lex-config
//!
//! Layered configuration loading for Lexmex using figment.
//!
//! Configuration sources (in priority order):
//! 1. Environment variables (`LEXMEX_*`, `__`-separated sections)
//! 2. Project-level `lexmex.toml`
//! 3. Built-in defaults

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

mod chunking;
mod error;
mod scrape;
mod storage;

pub use chunking::ChunkingConfig;
pub use error::ConfigError;
pub use scrape::ScrapeConfig;
pub use storage::{StorageConfig, StorageMode};

/// Full Lexmex configuration tree.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LexmexConfig {
    #[serde(default)]
    pub scrape: ScrapeConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl LexmexConfig {
    /// Load configuration: defaults, then `lexmex.toml`, then `LEXMEX_*` env
    /// vars (`LEXMEX_SCRAPE__RATE_LIMIT_PER_SECOND=1.0` style).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a source fails to parse or a value fails
    /// validation.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Self::default()))
                .merge(Toml::file("lexmex.toml"))
                .merge(Env::prefixed("LEXMEX_").split("__")),
        )
    }

    /// Extract and validate from an explicit figment (tests inject their own).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on extraction failure or invalid values.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scrape.rate_limit_per_second <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "scrape.rate_limit_per_second".into(),
                message: "must be positive".into(),
            });
        }
        if self.scrape.max_concurrent_downloads == 0 {
            return Err(ConfigError::Invalid {
                field: "scrape.max_concurrent_downloads".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.chunking.chunk_min_tokens > self.chunking.chunk_max_tokens {
            return Err(ConfigError::Invalid {
                field: "chunking.chunk_min_tokens".into(),
                message: "must not exceed chunk_max_tokens".into(),
            });
        }
        if self.chunking.chunk_overlap_tokens >= self.chunking.chunk_max_tokens {
            return Err(ConfigError::Invalid {
                field: "chunking.chunk_overlap_tokens".into(),
                message: "must be smaller than chunk_max_tokens".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn load_defaults_without_sources() {
        let config =
            LexmexConfig::from_figment(Figment::from(Serialized::defaults(LexmexConfig::default())))
                .unwrap();
        assert_eq!(config.scrape.max_concurrent_downloads, 3);
        assert_eq!(config.chunking.chunk_max_tokens, 512);
        assert_eq!(config.storage.mode, StorageMode::Local);
    }

    #[test]
    fn toml_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "lexmex.toml",
                r#"
                [scrape]
                rate_limit_per_second = 2.0
                max_concurrent_downloads = 5

                [storage]
                mode = "dual"
                "#,
            )?;
            let config = LexmexConfig::load().expect("load");
            assert!((config.scrape.rate_limit_per_second - 2.0).abs() < f64::EPSILON);
            assert_eq!(config.scrape.max_concurrent_downloads, 5);
            assert_eq!(config.storage.mode, StorageMode::Dual);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_toml() {
        Jail::expect_with(|jail| {
            jail.create_file("lexmex.toml", "[scrape]\nmax_retries = 1\n")?;
            jail.set_env("LEXMEX_SCRAPE__MAX_RETRIES", "7");
            let config = LexmexConfig::load().expect("load");
            assert_eq!(config.scrape.max_retries, 7);
            Ok(())
        });
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("lexmex.toml", "[scrape]\nmax_concurrent_downloads = 0\n")?;
            assert!(LexmexConfig::load().is_err());
            Ok(())
        });
    }

    #[test]
    fn oversized_overlap_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "lexmex.toml",
                "[chunking]\nchunk_overlap_tokens = 600\n",
            )?;
            assert!(LexmexConfig::load().is_err());
            Ok(())
        });
    }
}
