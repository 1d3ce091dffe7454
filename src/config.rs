use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::Deserialize;

use crate::error::Result;
use crate::storage::buffer::{PoolOptions, ResidencyPolicy};
use crate::storage::kv::StorageType;

#[derive(Debug, PartialEq, Deserialize)]
pub struct Config {
    pub log_level: String,

    pub storage_type: StorageType,

    /// number of frames in the buffer pool.
    pub pool_size: usize,
    /// history depth K of the replacer.
    pub replacer_k: usize,
    /// references to the same block closer than this are one burst.
    pub correlated_period_ms: u64,
    /// upper bound of tracked block histories, 0 means unbounded.
    pub max_tracked_blocks: usize,

    pub residency: ResidencyPolicy,
}

impl Config {
    pub fn new(file: &str) -> Result<Config> {
        let mut cfg = Self::defaults()?;
        if !file.is_empty() {
            cfg = cfg.add_source(config::File::with_name(file))
        }
        cfg = cfg.add_source(config::Environment::with_prefix("BUFMGR"));
        let cfg: Config = cfg.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        Ok(config::Config::builder()
            .set_default("log_level", "info")?
            .set_default("storage_type", "memory")?
            .set_default("pool_size", 8)?
            .set_default("replacer_k", 2)?
            .set_default("correlated_period_ms", 10_000)?
            .set_default("max_tracked_blocks", 1000)?
            .set_default("residency", "unmap_on_unpin")?)
    }

    pub fn validate(&self) -> Result<()> {
        PoolOptions::from(self).validate()
    }

    /// Install an env_logger backed logger filtered by `log_level`.
    /// `RUST_LOG` still wins when it is set.
    pub fn init_logger(&self) -> Result<()> {
        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&self.log_level);
        if let Ok(filters) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }
        builder.try_init()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use config::{File, FileFormat};
    use log::LevelFilter;

    use super::*;
    use crate::error::Error;

    #[test]
    fn test_default_config() -> Result<()> {
        let cfg = Config::new("")?;
        assert_eq!(StorageType::Memory, cfg.storage_type);
        assert_eq!(2, cfg.replacer_k);
        assert_eq!(10_000, cfg.correlated_period_ms);
        assert_eq!(ResidencyPolicy::UnmapOnUnpin, cfg.residency);
        Ok(())
    }

    #[test]
    fn test_override_from_source() -> Result<()> {
        let toml = r#"
            pool_size = 4
            replacer_k = 3
            residency = "retain_until_replaced"
        "#;
        let cfg: Config = Config::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        assert_eq!(4, cfg.pool_size);
        assert_eq!(3, cfg.replacer_k);
        assert_eq!(ResidencyPolicy::RetainUntilReplaced, cfg.residency);
        Ok(())
    }

    #[test]
    fn test_reject_empty_pool() -> Result<()> {
        let cfg: Config = Config::defaults()?
            .add_source(File::from_str("pool_size = 0", FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        assert!(matches!(cfg.validate(), Err(Error::Value(_))));
        Ok(())
    }

    #[test]
    fn test_reject_small_history() -> Result<()> {
        let toml = "pool_size = 16\nmax_tracked_blocks = 8";
        let cfg: Config = Config::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        assert!(matches!(cfg.validate(), Err(Error::Value(_))));

        let toml = "pool_size = 16\nmax_tracked_blocks = 0";
        let cfg: Config = Config::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(())
    }

    #[test]
    fn test_init_logger() -> Result<()> {
        let cfg = Config::new("")?;
        // another test may have installed its logger first
        if let Err(err) = cfg.init_logger() {
            assert!(matches!(err, Error::Internal(_)));
        }
        assert!(log::max_level() > LevelFilter::Off);
        Ok(())
    }
}
