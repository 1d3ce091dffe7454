use serde::Deserialize;

use crate::config::Config;
use crate::error::{Error, Result};

pub mod bufferpool;
pub mod frame;
pub mod history;
pub mod replacer;

pub use bufferpool::BufferManager;
pub use frame::{Frame, FrameData};
pub use history::{BlockHistory, LastReference, ReferenceHistory};

pub type FrameId = usize;

/// Transaction number recorded on the frames a transaction modifies.
pub type TxnId = u64;

/// Caller supplied clock reading in milliseconds. Zero is reserved as the
/// "never referenced" marker of the reference history.
pub type Timestamp = u64;

/// When a block leaves the residency index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidencyPolicy {
    /// Unmap the block as soon as its frame is unpinned. The frame keeps the
    /// block's contents, and pinning the block again finds the frame by
    /// scanning the unpinned frames.
    UnmapOnUnpin,
    /// Keep the block mapped until its frame is handed to another block.
    RetainUntilReplaced,
}

/// Construction parameters of a buffer manager, fixed for its lifetime.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PoolOptions {
    pub pool_size: usize,
    pub replacer_k: usize,
    pub correlated_period: Timestamp,
    /// 0 means unbounded.
    pub max_tracked_blocks: usize,
    pub residency: ResidencyPolicy,
}

impl PoolOptions {
    /// Reject options no buffer manager can be built with.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::Value("pool_size must be larger than zero".to_string()));
        }
        if self.replacer_k == 0 {
            return Err(Error::Value("replacer_k must be larger than zero".to_string()));
        }
        if self.max_tracked_blocks != 0 && self.max_tracked_blocks < self.pool_size {
            return Err(Error::Value(format!(
                "max_tracked_blocks {} cannot hold the histories of {} frames",
                self.max_tracked_blocks, self.pool_size
            )));
        }
        Ok(())
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        PoolOptions {
            pool_size: 8,
            replacer_k: 2,
            correlated_period: 10_000,
            max_tracked_blocks: 1000,
            residency: ResidencyPolicy::UnmapOnUnpin,
        }
    }
}

impl From<&Config> for PoolOptions {
    fn from(cfg: &Config) -> Self {
        PoolOptions {
            pool_size: cfg.pool_size,
            replacer_k: cfg.replacer_k,
            correlated_period: cfg.correlated_period_ms,
            max_tracked_blocks: cfg.max_tracked_blocks,
            residency: cfg.residency,
        }
    }
}
