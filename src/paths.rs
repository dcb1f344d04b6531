//! Output path planning with directory sharding
//!
//! Files land in `<root>/output_<low>_<high>/qrcode_<n>.jpg`, where `n` is the
//! 1-based sequence number and each shard directory holds at most
//! `shard_width` files.

use std::path::PathBuf;

/// Default number of files per shard directory.
pub const DEFAULT_SHARD_WIDTH: u64 = 500;

/// Inclusive 1-based bounds of the shard holding zero-based `index`.
pub fn shard_bounds(index: u64, shard_width: u64) -> (u64, u64) {
    let low = (index / shard_width) * shard_width + 1;
    (low, low + shard_width - 1)
}

#[derive(Debug, Clone)]
pub struct PathPlanner {
    root: PathBuf,
    shard_width: u64,
}

impl PathPlanner {
    /// `shard_width` must be non-zero; `Config` validates it.
    pub fn new(root: impl Into<PathBuf>, shard_width: u64) -> Self {
        Self {
            root: root.into(),
            shard_width,
        }
    }

    pub fn shard_dir(&self, index: u64) -> PathBuf {
        let (low, high) = shard_bounds(index, self.shard_width);
        self.root.join(format!("output_{low}_{high}"))
    }

    /// Output file for zero-based `index`.
    pub fn path_for(&self, index: u64) -> PathBuf {
        self.shard_dir(index)
            .join(format!("qrcode_{}.jpg", index + 1))
    }
}
