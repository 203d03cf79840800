//! Free-space check for the configured volume.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::core::config::PolicyConfig;
use crate::core::errors::Result;
use crate::platform::pal::{Platform, resolve_volume_root};

/// Result of one successful disk check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskCheck {
    pub volume: String,
    pub root: PathBuf,
    pub free_pct: u8,
    pub threshold_pct: u8,
    pub below_threshold: bool,
}

/// Alert condition: strictly below the threshold.
#[must_use]
pub const fn is_below_threshold(free_pct: u8, threshold_pct: u8) -> bool {
    free_pct < threshold_pct
}

/// Measures one named volume against a fixed threshold.
pub struct DiskSpaceMonitor {
    platform: Arc<dyn Platform>,
    volume_name: String,
    mounts: BTreeMap<String, PathBuf>,
    threshold_pct: u8,
}

impl DiskSpaceMonitor {
    #[must_use]
    pub fn new(
        platform: Arc<dyn Platform>,
        volume_name: impl Into<String>,
        mounts: BTreeMap<String, PathBuf>,
        threshold_pct: u8,
    ) -> Self {
        Self {
            platform,
            volume_name: volume_name.into(),
            mounts,
            threshold_pct,
        }
    }

    #[must_use]
    pub fn from_policy(platform: Arc<dyn Platform>, policy: &PolicyConfig) -> Self {
        Self::new(
            platform,
            policy.volume_name.clone(),
            policy.volume_mounts.clone(),
            policy.free_space_alert_percent,
        )
    }

    #[must_use]
    pub fn volume_name(&self) -> &str {
        &self.volume_name
    }

    #[must_use]
    pub const fn threshold_pct(&self) -> u8 {
        self.threshold_pct
    }

    /// Resolve the volume, read its capacity and compare against the threshold.
    ///
    /// Any failure (unknown volume, unreadable stats, zero size) is returned
    /// to the caller; no other volume is tried.
    pub fn check(&self) -> Result<DiskCheck> {
        let root = resolve_volume_root(&self.volume_name, &self.mounts)?;
        let stats = self.platform.volume_stats(&root)?;
        let free_pct = stats.free_pct_rounded()?;
        Ok(DiskCheck {
            volume: self.volume_name.clone(),
            root,
            free_pct,
            threshold_pct: self.threshold_pct,
            below_threshold: is_below_threshold(free_pct, self.threshold_pct),
        })
    }
}
