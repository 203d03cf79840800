//! PAL trait: volume statistics and volume-name resolution.

#![allow(missing_docs)]

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::errors::{CleanerError, Result};

/// Capacity figures for one volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeStats {
    pub total_bytes: u64,
    /// Bytes available to an unprivileged caller.
    pub available_bytes: u64,
    pub root: PathBuf,
}

impl VolumeStats {
    /// Free space as a whole percentage, rounded half-to-even.
    ///
    /// A zero-sized volume is an error rather than a division by zero.
    pub fn free_pct_rounded(&self) -> Result<u8> {
        free_pct_rounded(self.available_bytes, self.total_bytes).ok_or_else(|| {
            CleanerError::VolumeStats {
                path: self.root.clone(),
                details: "volume reports zero total size".to_string(),
            }
        })
    }
}

/// `round(available / total * 100)` with ties to even, clamped to 100.
///
/// Integer arithmetic only, so `free_pct_rounded(19, 100)` is exactly 19.
#[must_use]
pub fn free_pct_rounded(available: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let scaled = u128::from(available.min(total)) * 100;
    let total = u128::from(total);
    let quotient = scaled / total;
    let twice_rem = (scaled % total) * 2;
    let rounded = match twice_rem.cmp(&total) {
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal if quotient % 2 == 1 => quotient + 1,
        _ => quotient,
    };
    u8::try_from(rounded.min(100)).ok()
}

/// OS abstraction used by the disk-space monitor.
pub trait Platform: Send + Sync {
    fn volume_stats(&self, root: &Path) -> Result<VolumeStats>;
}

/// `statvfs`-backed implementation for Unix hosts.
#[derive(Debug, Default)]
pub struct NativePlatform;

impl Platform for NativePlatform {
    #[cfg(unix)]
    fn volume_stats(&self, root: &Path) -> Result<VolumeStats> {
        let stat = nix::sys::statvfs::statvfs(root).map_err(|error| CleanerError::VolumeStats {
            path: root.to_path_buf(),
            details: error.to_string(),
        })?;
        #[allow(clippy::useless_conversion)]
        let fragment = u64::from(stat.fragment_size());
        #[allow(clippy::useless_conversion)]
        let (blocks, available) = (u64::from(stat.blocks()), u64::from(stat.blocks_available()));
        Ok(VolumeStats {
            total_bytes: blocks.saturating_mul(fragment),
            available_bytes: available.saturating_mul(fragment),
            root: root.to_path_buf(),
        })
    }

    #[cfg(not(unix))]
    fn volume_stats(&self, root: &Path) -> Result<VolumeStats> {
        Err(CleanerError::UnsupportedPlatform {
            details: format!(
                "volume statistics are only implemented for Unix hosts (asked for {})",
                root.display()
            ),
        })
    }
}

/// In-memory mock implementation for deterministic tests.
#[derive(Debug, Clone, Default)]
pub struct MockPlatform {
    stats_by_root: HashMap<PathBuf, VolumeStats>,
}

impl MockPlatform {
    #[must_use]
    pub fn new(stats: impl IntoIterator<Item = VolumeStats>) -> Self {
        Self {
            stats_by_root: stats
                .into_iter()
                .map(|stats| (stats.root.clone(), stats))
                .collect(),
        }
    }

    /// Mock with one volume at `root`.
    #[must_use]
    pub fn single(root: impl Into<PathBuf>, total_bytes: u64, available_bytes: u64) -> Self {
        Self::new([VolumeStats {
            total_bytes,
            available_bytes,
            root: root.into(),
        }])
    }
}

impl Platform for MockPlatform {
    fn volume_stats(&self, root: &Path) -> Result<VolumeStats> {
        self.stats_by_root
            .get(root)
            .cloned()
            .ok_or_else(|| CleanerError::VolumeStats {
                path: root.to_path_buf(),
                details: "mock volume not found".to_string(),
            })
    }
}

/// Detect active platform implementation.
pub fn detect_platform() -> Result<Arc<dyn Platform>> {
    #[cfg(unix)]
    {
        Ok(Arc::new(NativePlatform))
    }
    #[cfg(not(unix))]
    {
        Err(CleanerError::UnsupportedPlatform {
            details: "only Unix hosts are currently implemented".to_string(),
        })
    }
}

/// Map a configured volume name (`C:`) to the root path that gets measured.
///
/// Order: explicit `VolumeMounts` entry (exact, then case-insensitive), then
/// the host convention. On Windows `X:` becomes `X:\`; elsewhere only the
/// boot volume name maps, to `/`. Anything else is [`CleanerError::UnknownVolume`].
pub fn resolve_volume_root(name: &str, mounts: &BTreeMap<String, PathBuf>) -> Result<PathBuf> {
    if let Some(path) = mounts.get(name) {
        return Ok(path.clone());
    }
    if let Some((_, path)) = mounts.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
        return Ok(path.clone());
    }

    #[cfg(windows)]
    {
        let mut chars = name.chars();
        if let (Some(letter), Some(':'), None) = (chars.next(), chars.next(), chars.next())
            && letter.is_ascii_alphabetic()
        {
            return Ok(PathBuf::from(format!("{name}\\")));
        }
    }

    #[cfg(not(windows))]
    {
        if name.eq_ignore_ascii_case(&crate::core::config::default_volume_name()) {
            return Ok(PathBuf::from("/"));
        }
    }

    Err(CleanerError::UnknownVolume {
        volume: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::default_volume_name;

    #[test]
    fn free_pct_examples() {
        assert_eq!(free_pct_rounded(19, 100), Some(19));
        assert_eq!(free_pct_rounded(21, 100), Some(21));
        assert_eq!(free_pct_rounded(0, 100), Some(0));
        assert_eq!(free_pct_rounded(100, 100), Some(100));
        assert_eq!(free_pct_rounded(1, 0), None);
    }

    #[test]
    fn free_pct_rounds_half_to_even() {
        // 0.5% → 0, 1.5% → 2, 2.5% → 2
        assert_eq!(free_pct_rounded(1, 200), Some(0));
        assert_eq!(free_pct_rounded(3, 200), Some(2));
        assert_eq!(free_pct_rounded(5, 200), Some(2));
        // 19.6% → 20
        assert_eq!(free_pct_rounded(196, 1000), Some(20));
        // 19.4% → 19
        assert_eq!(free_pct_rounded(194, 1000), Some(19));
    }

    #[test]
    fn free_pct_handles_large_volumes_and_overreporting() {
        assert_eq!(free_pct_rounded(u64::MAX / 2, u64::MAX), Some(50));
        assert_eq!(free_pct_rounded(200, 100), Some(100));
    }

    #[test]
    fn zero_sized_volume_is_an_error() {
        let stats = VolumeStats {
            total_bytes: 0,
            available_bytes: 0,
            root: PathBuf::from("/mnt/empty"),
        };
        let err = stats.free_pct_rounded().unwrap_err();
        assert_eq!(err.code(), "CCL-2003");
    }

    #[test]
    fn mock_platform_returns_known_roots_only() {
        let mock = MockPlatform::single("/mnt/data", 1000, 250);
        let stats = mock.volume_stats(Path::new("/mnt/data")).unwrap();
        assert_eq!(stats.free_pct_rounded().unwrap(), 25);
        assert!(mock.volume_stats(Path::new("/mnt/other")).is_err());
    }

    #[test]
    fn explicit_mounts_win() {
        let mut mounts = BTreeMap::new();
        mounts.insert("D:".to_string(), PathBuf::from("/mnt/data"));
        assert_eq!(
            resolve_volume_root("D:", &mounts).unwrap(),
            PathBuf::from("/mnt/data")
        );
        assert_eq!(
            resolve_volume_root("d:", &mounts).unwrap(),
            PathBuf::from("/mnt/data")
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn unmapped_volumes_on_unix() {
        let mounts = BTreeMap::new();
        assert_eq!(
            resolve_volume_root(&default_volume_name(), &mounts).unwrap(),
            PathBuf::from("/")
        );
        let err = resolve_volume_root("Q:", &mounts).unwrap_err();
        assert!(matches!(err, CleanerError::UnknownVolume { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn native_platform_reads_root_volume() {
        let stats = NativePlatform.volume_stats(Path::new("/")).unwrap();
        assert!(stats.total_bytes > 0);
        assert!(stats.available_bytes <= stats.total_bytes);
    }
}
