//! Disk space resolution.
//!
//! Maps a directory to the volume that holds it and reports that volume's
//! capacity. The resolution itself is a pure function over a mount snapshot;
//! [`SystemDisks`] feeds it the host's live mount table and [`StaticMounts`]
//! feeds it a fixed list.

mod error;
mod mounts;

use std::path::{Path, PathBuf};

pub use error::{DiskError, DiskResult};
pub use mounts::{
    DiskSpaceInfo, MountPoint, query_volume, resolve_mount, snapshot_mounts, unc_share_root,
};
use serde::{Deserialize, Serialize};

/// Looks up the volume holding a path.
pub trait DiskSpaceLookup: Send + Sync {
    /// Resolve the mount that contains `path`.
    fn resolve(&self, path: &Path) -> DiskResult<MountPoint>;

    /// Capacity of the volume holding `path`.
    ///
    /// Fails with [`DiskError::NotReady`] when the volume exists but reports
    /// no usable capacity.
    fn query(&self, path: &Path) -> DiskResult<DiskSpaceInfo> {
        let mount = self.resolve(path)?;
        if !mount.space.ready || mount.space.total_bytes == 0 {
            return Err(DiskError::NotReady(mount.root));
        }
        Ok(mount.space)
    }
}

/// Live lookup against the host's mount table.
///
/// Every query takes a fresh snapshot so free space is current at the time
/// of the call. Network shares resolve by their own share root, queried
/// directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDisks;

impl DiskSpaceLookup for SystemDisks {
    fn resolve(&self, path: &Path) -> DiskResult<MountPoint> {
        // Symlinked directories must resolve to the volume they point at.
        let absolute = std::fs::canonicalize(path)
            .or_else(|_| std::path::absolute(path))
            .unwrap_or_else(|_| path.to_path_buf());

        if let Some(share) = unc_share_root(&absolute) {
            return query_volume(&share);
        }

        let mounts = snapshot_mounts();
        resolve_mount(&absolute, &mounts)
            .cloned()
            .ok_or_else(|| DiskError::NoDrive(path.to_path_buf()))
    }
}

/// A fixed mount list.
#[derive(Debug, Clone, Default)]
pub struct StaticMounts(pub Vec<MountPoint>);

impl StaticMounts {
    pub fn new(mounts: Vec<MountPoint>) -> Self {
        Self(mounts)
    }

    /// A single volume that holds every path.
    pub fn single(root: impl Into<PathBuf>, space: DiskSpaceInfo) -> Self {
        Self(vec![MountPoint::new(root, space)])
    }
}

impl DiskSpaceLookup for StaticMounts {
    fn resolve(&self, path: &Path) -> DiskResult<MountPoint> {
        resolve_mount(path, &self.0)
            .cloned()
            .ok_or_else(|| DiskError::NoDrive(path.to_path_buf()))
    }
}

/// Drive information for a path, as printed by `sweeper drive-info`.
///
/// Capacity fields are omitted when the drive is not ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveReport {
    pub root_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
}

impl From<&MountPoint> for DriveReport {
    fn from(mount: &MountPoint) -> Self {
        let ready = mount.space.ready;
        Self {
            root_path: mount.root.clone(),
            available_bytes: ready.then_some(mount.space.available_bytes),
            total_bytes: ready.then_some(mount.space.total_bytes),
        }
    }
}

/// Describe the drive holding `path`.
pub fn drive_report(lookup: &dyn DiskSpaceLookup, path: &Path) -> DiskResult<DriveReport> {
    lookup.resolve(path).map(|mount| DriveReport::from(&mount))
}
