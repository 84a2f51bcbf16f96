use std::path::{Component, Path, PathBuf, Prefix};

use serde::{Deserialize, Serialize};
use sysinfo::Disks;

use super::error::{DiskError, DiskResult};

/// Capacity of one volume at the moment it was sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskSpaceInfo {
    pub total_bytes: u64,
    pub available_bytes: u64,
    /// False when the volume reported no usable capacity (unmounted media,
    /// pseudo filesystems).
    pub ready: bool,
}

impl DiskSpaceInfo {
    pub fn new(total_bytes: u64, available_bytes: u64) -> Self {
        Self {
            total_bytes,
            available_bytes,
            ready: total_bytes > 0,
        }
    }

    /// Free space as a percentage of capacity, or `None` when the volume
    /// cannot be evaluated.
    pub fn free_percent(&self) -> Option<f64> {
        if !self.ready || self.total_bytes == 0 {
            return None;
        }
        Some(self.available_bytes as f64 / self.total_bytes as f64 * 100.0)
    }
}

/// A mounted volume and its capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    pub root: PathBuf,
    pub space: DiskSpaceInfo,
}

impl MountPoint {
    pub fn new(root: impl Into<PathBuf>, space: DiskSpaceInfo) -> Self {
        Self {
            root: root.into(),
            space,
        }
    }
}

/// Find the volume that contains `path`.
///
/// Picks the mount with the longest root that is a component-wise prefix of
/// `path`, so `/mnt/media/archive` resolves to a volume mounted there rather
/// than to `/mnt/media` or `/`. Network shares (`\\server\share\...`) only
/// resolve to a mount rooted at that same share.
pub fn resolve_mount<'a>(path: &Path, mounts: &'a [MountPoint]) -> Option<&'a MountPoint> {
    if let Some(Component::Prefix(prefix)) = path.components().next()
        && matches!(prefix.kind(), Prefix::UNC(..) | Prefix::VerbatimUNC(..))
    {
        return mounts.iter().find(|mount| {
            matches!(mount.root.components().next(), Some(Component::Prefix(root)) if root == prefix)
        });
    }

    mounts
        .iter()
        .filter(|mount| path.starts_with(&mount.root))
        .max_by_key(|mount| mount.root.components().count())
}

/// The share root (`\\server\share\`) of a network path.
///
/// `None` for anything that is not a UNC path.
pub fn unc_share_root(path: &Path) -> Option<PathBuf> {
    match path.components().next() {
        Some(Component::Prefix(prefix))
            if matches!(prefix.kind(), Prefix::UNC(..) | Prefix::VerbatimUNC(..)) =>
        {
            Some(path.components().take(2).collect())
        }
        _ => None,
    }
}

/// Sample the capacity of the volume at `root` directly, without consulting
/// the mount table. Network shares are not listed there.
pub fn query_volume(root: &Path) -> DiskResult<MountPoint> {
    let sample = fs2::total_space(root).and_then(|total| {
        fs2::available_space(root).map(|available| DiskSpaceInfo::new(total, available))
    });

    match sample {
        Ok(space) => Ok(MountPoint::new(root, space)),
        Err(e) => {
            tracing::debug!(root = %root.display(), error = %e, "Volume query failed");
            Err(DiskError::NotReady(root.to_path_buf()))
        }
    }
}

/// Take a fresh snapshot of the host's mounted volumes.
pub fn snapshot_mounts() -> Vec<MountPoint> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .map(|disk| {
            MountPoint::new(
                disk.mount_point(),
                DiskSpaceInfo::new(disk.total_space(), disk.available_space()),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mount(root: &str, total: u64, available: u64) -> MountPoint {
        MountPoint::new(root, DiskSpaceInfo::new(total, available))
    }

    #[cfg(unix)]
    #[test]
    fn test_longest_prefix_wins() {
        let mounts = vec![
            mount("/", 100, 50),
            mount("/mnt/media", 1000, 100),
            mount("/mnt/media/archive", 4000, 3000),
        ];

        let resolved = resolve_mount(Path::new("/mnt/media/archive/2024/a.mkv"), &mounts).unwrap();
        assert_eq!(resolved.root, PathBuf::from("/mnt/media/archive"));

        let resolved = resolve_mount(Path::new("/mnt/media/tv"), &mounts).unwrap();
        assert_eq!(resolved.root, PathBuf::from("/mnt/media"));

        let resolved = resolve_mount(Path::new("/home/user"), &mounts).unwrap();
        assert_eq!(resolved.root, PathBuf::from("/"));
    }

    #[cfg(unix)]
    #[test]
    fn test_order_of_mount_list_does_not_matter() {
        let mounts = vec![
            mount("/mnt/media/archive", 4000, 3000),
            mount("/", 100, 50),
            mount("/mnt/media", 1000, 100),
        ];
        let resolved = resolve_mount(Path::new("/mnt/media/archive/x"), &mounts).unwrap();
        assert_eq!(resolved.root, PathBuf::from("/mnt/media/archive"));
    }

    #[cfg(unix)]
    #[test]
    fn test_sibling_with_shared_text_prefix_not_matched() {
        let mounts = vec![mount("/", 100, 50), mount("/mnt/data", 1000, 100)];
        let resolved = resolve_mount(Path::new("/mnt/data2/file"), &mounts).unwrap();
        assert_eq!(resolved.root, PathBuf::from("/"));
    }

    #[cfg(unix)]
    #[test]
    fn test_no_matching_mount() {
        let mounts = vec![mount("/mnt/data", 1000, 100)];
        assert!(resolve_mount(Path::new("/srv/other"), &mounts).is_none());
        assert!(resolve_mount(Path::new("relative/path"), &mounts).is_none());
        assert!(resolve_mount(Path::new("/srv/other"), &[]).is_none());
    }

    #[cfg(windows)]
    #[test]
    fn test_unc_path_resolves_to_own_share() {
        let mounts = vec![
            mount(r"C:\", 100, 50),
            mount(r"\\nas\media\", 1000, 900),
        ];
        let resolved = resolve_mount(Path::new(r"\\nas\media\movies\a.mkv"), &mounts).unwrap();
        assert_eq!(resolved.root, PathBuf::from(r"\\nas\media\"));
        assert!(resolve_mount(Path::new(r"\\nas\other\x"), &mounts).is_none());
    }

    #[cfg(windows)]
    #[test]
    fn test_unc_share_root() {
        assert_eq!(
            unc_share_root(Path::new(r"\\nas\media\movies\a.mkv")),
            Some(PathBuf::from(r"\\nas\media\"))
        );
        assert_eq!(unc_share_root(Path::new(r"C:\media")), None);
    }

    #[test]
    fn test_local_path_is_not_a_share() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(unc_share_root(dir.path()), None);
        assert_eq!(unc_share_root(Path::new("relative/path")), None);
    }

    #[test]
    fn test_query_volume_samples_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mount = query_volume(dir.path()).unwrap();
        assert_eq!(mount.root, dir.path());
        assert!(mount.space.ready);
        assert!(mount.space.available_bytes <= mount.space.total_bytes);
    }

    #[test]
    fn test_query_volume_missing_root_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let err = query_volume(&dir.path().join("gone")).unwrap_err();
        assert!(matches!(err, DiskError::NotReady(_)));
    }

    #[test]
    fn test_free_percent() {
        assert_eq!(DiskSpaceInfo::new(200, 50).free_percent(), Some(25.0));
        assert_eq!(DiskSpaceInfo::new(0, 0).free_percent(), None);

        let not_ready = DiskSpaceInfo {
            total_bytes: 100,
            available_bytes: 10,
            ready: false,
        };
        assert_eq!(not_ready.free_percent(), None);
    }
}
