//! Free disk space queries.

use cadence_core::{bytes_to_gb, BYTES_PER_GB};
use std::path::{Path, PathBuf};
use sysinfo::Disks;

/// Source of free-space figures for a filesystem path.
pub trait DiskSpace {
    /// Free GB on the filesystem holding `path`, or `None` if unknown.
    fn free_gb(&self, path: &Path) -> Option<f64>;
}

impl<D: DiskSpace + ?Sized> DiskSpace for &D {
    fn free_gb(&self, path: &Path) -> Option<f64> {
        (**self).free_gb(path)
    }
}

/// `sysinfo`-backed disk guard.
///
/// The filesystem is the mounted disk with the longest mount point that is a
/// prefix of the path. Paths that do not exist yet resolve through their
/// nearest existing ancestor.
#[derive(Debug, Default)]
pub struct DiskGuard;

impl DiskGuard {
    pub fn new() -> Self {
        Self
    }

    /// True when `path` has at least `estimated_bytes + buffer_gb` free.
    ///
    /// Unknown free space is treated as enough; the write itself reports any
    /// real failure.
    pub fn has_space(&self, path: &Path, estimated_bytes: u64, buffer_gb: f64) -> bool {
        match self.free_gb(path) {
            Some(free) => free >= bytes_to_gb(estimated_bytes) + buffer_gb,
            None => true,
        }
    }
}

impl DiskSpace for DiskGuard {
    fn free_gb(&self, path: &Path) -> Option<f64> {
        let target = existing_ancestor(path)?;
        let disks = Disks::new_with_refreshed_list();
        disks
            .iter()
            .filter(|disk| target.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| disk.available_space() as f64 / BYTES_PER_GB)
    }
}

fn existing_ancestor(path: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    absolute
        .ancestors()
        .find(|p| p.exists())
        .and_then(|p| p.canonicalize().ok())
}

/// Fixed free-space figure, for dry runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedDiskSpace(pub Option<f64>);

impl DiskSpace for FixedDiskSpace {
    fn free_gb(&self, _path: &Path) -> Option<f64> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_ancestor_of_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("a").join("b");
        let found = existing_ancestor(&missing).unwrap();
        assert_eq!(found, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_guard_finds_tempdir_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let guard = DiskGuard::new();
        if let Some(free) = guard.free_gb(dir.path()) {
            assert!(free >= 0.0);
        }
        assert!(guard.has_space(dir.path(), 0, 0.0));
    }

    #[test]
    fn test_fixed_disk_space() {
        let fixed = FixedDiskSpace(Some(12.5));
        assert_eq!(fixed.free_gb(Path::new("/anywhere")), Some(12.5));
    }
}
