//! Run directories.
//!
//! ```text
//! <root>/
//!   <domain>/
//!     data_YYYYmmdd_HHMMSS/
//!     data_YYYYmmdd_HHMMSS_1/      second run within the same second
//! ```

use crate::error::CliResult;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

pub const RUN_PREFIX: &str = "data_";

/// One run directory on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    /// Timestamp part of the directory name
    pub run_id: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct OutputManager {
    root: PathBuf,
}

impl OutputManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh `<root>/<domain>/data_<timestamp>`, never reusing an
    /// existing directory. Collisions get a `_<n>` suffix.
    pub fn create_run_dir(&self, domain: &str, at: NaiveDateTime) -> CliResult<PathBuf> {
        let domain_dir = self.root.join(domain);
        fs::create_dir_all(&domain_dir)?;

        let base = run_dir_name(at);
        let mut attempt = 0u32;
        loop {
            let name = match attempt {
                0 => base.clone(),
                n => format!("{}_{}", base, n),
            };
            let dir = domain_dir.join(name);
            match fs::create_dir(&dir) {
                Ok(()) => return Ok(dir),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Runs per domain, newest first. Domains without runs are omitted.
    pub fn list_runs(&self, domain: Option<&str>) -> CliResult<BTreeMap<String, Vec<RunInfo>>> {
        let mut result = BTreeMap::new();
        if !self.root.is_dir() {
            return Ok(result);
        }

        let domain_dirs: Vec<PathBuf> = match domain {
            Some(name) => vec![self.root.join(name)],
            None => subdirectories(&self.root)?,
        };

        for domain_dir in domain_dirs {
            if !domain_dir.is_dir() {
                continue;
            }
            let Some(name) = domain_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let mut runs = Vec::new();
            for path in subdirectories(&domain_dir)? {
                let Some(run_id) = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.strip_prefix(RUN_PREFIX))
                else {
                    continue;
                };
                runs.push(RunInfo {
                    run_id: run_id.to_string(),
                    size_bytes: dir_size(&path)?,
                    path,
                });
            }
            if !runs.is_empty() {
                runs.sort_by(|a, b| b.run_id.cmp(&a.run_id));
                result.insert(name.to_string(), runs);
            }
        }
        Ok(result)
    }

    /// Run directories `clear` would remove.
    pub fn clear_targets(&self, domain: Option<&str>) -> CliResult<Vec<PathBuf>> {
        Ok(self
            .list_runs(domain)?
            .into_values()
            .flatten()
            .map(|run| run.path)
            .collect())
    }

    /// Remove the given run directories. Returns how many were removed.
    pub fn remove(&self, targets: &[PathBuf]) -> CliResult<usize> {
        let mut removed = 0;
        for target in targets {
            if target.is_dir() {
                fs::remove_dir_all(target)?;
                info!(path = %target.display(), "Run removed");
                removed += 1;
            }
        }
        Ok(removed)
    }
}

pub fn run_dir_name(at: NaiveDateTime) -> String {
    format!("{}{}", RUN_PREFIX, at.format("%Y%m%d_%H%M%S"))
}

/// Total size of regular files under `path`.
pub fn dir_size(path: &Path) -> CliResult<u64> {
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_dir() {
            total += dir_size(&entry.path())?;
        } else if meta.is_file() {
            total += meta.len();
        }
    }
    Ok(total)
}

/// Human size: GB above one gigabyte, MB otherwise.
pub fn format_size(bytes: u64) -> String {
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = MB * 1024.0;
    let bytes = bytes as f64;
    if bytes > GB {
        format!("{:.2} GB", bytes / GB)
    } else {
        format!("{:.2} MB", bytes / MB)
    }
}

fn subdirectories(path: &Path) -> CliResult<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_run_dir_name() {
        assert_eq!(run_dir_name(at(9, 5, 7)), "data_20240501_090507");
    }

    #[test]
    fn test_list_runs_newest_first_with_sizes() {
        let tmp = tempfile::tempdir().unwrap();
        let out = OutputManager::new(tmp.path());
        let older = out.create_run_dir("timeline", at(8, 0, 0)).unwrap();
        let newer = out.create_run_dir("timeline", at(9, 0, 0)).unwrap();
        fs::create_dir_all(newer.join("events")).unwrap();
        fs::write(newer.join("events/part_0.jsonl"), vec![b'x'; 100]).unwrap();
        fs::write(older.join("daily_volume.jsonl"), vec![b'x'; 10]).unwrap();
        // Not a run directory.
        fs::create_dir_all(tmp.path().join("timeline/scratch")).unwrap();

        let runs = out.list_runs(None).unwrap();
        let timeline = &runs["timeline"];
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].run_id, "20240501_090000");
        assert_eq!(timeline[0].size_bytes, 100);
        assert_eq!(timeline[1].size_bytes, 10);
    }

    #[test]
    fn test_same_second_runs_get_separate_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let out = OutputManager::new(tmp.path());
        let first = out.create_run_dir("timeline", at(8, 0, 0)).unwrap();
        fs::write(first.join("events.jsonl"), b"{}\n").unwrap();
        let second = out.create_run_dir("timeline", at(8, 0, 0)).unwrap();
        let third = out.create_run_dir("timeline", at(8, 0, 0)).unwrap();

        assert_ne!(first, second);
        assert!(second.ends_with("data_20240501_080000_1"));
        assert!(third.ends_with("data_20240501_080000_2"));
        assert!(first.join("events.jsonl").is_file());
        assert!(!second.join("events.jsonl").exists());

        let runs = out.list_runs(Some("timeline")).unwrap();
        assert_eq!(runs["timeline"].len(), 3);
        assert_eq!(runs["timeline"][0].run_id, "20240501_080000_2");
    }

    #[test]
    fn test_list_missing_root_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let out = OutputManager::new(tmp.path().join("nope"));
        assert!(out.list_runs(None).unwrap().is_empty());
        assert!(out.list_runs(Some("timeline")).unwrap().is_empty());
    }

    #[test]
    fn test_clear_one_domain_keeps_others() {
        let tmp = tempfile::tempdir().unwrap();
        let out = OutputManager::new(tmp.path());
        out.create_run_dir("timeline", at(8, 0, 0)).unwrap();
        out.create_run_dir("timeline", at(9, 0, 0)).unwrap();
        let other = out.create_run_dir("sales", at(8, 0, 0)).unwrap();

        let targets = out.clear_targets(Some("timeline")).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(out.remove(&targets).unwrap(), 2);
        assert!(other.is_dir());
        assert!(out.list_runs(Some("timeline")).unwrap().is_empty());
    }

    #[test]
    fn test_clear_all() {
        let tmp = tempfile::tempdir().unwrap();
        let out = OutputManager::new(tmp.path());
        out.create_run_dir("timeline", at(8, 0, 0)).unwrap();
        out.create_run_dir("sales", at(8, 0, 0)).unwrap();

        let targets = out.clear_targets(None).unwrap();
        assert_eq!(out.remove(&targets).unwrap(), 2);
        assert!(out.list_runs(None).unwrap().is_empty());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.00 MB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }
}
