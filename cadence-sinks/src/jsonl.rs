//! JSON Lines sink.
//!
//! ```text
//! <root>/<table>.jsonl                 single pass
//! <root>/<table>/part_<id>.jsonl       batched, one part per batch
//! ```

use cadence_budget::{estimated_bytes, DiskGuard};
use cadence_core::{CadenceResult, RowCount, SinkError};
use cadence_scheduler::{Sink, TableLocation, WriteReceipt};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Writes each relation as newline-delimited JSON under a root directory.
#[derive(Debug)]
pub struct JsonlSink {
    root: PathBuf,
    guard: DiskGuard,
    bytes_per_row: u64,
    buffer_gb: f64,
    check_space: bool,
}

impl JsonlSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            guard: DiskGuard::new(),
            bytes_per_row: 64,
            buffer_gb: 20.0,
            check_space: true,
        }
    }

    /// Free space required beyond each write's estimate.
    pub fn with_space_check(mut self, bytes_per_row: u64, buffer_gb: f64) -> Self {
        self.bytes_per_row = bytes_per_row;
        self.buffer_gb = buffer_gb;
        self.check_space = true;
        self
    }

    pub fn without_space_check(mut self) -> Self {
        self.check_space = false;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn target(&self, table: &str, part_id: Option<u32>) -> (PathBuf, TableLocation) {
        match part_id {
            Some(id) => {
                let dir = self.root.join(table);
                (
                    dir.join(format!("part_{}.jsonl", id)),
                    TableLocation::Partitioned(dir),
                )
            }
            None => {
                let path = self.root.join(format!("{}.jsonl", table));
                (path.clone(), TableLocation::File(path))
            }
        }
    }
}

fn write_failed(table: &str, err: impl ToString) -> SinkError {
    SinkError::WriteFailed {
        table: table.to_string(),
        reason: err.to_string(),
    }
}

impl<T: Serialize> Sink<Vec<T>> for JsonlSink {
    fn write(
        &mut self,
        table: &str,
        relation: Vec<T>,
        estimated_rows: RowCount,
        part_id: Option<u32>,
    ) -> CadenceResult<WriteReceipt> {
        if self.check_space
            && !self.guard.has_space(
                &self.root,
                estimated_bytes(estimated_rows, self.bytes_per_row),
                self.buffer_gb,
            )
        {
            warn!(table, estimated_rows, buffer_gb = self.buffer_gb, "Not enough free disk for write");
            return Err(SinkError::InsufficientSpace {
                table: table.to_string(),
            }
            .into());
        }

        let (path, location) = self.target(table, part_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SinkError::Directory {
                path: parent.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        let file = File::create(&path).map_err(|e| write_failed(table, e))?;
        let mut writer = BufWriter::new(file);
        for row in &relation {
            serde_json::to_writer(&mut writer, row).map_err(|e| write_failed(table, e))?;
            writer.write_all(b"\n").map_err(|e| write_failed(table, e))?;
        }
        writer.flush().map_err(|e| write_failed(table, e))?;

        let rows = relation.len() as RowCount;
        debug!(table, rows, path = %path.display(), "JSONL written");
        Ok(WriteReceipt { location, rows })
    }
}
