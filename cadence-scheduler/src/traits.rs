//! Collaborator seams.
//!
//! The scheduler never touches rows. A [`DatasetBuilder`] turns a window into
//! named relations, and a [`Sink`] persists them.

use cadence_core::{CadenceResult, DateWindow, RowCount};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Produces relations for a date window.
///
/// Called repeatedly over disjoint windows; each call must yield disjoint
/// rows per table.
pub trait DatasetBuilder {
    type Relation;

    fn build_batch(&mut self, window: DateWindow) -> CadenceResult<BTreeMap<String, Self::Relation>>;
}

impl<B: DatasetBuilder + ?Sized> DatasetBuilder for &mut B {
    type Relation = B::Relation;

    fn build_batch(&mut self, window: DateWindow) -> CadenceResult<BTreeMap<String, Self::Relation>> {
        (**self).build_batch(window)
    }
}

/// Where a table ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum TableLocation {
    /// Single file
    File(PathBuf),
    /// Directory of parts
    Partitioned(PathBuf),
    /// Held in memory
    Memory(String),
}

impl TableLocation {
    pub fn is_partitioned(&self) -> bool {
        matches!(self, TableLocation::Partitioned(_))
    }
}

impl fmt::Display for TableLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableLocation::File(path) => write!(f, "{}", path.display()),
            TableLocation::Partitioned(path) => write!(f, "{}/ (partitioned)", path.display()),
            TableLocation::Memory(name) => write!(f, "memory:{}", name),
        }
    }
}

/// Result of one sink write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReceipt {
    pub location: TableLocation,
    pub rows: RowCount,
}

/// Persists relations.
///
/// With a `part_id` the write must append a new part to the table rather
/// than overwrite earlier parts.
pub trait Sink<R> {
    fn write(
        &mut self,
        table: &str,
        relation: R,
        estimated_rows: RowCount,
        part_id: Option<u32>,
    ) -> CadenceResult<WriteReceipt>;
}

impl<R, S: Sink<R> + ?Sized> Sink<R> for &mut S {
    fn write(
        &mut self,
        table: &str,
        relation: R,
        estimated_rows: RowCount,
        part_id: Option<u32>,
    ) -> CadenceResult<WriteReceipt> {
        (**self).write(table, relation, estimated_rows, part_id)
    }
}

impl<R, S: Sink<R> + ?Sized> Sink<R> for Box<S> {
    fn write(
        &mut self,
        table: &str,
        relation: R,
        estimated_rows: RowCount,
        part_id: Option<u32>,
    ) -> CadenceResult<WriteReceipt> {
        (**self).write(table, relation, estimated_rows, part_id)
    }
}
