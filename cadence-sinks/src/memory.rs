//! In-memory sink for dry runs.

use cadence_core::{CadenceResult, RowCount};
use cadence_scheduler::{Sink, TableLocation, WriteReceipt};
use std::collections::BTreeMap;

/// Keeps every written relation, grouped by table in write order.
#[derive(Debug, Clone)]
pub struct MemorySink<T> {
    tables: BTreeMap<String, Vec<Vec<T>>>,
}

impl<T> Default for MemorySink<T> {
    fn default() -> Self {
        Self {
            tables: BTreeMap::new(),
        }
    }
}

impl<T> MemorySink<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parts written for `table`, in order.
    pub fn parts(&self, table: &str) -> &[Vec<T>] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All rows of `table`, parts concatenated.
    pub fn rows(&self, table: &str) -> impl Iterator<Item = &T> {
        self.parts(table).iter().flatten()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

impl<T> Sink<Vec<T>> for MemorySink<T> {
    fn write(
        &mut self,
        table: &str,
        relation: Vec<T>,
        _estimated_rows: RowCount,
        _part_id: Option<u32>,
    ) -> CadenceResult<WriteReceipt> {
        let rows = relation.len() as RowCount;
        self.tables.entry(table.to_string()).or_default().push(relation);
        Ok(WriteReceipt {
            location: TableLocation::Memory(table.to_string()),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts_accumulate() {
        let mut sink = MemorySink::new();
        sink.write("t", vec![1, 2], 2, Some(0)).unwrap();
        sink.write("t", vec![3], 1, Some(1)).unwrap();
        assert_eq!(sink.parts("t").len(), 2);
        assert_eq!(sink.rows("t").copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(sink.parts("missing").len(), 0);
        assert_eq!(sink.table_names().collect::<Vec<_>>(), vec!["t"]);
    }
}
