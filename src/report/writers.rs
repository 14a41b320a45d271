//! # Built-in row writers.
//!
//! - [`JsonLinesWriter`] one `serde_json` object per line, flushed per row
//! - [`MemoryWriter`] shared in-memory collector (tests, demos, summaries)

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::SinkError;
use crate::report::sink::RowWriter;

/// Writes each row as one JSON line.
///
/// The line is encoded in full before it reaches the writer, so a row is either
/// written whole or not at all.
#[derive(Debug)]
pub struct JsonLinesWriter<W> {
    out: W,
}

impl<W: Write + Send + 'static> JsonLinesWriter<W> {
    /// Wraps a writer (file, stdout, socket, buffer).
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<R, W> RowWriter<R> for JsonLinesWriter<W>
where
    R: Serialize,
    W: Write + Send + 'static,
{
    fn write_row(&mut self, row: &R) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(row)?;
        line.push(b'\n');
        self.out.write_all(&line)?;
        self.out.flush()?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.out.flush()?;
        Ok(())
    }
}

/// Collects rows in memory; clones share the same buffer.
#[derive(Debug)]
pub struct MemoryWriter<R> {
    rows: Arc<Mutex<Vec<R>>>,
}

impl<R> Clone for MemoryWriter<R> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<R> Default for MemoryWriter<R> {
    fn default() -> Self {
        Self {
            rows: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<R: Clone> MemoryWriter<R> {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies out the rows collected so far.
    pub fn rows(&self) -> Vec<R> {
        self.rows.lock().clone()
    }

    /// Number of rows collected so far.
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    /// True if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

impl<R: Clone + Send + 'static> RowWriter<R> for MemoryWriter<R> {
    fn write_row(&mut self, row: &R) -> Result<(), SinkError> {
        self.rows.lock().push(row.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Level, ReportRow, ReportSink, WarningRow};
    use std::thread;

    /// Cloneable in-memory byte buffer.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            // Byte-at-a-time writes would expose any interleaving between rows.
            let Some(&byte) = buf.first() else {
                return Ok(0);
            };
            self.0.lock().push(byte);
            Ok(1)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn warning(id: u64) -> WarningRow {
        WarningRow {
            id,
            kind: "layer".into(),
            params: format!("name=l{id}"),
            level: Level::Warning,
            message: "layer is disabled".into(),
        }
    }

    #[test]
    fn test_json_lines_one_object_per_line() {
        let buf = SharedBuf::default();
        let mut w = JsonLinesWriter::new(buf.clone());
        RowWriter::<WarningRow>::write_row(&mut w, &warning(1)).unwrap();
        RowWriter::<WarningRow>::write_row(&mut w, &warning(2)).unwrap();

        let text = String::from_utf8(buf.0.lock().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let v: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(v["id"], 2);
        assert_eq!(v["level"], "WARNING");
    }

    #[test]
    fn test_concurrent_writes_are_not_interleaved() {
        let buf = SharedBuf::default();
        let sink = ReportSink::new(
            MemoryWriter::<ReportRow>::new(),
            JsonLinesWriter::new(buf.clone()),
        );

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for i in 0..50 {
                        sink.write_warning(&warning(t * 100 + i)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let text = String::from_utf8(buf.0.lock().clone()).unwrap();
        let mut ids: Vec<u64> = text
            .lines()
            .map(|l| {
                let v: serde_json::Value = serde_json::from_str(l).unwrap();
                v["id"].as_u64().unwrap()
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 200);
        assert_eq!(sink.warning_rows(), 200);
    }

    #[test]
    fn test_memory_writer_clones_share_rows() {
        let a = MemoryWriter::<WarningRow>::new();
        let mut b = a.clone();
        b.write_row(&warning(9)).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a.rows()[0].id, 9);
    }
}
