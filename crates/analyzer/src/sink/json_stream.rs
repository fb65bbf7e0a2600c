//! NDJSON (newline-delimited JSON) stream sink.
//!
//! Each row is serialized directly to the writer without an intermediate
//! `String` allocation.
//!
//! ```ignore
//! let mut sink = JsonStreamSink::stdout();
//! sink.write_summary(&summary)?;
//! sink.write_rows(&members)?;
//! sink.write_rows(&resources)?;
//! ```

use super::ReportSummaryRow;
use serde::Serialize;
use std::io::{self, BufWriter, Write};

/// Buffered NDJSON writer.
pub struct JsonStreamSink<W: Write> {
    writer: BufWriter<W>,
    rows_written: usize,
}

impl JsonStreamSink<io::Stdout> {
    /// Write NDJSON to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonStreamSink<W> {
    /// Create a sink wrapping any writer (file, Vec<u8>, etc.).
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(64 * 1024, writer),
            rows_written: 0,
        }
    }

    /// Write the report summary row.
    pub fn write_summary(&mut self, row: &ReportSummaryRow) -> io::Result<()> {
        self.write_row(row)
    }

    /// Write a batch of rows of any schema.
    pub fn write_rows<T: Serialize>(&mut self, rows: &[T]) -> io::Result<()> {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    fn write_row<T: Serialize>(&mut self, row: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, row).map_err(io::Error::other)?;
        self.writer.write_all(b"\n")?;
        self.rows_written += 1;
        Ok(())
    }

    /// Flush and return how many rows were written.
    pub fn finish(mut self) -> io::Result<usize> {
        self.writer.flush()?;
        Ok(self.rows_written)
    }

    /// Number of rows written so far.
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{GroupMemberRow, ResourceAccessRow};

    #[test]
    fn writes_one_json_object_per_line() {
        let mut buf = Vec::new();
        let mut sink = JsonStreamSink::new(&mut buf);

        let summary = ReportSummaryRow {
            organization: "acme".into(),
            total_members: 3,
            total_groups: 1,
            total_resources: 1,
            unshared_resources: 0,
            org_wide_resources: 1,
            collect_time_ms: 1200,
            total_time_ms: 1250,
        };
        let members = vec![GroupMemberRow {
            organization: "acme".into(),
            group: "Eng".into(),
            group_id: Some(7),
            member: "bob".into(),
            email: None,
        }];
        let resources = vec![ResourceAccessRow {
            organization: "acme".into(),
            resource: "repo1".into(),
            shared_with: vec!["everybody in acme".into()],
            groups: 1,
            individuals: 0,
            no_access: false,
        }];

        sink.write_summary(&summary).unwrap();
        sink.write_rows(&members).unwrap();
        sink.write_rows(&resources).unwrap();
        assert_eq!(sink.rows_written(), 3);
        let n = sink.finish().unwrap();
        assert_eq!(n, 3);

        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.trim().split('\n').collect();
        assert_eq!(lines.len(), 3);

        let member: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(member["group_id"], 7);
        assert!(member["email"].is_null());

        let resource: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(resource["shared_with"][0], "everybody in acme");
    }
}
