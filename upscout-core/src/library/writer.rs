//! Enriched CSV writer with a stable, additive schema.

use std::fs::File;
use std::io::{self, Write};

use super::{ENRICHMENT_COLUMNS, Enrichment, LibraryRow};
use crate::Result;

/// File wrapper whose `flush` also forces the data to disk.
///
/// A killed process then loses at most the row being processed.
#[derive(Debug)]
pub struct SyncedFile(File);

impl SyncedFile {
    pub fn new(file: File) -> Self {
        Self(file)
    }
}

impl Write for SyncedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()?;
        self.0.sync_data()
    }
}

/// Where an output column takes its value from.
#[derive(Debug, Clone, Copy)]
enum ColumnSource {
    Input(usize),
    Enrichment(usize),
}

/// Writes one output row per library row, flushing after each.
pub struct EnrichedWriter<W: Write> {
    writer: csv::Writer<W>,
    layout: Vec<ColumnSource>,
    rows_written: u64,
}

impl<W: Write> EnrichedWriter<W> {
    /// Writes the output header immediately.
    ///
    /// The header is the input header followed by every enrichment column it
    /// does not already contain. Existing columns are never removed or
    /// reordered.
    ///
    /// # Errors
    ///
    /// - `UpscoutError::Csv` - If the header cannot be written
    /// - `UpscoutError::Io` - If the destination cannot be flushed
    pub fn new(inner: W, input_header: &[String]) -> Result<Self> {
        let mut layout: Vec<ColumnSource> = input_header
            .iter()
            .enumerate()
            .map(|(index, column)| {
                match ENRICHMENT_COLUMNS
                    .iter()
                    .position(|name| column.trim().eq_ignore_ascii_case(name))
                {
                    Some(slot) => ColumnSource::Enrichment(slot),
                    None => ColumnSource::Input(index),
                }
            })
            .collect();

        let mut header: Vec<String> = input_header.to_vec();
        for (slot, name) in ENRICHMENT_COLUMNS.iter().enumerate() {
            let present = layout
                .iter()
                .any(|source| matches!(source, ColumnSource::Enrichment(s) if *s == slot));
            if !present {
                layout.push(ColumnSource::Enrichment(slot));
                header.push(name.to_string());
            }
        }

        let mut writer = csv::WriterBuilder::new().from_writer(inner);
        writer.write_record(&header)?;
        writer.flush()?;

        Ok(Self {
            writer,
            layout,
            rows_written: 0,
        })
    }

    /// Writes a row with the given enrichment and flushes it.
    ///
    /// # Errors
    ///
    /// - `UpscoutError::Csv` - If the row cannot be encoded or written
    /// - `UpscoutError::Io` - If the destination cannot be flushed
    pub fn write_row(&mut self, row: &LibraryRow, enrichment: &Enrichment) -> Result<()> {
        let record = self.layout.iter().map(|source| match source {
            ColumnSource::Input(index) => row.cells.get(*index).map(String::as_str).unwrap_or(""),
            ColumnSource::Enrichment(slot) => enrichment.value_at(*slot),
        });

        self.writer.write_record(record)?;
        self.writer.flush()?;
        self.rows_written += 1;
        Ok(())
    }

    /// Number of data rows written so far.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flushes and returns the underlying destination.
    ///
    /// # Errors
    ///
    /// - `UpscoutError::Io` - If the final flush fails
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|error| crate::UpscoutError::Io(error.into_error()))
    }
}
