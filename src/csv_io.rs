// file: src/csv_io.rs
// description: csv reading/writing adapters and line-count pre-scan
// reference: https://docs.rs/csv

use crate::error::{PipelineError, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Counts the lines of a file without parsing it as CSV. The result feeds
/// progress reporting only; the streaming pass re-reads the file.
pub fn count_lines(path: &Path) -> Result<u64> {
    let file = open_file(path)?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut count = 0u64;

    loop {
        buf.clear();
        let bytes = reader.read_until(b'\n', &mut buf)?;
        if bytes == 0 {
            break;
        }
        count += 1;
    }

    Ok(count)
}

/// Sequential CSV reader yielding one record at a time. Rows may have a
/// variable number of fields; the header row is not treated specially.
pub struct RecordSource {
    reader: csv::Reader<File>,
}

impl RecordSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = open_file(path)?;
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);
        Ok(Self { reader })
    }

    /// Returns the next record, or `None` at end of input.
    pub fn next_record(&mut self) -> Result<Option<Vec<String>>> {
        let mut record = StringRecord::new();
        if self.reader.read_record(&mut record)? {
            Ok(Some(record.iter().map(str::to_string).collect()))
        } else {
            Ok(None)
        }
    }
}

/// Buffered CSV writer. Callers decide when to flush; dropping the sink
/// flushes whatever the internal buffer still holds.
pub struct RecordSink {
    writer: csv::Writer<File>,
}

impl RecordSink {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| PipelineError::FileOperation {
            path: path.to_path_buf(),
            source,
        })?;
        let writer = WriterBuilder::new().flexible(true).from_writer(file);
        Ok(Self { writer })
    }

    pub fn write_record(&mut self, fields: &[String]) -> Result<()> {
        self.writer.write_record(fields)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Reads a whole CSV file into memory. Intended for small files and for
/// inspecting pipeline output in tests.
pub fn read_records(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut source = RecordSource::open(path)?;
    let mut records = Vec::new();
    while let Some(record) = source.next_record()? {
        records.push(record);
    }
    Ok(records)
}

/// Writes records to a CSV file, creating or truncating it.
pub fn write_records(path: &Path, records: &[Vec<String>]) -> Result<()> {
    let mut sink = RecordSink::create(path)?;
    for record in records {
        sink.write_record(record)?;
    }
    sink.flush()
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| PipelineError::FileOperation {
        path: path.to_path_buf(),
        source,
    })
}
