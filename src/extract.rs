use crate::config::{CSV_BUFFER_SIZE, EMAIL_COLUMN};
use crate::error::{PipelineError, Result};
use crate::models::{is_xlsx, FileFormat};
use calamine::{open_workbook, open_workbook_auto, Data, DataRef, Range, Reader, Xlsx};
use csv::{ByteRecordsIntoIter, ReaderBuilder};
use memchr::memchr;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Lazily yields candidate addresses from one input file, header row excluded.
///
/// A row is a candidate when its address cell is non-empty and contains `@`. Anything
/// stricter is left to the validator. The first error ends the sequence.
pub enum Candidates {
    Csv(CsvCandidates),
    Sheet(SheetCandidates),
}

impl Iterator for Candidates {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Candidates::Csv(rows) => rows.next(),
            Candidates::Sheet(rows) => rows.next(),
        }
    }
}

/// Opens `path` with the reader its extension calls for.
pub fn open(path: &Path) -> Result<Candidates> {
    match FileFormat::from_path(path)? {
        FileFormat::Csv => CsvCandidates::open(path).map(Candidates::Csv),
        FileFormat::Spreadsheet => SheetCandidates::open(path).map(Candidates::Sheet),
    }
}

/// Reads every candidate address from `path`.
pub fn extract(path: &Path) -> Result<Vec<String>> {
    let start = Instant::now();
    info!(path = %path.display(), "Extracting emails");

    let emails = open(path)?.collect::<Result<Vec<_>>>()?;

    info!(
        path = %path.display(),
        count = emails.len(),
        duration_secs = start.elapsed().as_secs_f64(),
        "Extraction complete"
    );
    Ok(emails)
}

/// A cell is a candidate when it is non-empty and contains `@`.
fn is_candidate(cell: &[u8]) -> bool {
    !cell.is_empty() && memchr(b'@', cell).is_some()
}

/// Streams records straight from disk. Every row must have as many fields as the header.
///
/// Records are read as bytes and only the address column is decoded, so other columns
/// may hold any encoding.
pub struct CsvCandidates {
    path: PathBuf,
    records: ByteRecordsIntoIter<File>,
    done: bool,
}

impl CsvCandidates {
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .buffer_capacity(CSV_BUFFER_SIZE)
            .from_path(path)
            .map_err(|e| PipelineError::read(path, e))?;

        let headers = reader
            .byte_headers()
            .map_err(|e| PipelineError::read(path, e))?;
        if headers.is_empty() {
            return Err(PipelineError::read(path, "file is empty"));
        }
        debug!(path = %path.display(), columns = headers.len(), "CSV header read");

        Ok(Self {
            path: path.to_path_buf(),
            records: reader.into_byte_records(),
            done: false,
        })
    }
}

impl Iterator for CsvCandidates {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.records.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Ok(record)) => {
                    let email = record
                        .get(EMAIL_COLUMN)
                        .filter(|cell| is_candidate(cell))
                        .map(|cell| String::from_utf8_lossy(cell).into_owned());
                    if let Some(email) = email {
                        return Some(Ok(email));
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(PipelineError::read(&self.path, e)));
                }
            }
        }
    }
}

/// Candidates from the first worksheet of a workbook. Other sheets are never decoded.
///
/// `.xlsx` sheets are read cell by cell from the archive and only address-column
/// candidates are kept. Legacy `.xls` sheets are decoded into a [`Range`] first, since
/// the BIFF reader has no cell stream.
pub struct SheetCandidates {
    rows: SheetRows,
    done: bool,
}

enum SheetRows {
    Streamed(std::vec::IntoIter<String>),
    Decoded {
        range: Range<Data>,
        next_row: u32,
        last_row: u32,
    },
}

impl SheetCandidates {
    pub fn open(path: &Path) -> Result<Self> {
        let rows = if is_xlsx(path) {
            SheetRows::Streamed(stream_xlsx(path)?.into_iter())
        } else {
            decode_first_sheet(path)?
        };
        Ok(Self { rows, done: false })
    }
}

fn stream_xlsx(path: &Path) -> Result<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|e| PipelineError::read(path, e))?;
    let sheet = workbook
        .sheet_names()
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::read(path, "no sheets found in workbook"))?;
    let mut cells = workbook
        .worksheet_cells_reader(&sheet)
        .map_err(|e| PipelineError::read(path, e))?;

    let mut emails = Vec::new();
    let mut seen_any = false;
    while let Some(cell) = cells.next_cell().map_err(|e| PipelineError::read(path, e))? {
        seen_any = true;
        let (row, col) = cell.get_position();
        // absolute row 0 is the header
        if row == 0 || col != EMAIL_COLUMN as u32 {
            continue;
        }
        let email = cell_ref_text(cell.get_value()).filter(|t| is_candidate(t.as_bytes()));
        if let Some(email) = email {
            emails.push(email);
        }
    }
    if !seen_any {
        return Err(PipelineError::read(path, "first sheet is empty"));
    }
    debug!(path = %path.display(), candidates = emails.len(), "Worksheet streamed");
    Ok(emails)
}

fn decode_first_sheet(path: &Path) -> Result<SheetRows> {
    let mut workbook = open_workbook_auto(path).map_err(|e| PipelineError::read(path, e))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::read(path, "no sheets found in workbook"))?
        .map_err(|e| PipelineError::read(path, e))?;

    let Some((last_row, _)) = range.end() else {
        return Err(PipelineError::read(path, "first sheet is empty"));
    };
    debug!(path = %path.display(), rows = last_row + 1, "Worksheet decoded");

    Ok(SheetRows::Decoded {
        range,
        next_row: 1,
        last_row,
    })
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn cell_ref_text(cell: &DataRef<'_>) -> Option<String> {
    match cell {
        DataRef::Empty => None,
        DataRef::SharedString(s) => Some(s.to_string()),
        DataRef::String(s) => Some(s.clone()),
        other => cell_text(&Data::from(other.clone())),
    }
}

impl Iterator for SheetCandidates {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match &mut self.rows {
            SheetRows::Streamed(emails) => {
                if let Some(email) = emails.next() {
                    return Some(Ok(email));
                }
            }
            SheetRows::Decoded {
                range,
                next_row,
                last_row,
            } => {
                while *next_row <= *last_row {
                    let row = *next_row;
                    *next_row += 1;

                    let email = range
                        .get_value((row, EMAIL_COLUMN as u32))
                        .and_then(cell_text)
                        .filter(|t| is_candidate(t.as_bytes()));
                    if let Some(email) = email {
                        return Some(Ok(email));
                    }
                }
            }
        }
        self.done = true;
        None
    }
}
