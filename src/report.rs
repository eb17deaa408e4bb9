use crate::config::CSV_BUFFER_SIZE;
use crate::error::{PipelineError, Result};
use crate::models::{is_xlsx, ClassifiedEntry, ComparisonResult, FileFormat, Summary};
use csv::WriterBuilder;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, XlsxError};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;
use tracing::info;

pub const HEADERS: [&str; 6] = [
    "Email",
    "Normalized Email",
    "Source",
    "Status",
    "Valid",
    "Reason",
];

pub const RESULTS_SHEET: &str = "Validation Results";
pub const SUMMARY_SHEET: &str = "Summary";

const HEADER_FILL: u32 = 0xDDEBF7;

/// Where a reported address was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Both,
    SecondOnly,
    FirstOnly,
}

impl Relation {
    pub fn source_label(self) -> &'static str {
        match self {
            Relation::Both => "Both",
            Relation::SecondOnly => "Second File Only",
            Relation::FirstOnly => "First File Only",
        }
    }

    pub fn status_label(self) -> &'static str {
        match self {
            Relation::Both => "Matching",
            Relation::SecondOnly => "Missing in First File",
            Relation::FirstOnly => "Missing in Second File",
        }
    }

    pub fn from_status(status: &str) -> Option<Self> {
        [Relation::Both, Relation::SecondOnly, Relation::FirstOnly]
            .into_iter()
            .find(|r| r.status_label() == status)
    }
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

struct ReportRow<'a> {
    entry: &'a ClassifiedEntry,
    relation: Relation,
}

impl<'a> ReportRow<'a> {
    fn fields(&self) -> [&'a str; 6] {
        [
            self.entry.original.as_str(),
            self.entry.normalized_key.as_str(),
            self.relation.source_label(),
            self.relation.status_label(),
            yes_no(self.entry.is_valid),
            self.entry.invalid_reason.as_deref().unwrap_or(""),
        ]
    }
}

fn tagged(entries: &[ClassifiedEntry], relation: Relation) -> impl Iterator<Item = ReportRow<'_>> {
    entries.iter().map(move |entry| ReportRow { entry, relation })
}

/// Data rows in report order: matched, then missing in first, then missing in second.
fn report_rows(result: &ComparisonResult) -> impl Iterator<Item = ReportRow<'_>> {
    tagged(&result.matched, Relation::Both)
        .chain(tagged(&result.only_in_second, Relation::SecondOnly))
        .chain(tagged(&result.only_in_first, Relation::FirstOnly))
}

/// Format a report at `path` is written in. Only `.csv` and `.xlsx` are writable;
/// `.xls` names the legacy binary format, which readers would try to parse as such.
fn report_format(path: &Path) -> Result<FileFormat> {
    let format = FileFormat::from_path(path)?;
    if format == FileFormat::Spreadsheet && !is_xlsx(path) {
        return Err(PipelineError::unsupported(path));
    }
    Ok(format)
}

/// Writes the comparison report to `path` as CSV or XLSX, chosen by extension.
pub fn write_report(path: &Path, result: &ComparisonResult) -> Result<()> {
    let start = Instant::now();
    match report_format(path)? {
        FileFormat::Csv => write_csv(path, result),
        FileFormat::Spreadsheet => {
            write_xlsx(path, result).map_err(|e| PipelineError::write(path, e))
        }
    }?;

    info!(
        path = %path.display(),
        rows = result.matched.len() + result.only_in_first.len() + result.only_in_second.len(),
        duration_secs = start.elapsed().as_secs_f64(),
        "Report written"
    );
    Ok(())
}

fn write_csv(path: &Path, result: &ComparisonResult) -> Result<()> {
    let err = |e: csv::Error| PipelineError::write(path, e);

    let file = File::create(path).map_err(|e| PipelineError::write(path, e))?;
    // the trailing summary rows are narrower than the data rows
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .from_writer(BufWriter::with_capacity(CSV_BUFFER_SIZE, file));

    writer.write_record(HEADERS).map_err(err)?;
    for row in report_rows(result) {
        writer.write_record(row.fields()).map_err(err)?;
    }

    write_csv_summary(&mut writer, &result.summary).map_err(err)?;
    writer.flush().map_err(|e| PipelineError::write(path, e))?;
    Ok(())
}

fn write_csv_summary<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    summary: &Summary,
) -> csv::Result<()> {
    writer.write_record([""])?;
    writer.write_record(["Summary"])?;
    writer.write_record(["Metric", "Value"])?;

    let mut buf = itoa::Buffer::new();
    for (label, value) in summary.metrics() {
        writer.write_record([label, buf.format(value)])?;
    }
    Ok(())
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_border_bottom(FormatBorder::Thin)
        .set_align(FormatAlign::Center)
}

fn write_xlsx(path: &Path, result: &ComparisonResult) -> std::result::Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let header = header_format();

    let sheet = workbook.add_worksheet();
    sheet.set_name(RESULTS_SHEET)?;
    for (col, title) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
    }
    for (i, row) in report_rows(result).enumerate() {
        let r = i as u32 + 1;
        for (col, value) in row.fields().into_iter().enumerate() {
            // blank cells instead of empty strings
            if !value.is_empty() {
                sheet.write_string(r, col as u16, value)?;
            }
        }
    }
    for col in 0..HEADERS.len() as u16 {
        sheet.set_column_width(col, 20)?;
    }

    let sheet = workbook.add_worksheet();
    sheet.set_name(SUMMARY_SHEET)?;
    sheet.write_string_with_format(0, 0, "Metric", &header)?;
    sheet.write_string_with_format(0, 1, "Value", &header)?;
    for (i, (label, value)) in result.summary.metrics().into_iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, label)?;
        sheet.write_number(r, 1, value as f64)?;
    }
    sheet.set_column_width(0, 30)?;
    sheet.set_column_width(1, 15)?;

    workbook.save(path)
}
