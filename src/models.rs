use crate::error::{PipelineError, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Which of the two compared files an entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Source {
    First,
    Second,
}

impl Source {
    pub fn label(self) -> &'static str {
        match self {
            Source::First => "First File",
            Source::Second => "Second File",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One address after validation. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedEntry {
    pub original: String,
    pub source: Source,
    pub normalized_key: String,
    pub is_valid: bool,
    pub is_disposable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_emails_first_file: usize,
    pub total_emails_second_file: usize,
    pub valid_emails_first_file: usize,
    pub valid_emails_second_file: usize,
    pub matching_count: usize,
    pub missing_in_first_count: usize,
    pub missing_in_second_count: usize,
    pub disposable_emails_count: usize,
    pub processing_time_seconds: f64,
}

impl Summary {
    /// The eight report metrics as label/value pairs, in report order.
    pub fn metrics(&self) -> [(&'static str, usize); 8] {
        [
            ("Total Emails in First File", self.total_emails_first_file),
            ("Total Emails in Second File", self.total_emails_second_file),
            ("Valid Emails in First File", self.valid_emails_first_file),
            ("Valid Emails in Second File", self.valid_emails_second_file),
            ("Matching Emails", self.matching_count),
            ("Emails Missing in First File", self.missing_in_first_count),
            ("Emails Missing in Second File", self.missing_in_second_count),
            ("Disposable Emails", self.disposable_emails_count),
        ]
    }
}

/// Three-way partition of two address lists by normalized key.
///
/// `matched` holds one representative per shared key, always taken from the first file.
/// `only_in_second` is what the first file is missing and `only_in_first` is what the
/// second file is missing.
#[derive(Debug, Clone, Default)]
pub struct ComparisonResult {
    pub matched: Vec<ClassifiedEntry>,
    pub only_in_first: Vec<ClassifiedEntry>,
    pub only_in_second: Vec<ClassifiedEntry>,
    pub summary: Summary,
}

/// What a caller of the pipeline receives back
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub matching_emails: Vec<String>,
    pub missing_in_first_file: Vec<String>,
    pub missing_in_second_file: Vec<String>,
    pub file_name: String,
    pub output_path: String,
    pub summary: Summary,
}

/// Tabular file formats, chosen purely by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Spreadsheet,
}

pub const SPREADSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

impl FileFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("csv") => Ok(FileFormat::Csv),
            Some("xlsx") | Some("xls") => Ok(FileFormat::Spreadsheet),
            _ => Err(PipelineError::unsupported(path)),
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            FileFormat::Csv => "text/csv",
            FileFormat::Spreadsheet => SPREADSHEET_CONTENT_TYPE,
        }
    }
}

/// True for the zipped OOXML workbook extension, as opposed to legacy `.xls`.
pub fn is_xlsx(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"))
}

/// Content type a transport layer should send a generated report with.
pub fn content_type(path: &Path) -> &'static str {
    FileFormat::from_path(path)
        .map(FileFormat::content_type)
        .unwrap_or("application/octet-stream")
}

/// Report format requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Excel,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Excel => "xlsx",
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("output format must be 'csv' or 'excel', got '{0}'")]
pub struct ParseOutputFormatError(pub String);

impl FromStr for OutputFormat {
    type Err = ParseOutputFormatError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "" | "csv" => Ok(OutputFormat::Csv),
            "excel" => Ok(OutputFormat::Excel),
            other => Err(ParseOutputFormatError(other.to_string())),
        }
    }
}
