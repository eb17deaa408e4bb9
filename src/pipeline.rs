use crate::compare::compare;
use crate::config::{DEFAULT_OUTPUT_DIR, MAX_NAME_ATTEMPTS, OUTPUT_FILE_PREFIX};
use crate::error::{PipelineError, Result};
use crate::extract::extract;
use crate::models::{ClassifiedEntry, OutputFormat, Source, ValidationResult};
use crate::report::write_report;
use crate::validate::Validator;
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything a comparison request needs besides its inputs.
#[derive(Clone)]
pub struct PipelineContext {
    pub output_dir: PathBuf,
    pub validator: Validator,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            validator: Validator::default(),
        }
    }
}

impl PipelineContext {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// `validation_result_<YYYYMMDD_HHMMSS>.<ext>`, with `_<n>` before the extension when
/// `n > 0`.
fn numbered_file_name(stamp: &str, n: u32, format: OutputFormat) -> String {
    if n == 0 {
        format!("{}_{}.{}", OUTPUT_FILE_PREFIX, stamp, format.extension())
    } else {
        format!("{}_{}_{}.{}", OUTPUT_FILE_PREFIX, stamp, n, format.extension())
    }
}

/// `validation_result_<YYYYMMDD_HHMMSS>.<ext>`
pub fn output_file_name(format: OutputFormat) -> String {
    numbered_file_name(&timestamp(), 0, format)
}

/// Creates an empty report file under `dir` and returns its name and path.
///
/// The file is created exclusively, so concurrent requests stamped with the same second
/// get `_1`, `_2`, ... suffixes instead of overwriting each other.
fn claim_output_file(dir: &Path, stamp: &str, format: OutputFormat) -> Result<(String, PathBuf)> {
    for n in 0..MAX_NAME_ATTEMPTS {
        let name = numbered_file_name(stamp, n, format);
        let path = dir.join(&name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => return Ok((name, path)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(PipelineError::write(&path, e)),
        }
    }
    Err(PipelineError::write(
        dir,
        format!("no free report name for timestamp {stamp}"),
    ))
}

fn emails(entries: Vec<ClassifiedEntry>) -> Vec<String> {
    entries.into_iter().map(|e| e.original).collect()
}

/// Compares the addresses in two files and writes the report into the context's
/// output directory.
///
/// Both files are extracted concurrently, then both lists are validated concurrently.
/// Comparison and report writing run on the calling thread. The first error aborts
/// the request; input files are left untouched.
pub fn process_validation_request(
    ctx: &PipelineContext,
    first_path: &Path,
    second_path: &Path,
    format: OutputFormat,
) -> Result<ValidationResult> {
    let start = Instant::now();
    info!(
        first = %first_path.display(),
        second = %second_path.display(),
        "Starting email validation"
    );

    let (first, second) = rayon::join(|| extract(first_path), || extract(second_path));
    let (first, second) = (first?, second?);
    debug!(
        duration_secs = start.elapsed().as_secs_f64(),
        "Both files extracted"
    );

    let validator = &ctx.validator;
    let (first, second) = rayon::join(
        || validator.validate_batch(first, Source::First),
        || validator.validate_batch(second, Source::Second),
    );

    let mut result = compare(first, second);
    result.summary.processing_time_seconds = start.elapsed().as_secs_f64();

    fs::create_dir_all(&ctx.output_dir).map_err(|e| PipelineError::write(&ctx.output_dir, e))?;
    let (file_name, output_path) = claim_output_file(&ctx.output_dir, &timestamp(), format)?;
    info!(path = %output_path.display(), "Generating output file");
    if let Err(e) = write_report(&output_path, &result) {
        if let Err(rm) = fs::remove_file(&output_path) {
            warn!(path = %output_path.display(), error = %rm, "Failed to remove partial report");
        }
        return Err(e);
    }

    let validation = ValidationResult {
        matching_emails: emails(result.matched),
        missing_in_first_file: emails(result.only_in_second),
        missing_in_second_file: emails(result.only_in_first),
        file_name,
        output_path: output_path.to_string_lossy().to_string(),
        summary: result.summary,
    };

    info!(
        duration_secs = start.elapsed().as_secs_f64(),
        matching = validation.matching_emails.len(),
        missing_in_first = validation.missing_in_first_file.len(),
        missing_in_second = validation.missing_in_second_file.len(),
        "Email validation completed"
    );
    Ok(validation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_shape() {
        let name = output_file_name(OutputFormat::Csv);
        assert!(name.starts_with("validation_result_"));
        assert!(name.ends_with(".csv"));
        // prefix + '_' + 8 digits + '_' + 6 digits + ".csv"
        assert_eq!(name.len(), "validation_result_".len() + 15 + 4);

        assert!(output_file_name(OutputFormat::Excel).ends_with(".xlsx"));
    }

    #[test]
    fn same_second_requests_get_distinct_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let stamp = "20240102_030405";

        let (first, first_path) = claim_output_file(dir.path(), stamp, OutputFormat::Csv).unwrap();
        let (second, second_path) = claim_output_file(dir.path(), stamp, OutputFormat::Csv).unwrap();
        let (third, _) = claim_output_file(dir.path(), stamp, OutputFormat::Excel).unwrap();

        assert_eq!(first, "validation_result_20240102_030405.csv");
        assert_eq!(second, "validation_result_20240102_030405_1.csv");
        assert_eq!(third, "validation_result_20240102_030405.xlsx");
        assert!(first_path.exists() && second_path.exists());
    }

    #[test]
    fn claim_in_missing_dir_is_a_write_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            claim_output_file(&missing, "20240102_030405", OutputFormat::Csv),
            Err(PipelineError::Write { .. })
        ));
    }

    #[test]
    fn default_context() {
        let ctx = PipelineContext::default();
        assert_eq!(ctx.output_dir, PathBuf::from("./temp"));
    }
}
