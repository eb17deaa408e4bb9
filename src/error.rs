//! Error types for the comparison pipeline

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Terminal failures of a comparison request. None of them are retried.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input or output path has an extension other than `.csv`, `.xlsx` or `.xls`
    #[error("unsupported file format: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },

    /// I/O failure or malformed row structure while extracting
    #[error("failed to read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    /// I/O failure while rendering the report
    #[error("failed to write {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },
}

impl PipelineError {
    pub fn unsupported(path: &Path) -> Self {
        PipelineError::UnsupportedFormat {
            path: path.to_path_buf(),
        }
    }

    pub fn read(path: &Path, err: impl std::fmt::Display) -> Self {
        PipelineError::Read {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub fn write(path: &Path, err: impl std::fmt::Display) -> Self {
        PipelineError::Write {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_path() {
        let err = PipelineError::read(Path::new("list.csv"), "unexpected end of file");
        assert_eq!(
            err.to_string(),
            "failed to read list.csv: unexpected end of file"
        );

        let err = PipelineError::unsupported(Path::new("list.txt"));
        assert_eq!(err.to_string(), "unsupported file format: list.txt");
    }
}
