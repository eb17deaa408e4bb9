//! mailmatch: email list validation and comparison
//!
//! Takes two tabular files (CSV or Excel), each listing email addresses in its first
//! column, and reports which addresses appear in both, which only in the first and which
//! only in the second:
//!
//! 1. **Extraction** -- Stream candidate addresses out of each file, header row skipped,
//!    both files read concurrently
//! 2. **Validation** -- Classify every address (valid, disposable, reason) on a bounded
//!    worker pool; output order always matches input order
//! 3. **Comparison** -- Single-pass reconciliation on normalized keys, so
//!    `First.Last+tag@Gmail.com` and `firstlast@gmail.com` count as the same address
//! 4. **Report** -- Write the three partitions plus summary metrics as CSV or XLSX
//!
//! # Key Modules
//!
//! - [`pipeline`] -- `process_validation_request`, the single entry point
//! - [`extract`] -- CSV and spreadsheet readers behind one iterator
//! - [`normalize`] -- Canonical comparison keys
//! - [`validate`] -- Pluggable validation policies and batch validation
//! - [`compare`] -- Three-way partition and summary counts
//! - [`report`] -- CSV and XLSX report writers
//! - [`cache`] -- Expiring key-value store for domain lookups
//! - [`pool`] -- Order-preserving parallel map with bounded fan-out
//! - [`models`] -- Entries, summaries, formats
//! - [`config`] -- Constants
//!
//! # Example Usage
//!
//! ```bash
//! mailmatch compare --first crm.csv --second newsletter.xlsx --format excel
//! mailmatch check " First.Last+promo@gmail.com " not-an-address
//! ```

pub mod cache;
pub mod compare;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod pool;
pub mod report;
pub mod validate;

pub use error::{PipelineError, Result};
pub use models::{ClassifiedEntry, ComparisonResult, OutputFormat, Source, Summary, ValidationResult};
pub use pipeline::{process_validation_request, PipelineContext};
