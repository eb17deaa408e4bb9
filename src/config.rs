use std::time::Duration;

/// Upper bound on concurrent validation workers per batch
pub const MAX_VALIDATION_WORKERS: usize = 10;

/// Zero-based column holding the address in every input file
pub const EMAIL_COLUMN: usize = 0;

/// Provider whose local part ignores dots and `+tag` suffixes
pub const GMAIL_DOMAIN: &str = "gmail.com";

/// How long a domain lookup result stays cached
pub const DOMAIN_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Directory reports are written to when none is given
pub const DEFAULT_OUTPUT_DIR: &str = "./temp";

/// Prefix for generated report file names
pub const OUTPUT_FILE_PREFIX: &str = "validation_result";

/// Report names tried per timestamp before giving up
pub const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Buffer size for CSV readers and writers
pub const CSV_BUFFER_SIZE: usize = 128 * 1024;

/// Port used when resolving a domain through the system resolver
pub const DOMAIN_LOOKUP_PORT: u16 = 25;
