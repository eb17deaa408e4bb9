use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mailmatch::config::DEFAULT_OUTPUT_DIR;
use mailmatch::validate::{CachedDomainCheck, ResolverDomainCheck, StrictPolicy, Validator};
use mailmatch::{process_validation_request, OutputFormat, PipelineContext, Source};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "mailmatch")]
#[command(about = "Validate and compare email lists from two CSV or Excel files")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two files and write a report
    Compare(CompareArgs),
    /// Classify addresses given on the command line
    Check(CheckArgs),
}

#[derive(Args)]
struct PolicyArgs {
    /// Also check address format and flag disposable domains
    #[arg(long)]
    strict: bool,

    /// With --strict, reject domains the system resolver cannot find
    #[arg(long, requires = "strict")]
    check_domains: bool,
}

impl PolicyArgs {
    fn validator(&self) -> Validator {
        if !self.strict {
            return Validator::default();
        }
        let policy = if self.check_domains {
            StrictPolicy::new().with_domain_check(CachedDomainCheck::new(ResolverDomainCheck))
        } else {
            StrictPolicy::new()
        };
        Validator::new(policy)
    }
}

#[derive(Args)]
struct CompareArgs {
    /// First file (.csv, .xlsx or .xls)
    #[arg(short, long)]
    first: PathBuf,

    /// Second file (.csv, .xlsx or .xls)
    #[arg(short, long)]
    second: PathBuf,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Directory the report is written to
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Print the full result as JSON instead of a summary
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    policy: PolicyArgs,
}

#[derive(Args)]
struct CheckArgs {
    /// Addresses to classify
    #[arg(required = true)]
    addresses: Vec<String>,

    #[command(flatten)]
    policy: PolicyArgs,
}

fn run_compare(args: CompareArgs) -> Result<()> {
    if args.policy.strict {
        warn!("Strict validation enabled");
    }
    let ctx = PipelineContext::new(&args.output_dir).with_validator(args.policy.validator());

    let result = process_validation_request(&ctx, &args.first, &args.second, args.format)
        .with_context(|| {
            format!(
                "Failed to compare {} with {}",
                args.first.display(),
                args.second.display()
            )
        })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let s = &result.summary;
    println!();
    println!("=== Summary ===");
    println!("Processing time:          {:.2}s", s.processing_time_seconds);
    println!();
    for (label, value) in s.metrics() {
        println!("{:<30}{}", format!("{label}:"), value);
    }
    println!();
    println!("Report written to: {}", result.output_path);

    Ok(())
}

fn run_check(args: CheckArgs) -> Result<()> {
    let validator = args.policy.validator();
    let entries = validator.validate_batch(args.addresses, Source::First);

    for entry in entries {
        let mut line = format!(
            "{:?} -> {} [{}]",
            entry.original,
            entry.normalized_key,
            if entry.is_valid { "valid" } else { "invalid" }
        );
        if entry.is_disposable {
            line.push_str(" disposable");
        }
        if let Some(reason) = &entry.invalid_reason {
            line.push_str(": ");
            line.push_str(reason);
        }
        println!("{line}");
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Compare(args) => run_compare(args),
        Commands::Check(args) => run_check(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
