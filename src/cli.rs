//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use animal_etl::client::{DEFAULT_BASE_URL, DEFAULT_MAX_ATTEMPTS, REQUEST_TIMEOUT_SECS};
use animal_etl::pipeline::{DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY};
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};

/// Extract animals from the source API, normalize them and load them in batches.
#[derive(Parser, Debug, Clone)]
#[command(name = "animal-etl")]
#[command(author, version, about)]
pub struct Args {
    /// Base URL of the animals API
    #[arg(long, env = "ANIMAL_ETL_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Maximum concurrent detail fetches (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Records per upload request (1-1000)
    #[arg(short = 'b', long, default_value_t = DEFAULT_BATCH_SIZE as u16, value_parser = clap::value_parser!(u16).range(1..=1000))]
    pub batch_size: u16,

    /// Fetch details one at a time instead of in parallel
    #[arg(long)]
    pub sequential: bool,

    /// Maximum attempts per request, including the first (1-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_ATTEMPTS as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_attempts: u8,

    /// Per-request timeout in seconds (1-3600)
    #[arg(long = "timeout", default_value_t = REQUEST_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout_secs: u64,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to a config file (defaults to the XDG config location)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Which arguments were given explicitly, on the command line or via the environment.
///
/// Explicit values win over the config file; defaulted values do not.
#[derive(Debug, Clone, Copy, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct CliValueSources {
    pub base_url: bool,
    pub concurrency: bool,
    pub batch_size: bool,
    pub sequential: bool,
    pub max_attempts: bool,
    pub timeout_secs: bool,
    pub verbose: bool,
    pub quiet: bool,
}

impl CliValueSources {
    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            base_url: is_explicit(matches, "base_url"),
            concurrency: is_explicit(matches, "concurrency"),
            batch_size: is_explicit(matches, "batch_size"),
            sequential: is_explicit(matches, "sequential"),
            max_attempts: is_explicit(matches, "max_attempts"),
            timeout_secs: is_explicit(matches, "timeout_secs"),
            verbose: is_explicit(matches, "verbose"),
            quiet: is_explicit(matches, "quiet"),
        }
    }
}

fn is_explicit(matches: &ArgMatches, id: &str) -> bool {
    matches!(
        matches.value_source(id),
        Some(ValueSource::CommandLine | ValueSource::EnvVariable)
    )
}

/// Parses process arguments, exiting with clap's usage error on bad input.
pub fn parse_with_sources() -> (Args, CliValueSources) {
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    (args, CliValueSources::from_matches(&matches))
}

#[cfg(test)]
fn try_parse_with_sources(argv: &[&str]) -> Result<(Args, CliValueSources), clap::Error> {
    let matches = Args::command().try_get_matches_from(argv)?;
    let args = Args::from_arg_matches(&matches)?;
    Ok((args, CliValueSources::from_matches(&matches)))
}
