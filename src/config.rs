//! Config file loading and merging with CLI arguments.
//!
//! Precedence: command line > environment > config file > built-in default.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use animal_etl::client::{ClientSettings, RetryPolicy};
use animal_etl::pipeline::{FetchMode, PipelineConfig};
use anyhow::{Context, Result, bail};

use crate::cli::{Args, CliValueSources};

/// Values read from a `key = value` config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Base URL of the animals API.
    pub base_url: Option<String>,
    /// Detail fetch workers (1..=100).
    pub concurrency: Option<u8>,
    /// Records per upload request (1..=1000).
    pub batch_size: Option<u16>,
    /// Attempts per request (1..=10).
    pub max_attempts: Option<u8>,
    /// Per-request timeout in seconds (1..=3600).
    pub timeout_secs: Option<u64>,
    /// Fetch details one at a time.
    pub sequential: Option<bool>,
    /// Default log verbosity.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against the same ranges the CLI enforces.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency {
            validate_range("concurrency", u64::from(concurrency), 1, 100)?;
        }
        if let Some(batch_size) = self.batch_size {
            validate_range("batch_size", u64::from(batch_size), 1, 1000)?;
        }
        if let Some(max_attempts) = self.max_attempts {
            validate_range("max_attempts", u64::from(max_attempts), 1, 10)?;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            validate_range("timeout_secs", timeout_secs, 1, 3600)?;
        }
        if let Some(base_url) = &self.base_url {
            if url::Url::parse(base_url).is_err() {
                bail!("Invalid config value for `base_url`: '{base_url}' is not a valid URL");
            }
        }
        Ok(())
    }
}

fn validate_range(field: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Quiet,
    Default,
    Verbose,
    Trace,
}

impl VerbositySetting {
    /// Returns the stable string label for display output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::Default => "default",
            Self::Verbose => "verbose",
            Self::Trace => "trace",
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Path that was consulted, if any.
    pub path: Option<PathBuf>,
    /// Parsed file config when a file was found.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/animal-etl/config.toml`
/// 2. `$HOME/.config/animal-etl/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("animal-etl")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("animal-etl")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist. The default path is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.is_file() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_number = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_number}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_number}");

        match key {
            "base_url" => {
                cfg.base_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "concurrency" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                cfg.concurrency = Some(
                    u8::try_from(parsed)
                        .map_err(|_| anyhow::anyhow!("concurrency out of range for u8"))
                        .with_context(invalid)?,
                );
            }
            "batch_size" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                cfg.batch_size = Some(
                    u16::try_from(parsed)
                        .map_err(|_| anyhow::anyhow!("batch_size out of range for u16"))
                        .with_context(invalid)?,
                );
            }
            "max_attempts" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                cfg.max_attempts = Some(
                    u8::try_from(parsed)
                        .map_err(|_| anyhow::anyhow!("max_attempts out of range for u8"))
                        .with_context(invalid)?,
                );
            }
            "timeout_secs" => {
                cfg.timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "sequential" => {
                cfg.sequential = Some(parse_boolean(value).with_context(invalid)?);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_number}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_number}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "quiet" => Ok(VerbositySetting::Quiet),
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "trace" => Ok(VerbositySetting::Trace),
        _ => bail!("Expected one of: quiet, default, verbose, trace"),
    }
}

/// Fills every argument not given explicitly from the config file.
pub fn apply_config_defaults(
    mut args: Args,
    sources: &CliValueSources,
    file_config: Option<&FileConfig>,
) -> Args {
    let Some(file_config) = file_config else {
        return args;
    };

    if !sources.base_url {
        if let Some(base_url) = &file_config.base_url {
            args.base_url.clone_from(base_url);
        }
    }
    if !sources.concurrency {
        if let Some(concurrency) = file_config.concurrency {
            args.concurrency = concurrency;
        }
    }
    if !sources.batch_size {
        if let Some(batch_size) = file_config.batch_size {
            args.batch_size = batch_size;
        }
    }
    if !sources.max_attempts {
        if let Some(max_attempts) = file_config.max_attempts {
            args.max_attempts = max_attempts;
        }
    }
    if !sources.timeout_secs {
        if let Some(timeout_secs) = file_config.timeout_secs {
            args.timeout_secs = timeout_secs;
        }
    }
    if !sources.sequential {
        if let Some(sequential) = file_config.sequential {
            args.sequential = sequential;
        }
    }
    if !sources.verbose && !sources.quiet {
        if let Some(verbosity) = file_config.verbosity {
            apply_config_verbosity(&mut args, verbosity);
        }
    }

    args
}

fn apply_config_verbosity(args: &mut Args, verbosity: VerbositySetting) {
    let (quiet, verbose) = match verbosity {
        VerbositySetting::Quiet => (true, 0),
        VerbositySetting::Default => (false, 0),
        VerbositySetting::Verbose => (false, 1),
        VerbositySetting::Trace => (false, 2),
    };
    args.quiet = quiet;
    args.verbose = verbose;
}

/// Default tracing level for the effective arguments.
#[must_use]
pub fn resolve_default_log_level(args: &Args) -> &'static str {
    if args.quiet {
        return "error";
    }
    match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Transport settings for the effective arguments.
#[must_use]
pub fn resolve_client_settings(args: &Args) -> ClientSettings {
    let defaults = ClientSettings::default();
    ClientSettings {
        request_timeout: Duration::from_secs(args.timeout_secs),
        retry_policy: RetryPolicy::with_max_attempts(u32::from(args.max_attempts)),
        ..defaults
    }
}

/// Stage settings for the effective arguments.
#[must_use]
pub fn resolve_pipeline_config(args: &Args) -> PipelineConfig {
    let fetch_mode = if args.sequential {
        FetchMode::Sequential
    } else {
        FetchMode::Parallel {
            concurrency: usize::from(args.concurrency),
        }
    };
    PipelineConfig {
        fetch_mode,
        batch_size: usize::from(args.batch_size),
    }
}
