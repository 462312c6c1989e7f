//! CLI mode for gofile-dl - mirrors one share link into a local directory.

mod progress;

use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::{AppConfig, LineProgress, Session, WalkSummary, Walker};

pub use progress::{IndicatifProgress, make_progress_bar, print_summary};

/// Environment variable consulted when no `-p` is given.
pub const PASSWORD_ENV: &str = "GOFILE_PASSWORD";

/// How chatty logging should be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Warnings and errors only.
    Quiet,
    /// Informational messages.
    #[default]
    Normal,
    /// Everything including debug output.
    Verbose,
}

impl Verbosity {
    const fn filter(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Normal => "info",
            Self::Verbose => "debug",
        }
    }
}

/// Parsed command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// Share link to mirror.
    pub url: String,
    /// Overrides the configured output directory.
    pub output_dir: Option<PathBuf>,
    /// Password for protected content.
    pub password: Option<String>,
    /// Overrides the configured chunk size.
    pub chunk_size: Option<usize>,
    /// Overrides the configured depth limit.
    pub max_depth: Option<usize>,
    /// Overrides the configured request timeout.
    pub timeout_secs: Option<u64>,
    /// Explicit config file.
    pub config_path: Option<PathBuf>,
    /// Forces single-line progress output.
    pub plain: bool,
    /// Log level selection.
    pub verbosity: Verbosity,
}

impl CliArgs {
    /// Layers the command-line overrides on top of a loaded config.
    #[must_use]
    pub fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(dir) = &self.output_dir {
            config.output_dir.clone_from(dir);
        }
        if let Some(size) = self.chunk_size {
            config.download = config.download.with_chunk_size(size);
        }
        if let Some(depth) = self.max_depth {
            config.download = config.download.with_max_depth(depth);
        }
        if self.timeout_secs.is_some() {
            config.download = config.download.with_request_timeout_secs(self.timeout_secs);
        }
        config
    }
}

/// What the command line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Mirror a share link.
    Run(CliArgs),
    /// Print usage and exit.
    Help,
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<String>) -> Result<T, String> {
    let value = value.ok_or_else(|| format!("{flag} requires a value"))?;
    value
        .parse()
        .map_err(|_| format!("invalid value for {flag}: {value}"))
}

/// Parses command-line arguments (without the program name).
///
/// # Errors
///
/// Returns a message describing the first unknown option, missing or
/// malformed value, or a missing or repeated URL.
pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Command, String> {
    let mut args = args.into_iter();
    let mut parsed = CliArgs::default();
    let mut url = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-d" | "--dir" => {
                parsed.output_dir = Some(PathBuf::from(
                    args.next().ok_or_else(|| format!("{arg} requires a value"))?,
                ));
            }
            "-p" | "--password" => {
                parsed.password =
                    Some(args.next().ok_or_else(|| format!("{arg} requires a value"))?);
            }
            "--chunk-size" => parsed.chunk_size = Some(parse_value(&arg, args.next())?),
            "--max-depth" => parsed.max_depth = Some(parse_value(&arg, args.next())?),
            "--timeout" => parsed.timeout_secs = Some(parse_value(&arg, args.next())?),
            "--config" => {
                parsed.config_path = Some(PathBuf::from(
                    args.next().ok_or_else(|| format!("{arg} requires a value"))?,
                ));
            }
            "--plain" => parsed.plain = true,
            "-v" | "--verbose" => parsed.verbosity = Verbosity::Verbose,
            "-q" | "--quiet" => parsed.verbosity = Verbosity::Quiet,
            positional if !positional.starts_with('-') => {
                if url.replace(positional.to_string()).is_some() {
                    return Err("only one URL may be given".to_string());
                }
            }
            _ => return Err(format!("unknown option: {arg}")),
        }
    }

    parsed.url = url.ok_or_else(|| "missing <url>".to_string())?;
    Ok(Command::Run(parsed))
}

fn print_usage() {
    eprintln!("Usage: gofile-dl [OPTIONS] <url>");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <url>                 Share link, e.g. https://gofile.io/d/ABC123");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -d, --dir <DIR>       Output directory (default: ./output)");
    eprintln!("  -p, --password <PW>   Password for protected content (or ${PASSWORD_ENV})");
    eprintln!("      --chunk-size <N>  Bytes written per piece (default: 8192)");
    eprintln!("      --max-depth <N>   Maximum folder depth (default: 64)");
    eprintln!("      --timeout <SECS>  Per-request timeout");
    eprintln!("      --config <PATH>   Config file");
    eprintln!("                        (default: $XDG_CONFIG_HOME/gofile-dl/config.toml)");
    eprintln!("      --plain           Single-line progress output");
    eprintln!("  -v, --verbose         Debug logging");
    eprintln!("  -q, --quiet           Warnings and errors only");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Exit status:");
    eprintln!("  0  the walk finished; failed files and folders are listed in the summary");
    eprintln!("  1  bad arguments, unreadable config, invalid URL or authentication failure");
}

/// Installs the global logger. `RUST_LOG` wins over `verbosity`.
fn init_logging(verbosity: Verbosity) {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(verbosity.filter()),
    )
    .format(|buf, record| {
        writeln!(
            buf,
            "[{}][{}][{}]: {}",
            buf.timestamp_seconds(),
            record.target(),
            record.level(),
            record.args()
        )
    })
    .try_init();
}

async fn execute(
    config: &AppConfig,
    url: &str,
    password: Option<&str>,
    plain: bool,
) -> crate::Result<WalkSummary> {
    let session = Arc::new(Session::new(&config.download, config.endpoints.clone())?);
    let walker = Walker::from_session(session, config.download.clone());

    if plain || !console::Term::stderr().is_term() {
        walker
            .run_url(&config.output_dir, url, password, &LineProgress::stderr())
            .await
    } else {
        walker
            .run_url(&config.output_dir, url, password, &IndicatifProgress::new())
            .await
    }
}

/// Runs the CLI and returns the process exit code.
///
/// The exit code is zero whenever the walk completes, even if some files or
/// folders failed; those are listed in the summary. It is non-zero for bad
/// arguments, an unreadable config, an invalid URL, or missing credentials.
pub async fn run() -> ExitCode {
    let args = match parse_args(env::args().skip(1)) {
        Ok(Command::Run(args)) => args,
        Ok(Command::Help) => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        Err(msg) => {
            eprintln!("Error: {msg}");
            eprintln!();
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    init_logging(args.verbosity);

    let config = match AppConfig::load(args.config_path.as_deref()) {
        Ok(config) => args.apply(config),
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let password = args
        .password
        .clone()
        .or_else(|| env::var(PASSWORD_ENV).ok())
        .filter(|p| !p.is_empty());

    match execute(&config, &args.url, password.as_deref(), args.plain).await {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
