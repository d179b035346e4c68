use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// environment variable overriding the verbosity derived from the command line
pub const LOG_ENV: &str = "SWEEPDAG_LOG";

/// map `-v`/`-q` counts onto a level, starting at info
pub fn level(verbose: u8, quiet: u8) -> Level {
    match i16::from(verbose) - i16::from(quiet) {
        i16::MIN..=-2 => Level::ERROR,
        -1 => Level::WARN,
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber, logging to stderr
///
/// `SWEEPDAG_LOG` takes precedence over the given level and accepts the usual
/// `EnvFilter` directives, e.g. `sweepdag::generator=debug`.
pub fn init(level: Level) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let result = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();

    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {e}");
    }
}
