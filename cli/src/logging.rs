//! Log output for the CLI.
//!
//! Everything goes to stderr so `--json` output on stdout stays parseable.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
    Trace,
}

impl Verbosity {
    /// `-q` wins over any number of `-v`.
    #[must_use]
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Trace,
        }
    }

    #[must_use]
    pub fn to_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides `verbosity`.
pub fn init_logging(verbosity: Verbosity) {
    let level = verbosity.to_level();
    let default_filter = format!("flare={level},flare_core={level}");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(verbosity >= Verbosity::Verbose)
            .without_time(),
    );

    // Already set in tests; ignore.
    let _ = subscriber.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(Verbosity::from_flags(0, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(1, false), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(3, false), Verbosity::Trace);
        assert_eq!(Verbosity::from_flags(2, true), Verbosity::Quiet);
    }

    #[test]
    fn test_to_level() {
        assert_eq!(Verbosity::Quiet.to_level(), Level::ERROR);
        assert_eq!(Verbosity::Normal.to_level(), Level::WARN);
        assert_eq!(Verbosity::Verbose.to_level(), Level::DEBUG);
        assert_eq!(Verbosity::Trace.to_level(), Level::TRACE);
    }

    #[test]
    fn test_ordering() {
        assert!(Verbosity::Trace > Verbosity::Verbose);
        assert!(Verbosity::Quiet < Verbosity::Normal);
    }

    #[test]
    fn test_init_logging_twice_does_not_panic() {
        init_logging(Verbosity::Normal);
        init_logging(Verbosity::Trace);
    }
}
