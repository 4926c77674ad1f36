//! Diagnostics for providence.
//!
//! Tracing output is written to stderr so it never interleaves with the
//! dashboard on stdout. `RUST_LOG` overrides the level picked from `-v`/`-q`.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for diagnostic output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Warnings and errors.
    #[default]
    Normal,
    /// Playback lifecycle and per-entry debug lines.
    Verbose,
    /// Everything, including dependency chatter.
    Trace,
}

impl Verbosity {
    /// Map `-q` and the `-v` count onto a level. `quiet` wins.
    #[must_use]
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Trace,
        }
    }

    /// Convert verbosity to tracing level filter.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directive used when `RUST_LOG` is unset.
    ///
    /// The HTTP client and image decoder stay at `warn` unless tracing.
    #[must_use]
    pub fn directive(&self) -> String {
        let level = self.to_level_filter();
        if *self == Self::Trace {
            format!("providence={level},ureq={level},image={level}")
        } else {
            format!("providence={level},ureq=warn,image=warn")
        }
    }
}

/// Install the global subscriber.
///
/// Later calls are no-ops.
///
/// # Examples
///
/// ```no_run
/// use providence::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::from_flags(1, false));
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false),
    );

    let _ = subscriber.try_init();
}

/// Route diagnostics into the test harness output.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("providence=debug")
        .with_test_writer()
        .try_init();
}
