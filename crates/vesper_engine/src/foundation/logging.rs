//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

use log::LevelFilter;

/// Verbosity levels exposed to engine hosts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Verbosity {
    /// No output at all
    Silent,
    /// Construction and teardown faults only
    Error,
    /// Faults plus steady-state warnings (overruns, low frame rate)
    #[default]
    Warning,
    /// Everything, including subsystem lifecycle messages
    Verbose,
}

impl From<Verbosity> for LevelFilter {
    fn from(verbosity: Verbosity) -> Self {
        match verbosity {
            Verbosity::Silent => LevelFilter::Off,
            Verbosity::Error => LevelFilter::Error,
            Verbosity::Warning => LevelFilter::Warn,
            Verbosity::Verbose => LevelFilter::Debug,
        }
    }
}

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system with a fixed verbosity
///
/// `RUST_LOG` still overrides individual modules. Calling this twice is harmless.
pub fn init_with_level(verbosity: Verbosity) {
    let _ = env_logger::Builder::new()
        .filter_level(verbosity.into())
        .parse_default_env()
        .try_init();
}
