//! Tracing subscriber setup.
//!
//! The library only emits `tracing` events; binaries and demos call
//! [`init`] once to print them.

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter` when set.
///
/// # Errors
///
/// Returns an error if the filter does not parse or a global subscriber
/// is already installed.
pub fn init(default_filter: &str) -> Result<(), crate::BoxError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::builder().parse(default_filter)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
}
