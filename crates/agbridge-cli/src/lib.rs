mod args;
mod commands;
mod handlers;

pub use args::{ChatArgs, Cli, Commands, OutputFormat, ProvidersCommand, SessionsCommand};
pub use commands::run;

use tracing_subscriber::EnvFilter;

/// Log to stderr so stdout stays machine-readable. `AGBRIDGE_LOG` wins over
/// `--log-level`.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_env("AGBRIDGE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
