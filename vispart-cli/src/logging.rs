use std::io::IsTerminal;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use vispart_error::{VispartResult, vispart_err};

/// Install the global subscriber on stderr. Records the library emits through `log` are forwarded
/// to it.
pub fn setup_logger(filter: EnvFilter) -> VispartResult<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(filter)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init()
        .map_err(|e| vispart_err!(InvalidState: "cannot install logger: {}", e))
}

/// `RUST_LOG` if it is set, otherwise a level picked by how many `-v` flags were given.
pub fn default_env_filter(verbosity: u8) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}
