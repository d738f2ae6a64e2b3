//! Log setup. Logs go to a file so they never interleave with chat output.

use aui_core::config::paths;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "AUI_LOG";
const LOG_FILE: &str = "aui.log";

/// Installs the global subscriber writing to `${AUI_HOME}/logs/aui.log`.
///
/// `--verbose` forces `debug`; otherwise `AUI_LOG` is used, defaulting to
/// `warn`. Returns the writer guard, which must live until exit. Returns
/// `None` (logging disabled) when the log directory cannot be created.
pub fn init(verbose: bool) -> Option<WorkerGuard> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let dir = paths::logs_dir();
    if let Err(err) = std::fs::create_dir_all(&dir) {
        eprintln!("Warning: logging disabled ({}: {err})", dir.display());
        return None;
    }

    let appender = tracing_appender::rolling::never(dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;
    Some(guard)
}
