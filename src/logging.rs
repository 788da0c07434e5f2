use std::path::{Path, PathBuf};
use std::sync::{Once, OnceLock};

use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

static INIT_LOGGING: Once = Once::new();
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_PREFIX: &str = "nlsql.log";

fn build_file_appender(log_dir: &Path) -> Option<RollingFileAppender> {
    if let Err(err) = std::fs::create_dir_all(log_dir) {
        eprintln!(
            "[nlsql][WARN] Failed to create log directory {}: {}",
            log_dir.display(),
            err
        );
        return None;
    }
    Some(RollingFileAppender::new(
        Rotation::DAILY,
        log_dir,
        LOG_FILE_PREFIX,
    ))
}

/// `RUST_LOG` wins over the configured level
fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_string()))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber. Only the first call has an effect.
pub fn init(config: &LoggingConfig) {
    INIT_LOGGING.call_once(|| {
        let log_dir: Option<PathBuf> = config.file_output.then(|| config.log_directory());

        let file_layer = log_dir
            .as_deref()
            .and_then(build_file_appender)
            .map(|appender| {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                LOG_GUARD.set(guard).ok();
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(non_blocking)
            });
        let file_sink_ready = file_layer.is_some();

        let console_layer = config.console_output.then(|| {
            fmt::layer()
                .with_target(false)
                .with_ansi(true)
                .with_writer(std::io::stderr)
        });

        let installed = tracing_subscriber::registry()
            .with(build_filter(config))
            .with(console_layer)
            .with(file_layer)
            .try_init();
        if installed.is_err() {
            return;
        }

        match log_dir {
            Some(dir) if file_sink_ready => info!(
                "Logging initialized, files rotate daily under {}",
                dir.display()
            ),
            Some(dir) => warn!(
                "Logging initialized without file sink, {} is not writable",
                dir.display()
            ),
            None => {}
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use tempfile::TempDir;

    #[test]
    fn test_file_appender_creates_directory() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("nested").join("logs");
        assert!(build_file_appender(&log_dir).is_some());
        assert!(log_dir.is_dir());
    }

    #[test]
    fn test_init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let config = LoggingConfig {
            level: LogLevel::Debug,
            console_output: false,
            file_output: true,
            directory: Some(dir.path().to_string_lossy().to_string()),
        };
        init(&config);
        init(&config);
    }
}
