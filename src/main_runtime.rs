use hedgerun::config::LoggingConfig;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Console plus optional daily-rolling file logging.
///
/// `RUST_LOG` wins over the configured level. The returned guard flushes the
/// file writer on drop and must live as long as the process logs.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = match writable_log_dir(&config.directory) {
        Some(dir) => {
            // `rolling::daily` panics if it cannot create the initial file, hence the preflight.
            let appender = tracing_appender::rolling::daily(dir, &config.file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let json_console = config
        .json
        .then(|| tracing_subscriber::fmt::layer().json().with_target(true));
    let text_console = (!config.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
    });

    let file_logging_enabled = file_layer.is_some();
    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(json_console)
        .with(text_console)
        .with(file_layer)
        .try_init()
    {
        eprintln!("Warning: logging already initialized ({})", e);
    }

    if file_logging_enabled {
        eprintln!("Logging to: {}/{}", config.directory, config.file_name);
    }

    guard
}

fn writable_log_dir(dir: &str) -> Option<&Path> {
    if dir.trim().is_empty() {
        return None;
    }

    let path = Path::new(dir);
    if let Err(e) = std::fs::create_dir_all(path) {
        eprintln!(
            "Warning: Could not create log directory {} ({}), file logging disabled",
            dir, e
        );
        return None;
    }

    let probe = path.join(".hedgerun_write_test");
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&probe)
    {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            Some(path)
        }
        Err(e) => {
            eprintln!(
                "Warning: Could not write to log directory {} ({}), file logging disabled",
                dir, e
            );
            None
        }
    }
}

/// Console-only logging for failures before configuration is available
pub fn init_logging_simple() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
