use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{Level, Log, Metadata, Record};
use time::macros::format_description;
use time::OffsetDateTime;

/// Initialize the process logger.
///
/// The level comes from `RUST_LOG` and defaults to `info`. When `log_file` is given,
/// lines are appended to that file instead of stderr.
pub fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {} - {}",
            log_timestamp(),
            record.level(),
            record.target(),
            record.args()
        )
    });

    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory: {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file: {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init().context("logger already initialized")?;
    log::debug!("logging initialized (file: {:?})", log_file);
    Ok(())
}

fn log_timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
        ))
        .unwrap_or_default()
}

/// Log sink handed to each scanning component.
///
/// Wraps any [`log::Log`] so callers decide where probe and session events go.
/// [`ScanLog::global`] forwards to whatever logger the process installed.
#[derive(Clone)]
pub struct ScanLog {
    sink: Arc<dyn Log>,
    target: &'static str,
}

impl ScanLog {
    pub fn new(sink: Arc<dyn Log>) -> Self {
        Self {
            sink,
            target: "mc_scan",
        }
    }

    pub fn global() -> Self {
        Self::new(Arc::new(ProcessLog))
    }

    /// Same sink, different `target` on every emitted record.
    pub fn with_target(&self, target: &'static str) -> Self {
        Self {
            sink: self.sink.clone(),
            target,
        }
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Error, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Warn, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Info, args);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Debug, args);
    }

    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        let metadata = Metadata::builder().level(level).target(self.target).build();
        if self.sink.enabled(&metadata) {
            self.sink
                .log(&Record::builder().metadata(metadata).args(args).build());
        }
    }
}

impl Default for ScanLog {
    fn default() -> Self {
        Self::global()
    }
}

impl fmt::Debug for ScanLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanLog")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

struct ProcessLog;

impl Log for ProcessLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record) {
        log::logger().log(record);
    }

    fn flush(&self) {
        log::logger().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture {
        lines: Mutex<Vec<(Level, String, String)>>,
    }

    impl Log for Capture {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= Level::Info
        }

        fn log(&self, record: &Record) {
            self.lines.lock().unwrap().push((
                record.level(),
                record.target().to_string(),
                record.args().to_string(),
            ));
        }

        fn flush(&self) {}
    }

    #[test]
    fn emits_through_injected_sink() {
        let capture = Arc::new(Capture::default());
        let log = ScanLog::new(capture.clone()).with_target("probe");
        log.warn(format_args!("attempt {} failed", 1));
        log.debug(format_args!("filtered out"));

        let lines = capture.lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            (Level::Warn, "probe".to_string(), "attempt 1 failed".to_string())
        );
    }

    #[test]
    fn timestamp_has_millisecond_precision() {
        let ts = log_timestamp();
        // 2024-01-01 00:00:00.000
        assert_eq!(ts.len(), 23);
        assert_eq!(&ts[10..11], " ");
    }
}
