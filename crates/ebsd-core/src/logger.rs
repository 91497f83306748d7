//! Stderr logger for refinement runs.
//!
//! Lines read `[elapsed LEVEL worker crate::module] message`. `worker` is the
//! rayon thread refining the current chunk as `wNN`, or `main` outside the
//! pool, so interleaved per-chunk messages can be told apart. The `ebsd_`
//! crate prefix is dropped from targets.
//!
//! The optimizer crate logs once per basin hop or sampling round and gets
//! its own level in [`LogLevels`]. Install once at startup with
//! [`init_with_level`] or [`init_with_levels`].

use std::fmt;
use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter};

const OPTIMIZER_TARGET: &str = "ebsd_optim";

/// Level filters for refinement code and for the optimizers it drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogLevels {
    /// Geometry, projection and refinement driver messages.
    pub refinement: LevelFilter,
    /// Messages from `ebsd_optim`.
    pub optimizer: LevelFilter,
}

impl LogLevels {
    /// Same filter for every target.
    pub fn uniform(level: LevelFilter) -> Self {
        Self {
            refinement: level,
            optimizer: level,
        }
    }

    fn for_target(&self, target: &str) -> LevelFilter {
        if target.starts_with(OPTIMIZER_TARGET) {
            self.optimizer
        } else {
            self.refinement
        }
    }

    fn max(&self) -> LevelFilter {
        self.refinement.max(self.optimizer)
    }
}

struct RunLogger {
    levels: LogLevels,
    started: Instant,
}

impl Log for RunLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.levels.for_target(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_line(
            self.started.elapsed().as_secs_f64(),
            record.level(),
            rayon::current_thread_index(),
            record.target(),
            record.args(),
        );
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {}
}

fn format_line(
    elapsed: f64,
    level: Level,
    worker: Option<usize>,
    target: &str,
    message: &dyn fmt::Display,
) -> String {
    let worker = match worker {
        Some(i) => format!("w{i:02}"),
        None => "main".to_string(),
    };
    let target = target.strip_prefix("ebsd_").unwrap_or(target);
    format!("[{elapsed:8.3}s {:>5} {worker:>4} {target}] {message}", level.as_str())
}

static LOGGER: OnceLock<RunLogger> = OnceLock::new();

/// Install the stderr logger with one level for every target.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    init_with_levels(LogLevels::uniform(level))
}

/// Install the stderr logger with separate refinement and optimizer levels.
///
/// Calling this more than once is a no-op after the first successful
/// initialization.
pub fn init_with_levels(levels: LogLevels) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| RunLogger {
            levels,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(levels.max());
    }
    Ok(())
}

/// Install a `tracing` fmt subscriber filtered by `RUST_LOG`.
///
/// The default filter is `info` with the optimizers at `warn`. Span close
/// events carry the time spent per refinement chunk; thread IDs tell the
/// rayon workers apart.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,{OPTIMIZER_TARGET}=warn")));
    let builder = tracing_fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_thread_ids(true);
    if json {
        let _ = builder.json().flatten_event(true).finish().try_init();
    } else {
        let _ = builder
            .with_timer(tracing_fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}
