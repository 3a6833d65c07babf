//! Logging and run metrics for treestats
//!
//! There is no process-wide log level. A [`LoggingSystem`] owns its own
//! `tracing` dispatcher built from a [`LoggingConfig`]; callers hand it to the
//! driver, which runs inside [`LoggingSystem::in_scope`].

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, Dispatch, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc, MakeWriter},
    layer::SubscriberExt,
    EnvFilter, Layer, Registry,
};
use uuid::Uuid;

/// Log level configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::str::FromStr for LogLevel {
    type Err = crate::error::TreeStatsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(crate::error::TreeStatsError::parse(format!(
                "Invalid log level: {}",
                s
            ))),
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<LogLevel> for tracing_subscriber::filter::LevelFilter {
    fn from(level: LogLevel) -> Self {
        tracing_subscriber::filter::LevelFilter::from_level(level.into())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base log level
    pub level: LogLevel,
    /// Enable structured JSON logging
    pub json_format: bool,
    /// Log file directory (None for stderr only)
    pub log_dir: Option<PathBuf>,
    /// Log file name inside `log_dir`
    pub log_file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            json_format: false,
            log_dir: None,
            log_file_name: "treestats.log".to_string(),
        }
    }
}

/// Counters and timings collected during a run
#[derive(Debug)]
pub struct MetricsCollector {
    counters: RwLock<HashMap<String, AtomicU64>>,
    timers: RwLock<HashMap<String, Vec<Duration>>>,
    run_id: Uuid,
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            timers: RwLock::new(HashMap::new()),
            run_id: Uuid::new_v4(),
            start_time: Instant::now(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Increment a counter
    pub fn inc_counter(&self, name: &str) {
        self.inc_counter_by(name, 1);
    }

    /// Increment a counter by a specific value
    pub fn inc_counter_by(&self, name: &str, value: u64) {
        // a poisoned lock only means another scorer panicked; counts stay usable
        let counters = self.counters.read().unwrap_or_else(|e| e.into_inner());
        if let Some(counter) = counters.get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
            return;
        }
        drop(counters);

        let mut counters = self.counters.write().unwrap_or_else(|e| e.into_inner());
        counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(value, Ordering::Relaxed);
    }

    pub fn get_counter(&self, name: &str) -> u64 {
        self.counters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Record a timing measurement
    pub fn record_time(&self, name: &str, duration: Duration) {
        self.timers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(name.to_string())
            .or_default()
            .push(duration);
    }

    /// Total time recorded under `name`
    pub fn total_time(&self, name: &str) -> Option<Duration> {
        let timers = self.timers.read().unwrap_or_else(|e| e.into_inner());
        timers.get(name).map(|times| times.iter().sum::<Duration>())
    }

    pub fn summary(&self) -> MetricsSummary {
        let counters = self
            .counters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(name, value)| (name.clone(), value.load(Ordering::Relaxed)))
            .collect();
        let timings = self
            .timers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(name, times)| (name.clone(), times.iter().sum::<Duration>()))
            .collect();

        MetricsSummary {
            run_id: self.run_id,
            timestamp: Utc::now(),
            uptime: self.start_time.elapsed(),
            counters,
            timings,
        }
    }
}

/// Snapshot of a [`MetricsCollector`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub uptime: Duration,
    pub counters: HashMap<String, u64>,
    pub timings: HashMap<String, Duration>,
}

/// Logging capability handed to the driver
pub struct LoggingSystem {
    config: LoggingConfig,
    dispatch: Dispatch,
    metrics: Arc<MetricsCollector>,
    _guards: Vec<WorkerGuard>,
}

impl LoggingSystem {
    /// Build a dispatcher that writes to stderr or to `log_dir`
    pub fn new(config: LoggingConfig) -> Result<Self> {
        let mut guards = Vec::new();

        let layer = match &config.log_dir {
            Some(log_dir) => {
                fs::create_dir_all(log_dir)?;
                let appender = tracing_appender::rolling::never(log_dir, &config.log_file_name);
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                guards.push(guard);
                format_layer(&config, non_blocking, false)
            }
            None => format_layer(&config, std::io::stderr, true),
        };

        let filter = EnvFilter::from_default_env()
            .add_directive(tracing_subscriber::filter::LevelFilter::from(config.level).into());
        let subscriber = tracing_subscriber::registry().with(layer.with_filter(filter));

        Ok(Self {
            config,
            dispatch: Dispatch::new(subscriber),
            metrics: Arc::new(MetricsCollector::new()),
            _guards: guards,
        })
    }

    /// Dispatcher that drops every event
    pub fn disabled() -> Self {
        Self {
            config: LoggingConfig::default(),
            dispatch: Dispatch::none(),
            metrics: Arc::new(MetricsCollector::new()),
            _guards: Vec::new(),
        }
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    /// Run `f` with this system as the thread's default dispatcher
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Time an operation and record the result
    pub fn time_operation<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        let duration = start.elapsed();

        self.metrics.record_time(name, duration);
        debug!(operation = name, duration = ?duration, "Operation completed");
        result
    }

    pub fn log_metrics_summary(&self) {
        let summary = self.metrics.summary();
        debug!(
            run_id = %summary.run_id,
            counters = ?summary.counters,
            timings = ?summary.timings,
            "Metrics summary"
        );
    }
}

fn format_layer<W>(config: &LoggingConfig, writer: W, ansi: bool) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    if config.json_format {
        fmt::layer()
            .json()
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(writer)
            .boxed()
    } else {
        fmt::layer()
            .with_timer(ChronoUtc::rfc_3339())
            .with_target(true)
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed()
    }
}
