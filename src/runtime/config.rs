use std::time::Duration;

use anyhow::{bail, Result};

pub const DEFAULT_PROCESSOR_COUNT: usize = 2;
pub const DEFAULT_WRITER_COUNT: usize = 2;
pub const DEFAULT_RAW_BUFFER: usize = 64;
pub const DEFAULT_PARSED_BUFFER: usize = 256;
pub const DEFAULT_ATTEMPT_BUFFER: usize = 1;
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_BACKOFF_INITIAL: Duration = Duration::from_millis(500);
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(30);
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_BACKOFF_JITTER_RATIO: f64 = 0.15;

/// Sizing of the pipeline stages and queues.
///
/// Non-positive counts and zero durations fall back to the defaults at
/// startup instead of failing; a misconfigured pool size degrades to a
/// working pipeline, not a dead one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Decode-stage task count.
    pub processor_count: usize,
    /// Persist-stage task count. The store must be able to hand out at
    /// least this many dedicated connections.
    pub writer_count: usize,
    /// Raw queue capacity (receiver → processors).
    pub raw_buffer: usize,
    /// Parsed queue capacity (processors → writers).
    pub parsed_buffer: usize,
    /// Per-delivery-attempt channel capacity. Kept small so raw-queue
    /// backpressure translates immediately into sender blocking.
    pub attempt_buffer: usize,
    /// Bounded grace window for writers to flush buffered blocks after
    /// cancellation.
    pub drain_timeout: Duration,
    /// Interval of the metrics reporter task.
    pub metrics_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            processor_count: DEFAULT_PROCESSOR_COUNT,
            writer_count: DEFAULT_WRITER_COUNT,
            raw_buffer: DEFAULT_RAW_BUFFER,
            parsed_buffer: DEFAULT_PARSED_BUFFER,
            attempt_buffer: DEFAULT_ATTEMPT_BUFFER,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            metrics_interval: DEFAULT_METRICS_INTERVAL,
        }
    }
}

impl PipelineConfig {
    /// Replaces out-of-range values with the defaults.
    pub fn normalized(mut self) -> Self {
        if self.processor_count == 0 {
            tracing::warn!("processor_count must be positive; using default");
            self.processor_count = DEFAULT_PROCESSOR_COUNT;
        }
        if self.writer_count == 0 {
            tracing::warn!("writer_count must be positive; using default");
            self.writer_count = DEFAULT_WRITER_COUNT;
        }
        if self.raw_buffer == 0 {
            self.raw_buffer = DEFAULT_RAW_BUFFER;
        }
        if self.parsed_buffer == 0 {
            self.parsed_buffer = DEFAULT_PARSED_BUFFER;
        }
        if self.attempt_buffer == 0 {
            self.attempt_buffer = DEFAULT_ATTEMPT_BUFFER;
        }
        if self.drain_timeout.is_zero() {
            self.drain_timeout = DEFAULT_DRAIN_TIMEOUT;
        }
        if self.metrics_interval.is_zero() {
            self.metrics_interval = DEFAULT_METRICS_INTERVAL;
        }
        self
    }
}

/// Reconnect backoff shape.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
    pub jitter_ratio: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: DEFAULT_BACKOFF_INITIAL,
            max: DEFAULT_BACKOFF_MAX,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter_ratio: DEFAULT_BACKOFF_JITTER_RATIO,
        }
    }
}

impl BackoffConfig {
    pub fn normalized(mut self) -> Self {
        if self.initial.is_zero() {
            self.initial = DEFAULT_BACKOFF_INITIAL;
        }
        if self.max < self.initial {
            tracing::warn!("backoff max below initial; clamping to initial");
            self.max = self.initial;
        }
        if self.multiplier <= 1.0 {
            self.multiplier = DEFAULT_BACKOFF_MULTIPLIER;
        }
        if !(0.0..1.0).contains(&self.jitter_ratio) {
            self.jitter_ratio = DEFAULT_BACKOFF_JITTER_RATIO;
        }
        self
    }
}

/// Upstream delivery endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub host: String,
    pub port: u16,
    pub channel_id: String,
    /// First block requested when the store is empty.
    pub start_block: u64,
    /// Upper delivery bound; `0` or `u64::MAX` means unbounded.
    pub end_block: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 4001,
            channel_id: "mychannel".to_owned(),
            start_block: 0,
            end_block: u64::MAX,
        }
    }
}

impl StreamConfig {
    pub fn is_unbounded(&self) -> bool {
        self.end_block == 0 || self.end_block == u64::MAX
    }

    pub fn validate(&self) -> Result<()> {
        ensure_not_empty(&self.host, "stream host")?;
        ensure_not_empty(&self.channel_id, "channel_id")?;
        if self.port == 0 {
            bail!("stream port must be greater than 0");
        }
        Ok(())
    }
}

/// Ingestion store endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 5432,
            user: "postgres".to_owned(),
            password: "postgres".to_owned(),
            dbname: "ledgersink".to_owned(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_not_empty(&self.host, "store host")?;
        ensure_not_empty(&self.user, "store user")?;
        ensure_not_empty(&self.dbname, "store dbname")?;
        if self.port == 0 {
            bail!("store port must be greater than 0");
        }
        Ok(())
    }

    /// Driver-level connection parameters for this endpoint.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.user)
            .dbname(&self.dbname);
        if !self.password.is_empty() {
            config.password(&self.password);
        }
        config
    }
}

/// Everything the pipeline orchestrator consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestConfig {
    pub pipeline: PipelineConfig,
    pub backoff: BackoffConfig,
    pub stream: StreamConfig,
}

impl IngestConfig {
    pub fn normalized(self) -> Self {
        Self {
            pipeline: self.pipeline.normalized(),
            backoff: self.backoff.normalized(),
            stream: self.stream,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.stream.validate()
    }
}

fn ensure_not_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{field} cannot be empty");
    }
    Ok(())
}
