//! Configuration types, defaults, and CLI options.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use rustls::pki_types::CertificateDer;

// constants (used as defaults)
/// Maximum number of fetches in flight at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;
/// Overall deadline for a single fetch, independent of the pipeline deadline.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
/// Deadline for the whole pipeline run (0 disables it).
pub const DEFAULT_PIPELINE_TIMEOUT_SECS: u64 = 30;
/// Capacity of the channels between pipeline stages.
///
/// Kept at 1 so a slow consumer applies backpressure to the producers.
pub const STAGE_CHANNEL_CAPACITY: usize = 1;

// Transport pool sizing
pub const DEFAULT_MAX_IDLE_CONNECTIONS: usize = 100;
pub const DEFAULT_MAX_IDLE_PER_HOST: usize = 2;
pub const DEFAULT_MAX_CONNECTIONS_PER_HOST: usize = 32;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 90;

// Network operation timeouts
/// TCP connection timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// TLS handshake timeout in seconds
pub const DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS: u64 = 10;
/// How long a request carrying `Expect: 100-continue` waits before sending its body.
pub const DEFAULT_EXPECT_CONTINUE_TIMEOUT_MS: u64 = 1000;

// Redirect handling
/// Maximum number of redirect hops to follow
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Default User-Agent string for HTTP requests.
pub const DEFAULT_USER_AGENT: &str = concat!("url_pipeline/", env!("CARGO_PKG_VERSION"));

/// Default report destination.
pub const DEFAULT_OUTPUT_PATH: &str = "results.json";

// Security header names
pub const HEADER_CONTENT_SECURITY_POLICY: &str = "Content-Security-Policy";

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace). Used with the `--log-level` CLI option.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Plain,
    Json,
}

/// Report export format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// A single JSON array
    Json,
    /// One JSON object per line
    Jsonl,
}

/// Connection pool and handshake settings for the shared transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Idle connections kept across all hosts; the oldest is evicted past this.
    pub max_idle_connections: usize,
    /// Idle connections kept per host.
    pub max_idle_per_host: usize,
    /// Live (idle + in use) connections per host; further requests wait.
    pub max_connections_per_host: usize,
    /// Idle connections older than this are closed instead of reused.
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
    pub tls_handshake_timeout: Duration,
    /// Accepted for configuration compatibility but has no effect: the fetcher
    /// only sends bodiless GETs, so no request ever waits for `100 Continue`.
    pub expect_continue_timeout: Duration,
    pub user_agent: String,
    /// Trust anchors accepted in addition to the bundled webpki roots.
    pub extra_root_certificates: Vec<CertificateDer<'static>>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_idle_connections: DEFAULT_MAX_IDLE_CONNECTIONS,
            max_idle_per_host: DEFAULT_MAX_IDLE_PER_HOST,
            max_connections_per_host: DEFAULT_MAX_CONNECTIONS_PER_HOST,
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            tls_handshake_timeout: Duration::from_secs(DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS),
            expect_continue_timeout: Duration::from_millis(DEFAULT_EXPECT_CONTINUE_TIMEOUT_MS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            extra_root_certificates: Vec::new(),
        }
    }
}

/// Command-line options and configuration.
///
/// All options have defaults and can be overridden via command-line flags.
///
/// # Examples
///
/// ```bash
/// # Fetch a couple of URLs and write results.json
/// url_pipeline https://example.com https://www.rust-lang.org
///
/// # Read URLs from a file, allow 20 concurrent fetches, write JSON lines to stdout
/// url_pipeline --file urls.txt --max-concurrency 20 --format jsonl --output -
/// ```
#[derive(Debug, Clone, Parser)]
#[command(
    name = "url_pipeline",
    about = "Fetches URLs concurrently and reports timing and security signals."
)]
pub struct Config {
    /// URLs to fetch
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// File with one URL per line ('-' reads stdin). Blank lines and '#' comments are skipped.
    #[arg(long, value_parser)]
    pub file: Option<PathBuf>,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Maximum concurrent fetches
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    pub max_concurrency: usize,

    /// Per-fetch timeout in seconds
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS)]
    pub fetch_timeout_seconds: u64,

    /// Deadline for the whole run in seconds (0 disables it)
    #[arg(long, default_value_t = DEFAULT_PIPELINE_TIMEOUT_SECS)]
    pub pipeline_timeout_seconds: u64,

    /// Maximum idle connections kept in the pool
    #[arg(long, default_value_t = DEFAULT_MAX_IDLE_CONNECTIONS)]
    pub max_idle_connections: usize,

    /// Maximum idle connections kept per host
    #[arg(long, default_value_t = DEFAULT_MAX_IDLE_PER_HOST)]
    pub max_idle_per_host: usize,

    /// Maximum live connections per host
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS_PER_HOST)]
    pub max_connections_per_host: usize,

    /// Seconds an idle connection may stay pooled
    #[arg(long, default_value_t = DEFAULT_IDLE_TIMEOUT_SECS)]
    pub idle_timeout_seconds: u64,

    /// TCP connect timeout in seconds
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_seconds: u64,

    /// TLS handshake timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS)]
    pub tls_handshake_timeout_seconds: u64,

    /// Expect-continue wait in milliseconds (no effect: only bodiless GETs are sent)
    #[arg(long, default_value_t = DEFAULT_EXPECT_CONTINUE_TIMEOUT_MS)]
    pub expect_continue_timeout_ms: u64,

    /// Maximum redirect hops followed per URL
    #[arg(long, default_value_t = DEFAULT_MAX_REDIRECTS)]
    pub max_redirects: usize,

    /// HTTP User-Agent header value
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Report destination ('-' writes to stdout)
    #[arg(long, value_parser, default_value = DEFAULT_OUTPUT_PATH)]
    pub output: PathBuf,

    /// Report format: json|jsonl
    #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
    pub format: ExportFormat,

    /// Log per-phase timing averages at the end of the run
    #[arg(long)]
    pub show_timing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            file: None,
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            fetch_timeout_seconds: DEFAULT_FETCH_TIMEOUT_SECS,
            pipeline_timeout_seconds: DEFAULT_PIPELINE_TIMEOUT_SECS,
            max_idle_connections: DEFAULT_MAX_IDLE_CONNECTIONS,
            max_idle_per_host: DEFAULT_MAX_IDLE_PER_HOST,
            max_connections_per_host: DEFAULT_MAX_CONNECTIONS_PER_HOST,
            idle_timeout_seconds: DEFAULT_IDLE_TIMEOUT_SECS,
            connect_timeout_seconds: DEFAULT_CONNECT_TIMEOUT_SECS,
            tls_handshake_timeout_seconds: DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS,
            expect_continue_timeout_ms: DEFAULT_EXPECT_CONTINUE_TIMEOUT_MS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT_PATH),
            format: ExportFormat::Json,
            show_timing: false,
        }
    }
}

impl Config {
    /// Builds the transport settings from the CLI values.
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            max_idle_connections: self.max_idle_connections,
            max_idle_per_host: self.max_idle_per_host,
            max_connections_per_host: self.max_connections_per_host.max(1),
            idle_timeout: Duration::from_secs(self.idle_timeout_seconds),
            connect_timeout: Duration::from_secs(self.connect_timeout_seconds),
            tls_handshake_timeout: Duration::from_secs(self.tls_handshake_timeout_seconds),
            expect_continue_timeout: Duration::from_millis(self.expect_continue_timeout_ms),
            user_agent: self.user_agent.clone(),
            extra_root_certificates: Vec::new(),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    /// Pipeline-wide deadline, `None` when disabled.
    pub fn pipeline_timeout(&self) -> Option<Duration> {
        (self.pipeline_timeout_seconds > 0)
            .then(|| Duration::from_secs(self.pipeline_timeout_seconds))
    }
}
