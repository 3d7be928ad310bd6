use anyhow::{bail, Context, Result};
use std::{env, path::Path, path::PathBuf, str::FromStr, time::Duration};
use tickfill_shared::MAX_REQUEST_SEQUENCE;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_KNOWN_TOTAL: i32 = 14;
const DEFAULT_REQUEST_TIMEOUT: u64 = 2000; // ms
const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_GAP_FILL_CONCURRENCY: usize = 1;
const DEFAULT_OUTPUT_PATH: &str = "output.json";

/// Resend requests carry the sequence number in a single byte
pub const MAX_KNOWN_TOTAL: i32 = MAX_REQUEST_SEQUENCE;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    server_host: String,
    server_port: u16,

    /// Number of sequences the server is expected to hold, numbered from 1
    known_total: i32,

    /// How long to wait for a single resent packet
    request_timeout: Duration,

    /// Upper bound on gap fill passes
    max_attempts: u32,

    /// Number of resend requests in flight during a gap fill pass
    gap_fill_concurrency: usize,

    output_path: PathBuf,
}

impl Config {
    pub fn new(server_host: &str, server_port: u16) -> Self {
        Self {
            server_host: server_host.to_owned(),
            server_port,
            known_total: DEFAULT_KNOWN_TOTAL,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            gap_fill_concurrency: DEFAULT_GAP_FILL_CONCURRENCY,
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
        }
    }

    /// Reads the config from `TICKFILL_*` environment variables, with the
    /// positional arguments `[host] [port]` taking precedence.
    pub fn from_env() -> Result<Self> {
        let mut args = env::args().skip(1);

        let host = args
            .next()
            .or_else(|| env::var("TICKFILL_HOST").ok())
            .unwrap_or_else(|| DEFAULT_HOST.to_owned());

        let port = match args.next() {
            Some(port) => port
                .parse::<u16>()
                .with_context(|| format!("could not parse port argument: {}", port))?,
            None => parse_var("TICKFILL_PORT", DEFAULT_PORT)?,
        };

        let config = Self::new(&host, port)
            .with_known_total(parse_var("TICKFILL_KNOWN_TOTAL", DEFAULT_KNOWN_TOTAL)?)
            .with_request_timeout(Duration::from_millis(parse_var(
                "TICKFILL_TIMEOUT_MS",
                DEFAULT_REQUEST_TIMEOUT,
            )?))
            .with_max_attempts(parse_var("TICKFILL_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?)
            .with_gap_fill_concurrency(parse_var(
                "TICKFILL_CONCURRENCY",
                DEFAULT_GAP_FILL_CONCURRENCY,
            )?)
            .with_output_path(
                env::var("TICKFILL_OUTPUT").unwrap_or_else(|_| DEFAULT_OUTPUT_PATH.to_owned()),
            );

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.known_total < 1 || self.known_total > MAX_KNOWN_TOTAL {
            bail!(
                "known total must be between 1 and {}, got {}",
                MAX_KNOWN_TOTAL,
                self.known_total
            );
        }

        if self.request_timeout.is_zero() {
            bail!("request timeout must be greater than zero");
        }

        if self.max_attempts == 0 {
            bail!("max attempts must be at least 1");
        }

        if self.gap_fill_concurrency == 0 {
            bail!("gap fill concurrency must be at least 1");
        }

        Ok(())
    }

    pub fn server_host(&self) -> &str {
        &self.server_host[..]
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn known_total(&self) -> i32 {
        self.known_total
    }

    pub fn with_known_total(mut self, value: i32) -> Self {
        self.known_total = value;

        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn with_request_timeout(mut self, value: Duration) -> Self {
        self.request_timeout = value;

        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn with_max_attempts(mut self, value: u32) -> Self {
        self.max_attempts = value;

        self
    }

    pub fn gap_fill_concurrency(&self) -> usize {
        self.gap_fill_concurrency
    }

    pub fn with_gap_fill_concurrency(mut self, value: usize) -> Self {
        self.gap_fill_concurrency = value;

        self
    }

    pub fn output_path(&self) -> &Path {
        self.output_path.as_path()
    }

    pub fn with_output_path(mut self, value: impl Into<PathBuf>) -> Self {
        self.output_path = value.into();

        self
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("could not parse {}: {}", name, value)),
        Err(_) => Ok(default),
    }
}
