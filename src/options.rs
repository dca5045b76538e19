use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{RetryPolicy, Timeouts};

/// Client-wide configuration: timeouts, default headers and retry behavior.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Timeouts used when a call does not override them.
    pub timeouts: Timeouts,
    /// Headers sent when a call does not supply its own.
    pub default_headers: Vec<(String, String)>,
    /// Retry policy shared by every call.
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            default_headers: vec![("accept".to_owned(), "application/json".to_owned())],
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientOptions {
    /// Builds options from environment variables, keeping defaults for unset ones.
    ///
    /// Reads:
    /// - `CLOVER_HTTP_CONNECT_TIMEOUT_MS`
    /// - `CLOVER_HTTP_READ_TIMEOUT_MS`
    /// - `CLOVER_HTTP_MAX_ATTEMPTS`
    /// - `CLOVER_HTTP_BASE_WAIT_MS`
    /// - `CLOVER_HTTP_MAX_WAIT_MS`
    /// - `CLOVER_HTTP_JITTER` (`true`/`false`/`1`/`0`)
    ///
    /// Returns an error naming the variable if a value cannot be parsed.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<L>(lookup: L) -> Result<Self, String>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(ms) = parse_var(&lookup, "CLOVER_HTTP_CONNECT_TIMEOUT_MS")? {
            options.timeouts.connect = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "CLOVER_HTTP_READ_TIMEOUT_MS")? {
            options.timeouts.read = Duration::from_millis(ms);
        }
        if let Some(attempts) = parse_var::<_, u32>(&lookup, "CLOVER_HTTP_MAX_ATTEMPTS")? {
            if attempts == 0 {
                return Err("CLOVER_HTTP_MAX_ATTEMPTS must be at least 1".to_owned());
            }
            options.retry.max_attempts = attempts;
        }
        if let Some(ms) = parse_var(&lookup, "CLOVER_HTTP_BASE_WAIT_MS")? {
            options.retry.base_wait_ms = ms;
        }
        if let Some(ms) = parse_var(&lookup, "CLOVER_HTTP_MAX_WAIT_MS")? {
            options.retry.max_wait_ms = ms;
        }
        if let Some(raw) = lookup("CLOVER_HTTP_JITTER") {
            options.retry.jitter = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => return Err(format!("CLOVER_HTTP_JITTER has invalid value '{other}'")),
            };
        }

        Ok(options)
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_default_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.default_headers = headers;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

fn parse_var<L, T>(lookup: &L, key: &str) -> Result<Option<T>, String>
where
    L: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|err| format!("{key} has invalid value '{raw}': {err}")),
    }
}

/// Per-call overrides. Anything left unset falls back to [`ClientOptions`].
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Replaces the client's default timeouts for this call.
    pub timeouts: Option<Timeouts>,
    /// Replaces the client's default headers for this call.
    pub headers: Option<Vec<(String, String)>>,
    /// Aborts the in-flight attempt and any pending backoff when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides connect and read timeouts for this call. They may be longer
    /// or shorter than the client defaults.
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Sends exactly `headers` instead of the client defaults.
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers = Some(
            headers
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        );
        self
    }

    /// Ties the call to `token`.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}
