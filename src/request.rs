use std::fmt;
use std::time::Duration;

/// HTTP verb of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
}

impl Method {
    /// Upper-case verb as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connect and read timeouts for one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    /// Time allowed to establish the connection.
    pub connect: Duration,
    /// Time allowed to receive the response once connected.
    pub read: Duration,
}

impl Timeouts {
    pub fn new(connect: Duration, read: Duration) -> Self {
        Self { connect, read }
    }

    /// Upper bound on one attempt, from starting the connection to the last body byte.
    pub fn total(&self) -> Duration {
        self.connect.saturating_add(self.read)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(2),
            read: Duration::from_secs(8),
        }
    }
}

/// A fully resolved request, handed to the transport on every attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Encoded JSON payload.
    pub body: Option<Vec<u8>>,
    pub timeouts: Timeouts,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeouts: Timeouts::default(),
        }
    }

    /// Returns the first header value matching `name`, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Request body as text, for diagnostics.
    pub(crate) fn body_text(&self) -> Option<String> {
        self.body
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}
