use std::future::Future;

use reqwest::header::{HeaderName, HeaderValue};

use crate::{Error, Method, Request, Response, TransportFailureKind};

/// Transport-level failure: no response was received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportFailure {
    pub kind: TransportFailureKind,
    pub reason: String,
}

impl TransportFailure {
    pub fn new(kind: TransportFailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    pub fn connect(reason: impl Into<String>) -> Self {
        Self::new(TransportFailureKind::Connect, reason)
    }

    pub fn timeout(reason: impl Into<String>) -> Self {
        Self::new(TransportFailureKind::Timeout, reason)
    }

    /// The caller cancelled the call.
    pub fn cancelled() -> Self {
        Self::new(TransportFailureKind::Cancelled, "request cancelled by caller")
    }

    pub fn other(reason: impl Into<String>) -> Self {
        Self::new(TransportFailureKind::Other, reason)
    }
}

impl From<reqwest::Error> for TransportFailure {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportFailureKind::Timeout
        } else if err.is_connect() {
            TransportFailureKind::Connect
        } else {
            TransportFailureKind::Other
        };
        Self::new(kind, error_chain(&err))
    }
}

/// Joins an error's message with every message in its `source()` chain.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut reason = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }
    reason
}

/// Performs one HTTP round-trip.
///
/// Implementations must not retry; the [`Client`](crate::Client) owns the
/// retry loop.
pub trait Transport: Send + Sync {
    fn perform(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<Response, TransportFailure>> + Send;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a `reqwest` client with no client-wide timeouts.
    ///
    /// Every request carries its own deadline from [`Request::timeouts`], so a
    /// single call may ask for more time than the client defaults.
    pub fn new() -> Result<Self, Error> {
        let http = reqwest::Client::builder().build().map_err(Error::Setup)?;
        Ok(Self { http })
    }

    /// Wraps an already configured `reqwest` client. Timeouts set on `http`
    /// still apply on top of each request's own deadline.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn build(&self, request: &Request) -> reqwest::RequestBuilder {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
        };

        // Covers connecting, sending and reading the whole body.
        let mut builder = self
            .http
            .request(method, &request.url)
            .timeout(request.timeouts.total());

        for (name, value) in &request.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => builder = builder.header(name, value),
                _ => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(header = %name, "skipping invalid request header");
                }
            }
        }

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        builder
    }
}

impl Transport for ReqwestTransport {
    async fn perform(&self, request: &Request) -> Result<Response, TransportFailure> {
        let response = self.build(request).send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_owned(), value.to_owned()))
            })
            .collect();
        let body = response.bytes().await?;

        Ok(Response::new(status, headers, body.to_vec()))
    }
}
