use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{
    response::{self, apply, classify, transport_error},
    BoxError, ClientOptions, Error, Method, ReqwestTransport, Request, RequestOptions, Response,
    Result, Transport, TransportFailure,
};

/// HTTP client that retries transient failures and classifies the rest.
///
/// Each call runs attempts until one succeeds, a terminal error is hit, the
/// retry policy gives up, or the caller cancels. Only the last error is
/// returned.
#[derive(Clone, Debug)]
pub struct Client<T = ReqwestTransport> {
    transport: T,
    options: ClientOptions,
}

impl Client<ReqwestTransport> {
    /// Creates a `reqwest`-backed client with default options.
    pub fn new() -> Result<Self> {
        Self::from_options(ClientOptions::default())
    }

    /// Creates a `reqwest`-backed client. `options.timeouts` apply to every
    /// call that does not override them.
    pub fn from_options(options: ClientOptions) -> Result<Self> {
        let transport = ReqwestTransport::new()?;
        Ok(Self::with_transport(transport, options))
    }

    /// Creates a client configured from `CLOVER_HTTP_*` environment variables.
    ///
    /// See [`ClientOptions::from_env`] for the variables read.
    pub fn from_env() -> std::result::Result<Self, String> {
        let options = ClientOptions::from_env()?;
        Self::from_options(options).map_err(|err| err.to_string())
    }
}

impl<T: Transport> Client<T> {
    /// Creates a client over any [`Transport`].
    pub fn with_transport(transport: T, options: ClientOptions) -> Self {
        Self { transport, options }
    }

    /// Replaces the client options, new timeouts included.
    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Client-wide options in effect.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends a GET request and applies `transform` to the successful response.
    pub async fn get<V, E, F>(&self, url: &str, transform: F, options: RequestOptions) -> Result<V>
    where
        F: FnOnce(Response) -> std::result::Result<V, E>,
        E: Into<BoxError>,
    {
        let request = self.build_request(Method::Get, url, None, &options);
        self.execute(request, transform, options.cancel.as_ref())
            .await
    }

    /// Sends `payload` as JSON with PUT and applies `transform` to the successful response.
    pub async fn put<P, V, E, F>(
        &self,
        url: &str,
        payload: &P,
        transform: F,
        options: RequestOptions,
    ) -> Result<V>
    where
        P: Serialize + ?Sized,
        F: FnOnce(Response) -> std::result::Result<V, E>,
        E: Into<BoxError>,
    {
        self.send_payload(Method::Put, url, payload, transform, options)
            .await
    }

    /// Sends `payload` as JSON with POST and applies `transform` to the successful response.
    pub async fn post<P, V, E, F>(
        &self,
        url: &str,
        payload: &P,
        transform: F,
        options: RequestOptions,
    ) -> Result<V>
    where
        P: Serialize + ?Sized,
        F: FnOnce(Response) -> std::result::Result<V, E>,
        E: Into<BoxError>,
    {
        self.send_payload(Method::Post, url, payload, transform, options)
            .await
    }

    /// GET and decode the body as JSON.
    pub async fn get_json<V: DeserializeOwned>(&self, url: &str) -> Result<V> {
        self.get(url, response::json(), RequestOptions::default())
            .await
    }

    /// PUT a JSON payload and decode the JSON reply.
    pub async fn put_json<P, V>(&self, url: &str, payload: &P) -> Result<V>
    where
        P: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        self.put(url, payload, response::json(), RequestOptions::default())
            .await
    }

    /// POST a JSON payload and decode the JSON reply.
    pub async fn post_json<P, V>(&self, url: &str, payload: &P) -> Result<V>
    where
        P: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        self.post(url, payload, response::json(), RequestOptions::default())
            .await
    }

    /// Runs the attempt loop for a prepared request.
    ///
    /// `transform` runs at most once, on the first successful response.
    pub async fn execute<V, E, F>(
        &self,
        request: Request,
        transform: F,
        cancel: Option<&CancellationToken>,
    ) -> Result<V>
    where
        F: FnOnce(Response) -> std::result::Result<V, E>,
        E: Into<BoxError>,
    {
        let policy = &self.options.retry;
        let mut attempt = 1u32;

        loop {
            let outcome = self.attempt(&request, cancel).await;
            let err = match classify(&request, outcome) {
                Ok(response) => return apply(transform, response),
                Err(err) => err,
            };

            if !policy.should_retry(&err, attempt) {
                #[cfg(feature = "tracing")]
                {
                    if err.is_terminal() || err.is_cancelled() {
                        tracing::debug!(attempt, kind = ?err.kind(), "request failed: {err}");
                    } else {
                        tracing::warn!(attempt, kind = ?err.kind(), "giving up on request: {err}");
                    }
                }
                return Err(err.into());
            }

            let delay = policy.backoff_for(attempt);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt,
                max_attempts = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "retrying {} {} after error: {err}",
                request.method,
                request.url
            );

            if !Self::backoff(delay, cancel).await {
                return Err(transport_error(&request, TransportFailure::cancelled()).into());
            }
            attempt += 1;
        }
    }

    async fn send_payload<P, V, E, F>(
        &self,
        method: Method,
        url: &str,
        payload: &P,
        transform: F,
        options: RequestOptions,
    ) -> Result<V>
    where
        P: Serialize + ?Sized,
        F: FnOnce(Response) -> std::result::Result<V, E>,
        E: Into<BoxError>,
    {
        let body = serde_json::to_vec(payload).map_err(Error::Encode)?;
        let request = self.build_request(method, url, Some(body), &options);
        self.execute(request, transform, options.cancel.as_ref())
            .await
    }

    fn build_request(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
        options: &RequestOptions,
    ) -> Request {
        let mut headers = options
            .headers
            .clone()
            .unwrap_or_else(|| self.options.default_headers.clone());
        if body.is_some()
            && !headers
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        {
            headers.push(("content-type".to_owned(), "application/json".to_owned()));
        }

        Request {
            method,
            url: url.to_owned(),
            headers,
            body,
            timeouts: options.timeouts.unwrap_or(self.options.timeouts),
        }
    }

    async fn attempt(
        &self,
        request: &Request,
        cancel: Option<&CancellationToken>,
    ) -> std::result::Result<Response, TransportFailure> {
        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(TransportFailure::cancelled()),
                    outcome = self.transport.perform(request) => outcome,
                }
            }
            None => self.transport.perform(request).await,
        }
    }

    /// Sleeps for `delay`; returns false if cancelled first.
    async fn backoff(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => false,
                    _ = tokio::time::sleep(delay) => true,
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                true
            }
        }
    }
}
