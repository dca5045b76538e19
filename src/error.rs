use std::fmt;

use crate::Method;

/// Boxed error produced by a response transform.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request failed and was classified; retries, if any, are exhausted.
    #[error(transparent)]
    Classified(#[from] ClassifiedError),
    /// The caller's transform rejected a successful response. Never retried.
    #[error("response transform failed: {0}")]
    Transform(#[source] BoxError),
    /// The payload could not be encoded as JSON. No request was sent.
    #[error("payload encoding failed: {0}")]
    Encode(#[source] serde_json::Error),
    /// The underlying `reqwest` client could not be built.
    #[error("http client setup failed: {0}")]
    Setup(#[source] reqwest::Error),
}

impl Error {
    /// Returns the classified error, if this is one.
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            Self::Classified(err) => Some(err),
            _ => None,
        }
    }

    /// Shorthand for `classified().map(ClassifiedError::kind)`.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.classified().map(ClassifiedError::kind)
    }
}

/// Where a failed request went, and why it failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub method: Method,
    pub url: String,
    /// Request body as lossy UTF-8, when the request had one.
    pub body: Option<String>,
    /// Response text or transport failure message.
    pub reason: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)?;
        if let Some(body) = &self.body {
            write!(f, " body = {body}")?;
        }
        write!(f, " reason = {}", self.reason)
    }
}

/// Why no response was received.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportFailureKind {
    /// The connection could not be established.
    Connect,
    /// The connect or read deadline passed.
    Timeout,
    /// The caller's cancellation token fired.
    Cancelled,
    /// Any other failure while sending or reading the body.
    Other,
}

impl fmt::Display for TransportFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Other => "other",
        })
    }
}

/// Classified outcome of a failed request.
///
/// The set is closed: every non-2xx status and every transport failure maps
/// onto exactly one variant.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ClassifiedError {
    /// HTTP 400.
    #[error("bad input to API: {diagnostic}")]
    BadInput { diagnostic: Diagnostic },
    /// HTTP 401 or 403.
    #[error("not authorised to access API (status {status}): {diagnostic}")]
    Unauthorized { status: u16, diagnostic: Diagnostic },
    /// HTTP 404.
    #[error("no resources found: {diagnostic}")]
    NotFound { diagnostic: Diagnostic },
    /// Any other non-2xx status.
    #[error("API request was not ok, status code {status}: {diagnostic}")]
    ServerError { status: u16, diagnostic: Diagnostic },
    /// No response was received.
    #[error("transport error ({kind}): {diagnostic}")]
    Transport {
        kind: TransportFailureKind,
        diagnostic: Diagnostic,
    },
}

/// Fieldless discriminant of [`ClassifiedError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ClassifiedError::BadInput`].
    BadInput,
    /// See [`ClassifiedError::Unauthorized`].
    Unauthorized,
    /// See [`ClassifiedError::NotFound`].
    NotFound,
    /// See [`ClassifiedError::ServerError`].
    ServerError,
    /// See [`ClassifiedError::Transport`].
    Transport,
}

impl ClassifiedError {
    /// Which variant this is, without its payload.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadInput { .. } => ErrorKind::BadInput,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ServerError { .. } => ErrorKind::ServerError,
            Self::Transport { .. } => ErrorKind::Transport,
        }
    }

    /// Request and failure details, present on every variant.
    pub fn diagnostic(&self) -> &Diagnostic {
        match self {
            Self::BadInput { diagnostic }
            | Self::Unauthorized { diagnostic, .. }
            | Self::NotFound { diagnostic }
            | Self::ServerError { diagnostic, .. }
            | Self::Transport { diagnostic, .. } => diagnostic,
        }
    }

    /// HTTP status of the response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadInput { .. } => Some(400),
            Self::NotFound { .. } => Some(404),
            Self::Unauthorized { status, .. } | Self::ServerError { status, .. } => Some(*status),
            Self::Transport { .. } => None,
        }
    }

    /// Client misuse or permanent absence. Retrying cannot help.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::BadInput | ErrorKind::Unauthorized | ErrorKind::NotFound
        )
    }

    /// True when the caller's cancellation token ended the call.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                kind: TransportFailureKind::Cancelled,
                ..
            }
        )
    }
}
