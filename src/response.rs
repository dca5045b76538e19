//! Response classification and the stock response transforms.
//!
//! [`classify`] is the total mapping from a transport outcome to either a
//! successful [`Response`] or a [`ClassifiedError`]. Transforms only ever see
//! successful responses.

use serde::de::DeserializeOwned;

use crate::{
    BoxError, ClassifiedError, Diagnostic, Error, Request, Result, TransportFailure,
};

/// A completed HTTP response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the first header value matching `name`, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Raw body bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Body as text; invalid UTF-8 is replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

/// Maps a transport outcome onto a successful response or a classified error.
pub fn classify(
    request: &Request,
    outcome: std::result::Result<Response, TransportFailure>,
) -> std::result::Result<Response, ClassifiedError> {
    let response = match outcome {
        Ok(response) => response,
        Err(failure) => return Err(transport_error(request, failure)),
    };

    let status = response.status();
    if response.is_success() {
        return Ok(response);
    }

    let diagnostic = diagnostic(request, response.text());
    Err(match status {
        400 => ClassifiedError::BadInput { diagnostic },
        401 | 403 => ClassifiedError::Unauthorized { status, diagnostic },
        404 => ClassifiedError::NotFound { diagnostic },
        _ => ClassifiedError::ServerError { status, diagnostic },
    })
}

/// Classifies `outcome` and, on success, runs `transform` once.
///
/// Transform errors are returned as [`Error::Transform`] and are never
/// classified.
pub fn handle_response<T, E, F>(
    request: &Request,
    outcome: std::result::Result<Response, TransportFailure>,
    transform: F,
) -> Result<T>
where
    F: FnOnce(Response) -> std::result::Result<T, E>,
    E: Into<BoxError>,
{
    let response = classify(request, outcome)?;
    apply(transform, response)
}

pub(crate) fn apply<T, E, F>(transform: F, response: Response) -> Result<T>
where
    F: FnOnce(Response) -> std::result::Result<T, E>,
    E: Into<BoxError>,
{
    transform(response).map_err(|err| Error::Transform(err.into()))
}

pub(crate) fn transport_error(request: &Request, failure: TransportFailure) -> ClassifiedError {
    ClassifiedError::Transport {
        kind: failure.kind,
        diagnostic: diagnostic(request, failure.reason),
    }
}

fn diagnostic(request: &Request, reason: String) -> Diagnostic {
    Diagnostic {
        method: request.method,
        url: request.url.clone(),
        body: request.body_text(),
        reason,
    }
}

/// Decodes the body as JSON.
pub fn json<T: DeserializeOwned>() -> impl FnOnce(Response) -> serde_json::Result<T> {
    |response| response.json()
}

/// Returns the body as text.
pub fn text() -> impl FnOnce(Response) -> std::result::Result<String, BoxError> {
    |response| Ok(response.text())
}

/// Hands back the response unchanged.
pub fn identity() -> impl FnOnce(Response) -> std::result::Result<Response, BoxError> {
    Ok
}

/// Ignores the response.
pub fn discard() -> impl FnOnce(Response) -> std::result::Result<(), BoxError> {
    |_| Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json as json_value;

    use super::{classify, discard, handle_response, identity, json, text, Response};
    use crate::{
        ClassifiedError, Error, ErrorKind, Method, Request, TransportFailure,
        TransportFailureKind,
    };

    fn request() -> Request {
        let mut request = Request::new(Method::Post, "http://localhost:5000/categories");
        request.body = Some(br#"{"name":"food"}"#.to_vec());
        request
    }

    fn response(status: u16, body: &str) -> Response {
        Response::new(status, Vec::new(), body.as_bytes().to_vec())
    }

    fn kind_for(status: u16) -> ErrorKind {
        classify(&request(), Ok(response(status, "nope")))
            .expect_err("non-2xx must classify")
            .kind()
    }

    #[test]
    fn status_mapping_is_total() {
        assert_eq!(kind_for(400), ErrorKind::BadInput);
        assert_eq!(kind_for(401), ErrorKind::Unauthorized);
        assert_eq!(kind_for(403), ErrorKind::Unauthorized);
        assert_eq!(kind_for(404), ErrorKind::NotFound);
        assert_eq!(kind_for(405), ErrorKind::ServerError);
        assert_eq!(kind_for(429), ErrorKind::ServerError);
        assert_eq!(kind_for(500), ErrorKind::ServerError);
        assert_eq!(kind_for(503), ErrorKind::ServerError);
        assert_eq!(kind_for(302), ErrorKind::ServerError);
    }

    #[test]
    fn success_range_passes_through() {
        for status in [200, 201, 204, 299] {
            let response = classify(&request(), Ok(response(status, "")))
                .expect("2xx must be success");
            assert_eq!(response.status(), status);
        }
    }

    #[test]
    fn error_embeds_request_and_response_text() {
        let err = classify(&request(), Ok(response(400, "bad payload")))
            .expect_err("400 must classify");
        let diagnostic = err.diagnostic();
        assert_eq!(diagnostic.method, Method::Post);
        assert_eq!(diagnostic.url, "http://localhost:5000/categories");
        assert_eq!(diagnostic.body.as_deref(), Some(r#"{"name":"food"}"#));
        assert_eq!(diagnostic.reason, "bad payload");
    }

    #[test]
    fn transport_failure_skips_status_inspection() {
        let err = classify(&request(), Err(TransportFailure::timeout("read timed out")))
            .expect_err("transport failure must classify");
        match err {
            ClassifiedError::Transport { kind, diagnostic } => {
                assert_eq!(kind, TransportFailureKind::Timeout);
                assert_eq!(diagnostic.reason, "read timed out");
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn handle_response_runs_transform_on_success() {
        let id: i64 = handle_response(&request(), Ok(response(200, r#"{"id": 7}"#)), |r| {
            r.json::<serde_json::Value>().map(|v| v["id"].as_i64().unwrap_or_default())
        })
        .expect("transform must succeed");
        assert_eq!(id, 7);
    }

    #[test]
    fn handle_response_does_not_run_transform_on_error() {
        let mut ran = false;
        let result = handle_response(&request(), Ok(response(404, "")), |_| {
            ran = true;
            Ok::<_, serde_json::Error>(())
        });
        assert!(matches!(
            result,
            Err(Error::Classified(ClassifiedError::NotFound { .. }))
        ));
        assert!(!ran);
    }

    #[test]
    fn transform_error_is_not_classified() {
        let result =
            handle_response(&request(), Ok(response(200, "not json")), json::<serde_json::Value>());
        assert!(matches!(result, Err(Error::Transform(_))));
    }

    #[test]
    fn stock_transforms() {
        let body = r#"[{"name":"food"}]"#;
        assert_eq!(
            json::<serde_json::Value>()(response(200, body)).expect("valid json"),
            json_value!([{"name": "food"}])
        );
        assert_eq!(text()(response(200, body)).expect("text"), body);
        assert_eq!(
            identity()(response(201, body)).expect("identity").status(),
            201
        );
        assert!(discard()(response(204, "")).is_ok());
    }
}
