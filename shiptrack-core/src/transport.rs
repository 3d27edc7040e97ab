//! Outbound HTTP port used by carrier providers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Error as ReqwestError};

/// Default bound for establishing a connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
/// Default bound for the whole exchange.
pub const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(thiserror::Error, Debug)]
/// Failures of the HTTP exchange itself.
pub enum TransportError {
    /// Connect, timeout, DNS, TLS, or non-success status reported by `reqwest`.
    #[error("HTTP error: {0}")]
    Http(#[from] ReqwestError),
    /// Failure reported by a non-`reqwest` transport.
    #[error("Transport error: {0}")]
    Other(String),
}

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// Raw text, sent as-is.
    Text(String),
    /// `application/x-www-form-urlencoded` fields.
    Form(Vec<(String, String)>),
}

/// Connection and overall time bounds for one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Connection establishment bound.
    pub connect: Duration,
    /// Overall bound.
    pub total: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: CONNECT_TIMEOUT,
            total: TIMEOUT,
        }
    }
}

/// Everything a transport needs to perform one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute url.
    pub url: String,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Query string pairs.
    pub query: Vec<(String, String)>,
    /// Body.
    pub body: RequestBody,
    /// Time bounds.
    pub timeouts: Timeouts,
}

impl HttpRequest {
    /// A `GET` request with default timeouts.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// A `POST` request with default timeouts.
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
            timeouts: Timeouts::default(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a query pair.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }
}

#[async_trait]
/// Performs one HTTP exchange and hands back the raw response body.
pub trait HttpTransport: Send + Sync {
    /// Send `request` and return the body bytes of a successful response.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when no successful response was received.
    async fn execute(&self, request: HttpRequest) -> Result<Vec<u8>, TransportError>;
}

/// [`HttpTransport`] backed by a shared `reqwest` client.
///
/// `reqwest` only supports a connect timeout per client, so the client's
/// connect timeout applies and [`Timeouts::connect`] of individual requests is ignored.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a client using [`CONNECT_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("shiptrack/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<Vec<u8>, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        }
        .timeout(request.timeouts.total);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Text(text) => builder.body(text),
            RequestBody::Form(fields) => builder.form(&fields),
        };

        let bytes = builder
            .send()
            .await
            .map_err(TransportError::from)?
            .error_for_status()
            .map_err(TransportError::from)?
            .bytes()
            .await
            .map_err(TransportError::from)?;

        Ok(bytes.to_vec())
    }
}

/// In-memory transport for tests.
#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{HttpRequest, HttpTransport, TransportError};

    /// Replays a fixed outcome and records every request it receives.
    #[derive(Debug)]
    pub struct CannedTransport {
        response: Result<Vec<u8>, String>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl CannedTransport {
        /// Answer every request with `body`.
        #[must_use]
        pub fn responding(body: impl Into<Vec<u8>>) -> Self {
            Self {
                response: Ok(body.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Fail every request with [`TransportError::Other`].
        #[must_use]
        pub fn failing(message: impl Into<String>) -> Self {
            Self {
                response: Err(message.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Requests seen so far.
        #[must_use]
        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .map(|requests| requests.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl HttpTransport for CannedTransport {
        async fn execute(&self, request: HttpRequest) -> Result<Vec<u8>, TransportError> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request);
            }
            self.response.clone().map_err(TransportError::Other)
        }
    }
}
