//! HTTP transport seam
//!
//! Every network call made by the SDK goes through the [`Transport`] trait so
//! that callers can substitute their own client (or a mock in tests). The
//! default [`HttpTransport`] is a thin wrapper over `reqwest`'s blocking client.

use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,

    /// POST
    Post,

    /// PUT
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
        }
    }
}

/// An outgoing HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request method
    pub method: Method,

    /// Absolute URL
    pub url: String,

    /// Header name/value pairs
    pub headers: Vec<(String, String)>,

    /// Request body
    pub body: Vec<u8>,
}

impl Request {
    /// Create a request without headers or body
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Create a PUT request
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url)
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Add an `authorization: bearer` header
    #[must_use]
    pub fn bearer(self, token: &str) -> Self {
        self.header("authorization", &format!("bearer {}", token))
    }

    /// Set a raw body
    #[must_use]
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Set a JSON body and content type
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(body)?;
        Ok(self.header("Content-Type", "application/json").body(bytes))
    }

    /// Get the first value of a header, matched case-insensitively
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse the body as JSON
    pub fn json_body(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// A received HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: u16,

    /// Response body
    pub body: Vec<u8>,
}

impl Response {
    /// Create a response
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Create a response with a JSON body
    pub fn json_response(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Turn a non-success status into an error
    ///
    /// A 409 becomes [`Error::Conflict`]; every other non-2xx status becomes
    /// [`Error::Http`] carrying the raw body.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }

        let body = self.text();
        if self.status == 409 {
            return Err(Error::Conflict {
                message: error_message(&body).unwrap_or_else(|| body.clone()),
                body,
            });
        }

        Err(Error::Http {
            status: self.status,
            body,
        })
    }
}

/// Extract `error.message` (or `error.details[0].message`) from a service error body
pub fn error_message(body: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = parsed.get("error")?;

    error
        .get("details")
        .and_then(|d| d.get(0))
        .and_then(|d| d.get("message"))
        .or_else(|| error.get("message"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

/// Join a service root and a relative API path
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Sends requests and returns responses
///
/// Implementations report transport failures (DNS, TLS, connection reset) as
/// errors and return every received response, whatever its status, as `Ok`.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait Transport: Send + Sync {
    /// Send a request and wait for the full response
    fn send(&self, request: Request) -> Result<Response>;
}

/// Options for the default HTTP transport
#[derive(Debug, Clone)]
pub struct HttpTransportOptions {
    /// Total per-request timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,

    /// Value of the `User-Agent` header
    pub user_agent: String,
}

impl Default for HttpTransportOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: format!("ml-studio-rs/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Blocking HTTP transport backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Inner client
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Create a transport with default options
    pub fn new() -> Result<Self> {
        Self::with_options(&HttpTransportOptions::default())
    }

    /// Create a transport with the given options
    pub fn with_options(options: &HttpTransportOptions) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder().user_agent(options.user_agent.clone());
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: Request) -> Result<Response> {
        debug!(method = %request.method, url = %request.url, bytes = request.body.len(), "sending request");

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() || request.method != Method::Get {
            builder = builder.body(request.body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.bytes()?.to_vec();

        trace!(status, bytes = body.len(), "received response");
        Ok(Response { status, body })
    }
}
