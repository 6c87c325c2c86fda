//! Wire transport
//!
//! The gateway decides *what* to send and how to interpret the answer; a
//! [`Transport`] only moves bytes. [`HttpTransport`] is the `reqwest`
//! implementation used in production.

use crate::error::TransportError;
use crate::request::{Body, Field, Method, Request};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::future::Future;
use std::time::Duration;

/// A request ready for the wire: the description plus the bearer token
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    /// What to send
    pub request: Request,
    /// Token for the `Authorization: Bearer` header
    pub bearer: Option<String>,
}

/// Raw HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// Status code
    pub status: u16,
    /// Undecoded body
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Response with a JSON body
    #[must_use]
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string().into_bytes(),
        }
    }

    /// Whether the status is 2xx
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Moves a prepared request over the wire
///
/// Returns `Err` only when no response was received at all; any HTTP status,
/// including 4xx/5xx, is a successful transport round-trip.
pub trait Transport: Send + Sync + 'static {
    /// Execute the request
    fn execute(
        &self,
        request: PreparedRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

/// `reqwest`-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for `base_url` with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the HTTP client cannot be built (TLS backend
    /// initialisation failure).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Base URL requests are resolved against
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }

    fn form(payload: crate::request::Payload) -> Result<Form, TransportError> {
        let mut form = Form::new();
        for (name, field) in payload.iter() {
            form = match field {
                Field::Json(serde_json::Value::Null) => form,
                Field::Json(serde_json::Value::String(s)) => form.text(name.to_string(), s.clone()),
                Field::Json(other) => form.text(name.to_string(), other.to_string()),
                Field::File(file) => {
                    let part = Part::bytes(file.bytes.clone())
                        .file_name(file.file_name.clone())
                        .mime_str(&file.content_type)
                        .map_err(|e| TransportError(e.to_string()))?;
                    form.part(name.to_string(), part)
                },
            };
        }
        Ok(form)
    }
}

impl Transport for HttpTransport {
    async fn execute(&self, prepared: PreparedRequest) -> Result<RawResponse, TransportError> {
        let PreparedRequest { request, bearer } = prepared;
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = self.client.request(Self::method(request.method), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        builder = match request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::Multipart(payload) => builder.multipart(Self::form(payload)?),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError(e.to_string()))?
            .to_vec();

        Ok(RawResponse { status, body })
    }
}
