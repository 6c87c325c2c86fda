//! Outgoing request description
//!
//! A [`Request`] is plain data: reducers build it, effects hand it to the
//! gateway. The body encoding (JSON or multipart) follows from what the
//! payload contains, so callers never pick a content type themselves.

use serde_json::{Map, Value};

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl Method {
    /// Upper-case method name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary attachment carried by a multipart body
#[derive(Clone, PartialEq, Eq)]
pub struct FileAttachment {
    /// File name sent with the part
    pub file_name: String,
    /// MIME type, e.g. `image/png`
    pub content_type: String,
    /// Raw file content
    pub bytes: Vec<u8>,
}

impl FileAttachment {
    /// Create an attachment
    #[must_use]
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

impl std::fmt::Debug for FileAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAttachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One named field of a [`Payload`]
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Plain value
    Json(Value),
    /// File upload
    File(FileAttachment),
}

/// Write payload for create/update requests
///
/// Field order is kept as inserted; setting an existing name replaces it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    fields: Vec<(String, Field)>,
}

impl Payload {
    /// Empty payload
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a plain field
    #[must_use]
    pub fn field(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(name.into(), Field::Json(value.into()))
    }

    /// Attach a file
    #[must_use]
    pub fn file(self, name: impl Into<String>, file: FileAttachment) -> Self {
        self.with(name.into(), Field::File(file))
    }

    fn with(mut self, name: String, field: Field) -> Self {
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = field;
        } else {
            self.fields.push((name, field));
        }
        self
    }

    /// Whether any field is a file
    #[must_use]
    pub fn has_files(&self) -> bool {
        self.fields.iter().any(|(_, f)| matches!(f, Field::File(_)))
    }

    /// Look up a plain field
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find_map(|(n, f)| match f {
            Field::Json(v) if n == name => Some(v),
            _ => None,
        })
    }

    /// Rename a field, keeping its position
    #[must_use]
    pub fn rename(mut self, from: &str, to: &str) -> Self {
        if self.fields.iter().any(|(n, _)| n == to) {
            return self;
        }
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| n == from) {
            slot.0 = to.to_string();
        }
        self
    }

    /// The plain fields as a JSON object (files are left out)
    #[must_use]
    pub fn to_json(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter_map(|(n, f)| match f {
                Field::Json(v) => Some((n.clone(), v.clone())),
                Field::File(_) => None,
            })
            .collect()
    }

    /// Iterate over the fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// Number of fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the payload has no fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            fields: map.into_iter().map(|(k, v)| (k, Field::Json(v))).collect(),
        }
    }
}

/// Encoded request body
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    /// No body
    #[default]
    Empty,
    /// `application/json`
    Json(Value),
    /// `multipart/form-data`
    Multipart(Payload),
}

impl From<Payload> for Body {
    fn from(payload: Payload) -> Self {
        if payload.has_files() {
            Self::Multipart(payload)
        } else {
            Self::Json(Value::Object(payload.to_json()))
        }
    }
}

/// A request to the backend, relative to the configured base URL
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Path starting with `/`
    pub path: String,
    /// Query string pairs
    pub query: Vec<(String, String)>,
    /// Body
    pub body: Body,
    /// Sent outside the session: no bearer, and a 401 is an ordinary failure
    pub anonymous: bool,
}

impl Request {
    /// Request with no query and no body
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: Body::Empty,
            anonymous: false,
        }
    }

    /// GET request
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// POST request
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// PUT request
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    /// PATCH request
    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    /// DELETE request
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Append a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Set a JSON body
    #[must_use]
    pub fn json(mut self, value: Value) -> Self {
        self.body = Body::Json(value);
        self
    }

    /// Set the body from a payload, multipart when it carries files
    #[must_use]
    pub fn payload(mut self, payload: Payload) -> Self {
        self.body = payload.into();
        self
    }

    /// Send without the stored bearer
    ///
    /// For the auth endpoints themselves: a rejected password is not a
    /// rejected session.
    #[must_use]
    pub const fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    /// Whether the body will be sent as multipart
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self.body, Body::Multipart(_))
    }
}
