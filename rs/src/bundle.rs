//! Keyed multi-part packaging for glob query results.
//!
//! A [`Bundle`] is encoded as `multipart/form-data`, one part per matched
//! file, named by its path relative to the repository root. Parsed values
//! are sent as `application/json`, unparsed files as raw bytes.

/// The payload of one bundle part.
#[derive(Debug, Clone, PartialEq)]
pub enum PartBody {
    Json(serde_json::Value),
    Bytes(Vec<u8>),
}

/// One file in a bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub name: String,
    pub body: PartBody,
}

/// Ordered collection of parts keyed by relative path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    pub parts: Vec<Part>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, body: PartBody) {
        self.parts.push(Part {
            name: name.into(),
            body,
        });
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PartBody> {
        self.parts.iter().find(|p| p.name == name).map(|p| &p.body)
    }

    pub fn names(&self) -> Vec<&str> {
        self.parts.iter().map(|p| p.name.as_str()).collect()
    }

    /// A fresh random boundary.
    pub fn boundary() -> String {
        format!("repo-api-{}", uuid::Uuid::new_v4().simple())
    }

    /// `Content-Type` header value for a body encoded with `boundary`.
    pub fn content_type(boundary: &str) -> String {
        format!("multipart/form-data; boundary={}", boundary)
    }

    /// Encode as a `multipart/form-data` body.
    pub fn encode(&self, boundary: &str) -> Vec<u8> {
        let mut out = Vec::new();
        for part in &self.parts {
            let name = escape_name(&part.name);
            let (content_type, data) = match &part.body {
                PartBody::Json(value) => (
                    "application/json",
                    // Serializing a Value cannot fail.
                    serde_json::to_vec(value).unwrap_or_default(),
                ),
                PartBody::Bytes(bytes) => ("application/octet-stream", bytes.clone()),
            };

            out.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            out.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    name, name
                )
                .as_bytes(),
            );
            out.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
            out.extend_from_slice(&data);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        out
    }
}

/// Percent-encode the characters that would break a quoted header value.
fn escape_name(name: &str) -> String {
    name.replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
