use std::collections::BTreeMap;

use bytes::Bytes;

/// Name of the schema that validated a forwarded message.
pub const SCHEMA_NAME: &str = "Schema-Name";
/// Revision of that schema.
pub const SCHEMA_REVISION: &str = "Schema-Revision";
/// Subject pattern of that schema.
pub const SCHEMA_SUBJECT: &str = "Schema-Subject";
/// Dialect of that schema.
pub const SCHEMA_TYPE: &str = "Schema-Type";
/// Always `true` on forwarded messages.
pub const SCHEMA_VALIDATED: &str = "Schema-Validated";
/// Error description on failed service replies.
pub const SERVICE_ERROR: &str = "Service-Error";
/// Error code on failed service replies.
pub const SERVICE_ERROR_CODE: &str = "Service-Error-Code";

/// Message headers. Setting a header replaces any previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A message on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    /// Where the receiver should send its answer, if anywhere.
    pub reply: Option<String>,
    pub headers: Headers,
    pub payload: Bytes,
}

impl Message {
    pub fn new(subject: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            reply: None,
            headers: Headers::new(),
            payload: payload.into(),
        }
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Error code of a failed service reply.
    pub fn error_code(&self) -> Option<u16> {
        self.headers.get(SERVICE_ERROR_CODE)?.parse().ok()
    }

    /// Error description of a failed service reply.
    pub fn error_description(&self) -> Option<&str> {
        self.headers.get(SERVICE_ERROR)
    }
}
