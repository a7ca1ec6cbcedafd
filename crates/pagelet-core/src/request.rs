use serde::Serialize;
use std::collections::BTreeMap;

/// Snapshot of an incoming HTTP request, passed by value into `loader`.
///
/// Header names are stored as the transport reports them (lowercase for
/// `http::HeaderMap`). Repeated headers keep their arrival order.
#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
}

impl PageRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: BTreeMap::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}
