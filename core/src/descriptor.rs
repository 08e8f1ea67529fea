//! The call descriptor: everything needed to make one API call.
//!
//! # Design
//! `CallDescriptor` is an owned value built up with consuming `with_*`
//! methods. It only reaches an executor or the job queue through `freeze`,
//! which validates it and moves it behind an `Arc` as a `FrozenCall`. A
//! `FrozenCall` offers read access only, so once a call is submitted nothing
//! can change it. The job queue takes the descriptor by value, so the caller
//! keeps no handle to the submitted copy.
//!
//! Only caller-supplied headers are stored here. The built-in defaults are
//! merged in by `render`.

use std::sync::Arc;

use crate::error::CalloutError;
use crate::http::HttpMethod;

/// Timeout applied when the caller does not set one.
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDescriptor {
    endpoint_key: String,
    method: HttpMethod,
    path: String,
    query: String,
    body: String,
    headers: Vec<(String, String)>,
    timeout_ms: u64,
}

impl CallDescriptor {
    /// Describe a call with the default headers and timeout.
    pub fn new(
        endpoint_key: &str,
        method: HttpMethod,
        path: &str,
        query: &str,
        body: &str,
    ) -> Self {
        Self {
            endpoint_key: endpoint_key.to_string(),
            method,
            path: path.to_string(),
            query: query.to_string(),
            body: body.to_string(),
            headers: Vec::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Like `new`, with custom headers that take precedence over the defaults.
    pub fn with_custom_headers(
        endpoint_key: &str,
        method: HttpMethod,
        path: &str,
        query: &str,
        body: &str,
        headers: &[(&str, &str)],
    ) -> Self {
        Self::new(endpoint_key, method, path, query, body).with_headers(headers)
    }

    /// Start an empty GET against `endpoint_key`, to be filled in with the
    /// `with_*` methods.
    pub fn for_endpoint(endpoint_key: &str) -> Self {
        Self::new(endpoint_key, HttpMethod::Get, "", "", "")
    }

    pub fn with_endpoint_key(mut self, endpoint_key: &str) -> Self {
        self.endpoint_key = endpoint_key.to_string();
        self
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    /// Replace the query string. It is sent verbatim, so it must already be
    /// encoded.
    pub fn with_query(mut self, query: &str) -> Self {
        self.query = query.to_string();
        self
    }

    /// Append one `key=value` pair, URL-encoding both halves.
    pub fn with_query_param(mut self, key: &str, value: &str) -> Self {
        self.query = join_query(&self.query, &encode_pair(key, value));
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    /// Set one header, replacing any header with exactly the same name.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match self.headers.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
        self
    }

    pub fn with_headers(self, headers: &[(&str, &str)]) -> Self {
        headers
            .iter()
            .fold(self, |desc, (name, value)| desc.with_header(name, value))
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn endpoint_key(&self) -> &str {
        &self.endpoint_key
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Caller-supplied headers only, without the defaults.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Validate the descriptor and seal it for submission.
    pub fn freeze(self) -> Result<FrozenCall, CalloutError> {
        if self.endpoint_key.trim().is_empty() {
            return Err(CalloutError::Validation("endpoint key is required".to_string()));
        }
        if self.path.is_empty() {
            return Err(CalloutError::Validation(format!(
                "path is required for `{}`",
                self.endpoint_key
            )));
        }
        if self.timeout_ms == 0 {
            return Err(CalloutError::Validation(format!(
                "timeout for `{}` must be greater than zero",
                self.endpoint_key
            )));
        }
        Ok(FrozenCall(Arc::new(self)))
    }
}

/// A validated descriptor that can no longer change.
///
/// Cloning shares the same descriptor, so concurrent readers always agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenCall(Arc<CallDescriptor>);

impl FrozenCall {
    pub fn descriptor(&self) -> &CallDescriptor {
        &self.0
    }

    pub fn endpoint_key(&self) -> &str {
        self.0.endpoint_key()
    }

    /// An editable copy, for issuing a modified call. The frozen original is
    /// left as it was.
    pub fn to_descriptor(&self) -> CallDescriptor {
        CallDescriptor::clone(&self.0)
    }
}

pub(crate) fn encode_pair(key: &str, value: &str) -> String {
    format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
}

/// Join `pair` onto `query` with `&`, ignoring a leading `?` on `query`.
pub(crate) fn join_query(query: &str, pair: &str) -> String {
    let query = query.strip_prefix('?').unwrap_or(query);
    if query.is_empty() {
        pair.to_string()
    } else {
        format!("{query}&{pair}")
    }
}
