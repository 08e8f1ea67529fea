//! The seam between this crate and the network.

use std::sync::Arc;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

/// Sends one rendered request and returns its response.
///
/// Implementations block until the response arrives or `request.timeout_ms`
/// elapses, in which case they must return `TransportError::Timeout` rather
/// than hang. Any status code counts as a response. `request.endpoint_key`
/// names the target and its credentials; resolving it is up to the
/// implementation.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}
