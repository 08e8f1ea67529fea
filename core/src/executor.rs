//! Synchronous execution of a single call.
//!
//! # Design
//! `Executor` is stateless apart from the transport it owns. Each call makes
//! exactly one `Transport::send`; there are no retries and nothing is cached.
//! Whatever the transport returns is handed back unchanged.

use tracing::debug;

use crate::descriptor::{CallDescriptor, FrozenCall};
use crate::error::{CalloutError, TransportError};
use crate::http::HttpResponse;
use crate::render::render;
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct Executor<T> {
    transport: T,
}

impl<T: Transport> Executor<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Freeze `descriptor` and send it, blocking until the transport returns.
    ///
    /// The caller's descriptor is copied before freezing, so it stays usable.
    pub fn execute(&self, descriptor: &CallDescriptor) -> Result<HttpResponse, CalloutError> {
        let call = descriptor.clone().freeze()?;
        Ok(self.send(&call)?)
    }

    /// Send an already frozen call. Transport errors come back unwrapped.
    pub fn send(&self, call: &FrozenCall) -> Result<HttpResponse, TransportError> {
        let request = render(call);
        debug!(
            endpoint_key = %request.endpoint_key,
            method = %request.method,
            path = %request.path,
            "sending request"
        );
        let result = self.transport.send(&request);
        match &result {
            Ok(response) => debug!(
                endpoint_key = %request.endpoint_key,
                status_code = response.status_code,
                "received response"
            ),
            Err(err) => debug!(endpoint_key = %request.endpoint_key, error = %err, "transport failed"),
        }
        result
    }
}
