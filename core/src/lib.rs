//! Declarative HTTP callouts with synchronous and deferred execution.
//!
//! # Overview
//! A caller describes one API call as a `CallDescriptor`, freezes it, and
//! either runs it in place through an `Executor` or hands it to a `JobQueue`
//! that runs it later and reports the outcome to a `Finalizer`. The network
//! itself lives behind the `Transport` trait; `MockTransport` replays scripted
//! responses so tests never touch a socket.
//!
//! # Design
//! - Descriptors are plain owned values until `freeze`, which validates them
//!   and yields a shared read-only `FrozenCall`. Nothing downstream can mutate
//!   a frozen call.
//! - `render` is a pure function from `FrozenCall` to `HttpRequest`; the PATCH
//!   tunnel and header defaults are applied there and nowhere else.
//! - Status codes are data. Only failures to communicate at all surface as
//!   `TransportError`.
//! - Finalizers are resolved by name from a `FinalizerRegistry` when a job is
//!   finalized, not when it is enqueued.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod finalizer;
pub mod http;
pub mod job;
pub mod mock;
pub mod queue;
pub mod render;
pub mod transport;

pub use config::QueueConfig;
pub use descriptor::{CallDescriptor, FrozenCall, DEFAULT_TIMEOUT_MS};
pub use error::{CalloutError, MockMiss, TransportError};
pub use executor::Executor;
pub use finalizer::{Finalizer, FinalizerRegistry, Outcome};
pub use http::{generate_response, HttpMethod, HttpRequest, HttpResponse};
pub use job::{JobId, JobState};
pub use mock::{MockMode, MockTransport};
pub use queue::JobQueue;
pub use render::render;
pub use transport::Transport;
