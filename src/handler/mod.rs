//! Handler module - user callbacks and batch dispatch.
//!
//! Provides:
//! - [`OperatorHandler`] / [`ServerHandler`] - the callbacks user code implements
//! - [`SynthesizedHandler`] - a key-extraction function paired with an operator
//! - [`RequestContext`] - watermark and cancellation for one request
//! - [`Dispatcher`] - runs batch requests against a handler

mod context;
mod dispatch;
mod server;

pub use context::RequestContext;
pub use dispatch::Dispatcher;
pub use server::{BoxFuture, OperatorHandler, ServerHandler, SynthesizedHandler};
