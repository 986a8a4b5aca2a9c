//! # rxn-handler
//!
//! Handler runtime for keyed stream-processing jobs.
//!
//! The engine owns partitioning, durable state and timers. It sends the
//! handler batches of keyed events together with the stored state of every
//! key in the batch; the handler runs user callbacks per key and answers with
//! state mutations, new timers and sink requests.
//!
//! ## Architecture
//!
//! - **State** ([`state`]): typed value and map states hydrated from the
//!   batch's state entries, tracking their own mutations
//! - **Subject** ([`subject`]): the per-key view a callback works against
//! - **Dispatch** ([`handler`]): user callbacks and batch processing
//! - **Transports** ([`transport`]): unary HTTP RPC and a length-prefixed pipe
//!
//! ## Example
//!
//! ```ignore
//! use rxn_handler::config::ServerConfig;
//! use rxn_handler::transport::Server;
//!
//! #[tokio::main]
//! async fn main() -> rxn_handler::Result<()> {
//!     let server = Server::bind(&ServerConfig::default(), CountHandler::new()).await?;
//!     server.serve().await
//! }
//! ```

pub mod batch;
pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod operator;
pub mod protocol;
pub mod sink;
pub mod state;
pub mod subject;
pub mod testrun;
pub mod transport;

pub use error::{Error, Result};
pub use event::KeyedEvent;
pub use handler::RequestContext;
pub use subject::Subject;
