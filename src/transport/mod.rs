//! Transport boundary
//!
//! A transport performs the network I/O for one request. It is opened with a
//! method, URL and optional credentials, receives headers one at a time and
//! is then handed the body together with an [`EventSink`]. From that point
//! every lifecycle event is reported through the sink; `send` itself returns
//! immediately.

pub mod http;
pub mod mock;

use bytes::Bytes;
use thiserror::Error;

use crate::lifecycle::EventSink;
use crate::request::{Credentials, Method};

pub use http::HttpTransport;
pub use mock::{MockTransport, OpenedRequest};

/// Synchronous hand-off failures; network errors travel as events instead
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid url '{0}'")]
    InvalidUrl(String),

    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("transport used before open")]
    NotOpened,

    #[error("request already sent")]
    AlreadySent,

    #[error("no async runtime available: {0}")]
    NoRuntime(String),

    #[error("transport setup failed: {0}")]
    Setup(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// One-shot request transport
pub trait Transport: Send {
    fn open(&mut self, method: Method, url: &str, credentials: Option<&Credentials>) -> Result<()>;

    fn set_header(&mut self, name: &str, value: &str) -> Result<()>;

    /// Start the request; events are reported through `events`
    fn send(&mut self, body: Option<Bytes>, events: EventSink) -> Result<()>;

    /// Cancel an in-flight request. A no-op once the request has finished.
    fn abort(&mut self);
}
