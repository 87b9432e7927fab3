pub mod config;
pub mod dispatch;
pub mod lifecycle;
pub mod observability;
pub mod request;
pub mod transport;

pub use dispatch::{DispatchError, Dispatched, Dispatcher, PreparedRequest, dispatch};
