//! Request lifecycle routing
//!
//! A transport reports what happens to an in-flight request as a stream of
//! [`TransportEvent`]s. The [`LifecycleRouter`] turns that stream into calls on
//! the caller's [`Callbacks`]:
//!
//! - `Start` → `on_start`
//! - `Progress` → `on_loading` (zero or more times)
//! - `Load` → `on_success`, body parsed as JSON or kept as text
//! - `Error` → `on_failure`
//! - `Abort` → `on_abort`, or `on_failure` when no abort callback is bound
//! - `LoadEnd` → `on_finished`, exactly once and always last
//!
//! [`CallbackRegistry`] maps names to callbacks so declarative request
//! descriptions can refer to them.

mod registry;
mod router;
mod types;

pub use registry::{CallbackRegistry, RegisteredCallback, RegistryError};
pub use router::{EventSink, LifecycleRouter, TransportEvent};
pub use types::{
    BoundCallbacks, Callbacks, Completion, Failure, FailureFn, FailureKind, FinishedFn, Outcome,
    Progress, ProgressFn, RequestInfo, Response, ResponseBody, StartFn, SuccessFn,
};
