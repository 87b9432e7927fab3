use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::request::Method;

pub type StartFn = Arc<dyn Fn(&RequestInfo) + Send + Sync>;
pub type ProgressFn = Arc<dyn Fn(&Progress) + Send + Sync>;
pub type SuccessFn = Arc<dyn Fn(Response) + Send + Sync>;
pub type FailureFn = Arc<dyn Fn(&Failure) + Send + Sync>;
pub type FinishedFn = Arc<dyn Fn(&Completion) + Send + Sync>;

/// Identity of an in-flight request, passed to `on_start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub request_id: Uuid,
    pub method: Method,
    pub url: String,
}

/// Transfer progress reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub loaded: u64,
    /// Known only when the response declares a content length
    pub total: Option<u64>,
}

/// Response payload: structured when it parses as JSON, raw text otherwise
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    pub fn from_bytes(raw: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(raw) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(String::from_utf8_lossy(raw).into_owned()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            ResponseBody::Json(_) => None,
        }
    }
}

impl fmt::Display for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Json(value) => write!(f, "{}", value),
            ResponseBody::Text(text) => f.write_str(text),
        }
    }
}

/// Completed response handed to `on_success`
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub request_id: Uuid,
    pub status: u16,
    pub body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureKind {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("too many redirects")]
    TooManyRedirects,
    #[error("request aborted")]
    Aborted,
    #[error("transport finished without an outcome")]
    Incomplete,
}

/// Passed to `on_failure` and `on_abort`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub request_id: Uuid,
    pub kind: FailureKind,
}

/// Terminal result of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded { status: u16 },
    Failed(FailureKind),
    Aborted,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Succeeded { status } => write!(f, "succeeded with status {}", status),
            Outcome::Failed(kind) => write!(f, "failed: {}", kind),
            Outcome::Aborted => f.write_str("aborted"),
        }
    }
}

/// Passed to `on_finished`, always the last callback of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub request_id: Uuid,
    pub outcome: Outcome,
}

/// Optional lifecycle callbacks as supplied by the caller
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_success: Option<SuccessFn>,
    pub on_failure: Option<FailureFn>,
    pub on_abort: Option<FailureFn>,
    pub on_start: Option<StartFn>,
    pub on_loading: Option<ProgressFn>,
    pub on_finished: Option<FinishedFn>,
}

impl Callbacks {
    /// Promote to a bound set; `None` when `on_success` is missing
    pub fn into_bound(self) -> Option<BoundCallbacks> {
        let on_success = self.on_success?;
        Some(BoundCallbacks {
            on_success,
            on_failure: self.on_failure,
            on_abort: self.on_abort,
            on_start: self.on_start,
            on_loading: self.on_loading,
            on_finished: self.on_finished,
        })
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .field("on_abort", &self.on_abort.is_some())
            .field("on_start", &self.on_start.is_some())
            .field("on_loading", &self.on_loading.is_some())
            .field("on_finished", &self.on_finished.is_some())
            .finish()
    }
}

/// Validated callbacks: `on_success` is guaranteed present
#[derive(Clone)]
pub struct BoundCallbacks {
    pub on_success: SuccessFn,
    pub on_failure: Option<FailureFn>,
    pub on_abort: Option<FailureFn>,
    pub on_start: Option<StartFn>,
    pub on_loading: Option<ProgressFn>,
    pub on_finished: Option<FinishedFn>,
}

impl BoundCallbacks {
    pub fn new(on_success: SuccessFn) -> Self {
        Self {
            on_success,
            on_failure: None,
            on_abort: None,
            on_start: None,
            on_loading: None,
            on_finished: None,
        }
    }
}

impl fmt::Debug for BoundCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundCallbacks")
            .field("on_failure", &self.on_failure.is_some())
            .field("on_abort", &self.on_abort.is_some())
            .field("on_start", &self.on_start.is_some())
            .field("on_loading", &self.on_loading.is_some())
            .field("on_finished", &self.on_finished.is_some())
            .finish_non_exhaustive()
    }
}
