use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::types::{
    Completion, Failure, FailureFn, FinishedFn, Progress, ProgressFn, RequestInfo, Response,
    StartFn, SuccessFn,
};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("callback not found: {0}")]
    NotFound(String),
}

/// A named callback, tagged with the lifecycle slot signature it fits
#[derive(Clone)]
pub enum RegisteredCallback {
    Start(StartFn),
    Progress(ProgressFn),
    Success(SuccessFn),
    Failure(FailureFn),
    Finished(FinishedFn),
}

impl RegisteredCallback {
    pub fn kind(&self) -> &'static str {
        match self {
            RegisteredCallback::Start(_) => "start",
            RegisteredCallback::Progress(_) => "progress",
            RegisteredCallback::Success(_) => "success",
            RegisteredCallback::Failure(_) => "failure",
            RegisteredCallback::Finished(_) => "finished",
        }
    }

    pub fn as_start(&self) -> Option<StartFn> {
        match self {
            RegisteredCallback::Start(callback) => Some(callback.clone()),
            _ => None,
        }
    }

    pub fn as_progress(&self) -> Option<ProgressFn> {
        match self {
            RegisteredCallback::Progress(callback) => Some(callback.clone()),
            _ => None,
        }
    }

    pub fn as_success(&self) -> Option<SuccessFn> {
        match self {
            RegisteredCallback::Success(callback) => Some(callback.clone()),
            _ => None,
        }
    }

    pub fn as_failure(&self) -> Option<FailureFn> {
        match self {
            RegisteredCallback::Failure(callback) => Some(callback.clone()),
            _ => None,
        }
    }

    pub fn as_finished(&self) -> Option<FinishedFn> {
        match self {
            RegisteredCallback::Finished(callback) => Some(callback.clone()),
            _ => None,
        }
    }
}

impl fmt::Debug for RegisteredCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegisteredCallback::{}", self.kind())
    }
}

/// Registry mapping callback names to callables, used to bind
/// declarative request descriptions
#[derive(Clone, Debug)]
pub struct CallbackRegistry {
    callbacks: BTreeMap<String, RegisteredCallback>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            callbacks: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, callback: RegisteredCallback) {
        self.callbacks.insert(name.into(), callback);
    }

    pub fn register_start<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: Fn(&RequestInfo) + Send + Sync + 'static,
    {
        self.register(name, RegisteredCallback::Start(Arc::new(callback)));
    }

    pub fn register_progress<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        self.register(name, RegisteredCallback::Progress(Arc::new(callback)));
    }

    pub fn register_success<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: Fn(Response) + Send + Sync + 'static,
    {
        self.register(name, RegisteredCallback::Success(Arc::new(callback)));
    }

    pub fn register_failure<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: Fn(&Failure) + Send + Sync + 'static,
    {
        self.register(name, RegisteredCallback::Failure(Arc::new(callback)));
    }

    pub fn register_finished<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: Fn(&Completion) + Send + Sync + 'static,
    {
        self.register(name, RegisteredCallback::Finished(Arc::new(callback)));
    }

    pub fn get(&self, name: &str) -> Result<&RegisteredCallback, RegistryError> {
        self.callbacks
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.callbacks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.callbacks.keys().map(String::as_str)
    }

    /// Registry preloaded with tracing-backed callbacks for every slot
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register_start("log_start", |info: &RequestInfo| {
            info!(request_id = %info.request_id, method = %info.method, url = %info.url, "Request started");
        });
        registry.register_progress("log_progress", |progress: &Progress| {
            debug!(loaded = progress.loaded, total = ?progress.total, "Request progress");
        });
        registry.register_success("log_response", |response: Response| {
            info!(
                request_id = %response.request_id,
                status = response.status,
                body = %response.body,
                "Response received"
            );
        });
        registry.register_failure("log_failure", |failure: &Failure| {
            warn!(request_id = %failure.request_id, error = %failure.kind, "Request failed");
        });
        registry.register_finished("log_finished", |completion: &Completion| {
            info!(request_id = %completion.request_id, outcome = %completion.outcome, "Request finished");
        });

        registry
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
