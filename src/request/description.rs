//! Declarative request descriptions loaded from TOML or JSON
//!
//! Callback slots hold names that are resolved against a [`CallbackRegistry`].
//! Values arrive loosely typed, so this is where a wrong-typed required field
//! or an unresolvable callback name is caught.

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

use super::types::{Credentials, EncodingStrategy, FormInput, Header, RequestOptions};
use super::validation::ValidationError;
use crate::lifecycle::{CallbackRegistry, RegisteredCallback};

#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("failed to read request description: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid TOML request description: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid JSON request description: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single header or a list of them.
///
/// `Many` is tried first: a struct also deserializes from a sequence, so an
/// empty list would otherwise become one blank header.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HeaderList {
    Many(Vec<Header>),
    One(Header),
}

impl HeaderList {
    pub fn into_vec(self) -> Vec<Header> {
        match self {
            HeaderList::One(header) => vec![header],
            HeaderList::Many(headers) => headers,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsDescription {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Request options as written in a file
///
/// ```toml
/// method = "post"
/// url = "https://api.example.com/users"
/// on_success = "log_response"
/// on_failure = "log_failure"
///
/// [[headers]]
/// name = "Content-Type"
/// value = "application/json"
///
/// [[form.fields]]
/// name = "user"
/// value = "ada"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestDescription {
    pub method: Option<Value>,
    pub url: Option<Value>,
    pub headers: Option<HeaderList>,
    pub credentials: Option<CredentialsDescription>,
    pub data: Option<String>,
    pub form: Option<FormInput>,
    #[serde(default)]
    pub force_insecure: bool,
    pub consumes: Option<String>,
    pub encoding: Option<EncodingStrategy>,
    pub on_success: Option<Value>,
    pub on_failure: Option<Value>,
    pub on_abort: Option<Value>,
    pub on_start: Option<Value>,
    pub on_loading: Option<Value>,
    pub on_finished: Option<Value>,
}

impl RequestDescription {
    pub fn from_toml_str(raw: &str) -> Result<Self, DescriptionError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, DescriptionError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Load from disk; `.json` files are parsed as JSON, anything else as TOML
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DescriptionError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_str(&raw)
        } else {
            Self::from_toml_str(&raw)
        }
    }

    /// Resolve callback names and field types into [`RequestOptions`].
    ///
    /// Required fields are checked in the same order as validation:
    /// `on_success`, `url`, `method`.
    pub fn into_options(
        self,
        registry: &CallbackRegistry,
    ) -> Result<RequestOptions, ValidationError> {
        let success_name = required_string(self.on_success, "on_success", "a callback name")?;
        let url = required_string(self.url, "url", "a string")?;
        let method = required_string(self.method, "method", "a string")?;

        let mut options = RequestOptions::new().method(method).url(url);
        options.callbacks.on_success = Some(resolve(
            registry,
            "on_success",
            &success_name,
            RegisteredCallback::as_success,
        )?);
        options.callbacks.on_failure =
            resolve_optional(registry, "on_failure", self.on_failure, RegisteredCallback::as_failure)?;
        options.callbacks.on_abort =
            resolve_optional(registry, "on_abort", self.on_abort, RegisteredCallback::as_failure)?;
        options.callbacks.on_start =
            resolve_optional(registry, "on_start", self.on_start, RegisteredCallback::as_start)?;
        options.callbacks.on_loading = resolve_optional(
            registry,
            "on_loading",
            self.on_loading,
            RegisteredCallback::as_progress,
        )?;
        options.callbacks.on_finished = resolve_optional(
            registry,
            "on_finished",
            self.on_finished,
            RegisteredCallback::as_finished,
        )?;

        if let Some(credentials) = self.credentials {
            match (credentials.username, credentials.password) {
                (Some(username), Some(password)) => {
                    options.credentials = Some(Credentials::new(username, password));
                }
                _ => return Err(ValidationError::InvalidCredentials),
            }
        }

        options.headers = self.headers.map(HeaderList::into_vec);
        options.data = self.data.map(Into::into);
        options.form = self.form;
        options.force_insecure = self.force_insecure;
        options.consumes = self.consumes;
        options.encoding = self.encoding;

        Ok(options)
    }
}

fn required_string(
    value: Option<Value>,
    field: &'static str,
    expected: &'static str,
) -> Result<String, ValidationError> {
    match value {
        None | Some(Value::Null) => Err(ValidationError::MissingField(field)),
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(ValidationError::TypeMismatch { field, expected }),
    }
}

fn resolve<T>(
    registry: &CallbackRegistry,
    slot: &'static str,
    name: &str,
    extract: fn(&RegisteredCallback) -> Option<T>,
) -> Result<T, ValidationError> {
    let callback = registry
        .get(name)
        .map_err(|err| ValidationError::InvalidCallback {
            slot,
            reason: err.to_string(),
        })?;

    extract(callback).ok_or_else(|| ValidationError::InvalidCallback {
        slot,
        reason: format!("'{}' is a {} callback", name, callback.kind()),
    })
}

fn resolve_optional<T>(
    registry: &CallbackRegistry,
    slot: &'static str,
    value: Option<Value>,
    extract: fn(&RegisteredCallback) -> Option<T>,
) -> Result<Option<T>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(name)) => resolve(registry, slot, &name, extract).map(Some),
        Some(other) => Err(ValidationError::InvalidCallback {
            slot,
            reason: format!("expected a callback name, got {}", other),
        }),
    }
}
