use bytes::Bytes;
use std::collections::HashSet;
use thiserror::Error;

use super::types::{Credentials, EncodingStrategy, FormInput, Header, Method, RequestOptions};
use crate::lifecycle::BoundCallbacks;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' must be {expected}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
    },
    #[error("http method '{0}' is not allowed")]
    UnsupportedMethod(String),
    #[error("credentials require a non-empty username and password")]
    InvalidCredentials,
    #[error("header #{index} must have a non-empty name and value")]
    InvalidHeader { index: usize },
    #[error("header '{0}' supplied more than once")]
    DuplicateHeader(String),
    #[error("callback '{slot}' is not callable: {reason}")]
    InvalidCallback { slot: &'static str, reason: String },
}

/// Options that passed validation; immutable from here on
#[derive(Debug)]
pub struct ValidatedOptions {
    pub method: Method,
    pub url: String,
    pub headers: Vec<Header>,
    pub credentials: Option<Credentials>,
    pub data: Option<Bytes>,
    pub form: Option<FormInput>,
    pub force_insecure: bool,
    pub consumes: Option<String>,
    pub encoding: Option<EncodingStrategy>,
    pub callbacks: BoundCallbacks,
}

/// Check presence and well-formedness of request options.
///
/// Required fields are checked in order `on_success`, `url`, `method`.
/// Fails on the first problem found; nothing is partially applied.
pub fn validate(options: RequestOptions) -> Result<ValidatedOptions, ValidationError> {
    let RequestOptions {
        method,
        url,
        callbacks,
        headers,
        credentials,
        data,
        form,
        force_insecure,
        consumes,
        encoding,
    } = options;

    let callbacks = callbacks
        .into_bound()
        .ok_or(ValidationError::MissingField("on_success"))?;

    let url = url
        .filter(|url| !url.trim().is_empty())
        .ok_or(ValidationError::MissingField("url"))?;

    let method = method
        .ok_or(ValidationError::MissingField("method"))?
        .parse::<Method>()
        .map_err(ValidationError::UnsupportedMethod)?;

    if let Some(credentials) = &credentials {
        validate_credentials(credentials)?;
    }

    let headers = headers.unwrap_or_default();
    validate_headers(&headers)?;

    Ok(ValidatedOptions {
        method,
        url,
        headers,
        credentials,
        data,
        form,
        force_insecure,
        consumes: consumes.filter(|value| !value.trim().is_empty()),
        encoding,
        callbacks,
    })
}

fn validate_credentials(credentials: &Credentials) -> Result<(), ValidationError> {
    if credentials.username.is_empty() || credentials.password.is_empty() {
        return Err(ValidationError::InvalidCredentials);
    }
    Ok(())
}

fn validate_headers(headers: &[Header]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for (index, header) in headers.iter().enumerate() {
        if header.name.trim().is_empty() || header.value.trim().is_empty() {
            return Err(ValidationError::InvalidHeader { index });
        }

        if !seen.insert(header.name.to_ascii_lowercase()) {
            return Err(ValidationError::DuplicateHeader(header.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_options() -> RequestOptions {
        RequestOptions::new()
            .method("post")
            .url("https://example.com/api")
            .on_success(|_| {})
    }

    #[test]
    fn validate_accepts_minimal_options() {
        let validated = validate(sample_options()).unwrap();
        assert_eq!(validated.method, Method::Post);
        assert_eq!(validated.url, "https://example.com/api");
        assert!(validated.headers.is_empty());
        assert!(!validated.force_insecure);
    }

    #[test]
    fn validate_requires_on_success() {
        let options = RequestOptions::new().method("GET").url("https://example.com");
        let err = validate(options).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("on_success"));
    }

    #[test]
    fn validate_requires_url() {
        let options = RequestOptions::new().method("GET").on_success(|_| {});
        assert_eq!(
            validate(options).unwrap_err(),
            ValidationError::MissingField("url")
        );

        let options = RequestOptions::new().method("GET").url("  ").on_success(|_| {});
        assert_eq!(
            validate(options).unwrap_err(),
            ValidationError::MissingField("url")
        );
    }

    #[test]
    fn validate_requires_method() {
        let options = RequestOptions::new().url("https://example.com").on_success(|_| {});
        assert_eq!(
            validate(options).unwrap_err(),
            ValidationError::MissingField("method")
        );
    }

    #[test]
    fn validate_checks_required_fields_in_order() {
        let err = validate(RequestOptions::new()).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("on_success"));
    }

    #[test]
    fn validate_normalizes_method() {
        let options = sample_options().method(" g e t\t");
        assert_eq!(validate(options).unwrap().method, Method::Get);
    }

    #[test]
    fn validate_rejects_unknown_method() {
        let options = sample_options().method("patch");
        assert_eq!(
            validate(options).unwrap_err(),
            ValidationError::UnsupportedMethod("PATCH".to_string())
        );
    }

    #[test]
    fn validate_rejects_empty_credentials() {
        let options = sample_options().credentials("ada", "");
        assert_eq!(
            validate(options).unwrap_err(),
            ValidationError::InvalidCredentials
        );

        let options = sample_options().credentials("", "secret");
        assert_eq!(
            validate(options).unwrap_err(),
            ValidationError::InvalidCredentials
        );

        let options = sample_options().credentials("ada", "secret");
        assert!(validate(options).unwrap().credentials.is_some());
    }

    #[test]
    fn validate_rejects_incomplete_header() {
        let options = sample_options()
            .header("Accept", "text/plain")
            .header("X-Empty", "");
        assert_eq!(
            validate(options).unwrap_err(),
            ValidationError::InvalidHeader { index: 1 }
        );

        let options = sample_options().header("", "value");
        assert_eq!(
            validate(options).unwrap_err(),
            ValidationError::InvalidHeader { index: 0 }
        );
    }

    #[test]
    fn validate_rejects_blank_header_name_or_value() {
        for (name, value) in [("   ", "value"), ("X-A", "   ")] {
            let options = sample_options().header(name, value);
            assert_eq!(
                validate(options).unwrap_err(),
                ValidationError::InvalidHeader { index: 0 }
            );
        }
    }

    #[test]
    fn validate_rejects_duplicate_headers_case_insensitively() {
        let options = sample_options()
            .header("Content-Type", "application/json")
            .header("content-type", "text/plain");
        assert_eq!(
            validate(options).unwrap_err(),
            ValidationError::DuplicateHeader("content-type".to_string())
        );
    }

    #[test]
    fn validate_drops_blank_consumes() {
        let options = sample_options().consumes(" ");
        assert!(validate(options).unwrap().consumes.is_none());

        let options = sample_options().consumes("application/json");
        assert_eq!(
            validate(options).unwrap().consumes.as_deref(),
            Some("application/json")
        );
    }
}
