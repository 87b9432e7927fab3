use super::models::Config;
use std::collections::HashSet;
use thiserror::Error;

const MAX_REDIRECTS_LIMIT: usize = 50;
const PROXY_SCHEMES: [&str; 4] = ["http://", "https://", "socks5://", "socks5h://"];

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("user_agent must not be empty")]
    EmptyUserAgent,

    #[error("timeout must be positive: {field} = 0")]
    ZeroTimeout { field: &'static str },

    #[error("request_timeout_ms ({request}) is shorter than connect_timeout_ms ({connect})")]
    RequestTimeoutTooShort { request: u64, connect: u64 },

    #[error("max_redirects ({actual}) exceeds limit of {limit}")]
    TooManyRedirects { actual: usize, limit: usize },

    #[error("invalid proxy scheme in '{proxy}', expected http, https, socks5 or socks5h")]
    InvalidProxyScheme { proxy: String },

    #[error("default header '{name}' must have a non-empty name and value")]
    InvalidDefaultHeader { name: String },

    #[error("default header '{name}' configured more than once")]
    DuplicateDefaultHeader { name: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_transport(config)?;
    validate_proxy(config)?;
    validate_default_headers(config)?;
    Ok(())
}

fn validate_transport(config: &Config) -> Result<(), ValidationError> {
    let transport = &config.transport;

    if transport.user_agent.trim().is_empty() {
        return Err(ValidationError::EmptyUserAgent);
    }

    if transport.connect_timeout_ms == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "connect_timeout_ms",
        });
    }

    if transport.request_timeout_ms == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "request_timeout_ms",
        });
    }

    if transport.request_timeout_ms < transport.connect_timeout_ms {
        return Err(ValidationError::RequestTimeoutTooShort {
            request: transport.request_timeout_ms,
            connect: transport.connect_timeout_ms,
        });
    }

    if transport.max_redirects > MAX_REDIRECTS_LIMIT {
        return Err(ValidationError::TooManyRedirects {
            actual: transport.max_redirects,
            limit: MAX_REDIRECTS_LIMIT,
        });
    }

    Ok(())
}

fn validate_proxy(config: &Config) -> Result<(), ValidationError> {
    let Some(proxy) = &config.transport.proxy else {
        return Ok(());
    };

    let lowered = proxy.to_ascii_lowercase();
    if !PROXY_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) {
        return Err(ValidationError::InvalidProxyScheme {
            proxy: proxy.clone(),
        });
    }

    Ok(())
}

/// Names are compared case-insensitively, as on the wire
fn validate_default_headers(config: &Config) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for (name, value) in &config.defaults.default_headers {
        if name.trim().is_empty() || value.trim().is_empty() {
            return Err(ValidationError::InvalidDefaultHeader { name: name.clone() });
        }

        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(ValidationError::DuplicateDefaultHeader { name: name.clone() });
        }
    }

    Ok(())
}
