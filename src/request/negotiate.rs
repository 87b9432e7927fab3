//! Content negotiation: picks the body encoding from the effective content type
//!
//! Pure, stateless helpers. `consumes` always beats a `Content-Type` header, and
//! an explicit strategy beats both. Binary and base64 are never inferred.

use tracing::debug;

use super::types::{EncodingStrategy, Header};
use super::validation::ValidatedOptions;

pub const CONTENT_TYPE: &str = "Content-Type";

/// Classification tokens in precedence order
const TOKENS: [(&str, EncodingStrategy); 5] = [
    ("json", EncodingStrategy::Json),
    ("x-www-form-urlencoded", EncodingStrategy::UrlEncoded),
    ("html", EncodingStrategy::Html),
    ("multipart", EncodingStrategy::Multipart),
    ("plain", EncodingStrategy::Plain),
];

/// Select the encoding strategy for a header set and optional override
pub fn negotiate(headers: &[Header], consumes: Option<&str>) -> EncodingStrategy {
    declared_content_type(headers, consumes)
        .map(classify)
        .unwrap_or(EncodingStrategy::Plain)
}

/// Strategy for validated options; an explicit `encoding` wins outright
pub fn select_strategy(options: &ValidatedOptions) -> EncodingStrategy {
    options
        .encoding
        .unwrap_or_else(|| negotiate(&options.headers, options.consumes.as_deref()))
}

/// The content type the caller declared: `consumes` first, then the header
pub fn declared_content_type<'a>(
    headers: &'a [Header],
    consumes: Option<&'a str>,
) -> Option<&'a str> {
    consumes.or_else(|| {
        headers
            .iter()
            .find(|header| header.is_named(CONTENT_TYPE))
            .map(|header| header.value.as_str())
    })
}

/// Case-insensitive substring classification; unknown values fall back to plain
pub fn classify(content_type: &str) -> EncodingStrategy {
    if content_type.parse::<mime::Mime>().is_err() {
        debug!(content_type, "Declared content type is not a valid media type");
    }

    TOKENS
        .iter()
        .find(|(token, _)| contains_ignore_case(content_type, token))
        .map(|(_, strategy)| *strategy)
        .unwrap_or(EncodingStrategy::Plain)
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_tokens() {
        assert_eq!(classify("application/json"), EncodingStrategy::Json);
        assert_eq!(
            classify("application/json; charset=utf-8"),
            EncodingStrategy::Json
        );
        assert_eq!(
            classify("application/x-www-form-urlencoded"),
            EncodingStrategy::UrlEncoded
        );
        assert_eq!(classify("TEXT/HTML"), EncodingStrategy::Html);
        assert_eq!(
            classify("multipart/form-data; boundary=x"),
            EncodingStrategy::Multipart
        );
        assert_eq!(classify("text/plain"), EncodingStrategy::Plain);
    }

    #[test]
    fn test_classify_precedence() {
        // json outranks html when both tokens appear
        assert_eq!(classify("text/html+json"), EncodingStrategy::Json);
        assert_eq!(
            classify("application/x-www-form-urlencoded+html"),
            EncodingStrategy::UrlEncoded
        );
    }

    #[test]
    fn test_classify_never_infers_binary() {
        assert_eq!(classify("application/octet-stream"), EncodingStrategy::Plain);
        assert_eq!(classify("application/base64"), EncodingStrategy::Plain);
        assert_eq!(classify("garbage"), EncodingStrategy::Plain);
    }

    #[test]
    fn test_negotiate_defaults_to_plain() {
        assert_eq!(negotiate(&[], None), EncodingStrategy::Plain);
        let headers = vec![Header::new("Accept", "application/json")];
        assert_eq!(negotiate(&headers, None), EncodingStrategy::Plain);
    }

    #[test]
    fn test_negotiate_reads_content_type_header() {
        let headers = vec![Header::new("content-type", "application/json")];
        assert_eq!(negotiate(&headers, None), EncodingStrategy::Json);
    }

    #[test]
    fn test_consumes_overrides_header() {
        let headers = vec![Header::new("Content-Type", "application/json")];
        assert_eq!(
            negotiate(&headers, Some("text/html")),
            EncodingStrategy::Html
        );
        assert_eq!(
            declared_content_type(&headers, Some("text/html")),
            Some("text/html")
        );
        assert_eq!(
            declared_content_type(&headers, None),
            Some("application/json")
        );
    }
}
