use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{EncodingStrategy, FormInput};

/// Everything `encodeURIComponent` escapes: all but `A-Z a-z 0-9 - _ . ! ~ * ' ( )`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("{0} encoding is not supported")]
    UnsupportedEncoding(EncodingStrategy),
}

/// Serialized form body and the content type it travels with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    pub body: String,
    pub content_type: String,
}

/// Encode a form for the selected strategy.
///
/// Fields missing a name or value are skipped. Only the strategy itself can
/// fail: multipart, binary and base64 have no body model.
///
/// `declared` is the caller's content type (`consumes` or header); when absent
/// the strategy's canonical media type is used.
pub fn encode(
    strategy: EncodingStrategy,
    form: &FormInput,
    declared: Option<&str>,
) -> Result<EncodedBody, EncodingError> {
    let body = match strategy {
        EncodingStrategy::Plain => encode_plain(form),
        EncodingStrategy::Json => encode_json(form),
        EncodingStrategy::UrlEncoded => encode_urlencoded(form),
        EncodingStrategy::Html => form.markup.clone(),
        EncodingStrategy::Multipart | EncodingStrategy::Binary | EncodingStrategy::Base64 => {
            return Err(EncodingError::UnsupportedEncoding(strategy));
        }
    };

    let content_type = match declared {
        Some(declared) => declared.to_owned(),
        None => strategy
            .canonical_mime()
            .map(|mime| mime.to_string())
            .unwrap_or_default(),
    };

    Ok(EncodedBody { body, content_type })
}

/// `name=value` pairs back to back, no delimiter
fn encode_plain(form: &FormInput) -> String {
    form.encodable_fields()
        .map(|field| format!("{}={}", field.name, field.value))
        .collect()
}

/// Object of name → value; last write wins, first position kept
fn encode_json(form: &FormInput) -> String {
    let mut object = Map::new();
    for field in form.encodable_fields() {
        object.insert(field.name.clone(), Value::String(field.value.clone()));
    }
    Value::Object(object).to_string()
}

/// `?a=1&b=2`; the leading `?` is part of the payload backends expect
fn encode_urlencoded(form: &FormInput) -> String {
    let pairs: Vec<String> = form
        .encodable_fields()
        .map(|field| {
            format!(
                "{}={}",
                utf8_percent_encode(&field.name, URI_COMPONENT),
                utf8_percent_encode(&field.value, URI_COMPONENT)
            )
        })
        .collect();

    if pairs.is_empty() {
        String::new()
    } else {
        format!("?{}", pairs.join("&"))
    }
}
