use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::lifecycle::{Callbacks, Completion, Failure, Progress, RequestInfo, Response};

/// HTTP methods the dispatcher accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
}

impl Method {
    pub const ALL: [Method; 6] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Head,
        Method::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }

    /// Uppercase the raw method and strip every whitespace character.
    ///
    /// `" get "`, `"g e t"` and `"GET"` all normalize to `"GET"`.
    pub fn normalize(raw: &str) -> String {
        raw.chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_uppercase)
            .collect()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    /// The normalized form of the rejected input
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = Self::normalize(raw);
        Method::ALL
            .into_iter()
            .find(|method| method.as_str() == normalized)
            .ok_or(normalized)
    }
}

/// A single request header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Case-insensitive name comparison
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Basic-auth credentials handed to the transport on `open`
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One named input of a structured form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl FormField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Only fields with a non-empty name and value reach an encoded body
    pub fn is_encodable(&self) -> bool {
        !self.name.is_empty() && !self.value.is_empty()
    }
}

/// Structured input source: ordered fields plus the raw markup they came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormInput {
    #[serde(default)]
    pub fields: Vec<FormField>,
    #[serde(default)]
    pub markup: String,
}

impl FormInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(FormField::new(name, value));
        self
    }

    pub fn markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = markup.into();
        self
    }

    pub fn encodable_fields(&self) -> impl Iterator<Item = &FormField> {
        self.fields.iter().filter(|field| field.is_encodable())
    }
}

/// Body encoding selected for a form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingStrategy {
    Plain,
    Html,
    Json,
    #[serde(alias = "x-www-form-urlencoded")]
    UrlEncoded,
    Multipart,
    Binary,
    Base64,
}

impl EncodingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingStrategy::Plain => "plain",
            EncodingStrategy::Html => "html",
            EncodingStrategy::Json => "json",
            EncodingStrategy::UrlEncoded => "urlencoded",
            EncodingStrategy::Multipart => "multipart",
            EncodingStrategy::Binary => "binary",
            EncodingStrategy::Base64 => "base64",
        }
    }

    /// Multipart, binary and base64 have no body model yet
    pub fn is_supported(&self) -> bool {
        self.canonical_mime().is_some()
    }

    /// Content type installed when the caller declared none
    pub fn canonical_mime(&self) -> Option<mime::Mime> {
        match self {
            EncodingStrategy::Plain => Some(mime::TEXT_PLAIN_UTF_8),
            EncodingStrategy::Html => Some(mime::TEXT_HTML_UTF_8),
            EncodingStrategy::Json => Some(mime::APPLICATION_JSON),
            EncodingStrategy::UrlEncoded => Some(mime::APPLICATION_WWW_FORM_URLENCODED),
            EncodingStrategy::Multipart | EncodingStrategy::Binary | EncodingStrategy::Base64 => {
                None
            }
        }
    }
}

impl fmt::Display for EncodingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncodingStrategy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(EncodingStrategy::Plain),
            "html" => Ok(EncodingStrategy::Html),
            "json" => Ok(EncodingStrategy::Json),
            "urlencoded" | "x-www-form-urlencoded" => Ok(EncodingStrategy::UrlEncoded),
            "multipart" => Ok(EncodingStrategy::Multipart),
            "binary" => Ok(EncodingStrategy::Binary),
            "base64" => Ok(EncodingStrategy::Base64),
            other => Err(format!("unknown encoding strategy: {}", other)),
        }
    }
}

/// Caller description of a single HTTP call.
///
/// Built with the chained setters below and consumed once by validation.
/// `method`, `url` and `on_success` are required; everything else is optional.
///
/// ```rust
/// use dispatchbox::request::{FormInput, RequestOptions};
///
/// let options = RequestOptions::new()
///     .method("post")
///     .url("https://api.example.com/users")
///     .header("Content-Type", "application/json")
///     .form(FormInput::new().field("name", "ada"))
///     .on_success(|response| println!("{:?}", response.body));
/// ```
#[derive(Debug, Default)]
pub struct RequestOptions {
    pub method: Option<String>,
    pub url: Option<String>,
    pub callbacks: Callbacks,
    pub headers: Option<Vec<Header>>,
    pub credentials: Option<Credentials>,
    pub data: Option<Bytes>,
    pub form: Option<FormInput>,
    pub force_insecure: bool,
    pub consumes: Option<String>,
    /// Explicit strategy; the only way to select binary or base64
    pub encoding: Option<EncodingStrategy>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Vec::new)
            .push(Header::new(name, value));
        self
    }

    pub fn headers(mut self, headers: impl IntoIterator<Item = Header>) -> Self {
        self.headers
            .get_or_insert_with(Vec::new)
            .extend(headers);
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn form(mut self, form: FormInput) -> Self {
        self.form = Some(form);
        self
    }

    pub fn force_insecure(mut self, force_insecure: bool) -> Self {
        self.force_insecure = force_insecure;
        self
    }

    pub fn consumes(mut self, content_type: impl Into<String>) -> Self {
        self.consumes = Some(content_type.into());
        self
    }

    pub fn encoding(mut self, strategy: EncodingStrategy) -> Self {
        self.encoding = Some(strategy);
        self
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(Response) + Send + Sync + 'static,
    {
        self.callbacks.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_failure<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Failure) + Send + Sync + 'static,
    {
        self.callbacks.on_failure = Some(Arc::new(callback));
        self
    }

    pub fn on_abort<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Failure) + Send + Sync + 'static,
    {
        self.callbacks.on_abort = Some(Arc::new(callback));
        self
    }

    pub fn on_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RequestInfo) + Send + Sync + 'static,
    {
        self.callbacks.on_start = Some(Arc::new(callback));
        self
    }

    pub fn on_loading<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        self.callbacks.on_loading = Some(Arc::new(callback));
        self
    }

    pub fn on_finished<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Completion) + Send + Sync + 'static,
    {
        self.callbacks.on_finished = Some(Arc::new(callback));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_normalization() {
        assert_eq!(Method::normalize(" get "), "GET");
        assert_eq!(Method::normalize("p\tost\n"), "POST");
        assert_eq!(Method::normalize("De Lete"), "DELETE");
    }

    #[test]
    fn test_method_normalization_is_idempotent() {
        for raw in [" get ", "Options", "h e a d", "PATCH"] {
            let once = Method::normalize(raw);
            assert_eq!(Method::normalize(&once), once);
        }
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!(" get ".parse::<Method>(), Ok(Method::Get));
        assert_eq!("GET".parse::<Method>(), Ok(Method::Get));
        assert_eq!("options".parse::<Method>(), Ok(Method::Options));
        assert_eq!("patch".parse::<Method>(), Err("PATCH".to_string()));
        assert_eq!("".parse::<Method>(), Err(String::new()));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("ada", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("ada"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_form_field_encodable() {
        assert!(FormField::new("a", "1").is_encodable());
        assert!(!FormField::new("", "1").is_encodable());
        assert!(!FormField::new("a", "").is_encodable());
    }

    #[test]
    fn test_encoding_strategy_support() {
        assert!(EncodingStrategy::Json.is_supported());
        assert!(EncodingStrategy::Html.is_supported());
        assert!(!EncodingStrategy::Multipart.is_supported());
        assert!(!EncodingStrategy::Binary.is_supported());
        assert!(!EncodingStrategy::Base64.is_supported());
        assert_eq!(
            EncodingStrategy::UrlEncoded.canonical_mime().map(|m| m.to_string()),
            Some("application/x-www-form-urlencoded".to_string())
        );
    }

    #[test]
    fn test_encoding_strategy_from_str() {
        assert_eq!("JSON".parse(), Ok(EncodingStrategy::Json));
        assert_eq!(
            "x-www-form-urlencoded".parse(),
            Ok(EncodingStrategy::UrlEncoded)
        );
        assert!("gzip".parse::<EncodingStrategy>().is_err());
    }

    #[test]
    fn test_request_options_builder() {
        let options = RequestOptions::new()
            .method("post")
            .url("https://example.com")
            .header("Accept", "application/json")
            .header("X-Trace", "1")
            .credentials("ada", "secret")
            .data("raw")
            .on_success(|_| {});

        assert_eq!(options.method.as_deref(), Some("post"));
        assert_eq!(options.headers.as_ref().map(Vec::len), Some(2));
        assert_eq!(options.data, Some(Bytes::from_static(b"raw")));
        assert!(options.callbacks.on_success.is_some());
        assert!(options.callbacks.on_failure.is_none());
        assert!(!options.force_insecure);
    }
}
