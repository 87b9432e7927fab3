use bytes::Bytes;
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

use super::encode::EncodedBody;
use super::negotiate::CONTENT_TYPE;
use super::types::{Credentials, EncodingStrategy, Header, Method};
use super::validation::ValidatedOptions;
use crate::lifecycle::RequestInfo;

pub const NOSNIFF_HEADER: &str = "X-Content-Type-Options";
pub const NOSNIFF_VALUE: &str = "nosniff";

const INSECURE_SCHEME: &str = "http://";
const SECURE_SCHEME: &str = "https://";

/// Non-fatal observations made while assembling a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// Both `data` and a form were supplied; `data` was sent
    AmbiguousBody,
    /// The method carries no body, so the payload was dropped
    BodyDiscarded { method: Method },
    /// `force_insecure` kept a plain-http URL
    InsecureTransport { url: String },
    /// A header that may not be overridden was skipped
    IgnoredHeader { name: String },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::AmbiguousBody => f.write_str("data and form supplied, data selected"),
            Advisory::BodyDiscarded { method } => {
                write!(f, "{} requests carry no body, payload dropped", method)
            }
            Advisory::InsecureTransport { url } => write!(f, "insecure connection to {}", url),
            Advisory::IgnoredHeader { name } => write!(f, "header '{}' cannot be overridden", name),
        }
    }
}

/// Transport-ready request: final URL, header set and payload
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub request_id: Uuid,
    pub method: Method,
    pub url: String,
    pub credentials: Option<Credentials>,
    pub headers: Vec<Header>,
    pub body: Option<Bytes>,
    pub strategy: EncodingStrategy,
    pub advisories: Vec<Advisory>,
}

impl RequestDescriptor {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.is_named(name))
            .map(|header| header.value.as_str())
    }

    pub fn info(&self) -> RequestInfo {
        RequestInfo {
            request_id: self.request_id,
            method: self.method,
            url: self.url.clone(),
        }
    }
}

/// Composes validated options, negotiated content type and encoded body
#[derive(Debug, Clone, Default)]
pub struct RequestAssembler {
    default_headers: Vec<Header>,
}

impl RequestAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers installed beneath every caller header set
    pub fn with_default_headers(headers: impl IntoIterator<Item = Header>) -> Self {
        Self {
            default_headers: headers.into_iter().collect(),
        }
    }

    pub fn assemble(
        &self,
        options: &ValidatedOptions,
        strategy: EncodingStrategy,
        encoded: Option<EncodedBody>,
    ) -> RequestDescriptor {
        let request_id = Uuid::new_v4();
        let mut advisories = Vec::new();

        let url = upgrade_scheme(&options.url, options.force_insecure);
        if has_prefix_ignore_case(&url, INSECURE_SCHEME) {
            warn!(%request_id, %url, "Insecure connection");
            advisories.push(Advisory::InsecureTransport { url: url.clone() });
        }

        let mut headers = HeaderSet::default();
        headers.set(Header::new(NOSNIFF_HEADER, NOSNIFF_VALUE));
        for header in self.default_headers.iter().chain(&options.headers) {
            if header.is_named(NOSNIFF_HEADER) {
                advisories.push(Advisory::IgnoredHeader {
                    name: header.name.clone(),
                });
                continue;
            }
            headers.set(header.clone());
        }

        let (body, encoded_content_type) = match (encoded, &options.data) {
            (Some(_), Some(data)) => {
                info!(%request_id, "Data and form supplied, selecting data");
                advisories.push(Advisory::AmbiguousBody);
                (Some(data.clone()), None)
            }
            (Some(encoded), None) => (Some(Bytes::from(encoded.body)), Some(encoded.content_type)),
            (None, Some(data)) => (Some(data.clone()), None),
            (None, None) => (None, None),
        };

        let body = match body {
            Some(_) if options.method == Method::Get => {
                info!(%request_id, "GET request carries no body, payload dropped");
                advisories.push(Advisory::BodyDiscarded {
                    method: options.method,
                });
                None
            }
            body => body,
        };

        let content_type = options
            .consumes
            .clone()
            .or(encoded_content_type.filter(|_| body.is_some()));
        if let Some(content_type) = content_type {
            headers.set(Header::new(CONTENT_TYPE, content_type));
        }

        RequestDescriptor {
            request_id,
            method: options.method,
            url,
            credentials: options.credentials.clone(),
            headers: headers.into_vec(),
            body,
            strategy,
            advisories,
        }
    }
}

/// Rewrite a leading `http://` to `https://` unless insecure is forced
pub fn upgrade_scheme(url: &str, force_insecure: bool) -> String {
    if !force_insecure && has_prefix_ignore_case(url, INSECURE_SCHEME) {
        format!("{}{}", SECURE_SCHEME, &url[INSECURE_SCHEME.len()..])
    } else {
        url.to_string()
    }
}

fn has_prefix_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Ordered header list; setting an existing name replaces it in place
#[derive(Default)]
struct HeaderSet(Vec<Header>);

impl HeaderSet {
    fn set(&mut self, header: Header) {
        match self.0.iter_mut().find(|existing| existing.is_named(&header.name)) {
            Some(existing) => *existing = header,
            None => self.0.push(header),
        }
    }

    fn into_vec(self) -> Vec<Header> {
        self.0
    }
}
