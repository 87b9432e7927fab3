//! reqwest-backed transport

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy, RequestBuilder, Url};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{Instrument, Span, debug, warn};

use super::{Result, Transport, TransportError};
use crate::config::TransportConfig;
use crate::lifecycle::{EventSink, FailureKind, Progress, TransportEvent};
use crate::request::{Credentials, Method};

struct PendingRequest {
    method: reqwest::Method,
    url: Url,
    credentials: Option<Credentials>,
    headers: HeaderMap,
}

/// Sends one request on the current tokio runtime.
///
/// `send` spawns the request and returns at once. The response is read in
/// chunks so each one can be reported as progress.
pub struct HttpTransport {
    client: Client,
    pending: Option<PendingRequest>,
    sent: bool,
    abort: Option<oneshot::Sender<()>>,
}

impl HttpTransport {
    /// Create a transport with its own client built from `config`
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects));

        if let Some(url) = &config.proxy {
            let proxy = Proxy::all(url)
                .map_err(|e| TransportError::Setup(format!("invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        Ok(Self::with_client(client))
    }

    /// Reuse an existing client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            pending: None,
            sent: false,
            abort: None,
        }
    }
}

impl Transport for HttpTransport {
    fn open(&mut self, method: Method, url: &str, credentials: Option<&Credentials>) -> Result<()> {
        if self.sent {
            return Err(TransportError::AlreadySent);
        }

        let url = Url::parse(url).map_err(|e| {
            debug!(url, error = %e, "Rejected url");
            TransportError::InvalidUrl(url.to_string())
        })?;

        self.pending = Some(PendingRequest {
            method: to_reqwest_method(method),
            url,
            credentials: credentials.cloned(),
            headers: HeaderMap::new(),
        });
        Ok(())
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let pending = match self.pending.as_mut() {
            Some(pending) => pending,
            None if self.sent => return Err(TransportError::AlreadySent),
            None => return Err(TransportError::NotOpened),
        };

        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| TransportError::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| TransportError::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        pending.headers.append(header_name, header_value);
        Ok(())
    }

    fn send(&mut self, body: Option<Bytes>, events: EventSink) -> Result<()> {
        let runtime = Handle::try_current().map_err(|e| TransportError::NoRuntime(e.to_string()))?;

        let pending = match self.pending.take() {
            Some(pending) => pending,
            None if self.sent => return Err(TransportError::AlreadySent),
            None => return Err(TransportError::NotOpened),
        };
        self.sent = true;

        let mut request = self
            .client
            .request(pending.method, pending.url)
            .headers(pending.headers);
        if let Some(credentials) = pending.credentials {
            request = request.basic_auth(credentials.username, Some(credentials.password));
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let (abort_tx, abort_rx) = oneshot::channel();
        self.abort = Some(abort_tx);

        runtime.spawn(run(request, abort_rx, events).instrument(Span::current()));
        Ok(())
    }

    fn abort(&mut self) {
        match self.abort.take() {
            Some(abort) => {
                // Err means the request already finished
                if abort.send(()).is_err() {
                    debug!("Abort after completion ignored");
                }
            }
            None => debug!("Abort before send ignored"),
        }
    }
}

async fn run(request: RequestBuilder, abort: oneshot::Receiver<()>, mut events: EventSink) {
    events.emit(TransportEvent::Start);

    let result = tokio::select! {
        result = perform(request, &mut events) => Some(result),
        Ok(()) = abort => None,
    };

    match result {
        Some(Ok((status, body))) => {
            debug!(status, size = body.len(), "Response received");
            events.emit(TransportEvent::Load { status, body });
        }
        Some(Err(kind)) => {
            warn!(error = %kind, "Request failed");
            events.emit(TransportEvent::Error(kind));
        }
        None => {
            debug!("Request aborted");
            events.emit(TransportEvent::Abort);
        }
    }

    events.emit(TransportEvent::LoadEnd);
}

async fn perform(
    request: RequestBuilder,
    events: &mut EventSink,
) -> std::result::Result<(u16, Bytes), FailureKind> {
    let mut response = request.send().await.map_err(classify)?;

    let status = response.status().as_u16();
    let total = response.content_length();
    let mut body = Vec::with_capacity(total.unwrap_or(0).min(1 << 20) as usize);

    while let Some(chunk) = response.chunk().await.map_err(classify)? {
        body.extend_from_slice(&chunk);
        events.emit(TransportEvent::Progress(Progress {
            loaded: body.len() as u64,
            total,
        }));
    }

    Ok((status, Bytes::from(body)))
}

fn classify(err: reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_redirect() {
        FailureKind::TooManyRedirects
    } else {
        FailureKind::Network(err.to_string())
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{BoundCallbacks, LifecycleRouter, RequestInfo, Response};
    use std::sync::Arc;
    use uuid::Uuid;

    fn transport() -> HttpTransport {
        HttpTransport::new(&TransportConfig::default()).unwrap()
    }

    fn sink() -> EventSink {
        let info = RequestInfo {
            request_id: Uuid::new_v4(),
            method: Method::Get,
            url: "http://127.0.0.1:9".to_string(),
        };
        EventSink::new(LifecycleRouter::bind(
            info,
            BoundCallbacks::new(Arc::new(|_: Response| {})),
        ))
    }

    #[test]
    fn test_method_mapping() {
        for method in Method::ALL {
            assert_eq!(to_reqwest_method(method).as_str(), method.as_str());
        }
    }

    #[test]
    fn test_open_rejects_invalid_url() {
        let mut transport = transport();
        let err = transport.open(Method::Get, "not a url", None).unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl(url) if url == "not a url"));
    }

    #[test]
    fn test_set_header_requires_open() {
        let mut transport = transport();
        let err = transport.set_header("Accept", "*/*").unwrap_err();
        assert!(matches!(err, TransportError::NotOpened));
    }

    #[test]
    fn test_set_header_rejects_invalid_name() {
        let mut transport = transport();
        transport.open(Method::Get, "https://example.com", None).unwrap();
        let err = transport.set_header("Bad Header", "x").unwrap_err();
        assert!(matches!(err, TransportError::InvalidHeader { name, .. } if name == "Bad Header"));
    }

    #[test]
    fn test_send_outside_runtime() {
        let mut transport = transport();
        transport.open(Method::Get, "https://example.com", None).unwrap();
        let err = transport.send(None, sink()).unwrap_err();
        assert!(matches!(err, TransportError::NoRuntime(_)));
    }

    #[tokio::test]
    async fn test_send_requires_open_and_is_single_use() {
        let mut transport = transport();
        let err = transport.send(None, sink()).unwrap_err();
        assert!(matches!(err, TransportError::NotOpened));

        transport.open(Method::Get, "http://127.0.0.1:9", None).unwrap();
        transport.send(None, sink()).unwrap();
        let err = transport.send(None, sink()).unwrap_err();
        assert!(matches!(err, TransportError::AlreadySent));
        transport.abort();
    }

    #[test]
    fn test_invalid_proxy_fails_setup() {
        let config = TransportConfig {
            proxy: Some("http://[invalid".to_string()),
            ..TransportConfig::default()
        };
        assert!(matches!(
            HttpTransport::new(&config),
            Err(TransportError::Setup(_))
        ));
    }

    #[test]
    fn test_abort_before_send_is_noop() {
        let mut transport = transport();
        transport.abort();
        assert!(transport.abort.is_none());
    }
}
