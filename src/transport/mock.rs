//! Recording transport for tests and dry runs

use bytes::Bytes;
use tracing::{debug, info};

use super::{Result, Transport, TransportError};
use crate::lifecycle::{EventSink, FailureKind, TransportEvent};
use crate::request::{Credentials, Method};

/// Arguments the transport was opened with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedRequest {
    pub method: Method,
    pub url: String,
    pub credentials: Option<Credentials>,
}

/// Records everything handed to it and lets the caller drive events.
///
/// Nothing happens on `send` until the test emits events itself, either one
/// at a time with [`MockTransport::emit`] or with the `complete`/`fail`
/// shortcuts.
#[derive(Default)]
pub struct MockTransport {
    opened: Option<OpenedRequest>,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    sent: bool,
    aborted: bool,
    events: Option<EventSink>,
    rejected_header: Option<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose `set_header` fails for `name`
    pub fn rejecting_header(name: impl Into<String>) -> Self {
        Self {
            rejected_header: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn opened(&self) -> Option<&OpenedRequest> {
        self.opened.as_ref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn was_sent(&self) -> bool {
        self.sent
    }

    pub fn was_aborted(&self) -> bool {
        self.aborted
    }

    /// Route one event; false when nothing has been sent yet
    pub fn emit(&mut self, event: TransportEvent) -> bool {
        match self.events.as_mut() {
            Some(events) => {
                events.emit(event);
                true
            }
            None => false,
        }
    }

    /// Start, load with `status` and `body`, then finish
    pub fn complete(&mut self, status: u16, body: impl Into<Bytes>) -> bool {
        self.emit(TransportEvent::Start)
            && self.emit(TransportEvent::Load {
                status,
                body: body.into(),
            })
            && self.emit(TransportEvent::LoadEnd)
    }

    /// Start, fail with `kind`, then finish
    pub fn fail(&mut self, kind: FailureKind) -> bool {
        self.emit(TransportEvent::Start)
            && self.emit(TransportEvent::Error(kind))
            && self.emit(TransportEvent::LoadEnd)
    }
}

impl Transport for MockTransport {
    fn open(&mut self, method: Method, url: &str, credentials: Option<&Credentials>) -> Result<()> {
        if self.sent {
            return Err(TransportError::AlreadySent);
        }
        debug!(%method, url, "Mock open");
        self.opened = Some(OpenedRequest {
            method,
            url: url.to_string(),
            credentials: credentials.cloned(),
        });
        Ok(())
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        if self.opened.is_none() {
            return Err(TransportError::NotOpened);
        }
        if self.sent {
            return Err(TransportError::AlreadySent);
        }
        if let Some(rejected) = &self.rejected_header {
            if rejected.eq_ignore_ascii_case(name) {
                return Err(TransportError::InvalidHeader {
                    name: name.to_string(),
                    reason: "rejected by mock transport".to_string(),
                });
            }
        }
        self.headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn send(&mut self, body: Option<Bytes>, events: EventSink) -> Result<()> {
        if self.opened.is_none() {
            return Err(TransportError::NotOpened);
        }
        if self.sent {
            return Err(TransportError::AlreadySent);
        }
        info!(
            request_id = %events.request_id(),
            size = body.as_ref().map_or(0, Bytes::len),
            "Mock send"
        );
        self.body = body;
        self.events = Some(events);
        self.sent = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
        let Some(events) = self.events.as_mut() else {
            return;
        };
        if events.is_finished() {
            debug!("Abort after completion ignored");
            return;
        }
        events.emit(TransportEvent::Abort);
        events.emit(TransportEvent::LoadEnd);
    }
}
