//! Dispatch orchestration
//!
//! [`Dispatcher::prepare`] runs the synchronous pipeline and fails fast;
//! [`Dispatcher::send`] hands the result to a [`Transport`] and binds the
//! lifecycle router. Construction errors are returned, everything after the
//! hand-off arrives through callbacks.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::lifecycle::{BoundCallbacks, EventSink, LifecycleRouter, Outcome};
use crate::observability::Metrics;
use crate::request::{
    Advisory, EncodingError, RequestAssembler, RequestDescriptor, RequestOptions, ValidationError,
    declared_content_type, encode, select_strategy, validate,
};
use crate::transport::{Transport, TransportError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid request options: {0}")]
    Validation(#[from] ValidationError),

    #[error("body encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    #[error("transport rejected request: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;

/// A validated, encoded and assembled request waiting for a transport
#[derive(Debug)]
pub struct PreparedRequest {
    descriptor: RequestDescriptor,
    callbacks: BoundCallbacks,
}

impl PreparedRequest {
    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    pub fn advisories(&self) -> &[Advisory] {
        &self.descriptor.advisories
    }
}

/// Handle to a request that has been handed to its transport
pub struct Dispatched<T> {
    transport: T,
    descriptor: RequestDescriptor,
    completion: Option<oneshot::Receiver<Outcome>>,
}

impl<T: Transport> Dispatched<T> {
    pub fn request_id(&self) -> Uuid {
        self.descriptor.request_id
    }

    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    pub fn advisories(&self) -> &[Advisory] {
        &self.descriptor.advisories
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Cancel the request; routed as `on_abort`, or `on_failure` without one
    pub fn abort(&mut self) {
        info!(request_id = %self.descriptor.request_id, "Aborting request");
        self.transport.abort();
    }

    /// Detach the completion receiver, e.g. to await it alongside `abort`
    pub fn take_completion(&mut self) -> Option<oneshot::Receiver<Outcome>> {
        self.completion.take()
    }

    /// Wait for the final outcome, resolved after `on_finished` has run.
    ///
    /// `None` when the receiver was taken or the transport dropped the
    /// request without finishing it.
    pub async fn completion(&mut self) -> Option<Outcome> {
        self.completion.take()?.await.ok()
    }

    /// Non-blocking check for the final outcome
    pub fn try_outcome(&mut self) -> Option<Outcome> {
        let outcome = self.completion.as_mut()?.try_recv().ok()?;
        self.completion = None;
        Some(outcome)
    }
}

/// Runs validate → negotiate → encode → assemble and hands off to a transport
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    assembler: RequestAssembler,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher applying the configured default headers
    pub fn from_config(config: &Config) -> Self {
        Self {
            assembler: RequestAssembler::with_default_headers(config.defaults.headers()),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Build the transport-ready request without sending it
    pub fn prepare(&self, options: RequestOptions) -> Result<PreparedRequest> {
        self.build(options).inspect_err(|err| {
            warn!(error = %err, "Request rejected");
            self.metrics.request_rejected();
        })
    }

    fn build(&self, options: RequestOptions) -> Result<PreparedRequest> {
        let validated = validate(options)?;
        let strategy = select_strategy(&validated);

        // An explicit unsupported encoding fails whatever the body source
        if let Some(explicit) = validated.encoding {
            if !explicit.is_supported() {
                return Err(EncodingError::UnsupportedEncoding(explicit).into());
            }
        }

        let encoded = match &validated.form {
            Some(form) => {
                let declared =
                    declared_content_type(&validated.headers, validated.consumes.as_deref());
                Some(encode(strategy, form, declared)?)
            }
            None => None,
        };

        let descriptor = self.assembler.assemble(&validated, strategy, encoded);
        for advisory in &descriptor.advisories {
            info!(request_id = %descriptor.request_id, %advisory, "Request advisory");
            self.metrics.advisory_emitted();
        }

        Ok(PreparedRequest {
            descriptor,
            callbacks: validated.callbacks,
        })
    }

    /// Hand a prepared request to `transport`
    pub fn send<T: Transport>(
        &self,
        prepared: PreparedRequest,
        mut transport: T,
    ) -> Result<Dispatched<T>> {
        let PreparedRequest {
            descriptor,
            callbacks,
        } = prepared;

        let span = info_span!(
            "dispatch",
            request_id = %descriptor.request_id,
            method = %descriptor.method,
            url = %descriptor.url,
        );
        let _guard = span.enter();

        transport.open(
            descriptor.method,
            &descriptor.url,
            descriptor.credentials.as_ref(),
        )?;
        for header in &descriptor.headers {
            transport.set_header(&header.name, &header.value)?;
        }

        let mut router =
            LifecycleRouter::bind(descriptor.info(), callbacks).with_metrics(self.metrics.clone());
        let completion = router.subscribe();

        transport.send(descriptor.body.clone(), EventSink::new(router))?;
        self.metrics.request_dispatched();
        info!(strategy = %descriptor.strategy, "Request dispatched");

        Ok(Dispatched {
            transport,
            descriptor,
            completion: Some(completion),
        })
    }

    /// Prepare and send in one step
    pub fn dispatch<T: Transport>(
        &self,
        options: RequestOptions,
        transport: T,
    ) -> Result<Dispatched<T>> {
        let prepared = self.prepare(options)?;
        self.send(prepared, transport)
    }
}

/// Dispatch with a default [`Dispatcher`]
pub fn dispatch<T: Transport>(options: RequestOptions, transport: T) -> Result<Dispatched<T>> {
    Dispatcher::new().dispatch(options, transport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{EncodingStrategy, FormInput, NOSNIFF_HEADER};
    use crate::transport::MockTransport;

    fn options() -> RequestOptions {
        RequestOptions::new()
            .method("post")
            .url("http://api.test/items")
            .on_success(|_| {})
    }

    #[test]
    fn test_prepare_runs_pipeline() {
        let dispatcher = Dispatcher::new();
        let prepared = dispatcher
            .prepare(
                options()
                    .header("Content-Type", "application/json")
                    .form(FormInput::new().field("a", "1")),
            )
            .unwrap();

        let descriptor = prepared.descriptor();
        assert_eq!(descriptor.url, "https://api.test/items");
        assert_eq!(descriptor.strategy, EncodingStrategy::Json);
        assert_eq!(descriptor.body.as_deref(), Some(&br#"{"a":"1"}"#[..]));
        assert!(prepared.advisories().is_empty());
    }

    #[test]
    fn test_prepare_counts_rejections() {
        let dispatcher = Dispatcher::new();
        let err = dispatcher
            .prepare(options().encoding(EncodingStrategy::Base64).form(FormInput::new()))
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Encoding(EncodingError::UnsupportedEncoding(EncodingStrategy::Base64))
        ));

        let err = dispatcher.prepare(RequestOptions::new()).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Validation(ValidationError::MissingField("on_success"))
        ));

        assert_eq!(dispatcher.metrics().snapshot().requests_rejected, 2);
    }

    #[test]
    fn test_send_writes_headers_in_order() {
        let dispatcher = Dispatcher::new();
        let dispatched = dispatcher
            .dispatch(options().header("X-Trace", "7"), MockTransport::new())
            .unwrap();

        let names: Vec<&str> = dispatched
            .transport()
            .headers()
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(names, vec![NOSNIFF_HEADER, "X-Trace"]);
        assert_eq!(dispatcher.metrics().snapshot().requests_dispatched, 1);
    }

    #[test]
    fn test_try_outcome() {
        let mut dispatched = dispatch(options(), MockTransport::new()).unwrap();
        assert_eq!(dispatched.try_outcome(), None);

        dispatched.transport_mut().complete(200, "ok");
        assert_eq!(
            dispatched.try_outcome(),
            Some(Outcome::Succeeded { status: 200 })
        );
        assert_eq!(dispatched.try_outcome(), None);
    }
}
