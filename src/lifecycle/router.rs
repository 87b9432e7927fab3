//! Routes transport lifecycle events to the caller's callbacks

use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use super::types::{
    BoundCallbacks, Completion, Failure, FailureKind, Outcome, Progress, RequestInfo, Response,
    ResponseBody,
};
use crate::observability::Metrics;

/// Events a transport emits while a request is in flight
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Start,
    Progress(Progress),
    Load { status: u16, body: Bytes },
    Error(FailureKind),
    Abort,
    LoadEnd,
}

impl TransportEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::Start => "start",
            TransportEvent::Progress(_) => "progress",
            TransportEvent::Load { .. } => "load",
            TransportEvent::Error(_) => "error",
            TransportEvent::Abort => "abort",
            TransportEvent::LoadEnd => "loadend",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Started,
    Settled,
    Finished,
}

/// Binds one request's callbacks to its transport events.
///
/// Success, failure and abort are mutually exclusive and fire at most once.
/// `on_finished` fires exactly once and always last.
pub struct LifecycleRouter {
    info: RequestInfo,
    callbacks: BoundCallbacks,
    phase: Phase,
    outcome: Option<Outcome>,
    metrics: Option<Arc<Metrics>>,
    completion: Option<oneshot::Sender<Outcome>>,
}

impl LifecycleRouter {
    pub fn bind(info: RequestInfo, callbacks: BoundCallbacks) -> Self {
        Self {
            info,
            callbacks,
            phase: Phase::Pending,
            outcome: None,
            metrics: None,
            completion: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Receiver resolved with the outcome once `on_finished` has run
    pub fn subscribe(&mut self) -> oneshot::Receiver<Outcome> {
        let (tx, rx) = oneshot::channel();
        self.completion = Some(tx);
        rx
    }

    pub fn info(&self) -> &RequestInfo {
        &self.info
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub fn route(&mut self, event: TransportEvent) {
        if self.phase == Phase::Finished {
            warn!(
                request_id = %self.info.request_id,
                event = event.name(),
                "Event after finish ignored"
            );
            return;
        }

        debug!(request_id = %self.info.request_id, event = event.name(), "Routing event");

        match event {
            TransportEvent::Start => self.start(),
            TransportEvent::Progress(progress) => self.progress(progress),
            TransportEvent::Load { status, body } => self.load(status, &body),
            TransportEvent::Error(kind) => self.settle(Outcome::Failed(kind)),
            TransportEvent::Abort => self.settle(Outcome::Aborted),
            TransportEvent::LoadEnd => self.finish(),
        }
    }

    fn start(&mut self) {
        if self.phase != Phase::Pending {
            debug!(request_id = %self.info.request_id, "Duplicate start ignored");
            return;
        }
        self.phase = Phase::Started;
        if let Some(on_start) = &self.callbacks.on_start {
            on_start(&self.info);
        }
    }

    fn progress(&mut self, progress: Progress) {
        if self.phase == Phase::Settled {
            return;
        }
        if let Some(on_loading) = &self.callbacks.on_loading {
            on_loading(&progress);
        }
    }

    fn load(&mut self, status: u16, body: &[u8]) {
        if self.phase == Phase::Settled {
            warn!(request_id = %self.info.request_id, "Load after outcome ignored");
            return;
        }
        self.phase = Phase::Settled;
        self.outcome = Some(Outcome::Succeeded { status });
        self.record_outcome();

        let response = Response {
            request_id: self.info.request_id,
            status,
            body: ResponseBody::from_bytes(body),
        };
        (self.callbacks.on_success)(response);
    }

    fn settle(&mut self, outcome: Outcome) {
        if self.phase == Phase::Settled {
            warn!(request_id = %self.info.request_id, %outcome, "Outcome after settle ignored");
            return;
        }
        self.phase = Phase::Settled;

        let (kind, callback) = match &outcome {
            Outcome::Aborted => (
                FailureKind::Aborted,
                self.callbacks
                    .on_abort
                    .as_ref()
                    .or(self.callbacks.on_failure.as_ref()),
            ),
            Outcome::Failed(kind) => (kind.clone(), self.callbacks.on_failure.as_ref()),
            Outcome::Succeeded { .. } => return,
        };

        self.outcome = Some(outcome);
        self.record_outcome();

        let failure = Failure {
            request_id: self.info.request_id,
            kind,
        };
        match callback {
            Some(callback) => callback(&failure),
            None => debug!(
                request_id = %self.info.request_id,
                failure = %failure.kind,
                "No failure callback bound"
            ),
        }
    }

    fn finish(&mut self) {
        if self.outcome.is_none() {
            self.settle(Outcome::Failed(FailureKind::Incomplete));
        }
        self.phase = Phase::Finished;

        let outcome = self
            .outcome
            .clone()
            .unwrap_or(Outcome::Failed(FailureKind::Incomplete));

        if let Some(on_finished) = &self.callbacks.on_finished {
            on_finished(&Completion {
                request_id: self.info.request_id,
                outcome: outcome.clone(),
            });
        }

        if let Some(tx) = self.completion.take() {
            let _ = tx.send(outcome);
        }
    }

    fn record_outcome(&self) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        match &self.outcome {
            Some(Outcome::Succeeded { .. }) => metrics.request_succeeded(),
            Some(Outcome::Failed(_)) => metrics.request_failed(),
            Some(Outcome::Aborted) => metrics.request_aborted(),
            None => {}
        }
    }
}

/// Owned handle a transport uses to report events for one request
pub struct EventSink {
    router: LifecycleRouter,
}

impl EventSink {
    pub fn new(router: LifecycleRouter) -> Self {
        Self { router }
    }

    pub fn emit(&mut self, event: TransportEvent) {
        self.router.route(event);
    }

    pub fn request_id(&self) -> Uuid {
        self.router.info().request_id
    }

    pub fn is_finished(&self) -> bool {
        self.router.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Method;
    use serde_json::json;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn info() -> RequestInfo {
        RequestInfo {
            request_id: Uuid::new_v4(),
            method: Method::Get,
            url: "https://example.com".to_string(),
        }
    }

    fn recording_callbacks(log: &Log, with_abort: bool) -> BoundCallbacks {
        let success_log = log.clone();
        let mut callbacks = BoundCallbacks::new(Arc::new(move |response: Response| {
            success_log
                .lock()
                .unwrap()
                .push(format!("success:{}:{}", response.status, response.body));
        }));

        let failure_log = log.clone();
        callbacks.on_failure = Some(Arc::new(move |failure: &Failure| {
            failure_log
                .lock()
                .unwrap()
                .push(format!("failure:{}", failure.kind));
        }));

        if with_abort {
            let abort_log = log.clone();
            callbacks.on_abort = Some(Arc::new(move |_: &Failure| {
                abort_log.lock().unwrap().push("abort".to_string());
            }));
        }

        let start_log = log.clone();
        callbacks.on_start = Some(Arc::new(move |_: &RequestInfo| {
            start_log.lock().unwrap().push("start".to_string());
        }));

        let progress_log = log.clone();
        callbacks.on_loading = Some(Arc::new(move |progress: &Progress| {
            progress_log
                .lock()
                .unwrap()
                .push(format!("loading:{}", progress.loaded));
        }));

        let finished_log = log.clone();
        callbacks.on_finished = Some(Arc::new(move |completion: &Completion| {
            finished_log
                .lock()
                .unwrap()
                .push(format!("finished:{}", completion.outcome));
        }));

        callbacks
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn test_success_then_finished() {
        let log = Log::default();
        let mut router = LifecycleRouter::bind(info(), recording_callbacks(&log, true));

        router.route(TransportEvent::Start);
        router.route(TransportEvent::Progress(Progress { loaded: 4, total: Some(11) }));
        router.route(TransportEvent::Load {
            status: 200,
            body: Bytes::from_static(br#"{"a":1}"#),
        });
        router.route(TransportEvent::LoadEnd);

        assert_eq!(
            entries(&log),
            vec![
                "start",
                "loading:4",
                r#"success:200:{"a":1}"#,
                "finished:succeeded with status 200",
            ]
        );
        assert!(router.is_finished());
    }

    #[test]
    fn test_success_receives_parsed_json() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let callbacks = BoundCallbacks::new(Arc::new(move |response: Response| {
            *sink.lock().unwrap() = Some(response.body);
        }));
        let mut router = LifecycleRouter::bind(info(), callbacks);

        router.route(TransportEvent::Load {
            status: 200,
            body: Bytes::from_static(br#"{"user":"ada"}"#),
        });

        assert_eq!(
            *seen.lock().unwrap(),
            Some(ResponseBody::Json(json!({"user": "ada"})))
        );
    }

    #[test]
    fn test_failure_excludes_success() {
        let log = Log::default();
        let mut router = LifecycleRouter::bind(info(), recording_callbacks(&log, true));

        router.route(TransportEvent::Start);
        router.route(TransportEvent::Error(FailureKind::Timeout));
        router.route(TransportEvent::Load {
            status: 200,
            body: Bytes::new(),
        });
        router.route(TransportEvent::LoadEnd);

        assert_eq!(
            entries(&log),
            vec![
                "start",
                "failure:request timed out",
                "finished:failed: request timed out",
            ]
        );
    }

    #[test]
    fn test_abort_prefers_abort_callback() {
        let log = Log::default();
        let mut router = LifecycleRouter::bind(info(), recording_callbacks(&log, true));

        router.route(TransportEvent::Abort);
        router.route(TransportEvent::LoadEnd);

        assert_eq!(entries(&log), vec!["abort", "finished:aborted"]);
    }

    #[test]
    fn test_abort_falls_back_to_failure() {
        let log = Log::default();
        let mut router = LifecycleRouter::bind(info(), recording_callbacks(&log, false));

        router.route(TransportEvent::Abort);
        router.route(TransportEvent::LoadEnd);

        assert_eq!(
            entries(&log),
            vec!["failure:request aborted", "finished:aborted"]
        );
    }

    #[test]
    fn test_finished_fires_exactly_once() {
        let log = Log::default();
        let mut router = LifecycleRouter::bind(info(), recording_callbacks(&log, true));

        router.route(TransportEvent::Load {
            status: 204,
            body: Bytes::new(),
        });
        router.route(TransportEvent::LoadEnd);
        router.route(TransportEvent::LoadEnd);
        router.route(TransportEvent::Start);

        let finished = entries(&log)
            .into_iter()
            .filter(|entry| entry.starts_with("finished"))
            .count();
        assert_eq!(finished, 1);
    }

    #[test]
    fn test_loadend_without_outcome_is_incomplete() {
        let log = Log::default();
        let mut router = LifecycleRouter::bind(info(), recording_callbacks(&log, true));

        router.route(TransportEvent::Start);
        router.route(TransportEvent::LoadEnd);

        assert_eq!(
            entries(&log),
            vec![
                "start",
                "failure:transport finished without an outcome",
                "finished:failed: transport finished without an outcome",
            ]
        );
        assert_eq!(
            router.outcome(),
            Some(&Outcome::Failed(FailureKind::Incomplete))
        );
    }

    #[test]
    fn test_progress_after_outcome_ignored() {
        let log = Log::default();
        let mut router = LifecycleRouter::bind(info(), recording_callbacks(&log, true));

        router.route(TransportEvent::Load {
            status: 200,
            body: Bytes::from_static(b"ok"),
        });
        router.route(TransportEvent::Progress(Progress { loaded: 2, total: None }));

        assert_eq!(entries(&log), vec!["success:200:ok"]);
    }

    #[test]
    fn test_metrics_and_completion() {
        let metrics = Arc::new(Metrics::new());
        let callbacks = BoundCallbacks::new(Arc::new(|_: Response| {}));
        let mut router = LifecycleRouter::bind(info(), callbacks).with_metrics(metrics.clone());
        let mut completion = router.subscribe();

        router.route(TransportEvent::Abort);
        assert!(completion.try_recv().is_err());

        router.route(TransportEvent::LoadEnd);
        assert_eq!(completion.try_recv(), Ok(Outcome::Aborted));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_aborted, 1);
        assert_eq!(snapshot.requests_succeeded, 0);
    }
}
