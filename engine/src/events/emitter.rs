//! Per-run event emitter
//!
//! Each workflow run owns one emitter. `emit` appends to the session log
//! before returning, then hands the event to a dispatcher task over a
//! bounded queue for live delivery. The run calls [`EventEmitter::flush`]
//! when it ends so every queued delivery has reached the store before the
//! response goes out.
//!
//! A delivery dropped on overflow is still reported to the store as a skip,
//! through the dispatcher, so later events of the session are not held back
//! waiting for it.

use super::{SessionEventStore, Sequence};
use sdk::events::{EventPayload, ProcessEvent, StepStatus, StepType};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Default capacity of the delivery queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

pub struct EventEmitter {
    store: Arc<SessionEventStore>,
    session_id: String,
    question: String,
    queue: Option<mpsc::Sender<(Sequence, ProcessEvent)>>,
    skipped: mpsc::UnboundedSender<Sequence>,
    dispatcher: Option<JoinHandle<()>>,
}

impl EventEmitter {
    /// Start an emitter and its dispatcher task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        store: Arc<SessionEventStore>,
        session_id: impl Into<String>,
        question: impl Into<String>,
        queue_capacity: usize,
    ) -> Self {
        let session_id = session_id.into();
        let (tx, mut rx) = mpsc::channel::<(Sequence, ProcessEvent)>(queue_capacity.max(1));
        let (skipped, mut skipped_rx) = mpsc::unbounded_channel::<Sequence>();

        let dispatch_store = Arc::clone(&store);
        let dispatch_session = session_id.clone();
        let dispatcher = tokio::spawn(async move {
            while let Some((seq, event)) = rx.recv().await {
                dispatch_store.deliver(seq, &event).await;
                while let Ok(seq) = skipped_rx.try_recv() {
                    dispatch_store.skip(&dispatch_session, seq).await;
                }
            }
            skipped_rx.close();
            while let Some(seq) = skipped_rx.recv().await {
                dispatch_store.skip(&dispatch_session, seq).await;
            }
        });

        Self {
            store,
            session_id,
            question: question.into(),
            queue: Some(tx),
            skipped,
            dispatcher: Some(dispatcher),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Record an event and queue it for live delivery
    pub async fn emit(&self, event: ProcessEvent) {
        let label = event.label();
        let seq = self.store.append(event.clone()).await;

        let Some(queue) = &self.queue else {
            self.store.skip(&self.session_id, seq).await;
            return;
        };
        match queue.try_send((seq, event)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    "Event queue full for session {}; live delivery of {} dropped",
                    self.session_id,
                    label
                );
                self.report_skip(seq).await;
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(
                    "Event dispatcher stopped for session {}; live delivery of {} dropped",
                    self.session_id,
                    label
                );
                self.report_skip(seq).await;
            }
        }
    }

    async fn report_skip(&self, seq: Sequence) {
        // Dispatcher gone: nothing will drain the skip channel
        if let Err(e) = self.skipped.send(seq) {
            self.store.skip(&self.session_id, e.0).await;
        }
    }

    /// Emit a `started` event for a step
    pub async fn started(&self, step: StepType) {
        self.emit(ProcessEvent::started(&self.session_id, step, &self.question))
            .await;
    }

    /// Emit a `started` event carrying extra context
    pub async fn started_with(&self, step: StepType, attempt: Option<u32>, query: Option<String>) {
        let event = ProcessEvent::new(
            self.session_id.as_str(),
            step,
            StepStatus::Started,
            self.question.as_str(),
            EventPayload::Started { attempt, query },
        );
        self.emit(event).await;
    }

    /// Emit a `completed` event
    pub async fn completed(&self, step: StepType, payload: EventPayload, elapsed: Duration) {
        let event = ProcessEvent::completed(&self.session_id, step, &self.question, payload)
            .with_duration_ms(elapsed.as_millis() as u64);
        self.emit(event).await;
    }

    /// Emit a `failed` event
    pub async fn failed(&self, step: StepType, error_message: impl Into<String>, elapsed: Duration) {
        let event = ProcessEvent::failed(&self.session_id, step, &self.question, error_message)
            .with_duration_ms(elapsed.as_millis() as u64);
        self.emit(event).await;
    }

    /// Close the queue and wait for the dispatcher to drain it
    pub async fn flush(mut self) {
        self.queue.take();
        if let Some(dispatcher) = self.dispatcher.take() {
            if let Err(e) = dispatcher.await {
                tracing::warn!("Event dispatcher for session {} failed: {}", self.session_id, e);
            }
        }
    }
}
