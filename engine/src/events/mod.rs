//! Session event store
//!
//! Keeps an append-only event log per session and a registry of live
//! subscribers. Writers append first and deliver second; the two steps are
//! split so a run can persist synchronously and fan out from a background
//! dispatcher (see [`emitter`]).
//!
//! Live delivery follows log order within a session even when several runs
//! write to it at once: each appended event is released to subscribers only
//! after every earlier event of that session was delivered or skipped.
//!
//! Every subscriber gets a bounded channel. A subscriber whose channel is
//! full or closed is dropped from the registry on the next delivery, so a
//! slow observer can never stall a run.

pub mod emitter;

pub use emitter::EventEmitter;

use sdk::events::ProcessEvent;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};

/// Default per-subscriber channel capacity
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 100;

/// Position of an event within its session
///
/// Survives `clear`. A session's numbering only restarts once the session
/// has no events, no subscribers and no delivery outstanding.
pub type Sequence = u64;

/// A live registration on one session's event stream
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<ProcessEvent>,
}

struct Subscriber {
    id: u64,
    /// First sequence this subscriber should see live
    from_seq: Sequence,
    tx: mpsc::Sender<ProcessEvent>,
}

#[derive(Default)]
struct Session {
    events: Vec<ProcessEvent>,
    next_seq: Sequence,
    /// Next sequence to release to subscribers
    next_release: Sequence,
    /// Deliveries that arrived ahead of an earlier one; `None` marks a skip
    pending: BTreeMap<Sequence, Option<ProcessEvent>>,
    subscribers: Vec<Subscriber>,
}

impl Session {
    fn is_idle(&self) -> bool {
        self.events.is_empty()
            && self.subscribers.is_empty()
            && self.next_release == self.next_seq
    }

    /// Queue one delivery and release everything that is now in order
    fn release(&mut self, session_id: &str, seq: Sequence, event: Option<ProcessEvent>) {
        if seq < self.next_release {
            return;
        }
        self.pending.insert(seq, event);

        while let Some(entry) = self.pending.remove(&self.next_release) {
            let seq = self.next_release;
            self.next_release += 1;
            if let Some(event) = entry {
                self.fan_out(session_id, seq, &event);
            }
        }
    }

    fn fan_out(&mut self, session_id: &str, seq: Sequence, event: &ProcessEvent) {
        self.subscribers.retain(|sub| {
            if seq < sub.from_seq {
                return true;
            }
            match sub.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(
                        "Dropping subscriber {} on session {}: {}",
                        sub.id,
                        session_id,
                        e
                    );
                    false
                }
            }
        });
    }
}

/// Per-session event log plus live fan-out
///
/// Per-session operations lock only that session; the session index is
/// write-locked only to create or drop a session.
pub struct SessionEventStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    next_subscriber_id: AtomicU64,
    subscriber_buffer: usize,
}

impl SessionEventStore {
    /// Create a store whose subscriber channels hold `subscriber_buffer` events
    pub fn new(subscriber_buffer: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_subscriber_id: AtomicU64::new(1),
            subscriber_buffer: subscriber_buffer.max(1),
        }
    }

    /// Run `f` against a session, creating it if needed.
    ///
    /// The index read guard is held while the session is locked so a
    /// concurrent `clear` cannot detach the session mid-operation.
    async fn with_session<R>(&self, session_id: &str, f: impl FnOnce(&mut Session) -> R) -> R {
        {
            let index = self.sessions.read().await;
            if let Some(session) = index.get(session_id) {
                let mut session = session.lock().await;
                return f(&mut *session);
            }
        }

        let mut index = self.sessions.write().await;
        let session = Arc::clone(index.entry(session_id.to_string()).or_default());
        let mut session = session.lock().await;
        f(&mut *session)
    }

    /// Append an event to its session log and return its sequence number
    ///
    /// Every appended sequence must later reach [`Self::deliver`] or
    /// [`Self::skip`], or live delivery on the session stalls behind it.
    pub(crate) async fn append(&self, event: ProcessEvent) -> Sequence {
        let session_id = event.session_id.clone();
        self.with_session(&session_id, |session| {
            let seq = session.next_seq;
            session.next_seq += 1;
            session.events.push(event);
            seq
        })
        .await
    }

    /// Push an already-appended event to the session's live subscribers
    ///
    /// Held back until every earlier sequence of the session is released.
    /// Never fails. Subscribers that cannot take the event are deregistered.
    pub(crate) async fn deliver(&self, seq: Sequence, event: &ProcessEvent) {
        self.release(&event.session_id, seq, Some(event.clone()))
            .await;
    }

    /// Give up on the live delivery of an appended event
    pub(crate) async fn skip(&self, session_id: &str, seq: Sequence) {
        self.release(session_id, seq, None).await;
    }

    async fn release(&self, session_id: &str, seq: Sequence, event: Option<ProcessEvent>) {
        let index = self.sessions.read().await;
        let Some(session) = index.get(session_id) else {
            return;
        };
        session.lock().await.release(session_id, seq, event);
    }

    /// Append and deliver in one call
    pub async fn record(&self, event: ProcessEvent) {
        let seq = self.append(event.clone()).await;
        self.deliver(seq, &event).await;
    }

    /// Register a live subscriber on a session
    pub async fn subscribe(&self, session_id: &str) -> Subscription {
        self.subscribe_with_backlog(session_id).await.1
    }

    /// Register a live subscriber and snapshot the log in one step
    ///
    /// Events in the returned backlog are never delivered again on the
    /// subscription, and nothing appended after the snapshot is missed.
    pub async fn subscribe_with_backlog(
        &self,
        session_id: &str,
    ) -> (Vec<ProcessEvent>, Subscription) {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (tx, receiver) = mpsc::channel(self.subscriber_buffer);

        let backlog = self
            .with_session(session_id, |session| {
                session.subscribers.push(Subscriber {
                    id,
                    from_seq: session.next_seq,
                    tx,
                });
                session.events.clone()
            })
            .await;

        tracing::debug!("Subscriber {} registered on session {}", id, session_id);
        (backlog, Subscription { id, receiver })
    }

    /// Remove a subscriber; unknown ids are ignored
    pub async fn unsubscribe(&self, session_id: &str, subscriber_id: u64) {
        let mut index = self.sessions.write().await;
        let Some(session) = index.get(session_id).cloned() else {
            return;
        };
        let mut session = session.lock().await;
        session.subscribers.retain(|sub| sub.id != subscriber_id);
        if session.is_idle() {
            index.remove(session_id);
        }
    }

    /// Ordered snapshot of a session's log
    pub async fn get_events(&self, session_id: &str) -> Vec<ProcessEvent> {
        let index = self.sessions.read().await;
        match index.get(session_id) {
            Some(session) => session.lock().await.events.clone(),
            None => Vec::new(),
        }
    }

    /// Discard a session's log, keeping its subscribers
    ///
    /// The session's sequence numbering carries on, so deliveries still in
    /// flight for discarded events never reach later subscribers.
    /// Returns the number of events discarded.
    pub async fn clear(&self, session_id: &str) -> usize {
        let mut index = self.sessions.write().await;
        let Some(session) = index.get(session_id).cloned() else {
            return 0;
        };
        let mut session = session.lock().await;
        let cleared = session.events.len();
        session.events.clear();
        if session.is_idle() {
            index.remove(session_id);
        }
        tracing::info!("Cleared {} events from session {}", cleared, session_id);
        cleared
    }

    /// Ids of sessions that currently hold events, sorted
    pub async fn sessions(&self) -> Vec<String> {
        let index = self.sessions.read().await;
        let mut ids = Vec::new();
        for (id, session) in index.iter() {
            if !session.lock().await.events.is_empty() {
                ids.push(id.clone());
            }
        }
        ids.sort();
        ids
    }

    /// Number of live subscribers on a session
    pub async fn subscriber_count(&self, session_id: &str) -> usize {
        let index = self.sessions.read().await;
        match index.get(session_id) {
            Some(session) => session.lock().await.subscribers.len(),
            None => 0,
        }
    }
}

impl Default for SessionEventStore {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}
