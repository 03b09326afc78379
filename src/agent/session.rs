//! Conversation state: the turn log and the reply cycle.
//!
//! Replies are serialized. Each accepted user turn is queued, a single
//! scheduler timer is armed at a time, and every firing answers the oldest
//! queued turn before arming the next one. Agent replies therefore follow
//! the order of the user turns they answer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;

use super::classifier::IntentClassifier;
use super::responder::ResponseSelector;
use super::scheduler::TurnScheduler;
use crate::config::Lexicon;
use crate::error::CompanionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Agent,
}

/// One message in the conversation. Never modified once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub id: u64,
    pub text: String,
    pub author: Author,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    AwaitingReply,
}

struct Engine {
    classifier: IntentClassifier,
    selector: ResponseSelector,
    delay: Duration,
}

struct SessionState {
    turns: Vec<Turn>,
    next_id: u64,
    queue: VecDeque<String>,
    pending_reply: bool,
    closed: bool,
    rng: Box<dyn RngCore + Send>,
    last_error: Option<CompanionError>,
}

impl SessionState {
    fn push(&mut self, author: Author, text: String) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let now = Utc::now();
        let created_at = self.turns.last().map_or(now, |t| now.max(t.created_at));
        self.turns.push(Turn {
            id,
            text,
            author,
            created_at,
        });
        id
    }
}

/// A single chat: owns the turn log and sequences user turns into replies.
///
/// Dropping the session cancels any reply still pending.
pub struct ConversationSession {
    state: Arc<Mutex<SessionState>>,
    engine: Arc<Engine>,
    scheduler: Arc<dyn TurnScheduler>,
}

impl ConversationSession {
    /// Start a session seeded with the lexicon's greeting.
    pub fn new(
        lexicon: &Lexicon,
        scheduler: Arc<dyn TurnScheduler>,
        rng: Box<dyn RngCore + Send>,
    ) -> Result<Self, CompanionError> {
        let classifier = IntentClassifier::new(lexicon)?;
        let selector = ResponseSelector::new(lexicon);
        Ok(Self::from_parts(
            classifier,
            selector,
            &lexicon.greeting,
            lexicon.reply_delay(),
            scheduler,
            rng,
        ))
    }

    /// Like [`ConversationSession::new`] with an OS-seeded random source.
    pub fn with_os_rng(
        lexicon: &Lexicon,
        scheduler: Arc<dyn TurnScheduler>,
    ) -> Result<Self, CompanionError> {
        Self::new(lexicon, scheduler, Box::new(StdRng::from_os_rng()))
    }

    /// Assemble a session from prebuilt components.
    pub fn from_parts(
        classifier: IntentClassifier,
        selector: ResponseSelector,
        greeting: &str,
        delay: Duration,
        scheduler: Arc<dyn TurnScheduler>,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        let mut state = SessionState {
            turns: Vec::new(),
            next_id: 1,
            queue: VecDeque::new(),
            pending_reply: false,
            closed: false,
            rng,
            last_error: None,
        };
        state.push(Author::Agent, greeting.to_string());
        tracing::info!(delay = ?delay, "session opened");

        Self {
            state: Arc::new(Mutex::new(state)),
            engine: Arc::new(Engine {
                classifier,
                selector,
                delay,
            }),
            scheduler,
        }
    }

    /// Append a user turn and start (or extend) the reply cycle.
    ///
    /// Returns the new turn's id. Blank input is rejected and leaves the log
    /// untouched. If no reply timer can be armed the turn stays in the log,
    /// waiting turns are dropped and the scheduler's error is returned.
    pub fn submit_user_turn(&self, text: &str) -> Result<u64, CompanionError> {
        if text.trim().is_empty() {
            tracing::warn!("rejected empty user turn");
            return Err(CompanionError::EmptyInputRejected);
        }

        let mut state = lock(&self.state);
        if state.closed {
            return Err(CompanionError::SessionClosed);
        }
        let id = state.push(Author::User, text.to_string());
        state.queue.push_back(text.to_string());

        let arm = !state.pending_reply;
        state.pending_reply = true;
        drop(state);

        if arm {
            let armed = schedule_reply(
                Arc::downgrade(&self.state),
                Arc::clone(&self.engine),
                Arc::clone(&self.scheduler),
            );
            if let Err(e) = armed {
                abandon_replies(&self.state, e.clone());
                return Err(e);
            }
        }
        Ok(id)
    }

    /// Snapshot of every turn so far, in insertion order.
    pub fn current_turns(&self) -> Vec<Turn> {
        lock(&self.state).turns.clone()
    }

    pub fn is_agent_composing(&self) -> bool {
        lock(&self.state).pending_reply
    }

    pub fn phase(&self) -> SessionPhase {
        if self.is_agent_composing() {
            SessionPhase::AwaitingReply
        } else {
            SessionPhase::Idle
        }
    }

    /// User turns still waiting for a reply.
    pub fn pending_replies(&self) -> usize {
        lock(&self.state).queue.len()
    }

    /// The most recent reply failure, if any.
    pub fn last_error(&self) -> Option<CompanionError> {
        lock(&self.state).last_error.clone()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    /// Tear the session down: unanswered turns are dropped and no pending
    /// callback will run.
    pub fn close(&self) {
        {
            let mut state = lock(&self.state);
            if state.closed {
                return;
            }
            state.closed = true;
            state.pending_reply = false;
            let dropped = state.queue.len();
            state.queue.clear();
            tracing::info!(turns = state.turns.len(), dropped, "session closed");
        }
        self.scheduler.cancel_all();
    }
}

impl Drop for ConversationSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn schedule_reply(
    state: Weak<Mutex<SessionState>>,
    engine: Arc<Engine>,
    scheduler: Arc<dyn TurnScheduler>,
) -> Result<(), CompanionError> {
    let delay = engine.delay;
    let next = Arc::clone(&scheduler);
    scheduler.after(
        delay,
        Box::new(move || deliver_reply(&state, &engine, &next)),
    )
}

/// Stop composing after a timer could not be armed.
fn abandon_replies(state: &Mutex<SessionState>, err: CompanionError) {
    let mut guard = lock(state);
    let dropped = guard.queue.len();
    guard.queue.clear();
    guard.pending_reply = false;
    tracing::error!(dropped, "cannot schedule reply: {err}");
    guard.last_error = Some(err);
}

/// Answer the oldest queued turn, then re-arm if more are waiting.
fn deliver_reply(
    state: &Weak<Mutex<SessionState>>,
    engine: &Arc<Engine>,
    scheduler: &Arc<dyn TurnScheduler>,
) {
    // Session already dropped.
    let Some(shared) = state.upgrade() else {
        return;
    };

    {
        let mut guard = lock(&shared);
        if guard.closed {
            return;
        }
        let Some(text) = guard.queue.pop_front() else {
            guard.pending_reply = false;
            return;
        };

        let category = engine.classifier.classify(&text);
        match engine.selector.select_response(category, &mut *guard.rng) {
            Ok(reply) => {
                let id = guard.push(Author::Agent, reply);
                tracing::info!(%category, turn = id, "agent replied");
            }
            Err(e) => {
                tracing::error!(%category, "no reply for classified turn: {e}");
                guard.last_error = Some(e);
            }
        }

        if guard.queue.is_empty() {
            guard.pending_reply = false;
            return;
        }
    }

    if let Err(e) = schedule_reply(
        Arc::downgrade(&shared),
        Arc::clone(engine),
        Arc::clone(scheduler),
    ) {
        abandon_replies(&shared, e);
    }
}
