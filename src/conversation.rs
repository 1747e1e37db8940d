use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::bus::{Event, EventBus};
use crate::chat::ChatMessage;
use crate::context::{compose, select, ReportMeta, SelectionLimits};
use crate::dataset::Datasets;
use crate::llm::{TextGenerator, FALLBACK_REPLY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Idle,
    Sending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    EmptyQuery,
    Busy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Nothing was appended.
    Rejected(RejectReason),
    /// The assistant message appended for this query.
    Answered(ChatMessage),
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSnapshot {
    pub status: ConversationStatus,
    pub pending_input: String,
    pub messages: Vec<ChatMessage>,
}

struct ConversationState {
    transcript: Vec<ChatMessage>,
    status: ConversationStatus,
    pending_input: String,
}

/// Owns the transcript and runs one query round-trip at a time.
pub struct Conversation {
    datasets: Arc<Datasets>,
    generator: Arc<dyn TextGenerator>,
    limits: SelectionLimits,
    event_bus: Arc<EventBus>,
    state: Mutex<ConversationState>,
}

impl Conversation {
    pub fn new(
        datasets: Arc<Datasets>,
        generator: Arc<dyn TextGenerator>,
        limits: SelectionLimits,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            datasets,
            generator,
            limits,
            event_bus,
            state: Mutex::new(ConversationState {
                transcript: Vec::new(),
                status: ConversationStatus::Idle,
                pending_input: String::new(),
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn datasets(&self) -> &Datasets {
        &self.datasets
    }

    #[cfg(test)]
    pub fn status(&self) -> ConversationStatus {
        self.lock_state().status
    }

    #[cfg(test)]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock_state().transcript.clone()
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        let state = self.lock_state();
        ConversationSnapshot {
            status: state.status,
            pending_input: state.pending_input.clone(),
            messages: state.transcript.clone(),
        }
    }

    /// Updates the draft the user is typing.
    pub fn set_pending_input(&self, text: impl Into<String>) {
        self.lock_state().pending_input = text.into();
    }

    /// Selection and composition for `query` against the loaded datasets.
    pub fn build_prompt(&self, query: &str) -> String {
        let selection = select(query, &self.datasets, self.limits);
        compose(query, &selection, ReportMeta::from(&self.datasets.report))
    }

    /// Runs one user turn: append the question, generate, append the reply.
    ///
    /// Empty queries and sends made while another is in flight are ignored.
    /// If the returned future is dropped before the reply arrives, the
    /// fallback reply is appended so the transcript keeps alternating.
    pub async fn send(&self, query: &str) -> SendOutcome {
        let query = query.trim();
        if query.is_empty() {
            debug!("Ignoring empty query");
            return SendOutcome::Rejected(RejectReason::EmptyQuery);
        }

        // Scope the lock so it is dropped before awaiting
        let user_message = {
            let mut state = self.lock_state();
            if state.status == ConversationStatus::Sending {
                debug!("Ignoring query while another is in flight");
                return SendOutcome::Rejected(RejectReason::Busy);
            }
            let message = ChatMessage::user(query);
            state.transcript.push(message.clone());
            state.pending_input.clear();
            state.status = ConversationStatus::Sending;
            message
        };

        let in_flight = InFlight {
            conversation: self,
            finished: false,
        };

        info!("Answering query {:?}", query);
        self.event_bus.publish(Event::MessageAppended(user_message));
        self.event_bus.publish(Event::StatusChanged {
            status: ConversationStatus::Sending,
        });

        let prompt = self.build_prompt(query);
        let reply = self.generator.respond(&prompt).await;

        SendOutcome::Answered(in_flight.finish(reply))
    }

    fn complete(&self, reply: String) -> ChatMessage {
        let message = ChatMessage::assistant(reply);
        {
            let mut state = self.lock_state();
            state.transcript.push(message.clone());
            state.status = ConversationStatus::Idle;
        }
        self.event_bus
            .publish(Event::MessageAppended(message.clone()));
        self.event_bus.publish(Event::StatusChanged {
            status: ConversationStatus::Idle,
        });
        message
    }
}

/// Closes out a send exactly once, even if the send future is dropped.
struct InFlight<'a> {
    conversation: &'a Conversation,
    finished: bool,
}

impl InFlight<'_> {
    fn finish(mut self, reply: String) -> ChatMessage {
        self.finished = true;
        self.conversation.complete(reply)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Send abandoned before the reply arrived, appending fallback");
            self.conversation.complete(FALLBACK_REPLY.to_string());
        }
    }
}
