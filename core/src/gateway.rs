//! Inference gateway
//!
//! Builds each request from the session's ledger, streams the reply on a
//! background task and reports back through an event channel. The ledger is
//! finalized exactly once per request: an assistant reply on completion, or a
//! rollback on failure so the failed turn leaves nothing behind.

use crate::error::ShellwiseError;
use crate::ids::{RequestId, SessionId};
use crate::ledger::Ledger;
use crate::llm::{ChatMessage, ChatRequest, ChatStream, ChatTransport, StreamEvent};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What a streaming request reports back, in transport order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    Chunk {
        session: SessionId,
        request: RequestId,
        text: String,
    },
    Complete {
        session: SessionId,
        request: RequestId,
    },
    Failure {
        session: SessionId,
        request: RequestId,
        message: String,
    },
}

impl GatewayEvent {
    pub fn session(&self) -> SessionId {
        match self {
            GatewayEvent::Chunk { session, .. }
            | GatewayEvent::Complete { session, .. }
            | GatewayEvent::Failure { session, .. } => *session,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, GatewayEvent::Chunk { .. })
    }
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub system_prompt: String,
    /// Ledger bound per session
    pub history_limit: usize,
    /// Structured-output flag forwarded to the transport
    pub json_mode: bool,
}

/// The request currently allowed to finalize a ledger.
struct InFlight {
    request: RequestId,
    /// Messages the pre-request trim dropped, restored if the request fails
    trimmed: Vec<ChatMessage>,
}

struct LedgerSlot {
    ledger: Ledger,
    active: Option<InFlight>,
}

impl LedgerSlot {
    /// Undo the in-flight request's user turn, leaving the ledger as it was before it.
    fn unwind(&mut self, in_flight: InFlight) {
        self.ledger.rollback_last_user();
        self.ledger.restore_front(in_flight.trimmed);
    }
}

pub struct InferenceGateway {
    transport: Arc<dyn ChatTransport>,
    settings: GatewaySettings,
    slots: HashMap<SessionId, Arc<Mutex<LedgerSlot>>>,
    events: mpsc::UnboundedSender<GatewayEvent>,
}

impl InferenceGateway {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        settings: GatewaySettings,
        events: mpsc::UnboundedSender<GatewayEvent>,
    ) -> Self {
        Self {
            transport,
            settings,
            slots: HashMap::new(),
            events,
        }
    }

    /// Start a streaming request for `session`. Returns immediately; results arrive as [`GatewayEvent`]s.
    ///
    /// Must be called from within a tokio runtime.
    pub fn query(
        &mut self,
        session: SessionId,
        request: RequestId,
        prompt: &str,
        context: &str,
    ) -> JoinHandle<()> {
        let limit = self.settings.history_limit;
        let slot = self
            .slots
            .entry(session)
            .or_insert_with(|| {
                Arc::new(Mutex::new(LedgerSlot {
                    ledger: Ledger::new(limit),
                    active: None,
                }))
            })
            .clone();

        let messages = {
            let mut guard = slot.lock();
            if let Some(stale) = guard.active.take() {
                // A cancelled request is still streaming; it no longer owns the ledger.
                crate::debug_log!(
                    "[{}] request {} superseded by {}, rolling back its turn",
                    session.short(),
                    stale.request,
                    request
                );
                guard.unwind(stale);
            }

            guard.ledger.append_user(compose_user_message(prompt, context));
            let trimmed = guard.ledger.trim();
            guard.active = Some(InFlight { request, trimmed });

            let mut messages = Vec::with_capacity(guard.ledger.len() + 1);
            messages.push(ChatMessage::system(self.settings.system_prompt.clone()));
            messages.extend(guard.ledger.snapshot());
            messages
        };

        crate::info_log!(
            "[{}] query {}: {} message(s), context {} bytes",
            session.short(),
            request,
            messages.len(),
            context.len()
        );

        let stream = self
            .transport
            .stream_chat(ChatRequest::new(messages).with_json_mode(self.settings.json_mode));
        tokio::spawn(drive_stream(
            session,
            request,
            stream,
            slot,
            self.events.clone(),
        ))
    }

    /// Drop a session's ledger. In-flight requests finish against a detached copy.
    pub fn forget(&mut self, session: SessionId) {
        self.slots.remove(&session);
    }

    pub fn ledger_snapshot(&self, session: SessionId) -> Vec<ChatMessage> {
        self.slots
            .get(&session)
            .map(|slot| slot.lock().ledger.snapshot())
            .unwrap_or_default()
    }

    pub fn ledger_len(&self, session: SessionId) -> usize {
        self.slots
            .get(&session)
            .map(|slot| slot.lock().ledger.len())
            .unwrap_or(0)
    }
}

/// Prefix the prompt with captured terminal output when there is any.
pub fn compose_user_message(prompt: &str, context: &str) -> String {
    if context.trim().is_empty() {
        return prompt.to_string();
    }
    format!(
        "Recent terminal output:\n<terminal>\n{}\n</terminal>\n\n{}",
        context.trim_end(),
        prompt
    )
}

async fn drive_stream(
    session: SessionId,
    request: RequestId,
    mut stream: ChatStream,
    slot: Arc<Mutex<LedgerSlot>>,
    events: mpsc::UnboundedSender<GatewayEvent>,
) {
    let mut accumulated = String::new();
    let mut outcome: Result<(), ShellwiseError> = Ok(());

    while let Some(item) = stream.next().await {
        match item {
            Ok(StreamEvent::Content(text)) => {
                accumulated.push_str(&text);
                let _ = events.send(GatewayEvent::Chunk {
                    session,
                    request,
                    text,
                });
            }
            Ok(StreamEvent::Usage(usage)) => {
                crate::info_log!("[{}] request {}: {}", session.short(), request, usage);
            }
            Ok(StreamEvent::Done) => break,
            Err(e) => {
                outcome = Err(e);
                break;
            }
        }
    }
    // Explicit done marker and plain end-of-stream both land here, once.

    {
        let mut guard = slot.lock();
        let owns_ledger = guard.active.as_ref().map(|a| a.request) == Some(request);
        if owns_ledger {
            if let Some(in_flight) = guard.active.take() {
                match &outcome {
                    Ok(()) => {
                        guard.ledger.append_assistant(accumulated);
                        guard.ledger.trim();
                    }
                    Err(_) => guard.unwind(in_flight),
                }
            }
        }
    }

    let event = match outcome {
        Ok(()) => GatewayEvent::Complete { session, request },
        Err(e) => {
            crate::error_log!(
                "[{}] request {} failed (retryable: {}): {}",
                session.short(),
                request,
                e.is_retryable(),
                e
            );
            GatewayEvent::Failure {
                session,
                request,
                message: e.user_message(),
            }
        }
    };
    let _ = events.send(event);
}
