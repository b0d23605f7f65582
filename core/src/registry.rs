//! Session registry
//!
//! Owns every live [`Session`] keyed by id and routes events to them.
//! Sessions are only created and destroyed on explicit request.

use crate::gateway::GatewayEvent;
use crate::ids::SessionId;
use crate::session::{Effect, Session, SessionEvent, SessionSettings};
use std::collections::HashMap;

pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            sessions: HashMap::new(),
            settings,
        }
    }

    pub fn create(&mut self) -> SessionId {
        let id = SessionId::new();
        self.sessions
            .insert(id, Session::new(id, self.settings.clone()));
        crate::info_log!("session {} created", id.short());
        id
    }

    /// Returns false if the session did not exist.
    pub fn destroy(&mut self, id: SessionId) -> bool {
        let removed = self.sessions.remove(&id).is_some();
        if removed {
            crate::info_log!("session {} destroyed", id.short());
        }
        removed
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Events for unknown sessions are dropped.
    pub fn dispatch(&mut self, id: SessionId, event: SessionEvent) -> Vec<Effect> {
        let Some(session) = self.sessions.get_mut(&id) else {
            crate::trace_log!("dropping event for unknown session {}", id.short());
            return Vec::new();
        };
        session.handle(event)
    }

    pub fn on_gateway_event(&mut self, event: GatewayEvent) -> Vec<Effect> {
        let (id, event) = match event {
            GatewayEvent::Chunk {
                session,
                request,
                text,
            } => (session, SessionEvent::Chunk { request, text }),
            GatewayEvent::Complete { session, request } => {
                (session, SessionEvent::Complete { request })
            }
            GatewayEvent::Failure {
                session,
                request,
                message,
            } => (session, SessionEvent::Failure { request, message }),
        };
        self.dispatch(id, event)
    }
}
