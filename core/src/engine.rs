//! Wires the registry to the inference gateway
//!
//! The runtime feeds terminal and gateway events in and executes the effects
//! that come back. `Query` effects are consumed here: terminal context is
//! captured through [`TerminalContext`] and the request is handed to the gateway.

use crate::config::Config;
use crate::gateway::{GatewayEvent, GatewaySettings, InferenceGateway};
use crate::ids::SessionId;
use crate::llm::{default_system_prompt, ChatTransport};
use crate::registry::SessionRegistry;
use crate::session::{Effect, SessionEvent, SessionSettings};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Snapshot of what the user has been seeing in a session's terminal.
pub trait TerminalContext {
    fn capture_recent_output(&self, session: SessionId, line_count: usize) -> String;
}

pub struct Engine {
    registry: SessionRegistry,
    gateway: InferenceGateway,
    context_lines: usize,
}

impl Engine {
    /// Gateway events must be fed back through [`Engine::on_gateway_event`].
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        gateway: GatewaySettings,
        session: SessionSettings,
        context_lines: usize,
    ) -> (Self, mpsc::UnboundedReceiver<GatewayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Self {
            registry: SessionRegistry::new(session),
            gateway: InferenceGateway::new(transport, gateway, tx),
            context_lines,
        };
        (engine, rx)
    }

    pub fn from_config(
        config: &Config,
        transport: Arc<dyn ChatTransport>,
    ) -> (Self, mpsc::UnboundedReceiver<GatewayEvent>) {
        let gateway = GatewaySettings {
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(default_system_prompt),
            history_limit: config.session.history_limit,
            json_mode: config.endpoint.json_mode,
        };
        let session = SessionSettings {
            settle_delay: config.session.settle_delay(),
        };
        Self::new(transport, gateway, session, config.session.context_lines)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn gateway(&self) -> &InferenceGateway {
        &self.gateway
    }

    pub fn create_session(&mut self) -> SessionId {
        self.registry.create()
    }

    pub fn destroy_session(&mut self, id: SessionId) -> bool {
        self.gateway.forget(id);
        self.registry.destroy(id)
    }

    pub fn handle(
        &mut self,
        id: SessionId,
        event: SessionEvent,
        context: &dyn TerminalContext,
    ) -> Vec<Effect> {
        let effects = self.registry.dispatch(id, event);
        self.start_queries(id, effects, context)
    }

    /// Returns the session the event was for, with its effects.
    pub fn on_gateway_event(
        &mut self,
        event: GatewayEvent,
        context: &dyn TerminalContext,
    ) -> (SessionId, Vec<Effect>) {
        let id = event.session();
        let effects = self.registry.on_gateway_event(event);
        (id, self.start_queries(id, effects, context))
    }

    fn start_queries(
        &mut self,
        id: SessionId,
        effects: Vec<Effect>,
        context: &dyn TerminalContext,
    ) -> Vec<Effect> {
        let mut remaining = Vec::with_capacity(effects.len());
        for effect in effects {
            match effect {
                Effect::Query { request, prompt } => {
                    let captured = context.capture_recent_output(id, self.context_lines);
                    // The handle is not kept: cancellation is local to the session.
                    let _ = self.gateway.query(id, request, &prompt, &captured);
                }
                other => remaining.push(other),
            }
        }
        remaining
    }
}
