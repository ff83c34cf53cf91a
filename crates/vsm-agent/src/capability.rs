//! Capability declaration and dispatch for a single agent process.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use vsm_core::Command;
use vsm_router::HandlerOutcome;

#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    async fn handle(&self, command: Command) -> HandlerOutcome;
}

/// Capabilities this agent advertises, each bound to the handler invoked
/// when a command targets it.
#[derive(Clone, Default)]
pub struct CapabilityTable {
    handlers: HashMap<String, Arc<dyn CapabilityHandler>>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capability(mut self, name: impl Into<String>, handler: Arc<dyn CapabilityHandler>) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    pub fn get(&self, capability: &str) -> Option<Arc<dyn CapabilityHandler>> {
        self.handlers.get(capability).cloned()
    }

    /// The command's type names the capability it targets.
    pub async fn dispatch(&self, command: Command) -> HandlerOutcome {
        match self.get(&command.command_type) {
            Some(handler) => handler.handle(command).await,
            None => HandlerOutcome::error(
                vsm_core::HandlerErrorKind::InvalidInput,
                format!("no capability handler for {}", command.command_type),
            ),
        }
    }
}
