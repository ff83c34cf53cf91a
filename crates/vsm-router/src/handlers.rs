//! Local handler registry: `RegisterHandler(type, fn)`. First
//! registration for a command type wins; later ones are rejected rather than
//! silently shadowing the first.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use vsm_core::{Command, HandlerErrorKind};

use crate::error::RouterError;

/// Outcome a handler reports back to the router.
pub enum HandlerOutcome {
    Ok(serde_json::Value),
    Error { kind: HandlerErrorKind, message: String },
}

impl HandlerOutcome {
    pub fn ok(payload: serde_json::Value) -> Self {
        HandlerOutcome::Ok(payload)
    }

    pub fn error(kind: HandlerErrorKind, message: impl Into<String>) -> Self {
        HandlerOutcome::Error { kind, message: message.into() }
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: Command) -> HandlerOutcome;
}

#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn CommandHandler>>>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `command_type`. Fails if one is already
    /// registered.
    pub fn register(&self, command_type: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Result<(), RouterError> {
        let command_type = command_type.into();
        let mut handlers = self.handlers.write();
        if handlers.contains_key(&command_type) {
            return Err(RouterError::HandlerAlreadyRegistered(command_type));
        }
        handlers.insert(command_type, handler);
        Ok(())
    }

    pub fn get(&self, command_type: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.read().get(command_type).cloned()
    }

    pub fn contains(&self, command_type: &str) -> bool {
        self.handlers.read().contains_key(command_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsm_core::CommandTarget;

    struct Echo;

    #[async_trait]
    impl CommandHandler for Echo {
        async fn handle(&self, command: Command) -> HandlerOutcome {
            HandlerOutcome::ok(command.payload)
        }
    }

    #[test]
    fn second_registration_for_same_type_fails() {
        let table = HandlerTable::new();
        table.register("echo", Arc::new(Echo)).unwrap();
        let err = table.register("echo", Arc::new(Echo)).unwrap_err();
        assert!(matches!(err, RouterError::HandlerAlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn registered_handler_is_invoked() {
        let table = HandlerTable::new();
        table.register("echo", Arc::new(Echo)).unwrap();
        let handler = table.get("echo").unwrap();
        let cmd = Command::new("echo", CommandTarget::Broadcast, serde_json::json!({"x": 1}));
        match handler.handle(cmd).await {
            HandlerOutcome::Ok(payload) => assert_eq!(payload, serde_json::json!({"x": 1})),
            HandlerOutcome::Error { .. } => panic!("expected ok"),
        }
    }
}
