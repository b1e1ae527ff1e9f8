use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm::types::{ToolCall, ToolDef};

const MAX_TOOL_NAME_LEN: usize = 64;

/// Executes one tool call. Failures are reported in the returned text; a
/// handler never errors.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, call: &ToolCall) -> String;
}

/// Adapts an async closure over the raw argument text into a handler.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = String> + Send,
{
    async fn call(&self, call: &ToolCall) -> String {
        (self.0)(call.arguments_json().to_string()).await
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool name must not be empty")]
    EmptyName,
    #[error("invalid tool name: {0}")]
    InvalidName(String),
    #[error("tool already registered: {0}")]
    Duplicate(String),
}

pub fn unsupported_tool_message(name: &str) -> String {
    let name = if name.is_empty() { "unknown" } else { name };
    format!("Unsupported tool: {name}")
}

fn validate_name(name: &str) -> Result<(), RegistryError> {
    if name.is_empty() {
        return Err(RegistryError::EmptyName);
    }
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid_chars || name.len() > MAX_TOOL_NAME_LEN {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Name → {definition, handler} table. Immutable once built; definitions
/// keep registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    definitions: Vec<ToolDef>,
    handlers: Vec<Arc<dyn ToolHandler>>,
    index: HashMap<String, usize>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    registry: ToolRegistry,
}

impl ToolRegistryBuilder {
    pub fn register(
        self,
        definition: ToolDef,
        handler: impl ToolHandler + 'static,
    ) -> Result<Self, RegistryError> {
        self.register_arc(definition, Arc::new(handler))
    }

    pub fn register_arc(
        mut self,
        definition: ToolDef,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<Self, RegistryError> {
        let name = definition.name().to_string();
        validate_name(&name)?;
        if self.registry.index.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        let reg = &mut self.registry;
        reg.index.insert(name, reg.definitions.len());
        reg.definitions.push(definition);
        reg.handlers.push(handler);
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        self.registry
    }
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    pub fn definitions(&self) -> &[ToolDef] {
        &self.definitions
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|d| d.name())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub async fn dispatch(&self, call: &ToolCall) -> String {
        let name = call.name();
        let Some(&idx) = self.index.get(name) else {
            warn!(tool = name, "unsupported tool requested");
            return unsupported_tool_message(name);
        };
        debug!(tool = name, id = %call.id, "dispatching tool call");
        self.handlers[idx].call(call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo() -> FnHandler<impl Fn(String) -> std::future::Ready<String> + Send + Sync> {
        FnHandler(|args: String| std::future::ready(format!("echo:{args}")))
    }

    fn def(name: &str) -> ToolDef {
        ToolDef::function(name, "test tool", json!({"type": "object", "properties": {}}))
    }

    #[tokio::test]
    async fn unknown_tool_gets_sentinel() {
        let registry = ToolRegistry::builder()
            .register(def("echo"), echo())
            .unwrap()
            .build();
        let out = registry.dispatch(&ToolCall::new("c1", "foo", "{}")).await;
        assert_eq!(out, "Unsupported tool: foo");
        let out = registry.dispatch(&ToolCall::new("c2", "", "{}")).await;
        assert_eq!(out, "Unsupported tool: unknown");
    }

    #[tokio::test]
    async fn dispatch_returns_handler_output_unchanged() {
        let registry = ToolRegistry::builder()
            .register(def("echo"), echo())
            .unwrap()
            .build();
        let out = registry
            .dispatch(&ToolCall::new("c1", "echo", "{\"a\":1}"))
            .await;
        assert_eq!(out, "echo:{\"a\":1}");
    }

    #[test]
    fn definitions_keep_registration_order() {
        let registry = ToolRegistry::builder()
            .register(def("b_tool"), echo())
            .unwrap()
            .register(def("a_tool"), echo())
            .unwrap()
            .build();
        let names: Vec<_> = registry.definitions().iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["b_tool", "a_tool"]);
        assert_eq!(registry.definitions(), registry.definitions());
        assert!(registry.contains("a_tool"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn rejects_bad_and_duplicate_names() {
        let err = ToolRegistry::builder()
            .register(def(""), echo())
            .err()
            .unwrap();
        assert_eq!(err, RegistryError::EmptyName);

        let err = ToolRegistry::builder()
            .register(def("has space"), echo())
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::InvalidName(_)));

        let long = "x".repeat(65);
        assert!(ToolRegistry::builder().register(def(&long), echo()).is_err());

        let err = ToolRegistry::builder()
            .register(def("dup"), echo())
            .unwrap()
            .register(def("dup"), echo())
            .err()
            .unwrap();
        assert_eq!(err, RegistryError::Duplicate("dup".into()));
    }
}
