//! The tool-calling conversation loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::aggregator::{QualifiedName, ToolAggregator};
use crate::config::AgentSettings;
use crate::protocol::{Arguments, ToolCallResult, ToolDescriptor};

use super::llm::{
    CompletionRequest, ContentBlock, LanguageModel, LlmError, Message, Role, ToolSpec,
};
use super::prompt::system_prompt;
use super::session::{trim_history, ConversationStore};

const LLM_APOLOGY: &str = "Lo siento, hubo un error procesando tu mensaje. Por favor, intenta de nuevo.";
const ITERATIONS_APOLOGY: &str =
    "Lo siento, no pude completar tu consulta. Intenta con una pregunta más específica.";
const TIMEOUT_APOLOGY: &str = "Lo siento, tu consulta tardó demasiado. Por favor, intenta de nuevo.";
const EMPTY_REPLY: &str = "No pude generar una respuesta.";

/// Source of the tools offered to the model.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// Every reachable tool under its qualified name.
    fn tools(&self) -> Vec<(QualifiedName, ToolDescriptor)>;

    /// Invoke a tool by qualified name. Never fails; errors are `Failure`.
    async fn invoke(&self, qualified_name: &str, arguments: Arguments) -> ToolCallResult;
}

#[async_trait]
impl ToolBackend for ToolAggregator {
    fn tools(&self) -> Vec<(QualifiedName, ToolDescriptor)> {
        self.list_all_tools()
    }

    async fn invoke(&self, qualified_name: &str, arguments: Arguments) -> ToolCallResult {
        ToolAggregator::invoke(self, qualified_name, arguments).await
    }
}

/// Agent loop limits.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum model calls per turn.
    pub max_iterations: usize,
    /// Maximum stored messages per user.
    pub max_history: usize,
    /// Upper bound on a whole turn.
    pub turn_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from(&AgentSettings::default())
    }
}

impl From<&AgentSettings> for AgentConfig {
    fn from(settings: &AgentSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            max_history: settings.max_history,
            turn_timeout: settings.turn_timeout,
        }
    }
}

#[derive(Debug, Error)]
enum TurnError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("no final answer after {0} model calls")]
    IterationsExhausted(usize),
}

/// Tools as offered to the model, with the route back to each one.
struct ToolTable {
    specs: Vec<ToolSpec>,
    routes: HashMap<String, QualifiedName>,
}

impl ToolTable {
    fn build(tools: Vec<(QualifiedName, ToolDescriptor)>) -> Self {
        let mut specs = Vec::with_capacity(tools.len());
        let mut routes = HashMap::with_capacity(tools.len());
        for (qualified, descriptor) in tools {
            let function = qualified.function_name();
            if routes.contains_key(&function) {
                warn!(tool = %qualified, function = %function, "Function name collision, tool skipped");
                continue;
            }
            specs.push(ToolSpec {
                name: function.clone(),
                description: descriptor.description.clone(),
                input_schema: descriptor.input_schema(),
            });
            routes.insert(function, qualified);
        }
        Self { specs, routes }
    }
}

/// WhatsApp analytics assistant.
///
/// Each turn loads the user's history, lets the model call tools until it
/// answers, and saves the history only when the turn completes.
pub struct Agent {
    model: Arc<dyn LanguageModel>,
    tools: Arc<dyn ToolBackend>,
    store: Arc<dyn ConversationStore>,
    config: AgentConfig,
}

impl Agent {
    /// Create an agent.
    pub fn new(
        model: Arc<dyn LanguageModel>,
        tools: Arc<dyn ToolBackend>,
        store: Arc<dyn ConversationStore>,
        config: AgentConfig,
    ) -> Self {
        Self {
            model,
            tools,
            store,
            config,
        }
    }

    /// Loop limits.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The conversation store.
    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Answer one inbound message from `user`.
    ///
    /// Always produces a reply; failures become an apology. A turn that
    /// exceeds the turn timeout is abandoned and leaves the stored history
    /// untouched.
    pub async fn process_message(&self, user: &str, text: &str) -> String {
        info!(user, chars = text.chars().count(), "Processing message");

        match tokio::time::timeout(self.config.turn_timeout, self.run_turn(user, text)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e @ TurnError::Llm(_))) => {
                warn!(user, error = %e, "Turn failed");
                LLM_APOLOGY.to_string()
            }
            Ok(Err(e @ TurnError::IterationsExhausted(_))) => {
                warn!(user, error = %e, "Turn failed");
                ITERATIONS_APOLOGY.to_string()
            }
            Err(_) => {
                warn!(user, timeout = ?self.config.turn_timeout, "Turn timed out");
                TIMEOUT_APOLOGY.to_string()
            }
        }
    }

    async fn run_turn(&self, user: &str, text: &str) -> Result<String, TurnError> {
        let mut messages = match self.store.load(user).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(user, error = %e, "Could not load history, starting fresh");
                Vec::new()
            }
        };
        messages.push(Message::user(text));

        let table = ToolTable::build(self.tools.tools());
        let system = system_prompt(Local::now().date_naive(), &table.specs);

        for iteration in 1..=self.config.max_iterations {
            let completion = self
                .model
                .complete(CompletionRequest {
                    system: &system,
                    messages: &messages,
                    tools: &table.specs,
                })
                .await?;

            let message = completion.into_message();
            let calls: Vec<(String, String, Value)> = message
                .tool_uses()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();
            messages.push(message);

            if calls.is_empty() {
                let reply = messages
                    .last()
                    .map(Message::text)
                    .filter(|reply| !reply.trim().is_empty())
                    .unwrap_or_else(|| EMPTY_REPLY.to_string());
                self.persist(user, messages).await;
                debug!(user, iteration, "Turn completed");
                return Ok(reply);
            }

            // One call at a time, in the order the model asked for them
            let mut results = Vec::with_capacity(calls.len());
            for (id, name, input) in calls {
                let result = self.execute(&table, &name, input).await;
                results.push(ContentBlock::ToolResult {
                    tool_use_id: id,
                    content: result.to_text(),
                    is_error: !result.is_success(),
                });
            }
            messages.push(Message {
                role: Role::User,
                content: results,
            });
        }

        Err(TurnError::IterationsExhausted(self.config.max_iterations))
    }

    async fn execute(&self, table: &ToolTable, function: &str, input: Value) -> ToolCallResult {
        let Some(qualified) = table.routes.get(function) else {
            warn!(function, "Model requested an unknown tool");
            return ToolCallResult::failure(format!("Tool '{}' not found", function));
        };

        let arguments = match input {
            Value::Object(arguments) => arguments,
            Value::Null => Arguments::new(),
            other => {
                return ToolCallResult::failure(format!(
                    "arguments for '{}' must be a JSON object, got {}",
                    qualified, other
                ))
            }
        };

        info!(tool = %qualified, "Calling tool");
        let result = self.tools.invoke(&qualified.to_string(), arguments).await;
        if !result.is_success() {
            warn!(tool = %qualified, error = ?result.error_message(), "Tool call failed");
        }
        result
    }

    async fn persist(&self, user: &str, mut messages: Vec<Message>) {
        trim_history(&mut messages, self.config.max_history);
        if let Err(e) = self.store.save(user, &messages).await {
            warn!(user, error = %e, "Could not save history");
        }
    }
}
