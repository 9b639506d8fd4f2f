//! Agent loop against a real chart tool server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::net::TcpListener;

use cerebro::agent::{
    Agent, AgentConfig, Completion, CompletionRequest, ContentBlock, ConversationStore,
    FileConversationStore, InMemoryConversationStore, LanguageModel, LlmResult, StopReason,
};
use cerebro::aggregator::ToolAggregator;
use cerebro::client::RemoteServerHandle;
use cerebro::config::ChartSettings;
use cerebro::server::{router, ToolServer};
use cerebro::tools::ChartTools;

/// Replays completions in order and records the tool names it was offered.
struct ScriptedModel {
    replies: Mutex<VecDeque<Completion>>,
    offered: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Completion>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            offered: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest<'_>) -> LlmResult<Completion> {
        let mut offered = self.offered.lock().unwrap();
        offered.clear();
        offered.extend(request.tools.iter().map(|tool| tool.name.clone()));
        Ok(self.replies.lock().unwrap().pop_front().unwrap())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Never answers within any reasonable turn timeout.
struct SlowModel;

#[async_trait]
impl LanguageModel for SlowModel {
    async fn complete(&self, _request: CompletionRequest<'_>) -> LlmResult<Completion> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Completion {
            content: vec![ContentBlock::text("tarde")],
            stop_reason: Some(StopReason::EndTurn),
        })
    }

    fn model_name(&self) -> &str {
        "slow"
    }
}

async fn chart_aggregator() -> Arc<ToolAggregator> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let tools = ChartTools::new(ChartSettings::default(), Duration::from_secs(5)).unwrap();
    let app = router(ToolServer::new(tools).unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let aggregator = ToolAggregator::new(Duration::from_secs(5));
    aggregator
        .register_server(RemoteServerHandle::new("chart", format!("http://{}", addr)))
        .await
        .unwrap();
    Arc::new(aggregator)
}

fn tool_use(id: &str, name: &str, input: serde_json::Value) -> ContentBlock {
    ContentBlock::ToolUse {
        id: id.to_string(),
        name: name.to_string(),
        input,
    }
}

#[tokio::test]
async fn test_tool_calls_run_in_order_and_history_is_saved() {
    let aggregator = chart_aggregator().await;
    let model = Arc::new(ScriptedModel::new(vec![
        Completion {
            content: vec![
                ContentBlock::text("Armando el gráfico"),
                tool_use(
                    "toolu_1",
                    "chart_generate_comparison_chart",
                    json!({
                        "titulo": "Ventas vs gastos",
                        "labels": ["Ene", "Feb"],
                        "series": [
                            {"nombre": "Ventas", "valores": [100, 150]},
                            {"nombre": "Gastos", "valores": [40, 60]},
                        ],
                    }),
                ),
                tool_use("toolu_2", "chart_generate_chart", json!({"tipo": "bar"})),
            ],
            stop_reason: Some(StopReason::ToolUse),
        },
        Completion {
            content: vec![ContentBlock::text("Aquí tienes tu comparativa.")],
            stop_reason: Some(StopReason::EndTurn),
        },
    ]));

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileConversationStore::new(dir.path()).unwrap());
    let agent = Agent::new(
        model.clone(),
        aggregator,
        store.clone(),
        AgentConfig::default(),
    );

    let reply = agent
        .process_message("whatsapp:+50255551234", "compara ventas y gastos")
        .await;
    assert_eq!(reply, "Aquí tienes tu comparativa.");

    let offered = model.offered.lock().unwrap().clone();
    assert_eq!(
        offered,
        vec!["chart_generate_chart", "chart_generate_comparison_chart"]
    );

    let history = store.load("whatsapp:+50255551234").await.unwrap();
    assert_eq!(history.len(), 4);

    let results: Vec<(&str, bool, &str)> = history[2]
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => Some((tool_use_id.as_str(), *is_error, content.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "toolu_1");
    assert!(!results[0].1);
    assert!(results[0].2.contains("quickchart.io"));
    assert_eq!(results[1].0, "toolu_2");
    assert!(results[1].1);
    assert!(results[1].2.contains("missing required parameter"));
}

#[tokio::test]
async fn test_history_carries_into_next_turn() {
    let aggregator = chart_aggregator().await;
    let model = Arc::new(ScriptedModel::new(vec![
        Completion {
            content: vec![ContentBlock::text("Hola, ¿en qué te ayudo?")],
            stop_reason: Some(StopReason::EndTurn),
        },
        Completion {
            content: vec![ContentBlock::text("Claro.")],
            stop_reason: Some(StopReason::EndTurn),
        },
    ]));
    let store = Arc::new(InMemoryConversationStore::new());
    let agent = Agent::new(model, aggregator, store.clone(), AgentConfig::default());

    agent.process_message("u1", "hola").await;
    agent.process_message("u1", "¿y ayer?").await;

    let history = store.load("u1").await.unwrap();
    let texts: Vec<String> = history.iter().map(|m| m.text()).collect();
    assert_eq!(texts, vec!["hola", "Hola, ¿en qué te ayudo?", "¿y ayer?", "Claro."]);
    assert!(store.load("u2").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_timed_out_turn_is_not_persisted() {
    let aggregator = chart_aggregator().await;
    let store = Arc::new(InMemoryConversationStore::new());
    let config = AgentConfig {
        turn_timeout: Duration::from_millis(100),
        ..AgentConfig::default()
    };
    let agent = Agent::new(Arc::new(SlowModel), aggregator, store.clone(), config);

    let reply = agent.process_message("u1", "¿cuánto vendí hoy?").await;

    assert!(reply.starts_with("Lo siento"));
    assert!(reply.contains("tardó demasiado"));
    assert!(store.load("u1").await.unwrap().is_empty());
}
