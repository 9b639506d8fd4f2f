//! Aggregator against real tool servers on loopback.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use cerebro::aggregator::ToolAggregator;
use cerebro::client::{RemoteServerHandle, RemoteToolClient};
use cerebro::config::ChartSettings;
use cerebro::protocol::Arguments;
use cerebro::server::{router, ToolServer};
use cerebro::tools::ChartTools;

struct Running {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Running {
    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    async fn shutdown(self) {
        let _ = self.stop.send(());
        let _ = self.task.await;
    }
}

async fn spawn(app: Router) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stopped.await;
            })
            .await
            .unwrap();
    });
    Running { addr, stop, task }
}

/// Stand-in for the n8n chart workflow.
async fn spawn_chart_workflow(hits: Arc<AtomicUsize>) -> Running {
    let app = Router::new().route(
        "/webhook/grafico",
        post(move |Json(body): Json<Value>| {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Json(json!({
                    "success": true,
                    "image_url": format!("https://charts.example.com/{}.png", body["tipo"].as_str().unwrap_or("x")),
                }))
            }
        }),
    );
    spawn(app).await
}

async fn spawn_chart_server(n8n_base_url: Option<String>) -> Running {
    let settings = ChartSettings {
        n8n_base_url,
        ..ChartSettings::default()
    };
    let tools = ChartTools::new(settings, Duration::from_secs(5)).unwrap();
    spawn(router(ToolServer::new(tools).unwrap())).await
}

fn args(value: Value) -> Arguments {
    value.as_object().cloned().unwrap()
}

fn chart_args() -> Arguments {
    args(json!({
        "tipo": "bar",
        "titulo": "Ventas de la semana",
        "labels": ["Lun", "Mar", "Mié"],
        "valores": [120.5, 98, 143],
    }))
}

#[tokio::test]
async fn test_chart_call_through_aggregator() {
    let hits = Arc::new(AtomicUsize::new(0));
    let workflow = spawn_chart_workflow(hits.clone()).await;
    let chart = spawn_chart_server(Some(workflow.url())).await;

    let aggregator = ToolAggregator::new(Duration::from_secs(5));
    aggregator
        .register_server(RemoteServerHandle::new("chart", chart.url()))
        .await
        .unwrap();

    let names: Vec<String> = aggregator
        .list_all_tools()
        .iter()
        .map(|(name, _)| name.to_string())
        .collect();
    assert_eq!(
        names,
        vec!["chart.generate_chart", "chart.generate_comparison_chart"]
    );

    let result = aggregator.invoke("chart.generate_chart", chart_args()).await;
    assert!(result.is_success(), "unexpected failure: {}", result);
    let text = result.to_text();
    assert!(text.contains("https://charts.example.com/bar.png"));
    assert!(text.contains("Ventas de la semana"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    chart.shutdown().await;
    workflow.shutdown().await;
}

#[tokio::test]
async fn test_length_mismatch_is_failure_without_upstream_call() {
    let hits = Arc::new(AtomicUsize::new(0));
    let workflow = spawn_chart_workflow(hits.clone()).await;
    let chart = spawn_chart_server(Some(workflow.url())).await;

    let aggregator = ToolAggregator::new(Duration::from_secs(5));
    aggregator
        .register_server(RemoteServerHandle::new("chart", chart.url()))
        .await
        .unwrap();

    let mut arguments = chart_args();
    arguments.insert("valores".to_string(), json!([1, 2]));
    let result = aggregator.invoke("chart.generate_chart", arguments).await;

    assert!(!result.is_success());
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    chart.shutdown().await;
    workflow.shutdown().await;
}

#[tokio::test]
async fn test_missing_parameter_and_unknown_tool() {
    let chart = spawn_chart_server(None).await;

    let aggregator = ToolAggregator::new(Duration::from_secs(5));
    aggregator
        .register_server(RemoteServerHandle::new("chart", chart.url()))
        .await
        .unwrap();

    let result = aggregator
        .invoke("chart.generate_chart", args(json!({"tipo": "bar"})))
        .await;
    assert!(result
        .error_message()
        .unwrap()
        .contains("missing required parameter"));

    let result = aggregator.invoke("chart.render_map", Arguments::new()).await;
    assert!(!result.is_success());

    let result = aggregator.invoke("nochart", Arguments::new()).await;
    assert!(!result.is_success());

    chart.shutdown().await;
}

#[tokio::test]
async fn test_stopped_server_is_service_unavailable() {
    let chart = spawn_chart_server(None).await;

    let aggregator = ToolAggregator::new(Duration::from_secs(5));
    aggregator
        .register_server(RemoteServerHandle::new("chart", chart.url()))
        .await
        .unwrap();
    assert_eq!(aggregator.list_all_tools().len(), 2);

    chart.shutdown().await;

    let result = aggregator
        .invoke(
            "chart.generate_comparison_chart",
            args(json!({
                "titulo": "Ventas vs gastos",
                "labels": ["Ene"],
                "series": [{"nombre": "Ventas", "valores": [10]}],
            })),
        )
        .await;
    let message = result.error_message().unwrap();
    assert!(message.contains("service unavailable"), "{}", message);

    // The cached list survives the outage
    assert_eq!(aggregator.list_all_tools().len(), 2);
    let health = aggregator.health().await;
    assert_eq!(health.len(), 1);
    assert!(!health[0].healthy);
}

#[tokio::test]
async fn test_same_tool_name_on_two_servers_stays_distinct() {
    let first = spawn_chart_server(None).await;
    let second = spawn_chart_server(None).await;

    let aggregator = ToolAggregator::new(Duration::from_secs(5));
    aggregator
        .register_server(RemoteServerHandle::new("chart", first.url()))
        .await
        .unwrap();
    aggregator
        .register_server(RemoteServerHandle::new("graficos", second.url()))
        .await
        .unwrap();

    let names: Vec<String> = aggregator
        .list_all_tools()
        .iter()
        .map(|(name, _)| name.to_string())
        .collect();
    assert_eq!(names.len(), 4);
    assert!(names.contains(&"chart.generate_comparison_chart".to_string()));
    assert!(names.contains(&"graficos.generate_comparison_chart".to_string()));

    let comparison = args(json!({
        "titulo": "Ventas vs gastos",
        "labels": ["Ene", "Feb"],
        "series": [
            {"nombre": "Ventas", "valores": [10, 20]},
            {"nombre": "Gastos", "valores": [5, 8]},
        ],
    }));
    for server in ["chart", "graficos"] {
        let result = aggregator
            .invoke(&format!("{}.generate_comparison_chart", server), comparison.clone())
            .await;
        assert!(result.is_success(), "{} failed: {}", server, result);
        assert!(result.to_text().contains("quickchart.io"));
    }

    first.shutdown().await;
    second.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_server_registers_with_no_tools() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let aggregator = ToolAggregator::new(Duration::from_secs(2));
    aggregator
        .register_server(RemoteServerHandle::new("meta", format!("http://{}", addr)))
        .await
        .unwrap();

    assert_eq!(aggregator.server_ids(), vec!["meta".to_string()]);
    assert!(aggregator.list_all_tools().is_empty());
    assert_eq!(aggregator.refresh_all().await, 0);

    let result = aggregator
        .invoke("meta.get_ad_spend_today", Arguments::new())
        .await;
    assert!(result.error_message().unwrap().contains("service unavailable"));
}

#[tokio::test]
async fn test_refresh_returns_tools_in_server_order() {
    let chart = spawn_chart_server(None).await;
    let client =
        RemoteToolClient::new(RemoteServerHandle::new("chart", chart.url()), Duration::from_secs(5))
            .unwrap();

    let snapshot = client.refresh_tools().await.unwrap();
    let names: Vec<&str> = snapshot.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["generate_chart", "generate_comparison_chart"]);
    assert!(snapshot.refreshed_at.is_some());
    assert_eq!(client.cached_tools().len(), 2);

    chart.shutdown().await;
}

#[tokio::test]
async fn test_hung_server_fails_within_call_timeout() {
    // Answers the tool list but never finishes a call
    let app = Router::new()
        .route("/tools", get(|| async { Json(json!({"tools": []})) }))
        .route(
            "/call",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Json(json!({"success": true, "content": "tarde"}))
            }),
        );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let timeout = Duration::from_millis(500);
    let aggregator = ToolAggregator::new(timeout);
    aggregator
        .register_server(RemoteServerHandle::new("lento", format!("http://{}", addr)))
        .await
        .unwrap();

    let started = Instant::now();
    let result = aggregator
        .invoke("lento.get_dropi_wallet", Arguments::new())
        .await;
    let elapsed = started.elapsed();

    let message = result.error_message().unwrap();
    assert!(message.contains("service unavailable"), "{}", message);
    assert!(elapsed >= Duration::from_millis(450), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5), "returned after {:?}", elapsed);
}
