//! Chart rendering tools backed by an n8n workflow and QuickChart.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::config::ChartSettings;
use crate::protocol::{
    Arguments, ParameterSpec, ParameterType, ToolContent, ToolDescriptor, ToolError, ToolResult,
};
use crate::registry::{ToolKind, ToolSet};

use super::args::{opt_str, req_array, req_str};
use super::upstream::Upstream;

/// Chart types the workflow can render.
pub const CHART_TYPES: &[&str] = &["bar", "line", "pie", "doughnut"];

/// Dataset colors for comparison charts, cycled per series.
const SERIES_COLORS: &[&str] = &["#4CAF50", "#2196F3", "#FF9800", "#f44336", "#9C27B0", "#00BCD4"];

/// Tools of the `chart` server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartTool {
    /// Single-series chart rendered by the n8n workflow.
    GenerateChart,
    /// Multi-series bar chart rendered as a QuickChart URL.
    GenerateComparisonChart,
}

impl ToolKind for ChartTool {
    const ALL: &'static [Self] = &[ChartTool::GenerateChart, ChartTool::GenerateComparisonChart];

    fn name(self) -> &'static str {
        match self {
            ChartTool::GenerateChart => "generate_chart",
            ChartTool::GenerateComparisonChart => "generate_comparison_chart",
        }
    }

    fn descriptor(self) -> ToolDescriptor {
        match self {
            ChartTool::GenerateChart => ToolDescriptor::new(
                self.name(),
                "Genera un gráfico (barras, líneas, pastel, dona) y devuelve la URL de la imagen. \
                 Útil para visualizar ventas, gastos y comparativas.",
            )
            .param(
                "tipo",
                ParameterSpec::required(ParameterType::String, "Tipo de gráfico")
                    .one_of(CHART_TYPES.iter().copied()),
            )
            .param(
                "titulo",
                ParameterSpec::required(ParameterType::String, "Título del gráfico"),
            )
            .param(
                "labels",
                ParameterSpec::required(ParameterType::Array, "Etiquetas del eje X o categorías")
                    .of(ParameterType::String),
            )
            .param(
                "valores",
                ParameterSpec::required(ParameterType::Array, "Valor numérico de cada etiqueta")
                    .of(ParameterType::Number),
            ),
            ChartTool::GenerateComparisonChart => ToolDescriptor::new(
                self.name(),
                "Genera un gráfico comparativo con varias series (ej: ventas vs gastos).",
            )
            .param(
                "titulo",
                ParameterSpec::required(ParameterType::String, "Título del gráfico"),
            )
            .param(
                "labels",
                ParameterSpec::required(ParameterType::Array, "Etiquetas del eje X")
                    .of(ParameterType::String),
            )
            .param(
                "series",
                ParameterSpec::required(
                    ParameterType::Array,
                    "Series de datos; cada una con 'nombre' y 'valores'",
                )
                .of(ParameterType::Object),
            ),
        }
    }
}

/// Payload posted to the chart workflow.
#[derive(Debug, Serialize)]
struct ChartRequest<'a> {
    tipo: &'a str,
    titulo: &'a str,
    labels: Vec<String>,
    valores: Vec<f64>,
}

/// One series of a comparison chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Legend label.
    pub name: String,
    /// One value per label.
    pub values: Vec<f64>,
}

/// Handlers of the `chart` server.
pub struct ChartTools {
    settings: ChartSettings,
    upstream: Upstream,
}

impl ChartTools {
    /// Create the tool set.
    pub fn new(settings: ChartSettings, timeout: Duration) -> ToolResult<Self> {
        Ok(Self {
            settings,
            upstream: Upstream::new("n8n", timeout)?,
        })
    }

    async fn generate_chart(&self, arguments: &Arguments) -> ToolResult<ToolContent> {
        let tool = ChartTool::GenerateChart.name();
        let tipo = opt_str(arguments, "tipo").unwrap_or("bar");
        if !CHART_TYPES.contains(&tipo) {
            return Err(ToolError::invalid_argument(
                tool,
                format!("'tipo' must be one of {}", CHART_TYPES.join(", ")),
            ));
        }
        let titulo = req_str(arguments, tool, "titulo")?;
        let labels = string_items(req_array(arguments, tool, "labels")?);
        let valores = number_items(tool, "valores", req_array(arguments, tool, "valores")?)?;
        check_lengths(tool, labels.len(), valores.len())?;

        let webhook = self.settings.webhook().ok_or_else(|| {
            ToolError::not_configured("n8n", "set N8N_BASE_URL or N8N_WEBHOOK_GRAFICO")
        })?;

        let payload = ChartRequest {
            tipo,
            titulo,
            labels,
            valores,
        };
        let reply = self
            .upstream
            .send(self.upstream.http().post(&webhook).json(&payload))
            .await?;

        let image_url = match (reply.get("success").and_then(Value::as_bool), reply.get("image_url").and_then(Value::as_str)) {
            (Some(true), Some(url)) => url.to_string(),
            _ => {
                return Err(ToolError::upstream(
                    self.upstream.service(),
                    format!("chart workflow returned no image: {}", reply),
                ))
            }
        };

        info!(tipo, titulo, "Chart generated");
        Ok(ToolContent::Text(format!(
            "GRÁFICO GENERADO\n\nTítulo: {}\nTipo: {}\nVer gráfico: {}",
            titulo, tipo, image_url
        )))
    }

    fn generate_comparison_chart(&self, arguments: &Arguments) -> ToolResult<ToolContent> {
        let tool = ChartTool::GenerateComparisonChart.name();
        let titulo = req_str(arguments, tool, "titulo")?;
        let labels = string_items(req_array(arguments, tool, "labels")?);
        let raw_series = req_array(arguments, tool, "series")?;

        if labels.is_empty() || raw_series.is_empty() {
            return Err(ToolError::invalid_argument(
                tool,
                "'labels' and 'series' must not be empty",
            ));
        }

        let series = raw_series
            .iter()
            .enumerate()
            .map(|(i, raw)| parse_series(tool, i, raw))
            .collect::<ToolResult<Vec<_>>>()?;

        let url = comparison_chart_url(&self.settings.quickchart_url, titulo, &labels, &series);
        let listing: Vec<String> = series
            .iter()
            .map(|s| format!("  - {}: {:?}", s.name, s.values))
            .collect();

        Ok(ToolContent::Text(format!(
            "GRÁFICO COMPARATIVO GENERADO\n\nTítulo: {}\nSeries:\n{}\n\nVer gráfico: {}",
            titulo,
            listing.join("\n"),
            url
        )))
    }
}

#[async_trait]
impl ToolSet for ChartTools {
    type Tool = ChartTool;

    fn server_name(&self) -> &str {
        "chart"
    }

    async fn call(&self, tool: ChartTool, arguments: &Arguments) -> ToolResult<ToolContent> {
        match tool {
            ChartTool::GenerateChart => self.generate_chart(arguments).await,
            ChartTool::GenerateComparisonChart => self.generate_comparison_chart(arguments),
        }
    }

    fn diagnostics(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("webhook_configured".to_string(), json!(self.settings.webhook().is_some()));
        fields.insert("quickchart_url".to_string(), json!(self.settings.quickchart_url));
        fields
    }
}

fn string_items(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

fn number_items(tool: &str, name: &str, items: &[Value]) -> ToolResult<Vec<f64>> {
    items
        .iter()
        .map(|item| {
            item.as_f64()
                .or_else(|| item.as_str().and_then(|s| s.trim().parse().ok()))
                .ok_or_else(|| {
                    ToolError::invalid_argument(tool, format!("'{}' must contain only numbers", name))
                })
        })
        .collect()
}

/// Labels and values must pair up one to one.
fn check_lengths(tool: &str, labels: usize, values: usize) -> ToolResult<()> {
    if labels == 0 || values == 0 {
        return Err(ToolError::invalid_argument(
            tool,
            "'labels' and 'valores' must not be empty",
        ));
    }
    if labels != values {
        return Err(ToolError::invalid_argument(
            tool,
            format!(
                "'labels' has {} items but 'valores' has {}; they must match",
                labels, values
            ),
        ));
    }
    Ok(())
}

fn parse_series(tool: &str, index: usize, raw: &Value) -> ToolResult<Series> {
    let name = raw
        .get("nombre")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| format!("Serie {}", index + 1));
    let values = match raw.get("valores") {
        Some(Value::Array(items)) => number_items(tool, "valores", items)?,
        None | Some(Value::Null) => Vec::new(),
        Some(_) => {
            return Err(ToolError::invalid_argument(
                tool,
                format!("series '{}' has non-array 'valores'", name),
            ))
        }
    };
    Ok(Series { name, values })
}

/// Build a QuickChart URL for a multi-series bar chart.
pub fn comparison_chart_url(base: &str, title: &str, labels: &[String], series: &[Series]) -> String {
    let datasets: Vec<Value> = series
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let color = SERIES_COLORS[i % SERIES_COLORS.len()];
            json!({
                "label": s.name,
                "data": s.values,
                "backgroundColor": color,
                "borderColor": color,
                "borderWidth": 2,
                "fill": false,
            })
        })
        .collect();

    let config = json!({
        "type": "bar",
        "data": { "labels": labels, "datasets": datasets },
        "options": {
            "plugins": {
                "title": { "display": true, "text": title, "font": { "size": 18 } },
                "legend": { "display": true },
            }
        }
    });

    format!(
        "{}?c={}&w=600&h=400&bkg=white",
        base,
        urlencoding::encode(&config.to_string())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolRegistry;

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap_or_default()
    }

    fn tools() -> ChartTools {
        ChartTools::new(ChartSettings::default(), Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_registry_table() {
        let registry = ToolRegistry::<ChartTool>::new().unwrap();
        assert_eq!(
            registry.tool_names(),
            vec!["generate_chart", "generate_comparison_chart"]
        );
        let chart = registry.get("generate_chart").unwrap();
        let required: Vec<&str> = chart.descriptor().required_parameters().collect();
        assert_eq!(required, vec!["labels", "tipo", "titulo", "valores"]);
    }

    #[test]
    fn test_check_lengths() {
        assert!(check_lengths("generate_chart", 3, 3).is_ok());

        let err = check_lengths("generate_chart", 3, 2).unwrap_err();
        assert!(err.to_string().contains("3"));
        assert!(err.to_string().contains("2"));

        assert!(check_lengths("generate_chart", 0, 0).is_err());
    }

    #[tokio::test]
    async fn test_mismatch_rejected_before_network() {
        let result = tools()
            .call(
                ChartTool::GenerateChart,
                &args(json!({"tipo": "bar", "titulo": "T", "labels": ["A", "B", "C"], "valores": [1, 2]})),
            )
            .await;

        assert!(matches!(result, Err(ToolError::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn test_unknown_chart_type() {
        let result = tools()
            .call(
                ChartTool::GenerateChart,
                &args(json!({"tipo": "radar", "titulo": "T", "labels": ["A"], "valores": [1]})),
            )
            .await;

        assert!(matches!(result, Err(ToolError::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn test_unconfigured_webhook() {
        let result = tools()
            .call(
                ChartTool::GenerateChart,
                &args(json!({"tipo": "pie", "titulo": "T", "labels": ["A"], "valores": [1]})),
            )
            .await;

        assert!(matches!(result, Err(ToolError::NotConfigured { .. })));
    }

    #[tokio::test]
    async fn test_comparison_chart() {
        let content = tools()
            .call(
                ChartTool::GenerateComparisonChart,
                &args(json!({
                    "titulo": "Ventas vs Gastos",
                    "labels": ["Ene", "Feb"],
                    "series": [
                        {"nombre": "Ventas", "valores": [100, 200]},
                        {"valores": [50, 60]}
                    ]
                })),
            )
            .await
            .unwrap();

        let text = content.to_text();
        assert!(text.contains("https://quickchart.io/chart?c="));
        assert!(text.contains("Serie 2"));
        assert!(text.contains("&w=600&h=400&bkg=white"));
    }

    #[test]
    fn test_comparison_url_encodes_config() {
        let url = comparison_chart_url(
            "https://quickchart.io/chart",
            "Mes actual",
            &["A".to_string()],
            &[Series {
                name: "Ventas".to_string(),
                values: vec![1.0],
            }],
        );

        assert!(!url.contains(' '));
        assert!(!url.contains('{'));
        assert!(url.contains("%234CAF50"));
    }
}
