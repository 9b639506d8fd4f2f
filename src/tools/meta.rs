//! Meta Ads (Facebook/Instagram) tools over the Graph API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Map, Value};

use crate::config::MetaSettings;
use crate::protocol::{
    Arguments, ParameterSpec, ParameterType, ToolContent, ToolDescriptor, ToolError, ToolResult,
};
use crate::registry::{ToolKind, ToolSet};

use super::args::opt_str;
use super::format::{grouped, money, number};
use super::upstream::Upstream;

/// Date presets accepted by `get_ad_spend_by_period`, with their aliases.
const PERIOD_PRESETS: &[(&str, &str)] = &[
    ("today", "today"),
    ("yesterday", "yesterday"),
    ("last_7d", "last_7d"),
    ("last_30d", "last_30d"),
    ("week", "last_7d"),
    ("month", "last_30d"),
];

/// Tools of the `meta` server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaTool {
    /// Account-level spend for today.
    AdSpendToday,
    /// Account-level spend for a preset or explicit date range.
    AdSpendByPeriod,
    /// Today's spend and purchases per campaign.
    CampaignPerformance,
    /// Today's spend per ad set.
    AdsetPerformance,
    /// Account metadata.
    AdAccountInfo,
}

impl ToolKind for MetaTool {
    const ALL: &'static [Self] = &[
        MetaTool::AdSpendToday,
        MetaTool::AdSpendByPeriod,
        MetaTool::CampaignPerformance,
        MetaTool::AdsetPerformance,
        MetaTool::AdAccountInfo,
    ];

    fn name(self) -> &'static str {
        match self {
            MetaTool::AdSpendToday => "get_ad_spend_today",
            MetaTool::AdSpendByPeriod => "get_ad_spend_by_period",
            MetaTool::CampaignPerformance => "get_campaign_performance",
            MetaTool::AdsetPerformance => "get_adset_performance",
            MetaTool::AdAccountInfo => "get_ad_account_info",
        }
    }

    fn descriptor(self) -> ToolDescriptor {
        let descriptor = |description: &str| ToolDescriptor::new(self.name(), description);
        match self {
            MetaTool::AdSpendToday => descriptor(
                "Gasto publicitario de HOY en Meta Ads: gasto, impresiones, clics, CPC, CTR y alcance.",
            ),
            MetaTool::AdSpendByPeriod => descriptor(
                "Gasto publicitario por periodo. Usa start_date y end_date (YYYY-MM-DD) para rangos \
                 exactos, o period para presets (today, yesterday, last_7d, last_30d).",
            )
            .param(
                "period",
                ParameterSpec::optional(ParameterType::String, "Periodo predefinido")
                    .one_of(["today", "yesterday", "last_7d", "last_30d", "week", "month"]),
            )
            .param(
                "start_date",
                ParameterSpec::optional(ParameterType::String, "Fecha inicio YYYY-MM-DD"),
            )
            .param(
                "end_date",
                ParameterSpec::optional(ParameterType::String, "Fecha fin YYYY-MM-DD"),
            ),
            MetaTool::CampaignPerformance => descriptor(
                "Campañas activas y cómo van hoy: gasto, clics, compras y CPA. Ideal para decidir \
                 cuál apagar o escalar.",
            ),
            MetaTool::AdsetPerformance => descriptor("Rendimiento por conjunto de anuncios (adsets) de hoy."),
            MetaTool::AdAccountInfo => descriptor("Información general de la cuenta de Meta Ads."),
        }
    }
}

/// How an insights query selects dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateSelection {
    /// A Graph API `date_preset`.
    Preset(&'static str),
    /// An explicit inclusive range.
    Range {
        /// First day.
        since: NaiveDate,
        /// Last day.
        until: NaiveDate,
    },
}

impl DateSelection {
    fn query(&self) -> (&'static str, String) {
        match self {
            DateSelection::Preset(preset) => ("date_preset", (*preset).to_string()),
            DateSelection::Range { since, until } => (
                "time_range",
                json!({ "since": since.to_string(), "until": until.to_string() }).to_string(),
            ),
        }
    }
}

/// Resolve the period arguments into a date selection and a report label.
///
/// Explicit dates win over `period`; a lone `start_date` runs until
/// `today`; unknown presets fall back to today.
pub fn resolve_period(arguments: &Arguments, today: NaiveDate) -> ToolResult<(DateSelection, String)> {
    let tool = MetaTool::AdSpendByPeriod.name();
    let parse = |name: &str| -> ToolResult<Option<NaiveDate>> {
        opt_str(arguments, name)
            .map(|raw| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                    ToolError::invalid_argument(tool, format!("'{}' must be YYYY-MM-DD, got '{}'", name, raw))
                })
            })
            .transpose()
    };

    match (parse("start_date")?, parse("end_date")?) {
        (Some(since), Some(until)) => {
            if until < since {
                return Err(ToolError::invalid_argument(
                    tool,
                    "'end_date' is before 'start_date'",
                ));
            }
            let label = if since == until {
                since.to_string()
            } else {
                format!("{} a {}", since, until)
            };
            Ok((DateSelection::Range { since, until }, label))
        }
        (Some(since), None) => Ok((
            DateSelection::Range { since, until: today },
            format!("desde {}", since),
        )),
        _ => {
            let period = opt_str(arguments, "period").unwrap_or("today");
            let preset = PERIOD_PRESETS
                .iter()
                .find(|(alias, _)| *alias == period)
                .map(|(_, preset)| *preset)
                .unwrap_or("today");
            Ok((DateSelection::Preset(preset), period.to_uppercase()))
        }
    }
}

/// Normalize an ad account id to the `act_` form.
pub fn account_path(raw: &str) -> String {
    if raw.starts_with("act_") {
        raw.to_string()
    } else {
        format!("act_{}", raw)
    }
}

/// Purchases and leads reported in an insights `actions` array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Conversions {
    /// `purchase` or `omni_purchase` actions.
    pub purchases: u64,
    /// `lead` actions.
    pub leads: u64,
}

impl Conversions {
    /// Extract conversions from an insights row.
    pub fn from_row(row: &Value) -> Self {
        let mut conversions = Conversions::default();
        for action in row.get("actions").and_then(Value::as_array).into_iter().flatten() {
            let value = number(action.get("value")) as u64;
            match action.get("action_type").and_then(Value::as_str) {
                Some("purchase") | Some("omni_purchase") => conversions.purchases = value,
                Some("lead") => conversions.leads = value,
                _ => {}
            }
        }
        conversions
    }
}

/// Cost per result, when there were results.
fn cost_per(spend: f64, results: u64) -> Option<f64> {
    (results > 0).then(|| spend / results as f64)
}

/// Human-readable label of a Graph API `account_status` code.
pub fn account_status_label(code: i64) -> &'static str {
    match code {
        1 => "Activa",
        2 => "Deshabilitada",
        3 => "Sin configurar",
        7 => "Pendiente",
        _ => "Desconocido",
    }
}

/// Render an account-level insights row for a period.
pub fn period_report(label: &str, row: &Value) -> String {
    let spend = number(row.get("spend"));
    let conversions = Conversions::from_row(row);

    let mut report = format!(
        "META ADS ({}):\nGasto: ${}\nImpresiones: {}\nClics: {}",
        label,
        money(spend),
        grouped(number(row.get("impressions")) as u64),
        grouped(number(row.get("clicks")) as u64),
    );

    if let Some(cpa) = cost_per(spend, conversions.purchases) {
        report.push_str(&format!("\nCompras: {}\nCPA: ${}", conversions.purchases, money(cpa)));
    }
    if let Some(cpl) = cost_per(spend, conversions.leads) {
        report.push_str(&format!("\nLeads: {}\nCPL: ${}", conversions.leads, money(cpl)));
    }

    report
}

/// Handlers of the `meta` server.
pub struct MetaTools {
    settings: MetaSettings,
    upstream: Upstream,
}

impl MetaTools {
    /// Create the tool set.
    pub fn new(settings: MetaSettings, timeout: Duration) -> ToolResult<Self> {
        Ok(Self {
            settings,
            upstream: Upstream::new("Meta", timeout)?,
        })
    }

    fn credentials(&self) -> ToolResult<(&str, String)> {
        let token = self
            .settings
            .access_token
            .as_deref()
            .ok_or_else(|| ToolError::not_configured("Meta", "META_ACCESS_TOKEN is not set"))?;
        let account = self
            .settings
            .ad_account_id
            .as_deref()
            .ok_or_else(|| ToolError::not_configured("Meta", "META_AD_ACCOUNT_ID is not set"))?;
        Ok((token, account_path(account)))
    }

    async fn graph(&self, path: &str, query: &[(&str, String)]) -> ToolResult<Value> {
        let (token, _) = self.credentials()?;
        let url = format!("{}/{}", self.settings.graph_url.trim_end_matches('/'), path);
        let request = self
            .upstream
            .http()
            .get(url)
            .query(&[("access_token", token)])
            .query(query);
        self.upstream.send(request).await
    }

    async fn insights(&self, query: &[(&str, String)]) -> ToolResult<Vec<Value>> {
        let (_, account) = self.credentials()?;
        let body = self.graph(&format!("{}/insights", account), query).await?;
        Ok(body
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    async fn ad_spend_today(&self) -> ToolResult<ToolContent> {
        let today = Utc::now().date_naive();
        let rows = self
            .insights(&[
                ("date_preset", "today".to_string()),
                ("fields", "spend,impressions,clicks,cpc,ctr,reach".to_string()),
                ("level", "account".to_string()),
            ])
            .await?;

        let Some(row) = rows.first() else {
            return Ok(ToolContent::Text(format!(
                "META ADS HOY ({}):\nGasto: $0.00\nImpresiones: 0\nClics: 0\n\n\
                 (No hay datos o Meta no ha actualizado todavía)",
                today
            )));
        };

        Ok(ToolContent::Text(format!(
            "META ADS HOY ({}):\nGasto: ${}\nImpresiones: {}\nClics: {}\nCPC: ${:.2}\nCTR: {:.2}%\nAlcance: {}",
            today,
            money(number(row.get("spend"))),
            grouped(number(row.get("impressions")) as u64),
            grouped(number(row.get("clicks")) as u64),
            number(row.get("cpc")),
            number(row.get("ctr")),
            grouped(number(row.get("reach")) as u64),
        )))
    }

    async fn ad_spend_by_period(&self, arguments: &Arguments) -> ToolResult<ToolContent> {
        let (selection, label) = resolve_period(arguments, Utc::now().date_naive())?;
        let (key, value) = selection.query();
        let rows = self
            .insights(&[
                (key, value),
                ("fields", "spend,impressions,clicks,cpc,ctr,reach,actions".to_string()),
                ("level", "account".to_string()),
            ])
            .await?;

        let Some(row) = rows.first() else {
            return Ok(ToolContent::Text(format!(
                "META ADS ({}):\nSin datos para este periodo",
                label
            )));
        };

        Ok(ToolContent::Text(period_report(&label, row)))
    }

    async fn campaign_performance(&self) -> ToolResult<ToolContent> {
        let rows = self
            .insights(&[
                ("date_preset", "today".to_string()),
                ("fields", "campaign_name,spend,impressions,clicks,cpc,actions".to_string()),
                ("level", "campaign".to_string()),
                ("limit", "50".to_string()),
            ])
            .await?;

        if rows.is_empty() {
            return Ok(ToolContent::Text("No hay campañas activas con gasto hoy.".to_string()));
        }

        let mut report = String::from("RENDIMIENTO POR CAMPAÑA (HOY):\n");
        for row in &rows {
            let spend = number(row.get("spend"));
            let purchases = Conversions::from_row(row).purchases;
            let cpa = cost_per(spend, purchases)
                .map(|cpa| format!("${}", money(cpa)))
                .unwrap_or_else(|| "N/A".to_string());
            report.push_str(&format!(
                "\n{}\n  Gasto: ${}\n  Clics: {}\n  Compras: {}\n  CPA: {}\n",
                row.get("campaign_name").and_then(Value::as_str).unwrap_or("Sin nombre"),
                money(spend),
                number(row.get("clicks")) as u64,
                purchases,
                cpa,
            ));
        }
        Ok(ToolContent::Text(report))
    }

    async fn adset_performance(&self) -> ToolResult<ToolContent> {
        let rows = self
            .insights(&[
                ("date_preset", "today".to_string()),
                ("fields", "adset_name,campaign_name,spend,impressions,clicks,actions".to_string()),
                ("level", "adset".to_string()),
                ("limit", "50".to_string()),
            ])
            .await?;

        if rows.is_empty() {
            return Ok(ToolContent::Text("No hay adsets activos con gasto hoy.".to_string()));
        }

        let mut report = String::from("RENDIMIENTO POR ADSET (HOY):\n");
        for row in &rows {
            report.push_str(&format!(
                "\n{}\n  Campaña: {}\n  Gasto: ${}\n  Impresiones: {}\n",
                row.get("adset_name").and_then(Value::as_str).unwrap_or("Sin nombre"),
                row.get("campaign_name").and_then(Value::as_str).unwrap_or("N/A"),
                money(number(row.get("spend"))),
                grouped(number(row.get("impressions")) as u64),
            ));
        }
        Ok(ToolContent::Text(report))
    }

    async fn ad_account_info(&self) -> ToolResult<ToolContent> {
        let (_, account) = self.credentials()?;
        let data = self
            .graph(
                &account,
                &[(
                    "fields",
                    "name,account_status,currency,timezone_name,amount_spent,balance,spend_cap".to_string(),
                )],
            )
            .await?;

        let text = |field: &str| data.get(field).and_then(Value::as_str).unwrap_or("N/A").to_string();
        let status = account_status_label(data.get("account_status").and_then(Value::as_i64).unwrap_or(0));
        // amount_spent is reported in cents
        let amount_spent = number(data.get("amount_spent")) / 100.0;

        Ok(ToolContent::Text(format!(
            "CUENTA DE META ADS:\nNombre: {}\nEstado: {}\nMoneda: {}\nZona horaria: {}\nGastado total: ${}\nID: {}",
            text("name"),
            status,
            text("currency"),
            text("timezone_name"),
            money(amount_spent),
            account,
        )))
    }
}

#[async_trait]
impl ToolSet for MetaTools {
    type Tool = MetaTool;

    fn server_name(&self) -> &str {
        "meta"
    }

    async fn call(&self, tool: MetaTool, arguments: &Arguments) -> ToolResult<ToolContent> {
        match tool {
            MetaTool::AdSpendToday => self.ad_spend_today().await,
            MetaTool::AdSpendByPeriod => self.ad_spend_by_period(arguments).await,
            MetaTool::CampaignPerformance => self.campaign_performance().await,
            MetaTool::AdsetPerformance => self.adset_performance().await,
            MetaTool::AdAccountInfo => self.ad_account_info().await,
        }
    }

    fn diagnostics(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("graph_url".to_string(), json!(self.settings.graph_url));
        fields.insert(
            "access_token_configured".to_string(),
            json!(self.settings.access_token.is_some()),
        );
        fields.insert(
            "ad_account_configured".to_string(),
            json!(self.settings.ad_account_id.is_some()),
        );
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap_or_default()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_account_path() {
        assert_eq!(account_path("123"), "act_123");
        assert_eq!(account_path("act_123"), "act_123");
    }

    #[test]
    fn test_resolve_period_explicit_range() {
        let today = day("2025-11-20");
        let (selection, label) = resolve_period(
            &args(json!({"start_date": "2025-11-01", "end_date": "2025-11-15", "period": "today"})),
            today,
        )
        .unwrap();

        assert_eq!(
            selection,
            DateSelection::Range {
                since: day("2025-11-01"),
                until: day("2025-11-15")
            }
        );
        assert_eq!(label, "2025-11-01 a 2025-11-15");
        assert_eq!(selection.query().0, "time_range");
    }

    #[test]
    fn test_resolve_period_open_range_and_presets() {
        let today = day("2025-11-20");

        let (selection, label) =
            resolve_period(&args(json!({"start_date": "2025-11-10"})), today).unwrap();
        assert_eq!(
            selection,
            DateSelection::Range {
                since: day("2025-11-10"),
                until: today
            }
        );
        assert_eq!(label, "desde 2025-11-10");

        let (selection, label) = resolve_period(&args(json!({"period": "week"})), today).unwrap();
        assert_eq!(selection, DateSelection::Preset("last_7d"));
        assert_eq!(label, "WEEK");

        let (selection, _) = resolve_period(&args(json!({})), today).unwrap();
        assert_eq!(selection, DateSelection::Preset("today"));
    }

    #[test]
    fn test_resolve_period_rejects_bad_dates() {
        let today = day("2025-11-20");
        assert!(resolve_period(&args(json!({"start_date": "11/01/2025"})), today).is_err());
        assert!(resolve_period(
            &args(json!({"start_date": "2025-11-10", "end_date": "2025-11-01"})),
            today
        )
        .is_err());
    }

    #[test]
    fn test_conversions() {
        let row = json!({
            "actions": [
                {"action_type": "link_click", "value": "40"},
                {"action_type": "omni_purchase", "value": "4"},
                {"action_type": "lead", "value": "2"}
            ]
        });
        assert_eq!(
            Conversions::from_row(&row),
            Conversions {
                purchases: 4,
                leads: 2
            }
        );
        assert_eq!(Conversions::from_row(&json!({})), Conversions::default());
    }

    #[test]
    fn test_period_report() {
        let row = json!({
            "spend": "120.00",
            "impressions": "15000",
            "clicks": "300",
            "actions": [{"action_type": "purchase", "value": "4"}]
        });

        let report = period_report("LAST_7D", &row);
        assert!(report.contains("Gasto: $120.00"));
        assert!(report.contains("Impresiones: 15,000"));
        assert!(report.contains("CPA: $30.00"));
        assert!(!report.contains("CPL"));
    }

    #[test]
    fn test_account_status_label() {
        assert_eq!(account_status_label(1), "Activa");
        assert_eq!(account_status_label(7), "Pendiente");
        assert_eq!(account_status_label(99), "Desconocido");
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let tools = MetaTools::new(MetaSettings::default(), Duration::from_secs(1)).unwrap();
        let result = tools.call(MetaTool::AdSpendToday, &Map::new()).await;
        assert!(matches!(result, Err(ToolError::NotConfigured { .. })));
    }
}
