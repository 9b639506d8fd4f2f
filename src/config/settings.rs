//! Process settings assembled from environment variables.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::aggregator::AggregatorConfig;
use crate::client::RemoteServerHandle;

use super::Configuration;

/// Default LLM model.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default port of the agent front end.
pub const DEFAULT_AGENT_PORT: u16 = 8000;

/// Default port of a tool server.
pub const DEFAULT_TOOL_SERVER_PORT: u16 = 3000;

/// Dropi platform per country code.
const DROPI_DOMAINS: &[(&str, &str)] = &[
    ("gt", "https://app.dropi.gt"),
    ("co", "https://app.dropi.co"),
    ("mx", "https://app.dropi.mx"),
    ("cl", "https://app.dropi.cl"),
    ("pe", "https://app.dropi.pe"),
    ("ec", "https://app.dropi.ec"),
];

/// Agent loop settings.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Anthropic API key; required to run the agent.
    pub anthropic_api_key: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Maximum LLM round trips per turn.
    pub max_iterations: usize,
    /// Maximum stored messages per conversation.
    pub max_history: usize,
    /// Upper bound on a whole turn.
    pub turn_timeout: Duration,
    /// Directory of the file conversation store; in-memory when unset.
    pub conversation_dir: Option<PathBuf>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_iterations: 10,
            max_history: 40,
            turn_timeout: Duration::from_secs(90),
            conversation_dir: None,
        }
    }
}

/// Messaging provider settings.
#[derive(Debug, Clone, Default)]
pub struct TwilioSettings {
    /// Account SID.
    pub account_sid: Option<String>,
    /// Auth token; enables webhook signature validation.
    pub auth_token: Option<String>,
    /// Sender number.
    pub whatsapp_number: Option<String>,
    /// Public webhook URL used in signature computation.
    pub public_webhook_url: Option<String>,
}

/// Meta Ads tool set settings.
#[derive(Debug, Clone)]
pub struct MetaSettings {
    /// Graph API access token.
    pub access_token: Option<String>,
    /// Ad account id, with or without the `act_` prefix.
    pub ad_account_id: Option<String>,
    /// Graph API base URL including version.
    pub graph_url: String,
}

impl Default for MetaSettings {
    fn default() -> Self {
        Self {
            access_token: None,
            ad_account_id: None,
            graph_url: "https://graph.facebook.com/v19.0".to_string(),
        }
    }
}

/// Shopify tool set settings.
#[derive(Debug, Clone)]
pub struct ShopifySettings {
    /// Shop domain (e.g., "mystore.myshopify.com") or full base URL.
    pub shop_domain: Option<String>,
    /// Admin API access token.
    pub access_token: Option<String>,
    /// Admin API version.
    pub api_version: String,
}

impl Default for ShopifySettings {
    fn default() -> Self {
        Self {
            shop_domain: None,
            access_token: None,
            api_version: "2024-01".to_string(),
        }
    }
}

/// Dropi tool set settings.
#[derive(Debug, Clone)]
pub struct DropiSettings {
    /// Bearer token.
    pub token: Option<String>,
    /// Country code selecting the platform domain.
    pub country: String,
    /// Explicit base URL, overriding the country domain.
    pub api_url: Option<String>,
}

impl Default for DropiSettings {
    fn default() -> Self {
        Self {
            token: None,
            country: "gt".to_string(),
            api_url: None,
        }
    }
}

impl DropiSettings {
    /// Base URL of the Dropi platform.
    ///
    /// Unknown country codes fall back to Guatemala.
    pub fn base_url(&self) -> String {
        if let Some(url) = &self.api_url {
            return url.trim_end_matches('/').to_string();
        }
        let country = self.country.to_lowercase();
        DROPI_DOMAINS
            .iter()
            .find(|(code, _)| *code == country)
            .map(|(_, url)| *url)
            .unwrap_or(DROPI_DOMAINS[0].1)
            .to_string()
    }
}

/// Chart tool set settings.
#[derive(Debug, Clone)]
pub struct ChartSettings {
    /// n8n base URL.
    pub n8n_base_url: Option<String>,
    /// Chart webhook; defaults to `{n8n_base_url}/webhook/grafico`.
    pub webhook_url: Option<String>,
    /// QuickChart render endpoint.
    pub quickchart_url: String,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            n8n_base_url: None,
            webhook_url: None,
            quickchart_url: "https://quickchart.io/chart".to_string(),
        }
    }
}

impl ChartSettings {
    /// Resolved chart webhook URL.
    pub fn webhook(&self) -> Option<String> {
        self.webhook_url.clone().or_else(|| {
            self.n8n_base_url
                .as_ref()
                .map(|base| format!("{}/webhook/grafico", base.trim_end_matches('/')))
        })
    }
}

/// Logging settings.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// `EnvFilter` directive.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Everything the binaries need, built once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bind host.
    pub host: String,
    /// Bind port; the default depends on what is being served.
    pub port: Option<u16>,
    /// Agent loop settings.
    pub agent: AgentSettings,
    /// Messaging provider settings.
    pub twilio: TwilioSettings,
    /// Tool servers to aggregate, in registration order.
    pub servers: Vec<RemoteServerHandle>,
    /// Per tool call timeout.
    pub tool_timeout: Duration,
    /// Meta Ads tool set.
    pub meta: MetaSettings,
    /// Shopify tool set.
    pub shopify: ShopifySettings,
    /// Dropi tool set.
    pub dropi: DropiSettings,
    /// Chart tool set.
    pub chart: ChartSettings,
    /// Logging.
    pub logging: LoggingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: None,
            agent: AgentSettings::default(),
            twilio: TwilioSettings::default(),
            servers: Vec::new(),
            tool_timeout: Duration::from_secs(30),
            meta: MetaSettings::default(),
            shopify: ShopifySettings::default(),
            dropi: DropiSettings::default(),
            chart: ChartSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Tool server URL variables, in registration order.
const SERVER_VARIABLES: &[(&str, &str, &str)] = &[
    (
        "shopify",
        "SHOPIFY_MCP_URL",
        "Ventas, pedidos, productos e inventario de la tienda online",
    ),
    (
        "meta",
        "META_MCP_URL",
        "Publicidad en Facebook e Instagram: gasto, CPA, campañas",
    ),
    (
        "dropi",
        "DROPI_MCP_URL",
        "Logística: órdenes, entregas, devoluciones y billetera",
    ),
    (
        "chart",
        "N8N_MCP_URL",
        "Gráficos: visualizaciones de ventas, gastos y comparativas",
    ),
];

impl Settings {
    /// Build settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(super::environment::lookup)
    }

    /// Build settings from an arbitrary variable lookup.
    ///
    /// Empty values count as unset. Malformed numbers are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Settings::default();

        let servers = SERVER_VARIABLES
            .iter()
            .filter_map(|(identifier, variable, description)| {
                get(*variable).map(|url| {
                    RemoteServerHandle::new(*identifier, url).with_description(*description)
                })
            })
            .collect();

        let debug = get("DEBUG").is_some_and(|value| value.eq_ignore_ascii_case("true"));
        let filter = get("RUST_LOG").unwrap_or_else(|| {
            if debug {
                "debug".to_string()
            } else {
                defaults.logging.filter.clone()
            }
        });

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_opt(&get, "PORT")?,
            agent: AgentSettings {
                anthropic_api_key: get("ANTHROPIC_API_KEY"),
                model: get("MODEL_NAME").unwrap_or(defaults.agent.model),
                max_iterations: parse_opt(&get, "MAX_ITERATIONS")?
                    .unwrap_or(defaults.agent.max_iterations),
                max_history: parse_opt(&get, "MAX_HISTORY")?.unwrap_or(defaults.agent.max_history),
                turn_timeout: parse_opt(&get, "TURN_TIMEOUT_SECONDS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.agent.turn_timeout),
                conversation_dir: get("CONVERSATION_DIR").map(PathBuf::from),
            },
            twilio: TwilioSettings {
                account_sid: get("TWILIO_ACCOUNT_SID"),
                auth_token: get("TWILIO_AUTH_TOKEN"),
                whatsapp_number: get("TWILIO_WHATSAPP_NUMBER"),
                public_webhook_url: get("PUBLIC_WEBHOOK_URL"),
            },
            servers,
            tool_timeout: parse_opt(&get, "TOOL_TIMEOUT_SECONDS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.tool_timeout),
            meta: MetaSettings {
                access_token: get("META_ACCESS_TOKEN"),
                ad_account_id: get("META_AD_ACCOUNT_ID"),
                graph_url: get("META_GRAPH_URL").unwrap_or(defaults.meta.graph_url),
            },
            shopify: ShopifySettings {
                shop_domain: get("SHOPIFY_SHOP_DOMAIN"),
                access_token: get("SHOPIFY_ACCESS_TOKEN"),
                api_version: get("SHOPIFY_API_VERSION").unwrap_or(defaults.shopify.api_version),
            },
            dropi: DropiSettings {
                token: get("DROPI_TOKEN"),
                country: get("DROPI_COUNTRY").unwrap_or(defaults.dropi.country),
                api_url: get("DROPI_API_URL"),
            },
            chart: ChartSettings {
                n8n_base_url: get("N8N_BASE_URL"),
                webhook_url: get("N8N_WEBHOOK_GRAFICO"),
                quickchart_url: get("QUICKCHART_URL").unwrap_or(defaults.chart.quickchart_url),
            },
            logging: LoggingSettings {
                filter,
                json: get("LOG_FORMAT").is_some_and(|value| value.eq_ignore_ascii_case("json")),
            },
        })
    }

    /// Apply overrides from a TOML configuration file.
    ///
    /// A non-empty server list in the file replaces the environment's.
    pub fn apply(&mut self, config: &Configuration) {
        if let Some(seconds) = config.tool_timeout_seconds {
            self.tool_timeout = Duration::from_secs(seconds);
        }
        if !config.servers.is_empty() {
            self.servers = config.servers.clone();
        }
        if let Some(agent) = &config.agent {
            if let Some(model) = &agent.model {
                self.agent.model = model.clone();
            }
            if let Some(max_iterations) = agent.max_iterations {
                self.agent.max_iterations = max_iterations;
            }
            if let Some(max_history) = agent.max_history {
                self.agent.max_history = max_history;
            }
            if let Some(seconds) = agent.turn_timeout_seconds {
                self.agent.turn_timeout = Duration::from_secs(seconds);
            }
        }
    }

    /// Aggregator configuration derived from these settings.
    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            servers: self.servers.clone(),
            call_timeout: self.tool_timeout,
        }
    }

    /// Bind address, using `default_port` when `PORT` is unset.
    pub fn bind_addr(&self, default_port: u16) -> Result<SocketAddr> {
        let port = self.port.unwrap_or(default_port);
        format!("{}:{}", self.host, port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, port))
    }
}

fn parse_opt<T, F>(get: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {}: '{}'", key, raw))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings_from(&[]).unwrap();

        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.agent.model, DEFAULT_MODEL);
        assert_eq!(settings.agent.max_iterations, 10);
        assert_eq!(settings.agent.max_history, 40);
        assert_eq!(settings.agent.turn_timeout, Duration::from_secs(90));
        assert_eq!(settings.tool_timeout, Duration::from_secs(30));
        assert!(settings.servers.is_empty());
        assert_eq!(settings.logging.filter, "info");
        assert!(!settings.logging.json);
        assert_eq!(
            settings.bind_addr(DEFAULT_AGENT_PORT).unwrap().port(),
            DEFAULT_AGENT_PORT
        );
    }

    #[test]
    fn test_servers_in_registration_order() {
        let settings = settings_from(&[
            ("N8N_MCP_URL", "http://localhost:3004"),
            ("META_MCP_URL", "http://localhost:3002"),
            ("SHOPIFY_MCP_URL", ""),
        ])
        .unwrap();

        let ids: Vec<&str> = settings
            .servers
            .iter()
            .map(|s| s.identifier.as_str())
            .collect();
        assert_eq!(ids, vec!["meta", "chart"]);
        assert_eq!(settings.aggregator_config().servers.len(), 2);
    }

    #[test]
    fn test_numeric_overrides() {
        let settings = settings_from(&[
            ("PORT", "9100"),
            ("TOOL_TIMEOUT_SECONDS", "5"),
            ("TURN_TIMEOUT_SECONDS", "20"),
            ("MAX_ITERATIONS", "3"),
        ])
        .unwrap();

        assert_eq!(settings.port, Some(9100));
        assert_eq!(settings.tool_timeout, Duration::from_secs(5));
        assert_eq!(settings.agent.turn_timeout, Duration::from_secs(20));
        assert_eq!(settings.agent.max_iterations, 3);
    }

    #[test]
    fn test_malformed_number_is_error() {
        let err = settings_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_logging_flags() {
        let settings = settings_from(&[("DEBUG", "TRUE"), ("LOG_FORMAT", "json")]).unwrap();
        assert_eq!(settings.logging.filter, "debug");
        assert!(settings.logging.json);

        let settings = settings_from(&[("DEBUG", "true"), ("RUST_LOG", "warn")]).unwrap();
        assert_eq!(settings.logging.filter, "warn");
    }

    #[test]
    fn test_dropi_base_url() {
        let mut dropi = DropiSettings::default();
        assert_eq!(dropi.base_url(), "https://app.dropi.gt");

        dropi.country = "CO".to_string();
        assert_eq!(dropi.base_url(), "https://app.dropi.co");

        dropi.country = "zz".to_string();
        assert_eq!(dropi.base_url(), "https://app.dropi.gt");

        dropi.api_url = Some("http://localhost:9000/".to_string());
        assert_eq!(dropi.base_url(), "http://localhost:9000");
    }

    #[test]
    fn test_chart_webhook_resolution() {
        let mut chart = ChartSettings::default();
        assert_eq!(chart.webhook(), None);

        chart.n8n_base_url = Some("https://n8n.local/".to_string());
        assert_eq!(
            chart.webhook().as_deref(),
            Some("https://n8n.local/webhook/grafico")
        );

        chart.webhook_url = Some("https://hooks.local/chart".to_string());
        assert_eq!(chart.webhook().as_deref(), Some("https://hooks.local/chart"));
    }
}
