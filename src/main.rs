use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use cerebro::agent::{
    Agent, AgentConfig, AnthropicModel, ConversationStore, FileConversationStore,
    InMemoryConversationStore,
};
use cerebro::aggregator::ToolAggregator;
use cerebro::config::{
    ConfigurationLoader, EnvironmentLoader, Settings, DEFAULT_AGENT_PORT, DEFAULT_TOOL_SERVER_PORT,
};
use cerebro::observability::init_tracing;
use cerebro::registry::ToolSet;
use cerebro::server::{self, ToolServer};
use cerebro::tools::{ChartTools, DropiTools, MetaTools, ShopifyTools};
use cerebro::webhook::{self, SignatureValidator, WebhookState};

#[derive(Parser)]
#[command(name = "cerebro", version, about = "WhatsApp business analytics agent and tool servers")]
struct Cli {
    /// TOML configuration layered over the environment
    #[arg(short, long, global = true, env = "CEREBRO_CONFIG")]
    config: Option<PathBuf>,

    /// Environment file to load before reading settings
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve one tool set over HTTP
    ToolServer {
        /// Tool set to host
        #[arg(value_enum)]
        kind: ServerKind,
    },
    /// Run the agent behind the messaging webhook
    Agent,
}

#[derive(Clone, Copy, ValueEnum)]
enum ServerKind {
    Chart,
    Meta,
    Shopify,
    Dropi,
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let _env = EnvironmentLoader::new(cli.env_file.as_deref());
    let mut settings = Settings::from_env()?;
    if let Some(path) = &cli.config {
        let loader = ConfigurationLoader::new(path)?;
        settings.apply(&loader.config);
    }
    Ok(settings)
}

async fn serve_tools<S: ToolSet>(tool_set: S, settings: &Settings) -> Result<()> {
    let server = ToolServer::new(tool_set).context("Invalid tool table")?;
    let addr = settings.bind_addr(DEFAULT_TOOL_SERVER_PORT)?;
    server::serve(server, addr).await
}

async fn run_tool_server(kind: ServerKind, settings: Settings) -> Result<()> {
    let timeout = settings.tool_timeout;
    match kind {
        ServerKind::Chart => serve_tools(ChartTools::new(settings.chart.clone(), timeout)?, &settings).await,
        ServerKind::Meta => serve_tools(MetaTools::new(settings.meta.clone(), timeout)?, &settings).await,
        ServerKind::Shopify => {
            serve_tools(ShopifyTools::new(settings.shopify.clone(), timeout)?, &settings).await
        }
        ServerKind::Dropi => serve_tools(DropiTools::new(settings.dropi.clone(), timeout)?, &settings).await,
    }
}

async fn run_agent(settings: Settings) -> Result<()> {
    let api_key = settings
        .agent
        .anthropic_api_key
        .clone()
        .context("ANTHROPIC_API_KEY is required to run the agent")?;

    let aggregator = Arc::new(
        ToolAggregator::from_config(settings.aggregator_config())
            .await
            .context("Failed to register tool servers")?,
    );
    if aggregator.server_ids().is_empty() {
        warn!("No tool servers configured; the agent can only chat");
    }

    let model = AnthropicModel::new(
        api_key,
        settings.agent.model.clone(),
        settings.agent.turn_timeout,
    )?;

    let store: Arc<dyn ConversationStore> = match &settings.agent.conversation_dir {
        Some(dir) => Arc::new(FileConversationStore::new(dir)?),
        None => Arc::new(InMemoryConversationStore::new()),
    };

    let agent = Agent::new(
        Arc::new(model),
        aggregator.clone(),
        store,
        AgentConfig::from(&settings.agent),
    );

    let mut state = WebhookState::new(Arc::new(agent), aggregator);
    match &settings.twilio.auth_token {
        Some(token) => {
            state = state.with_signature(
                SignatureValidator::new(token.clone()),
                settings.twilio.public_webhook_url.clone(),
            );
        }
        None => warn!("TWILIO_AUTH_TOKEN not set; webhook signatures are not checked"),
    }

    webhook::serve(state, settings.bind_addr(DEFAULT_AGENT_PORT)?).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    init_tracing(&settings.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting cerebro");

    match cli.command {
        Command::ToolServer { kind } => run_tool_server(kind, settings).await,
        Command::Agent => run_agent(settings).await,
    }
}
