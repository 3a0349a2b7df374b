use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use quest_config::{ConfigLoader, QuestConfig};
use quest_core::QuestError;
use quest_llm::{ClientConfig, RateLimiter, ReasoningClient};
use quest_runtime::{SessionController, SessionLimits, ToolRegistry};

mod run;
mod serve;

/// Quest: autonomous runner for remote multi-step challenges
#[derive(Parser)]
#[command(name = "quest", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to quest.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server and accept tasks on POST /solve
    Serve {
        /// Listen address override (e.g. 127.0.0.1:8080)
        #[arg(short = 'L', long)]
        listen: Option<String>,
    },
    /// Run one session in the foreground
    Run {
        /// Starting URL of the challenge
        #[arg(short, long)]
        url: String,
        /// Contact email for the task (defaults to task.email)
        #[arg(short, long)]
        email: Option<String>,
        /// Print every turn of the conversation log
        #[arg(long)]
        transcript: bool,
    },
    /// List built-in tools with their timeouts
    Tools,
    /// Show the effective configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show version and build info
    Version,
}

impl Cli {
    pub async fn run(self) -> quest_core::Result<()> {
        // Load config first so logging can follow it.
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level
                .as_deref()
                .unwrap_or(config.logging.level.as_str())
        };
        init_tracing(&config.logging.format, log_level);

        match self.command {
            Commands::Serve { listen } => serve::cmd_serve(config, listen).await,
            Commands::Run {
                url,
                email,
                transcript,
            } => run::cmd_run(config, url, email, transcript).await,
            Commands::Tools => Self::cmd_tools(&config),
            Commands::Config { json } => Self::cmd_config(&config, config_loader.path(), json),
            Commands::Version => Self::cmd_version(),
        }
    }

    fn cmd_tools(config: &QuestConfig) -> quest_core::Result<()> {
        let registry = builtin_registry(config);
        println!("{} tools:", registry.len());
        for tool in registry.descriptors() {
            println!(
                "  {:<18} {:>4}s  {}",
                tool.name,
                tool.timeout.as_secs(),
                tool.description
            );
        }
        Ok(())
    }

    fn cmd_config(
        config: &QuestConfig,
        path: &std::path::Path,
        json: bool,
    ) -> quest_core::Result<()> {
        let mut shown = config.clone();
        // Credentials never go to the terminal.
        if shown.llm.api_key.is_some() {
            shown.llm.api_key = Some("********".into());
        }
        if shown.task.secret.is_some() {
            shown.task.secret = Some("********".into());
        }

        if json {
            println!("{}", serde_json::to_string_pretty(&shown)?);
        } else {
            println!("# {}", path.display());
            println!(
                "{}",
                toml::to_string_pretty(&shown).map_err(|e| QuestError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_version() -> quest_core::Result<()> {
        println!("quest {}", env!("CARGO_PKG_VERSION"));
        println!("  target:  {}", std::env::consts::ARCH);
        println!("  os:      {}", std::env::consts::OS);
        Ok(())
    }
}

/// RUST_LOG wins over the resolved level when set.
fn init_tracing(format: &str, level: &str) {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
    };
    match format {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .json()
            .with_target(true)
            .init(),
        "compact" => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .compact()
            .with_target(false)
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_target(false)
            .init(),
    }
}

fn builtin_registry(config: &QuestConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    quest_tools::register_builtin(&mut registry, &config.tools, &config.task);
    registry
}

/// Wire provider, limiter, tools and limits into a controller.
fn build_controller(config: &QuestConfig) -> quest_core::Result<SessionController> {
    let provider = quest_llm::build_provider(&config.llm)?;
    let limiter = RateLimiter::new(config.llm.requests_per_window, config.llm.window());
    let client = ReasoningClient::new(provider, limiter, ClientConfig::from(&config.llm));
    Ok(SessionController::new(
        client,
        Arc::new(builtin_registry(config)),
        SessionLimits::from(&config.session),
    ))
}
