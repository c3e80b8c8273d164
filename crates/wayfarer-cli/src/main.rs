use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::StreamExt;

use wayfarer_agent::{plan_event_stream, translate_trace, OutboundEvent, PlanOutcome, ReasoningEvent};
use wayfarer_core::config::{Config, LoggingConfig};
use wayfarer_core::types::{ErrorPayload, PlanRequest};
use wayfarer_gateway::AppState;

#[derive(Parser)]
#[command(
    name = "wayfarer",
    about = "Trip planning backend: single-shot and streamed itineraries from an LLM agent",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (default: 8000)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Plan a trip from the command line
    Plan {
        #[command(flatten)]
        trip: TripArgs,

        /// Run the reasoning agent and print its events as they arrive
        #[arg(long)]
        stream: bool,
    },

    /// Translate a recorded reasoning trace (one JSON event per line)
    Replay {
        file: PathBuf,

        /// Destination used for the itinerary title
        #[arg(long)]
        destination: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show configuration status
    Status,
}

#[derive(clap::Args)]
struct TripArgs {
    #[arg(long)]
    destination: String,

    /// Free-form dates, e.g. "3 days" or "12-15 May"
    #[arg(long)]
    dates: String,

    #[arg(long)]
    budget: i64,

    #[arg(long, default_value = "USD")]
    currency: String,

    /// Comma-separated interests
    #[arg(long, value_delimiter = ',')]
    interests: Vec<String>,
}

impl From<TripArgs> for PlanRequest {
    fn from(args: TripArgs) -> Self {
        PlanRequest {
            destination: args.destination,
            dates: args.dates,
            currency: args.currency,
            budget: args.budget,
            interests: args.interests,
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a specific config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        logging.level.as_deref().unwrap_or("info")
    };
    let mut filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    for directive in &logging.filters {
        match directive.parse() {
            Ok(d) => filter = filter.add_directive(d),
            Err(e) => eprintln!("Ignoring log filter '{directive}': {e}"),
        }
    }

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let to_stdout = logging.output == "stdout";
    match (logging.format == "json", to_stdout) {
        (true, true) => builder.json().with_writer(std::io::stdout).init(),
        (true, false) => builder.json().with_writer(std::io::stderr).init(),
        (false, true) => builder.with_writer(std::io::stdout).init(),
        (false, false) => builder.with_writer(std::io::stderr).init(),
    }
}

/// Parse a config value given on the command line: JSON if it parses, else a string.
fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

/// Read a JSONL reasoning trace. Blank lines are skipped.
fn read_trace(path: &Path) -> anyhow::Result<Vec<ReasoningEvent>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut events = Vec::new();
    for (index, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid reasoning event", path.display(), index + 1))?;
        events.push(event);
    }
    Ok(events)
}

fn print_event(event: &OutboundEvent) -> anyhow::Result<()> {
    match event {
        OutboundEvent::Thought { content } => println!("· {content}"),
        OutboundEvent::Final { itinerary } => {
            println!("{}", serde_json::to_string_pretty(itinerary)?)
        }
        OutboundEvent::Status { message } => println!("[{message}]"),
        OutboundEvent::Done => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    let config = Config::load(&config_path)?;
    init_logging(&config.logging.clone().unwrap_or_default(), cli.verbose);

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or_else(|| config.server_port());
            tracing::info!("Starting Wayfarer on port {port}");

            #[allow(unused_mut)]
            let mut state = AppState::from_config(config)?;
            #[cfg(feature = "metrics")]
            {
                state.metrics = Some(wayfarer_gateway::metrics::install_prometheus_recorder()?);
            }
            wayfarer_gateway::start_server(Arc::new(state), port).await?;
        }
        Commands::Plan { trip, stream } => {
            let request = PlanRequest::from(trip);
            request.validate()?;
            let state = AppState::from_config(config)?;

            if stream {
                let mut events = plan_event_stream(state.agent.clone(), request);
                while let Some(event) = events.next().await {
                    print_event(&event)?;
                }
            } else {
                match state.agent.plan_once(&request).await? {
                    PlanOutcome::Planned(response) => {
                        println!("{}", serde_json::to_string_pretty(&response)?);
                    }
                    PlanOutcome::Malformed { raw } => {
                        let payload = ErrorPayload {
                            error: "Model returned invalid JSON".into(),
                            raw: Some(raw),
                        };
                        println!("{}", serde_json::to_string_pretty(&payload)?);
                        anyhow::bail!("Model returned invalid JSON");
                    }
                }
            }
        }
        Commands::Replay { file, destination } => {
            let trace = read_trace(&file)?;
            tracing::debug!(events = trace.len(), "Replaying trace");
            for event in translate_trace(trace, &destination) {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        Commands::Status => {
            println!("Wayfarer v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {}", config_path.display());
            let provider = config.active_provider();
            println!("Provider: {}", provider.id);
            println!("Model: {}", config.default_model());
            println!("Server: {}:{}", config.server_bind(), config.server_port());

            let (warnings, errors) = config.validate();
            for w in &warnings {
                println!("warning: {w}");
            }
            for e in &errors {
                println!("error: {e}");
            }
            if errors.is_empty() {
                println!("Status: ready");
            } else {
                println!("Status: misconfigured");
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("No config value at '{key}'"),
            },
            ConfigAction::Set { key, value } => {
                let mut config = config;
                config.set_path(&key, parse_value(&value))?;
                let (_, errors) = config.validate();
                if !errors.is_empty() {
                    anyhow::bail!("Refusing to save invalid config: {}", errors.join("; "));
                }
                config.save(&config_path)?;
                println!("Set {key} in {}", config_path.display());
            }
        },
    }

    Ok(())
}
