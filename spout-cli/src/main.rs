mod client;
mod ops;

use clap::{Parser, Subcommand};
use ops::{add_route, get_route, list_routes, remove_route, stream_logs, LogsArgs, OutputFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI wrapper around the spout HTTP API.
#[derive(Parser)]
#[command(name = "spout-cli", author, version, about = "CLI for the spout log daemon")]
struct Cli {
    /// API base url
    #[arg(long, env = "SPOUT_API_BASE", default_value = "http://127.0.0.1:8000")]
    api_base: String,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List routes
    Routes,
    /// Show one route
    Route { id: String },
    /// Add a route, e.g. `add syslog://10.0.0.1:514`
    Add {
        /// Target url; the scheme is the target type
        url: String,
        /// Fixed route id (replaces an existing route with that id)
        #[arg(long)]
        id: Option<String>,
        /// Stream types to forward (default: all)
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,
    },
    /// Remove a route
    Remove { id: String },
    /// Stream container output
    Logs {
        /// Container id (first 12 characters are used)
        #[arg(long)]
        id: Option<String>,
        /// Exact container name
        #[arg(long)]
        name: Option<String>,
        /// Substring of container names
        #[arg(long)]
        filter: Option<String>,
        /// Stream types to show (default: all)
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,
        /// One JSON record per line
        #[arg(long)]
        json: bool,
        /// Disable colored names
        #[arg(long)]
        no_color: bool,
        /// Use a WebSocket instead of a chunked response
        #[arg(long)]
        ws: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // load .env when present, ignoring errors
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();
    let client = client::build_client()?;

    match cli.command {
        Commands::Routes => list_routes(&client, &cli.api_base, cli.output).await?,
        Commands::Route { id } => get_route(&client, &cli.api_base, &id, cli.output).await?,
        Commands::Add { url, id, types } => {
            add_route(&client, &cli.api_base, &url, id, types, cli.output).await?
        }
        Commands::Remove { id } => remove_route(&client, &cli.api_base, &id).await?,
        Commands::Logs {
            id,
            name,
            filter,
            types,
            json,
            no_color,
            ws,
        } => {
            let args = LogsArgs {
                id,
                name,
                filter,
                types,
                json,
                no_color,
                ws,
            };
            stream_logs(&client, &cli.api_base, &args).await?
        }
    }

    Ok(())
}

fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
