use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{error, info};
use tokio::io::BufReader;

use relaychat::client::ChatClient;
use relaychat::config::Config;
use relaychat::relay::{ChatServer, ServerConsole};
use relaychat::ui::{ChatUi, StdoutUi};

#[derive(Parser)]
#[command(name = "relaychat")]
#[command(about = "A login-gated line chat relay server and client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "relaychat.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server with an operator console on stdin
    Server {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Connect to a relay server and chat from stdin
    Client {
        /// Login identifier sent as `#login <id>` on connect
        login_id: String,
        /// Server host
        #[arg(short = 'H', long)]
        host: Option<String>,
        /// Server port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Write a default configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config).await?;

    // -v wins over the config file level
    let log_level = match cli.verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .init();

    info!("Starting relaychat v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Server { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            let server = Arc::new(ChatServer::new(&config.server));
            if let Err(e) = server.listen().await {
                error!("ERROR - Could not listen for clients! ({})", e);
            }

            let console = ServerConsole::new(server.clone(), StdoutUi::server());
            tokio::select! {
                res = console.run(BufReader::new(tokio::io::stdin())) => res?,
                _ = tokio::signal::ctrl_c() => info!("Received shutdown signal"),
            }
            server.close().await;
        }
        Commands::Client { login_id, host, port } => {
            if let Some(host) = host {
                config.client.host = host;
            }
            if let Some(port) = port {
                config.client.port = port;
            }
            let mut client = ChatClient::new(&config.client, login_id, StdoutUi::client());
            if let Err(e) = client.open_connection().await {
                client.ui().display(&format!("Error: could not connect: {}. Awaiting command.", e));
            }
            client.run(BufReader::new(tokio::io::stdin())).await?;
        }
        Commands::Init => {
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
    }

    Ok(())
}
