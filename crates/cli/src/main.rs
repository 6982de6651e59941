use clap::{Parser, Subcommand};
use slack_bridge::bridge::Bridge;
use slack_bridge::slack::{SlackClient, SlackConnection};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "slack-bridge")]
#[command(about = "Slack bridge CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Connect to Slack and serve the status/config/workspace HTTP routes.
    Serve {
        /// Config file path (default: SLACK_BRIDGE_CONFIG_PATH or ~/.slack-bridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 15152)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Send one text message and print Slack's reply.
    SendText {
        /// Config file path (default: SLACK_BRIDGE_CONFIG_PATH or ~/.slack-bridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Channel id (e.g. C0123456789)
        #[arg(long)]
        channel: String,

        /// Message text
        #[arg(long)]
        text: String,

        /// Reply in this thread (parent message ts)
        #[arg(long, value_name = "TS")]
        thread: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("slack-bridge {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("serve failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::SendText {
            config,
            channel,
            text,
            thread,
        }) => {
            if let Err(e) = run_send_text(config, &channel, &text, thread).await {
                log::error!("send-text failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(config_path: Option<std::path::PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let (mut config, path) = slack_bridge::config::load_config(config_path)?;
    if let Some(p) = port {
        config.server.port = p;
    }
    log::info!("starting server on {}:{}", config.server.bind, config.server.port);
    slack_bridge::gateway::run_server(config, path).await
}

async fn run_send_text(
    config_path: Option<std::path::PathBuf>,
    channel: &str,
    text: &str,
    thread: Option<String>,
) -> anyhow::Result<()> {
    let (config, _) = slack_bridge::config::load_config(config_path)?;
    let client = Arc::new(SlackClient::new(slack_bridge::config::resolve_slack_config(&config)));
    client.connect().await?;

    let bridge = Bridge::new().await;
    bridge.set_connection(client).await;

    let options = thread.map(|ts| serde_json::json!({ "thread_ts": ts }));
    let reply = bridge.send_text(channel, text, options.as_ref()).await?;
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}
