mod commands;
mod conversation;
mod gateway;
mod graph;
mod records;

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::sync::Arc;
use teledate_channels::telegram::TelegramChannel;
use teledate_core::config::{self, shellexpand};
use teledate_store::Store;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "teledate",
    version,
    about = "Teledate — Telegram bot for keeping up with activity timelines"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot.
    Start,
    /// Check config and database health.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => {
            let cfg = config::load(&cli.config)?;
            let _log_guard = init_logging(&cfg)?;

            // Build channels.
            let mut channels: HashMap<String, Arc<dyn teledate_core::traits::Channel>> =
                HashMap::new();

            if let Some(ref tg) = cfg.channel.telegram {
                if tg.enabled {
                    if tg.bot_token.is_empty() {
                        anyhow::bail!(
                            "Telegram is enabled but bot_token is empty. Set it in config.toml."
                        );
                    }
                    let channel = TelegramChannel::new(tg.clone());
                    channels.insert("telegram".to_string(), Arc::new(channel));
                }
            }

            if channels.is_empty() {
                anyhow::bail!("No channels enabled. Enable at least one channel in config.toml.");
            }

            // Build the store.
            let store = Store::new(&cfg.store).await?;

            println!("Teledate — Starting bot...");
            let mut gw = gateway::Gateway::new(
                channels,
                store,
                cfg.store.clone(),
                cfg.scheduler.clone(),
            );
            gw.run().await?;
        }
        Commands::Status => {
            let cfg = config::load(&cli.config)?;
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new("warn")),
                )
                .init();

            println!("Teledate — Status Check\n");
            println!("Config: {}", cli.config);

            if let Some(ref tg) = cfg.channel.telegram {
                println!(
                    "  telegram: {}",
                    if tg.enabled && !tg.bot_token.is_empty() {
                        "configured"
                    } else if tg.enabled {
                        "enabled but missing bot_token"
                    } else {
                        "disabled"
                    }
                );
            } else {
                println!("  telegram: not configured");
            }

            let store = Store::new(&cfg.store).await?;
            let users = store.get_user_count().await?;
            let records = store.get_all_records().await?.len();
            println!("  database: {}", cfg.store.db_path);
            println!("  users: {users} (limit {})", cfg.store.user_limit);
            println!("  records: {records}");
        }
    }

    Ok(())
}

/// Set up tracing to stderr and a log file under the data dir.
///
/// The returned guard must stay alive for the file writer to flush.
fn init_logging(
    cfg: &config::Config,
) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let data_dir = shellexpand(&cfg.bot.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let file_appender = tracing_appender::rolling::never(&data_dir, "teledate.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cfg.bot.log_level.clone())),
        )
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    Ok(guard)
}
