//! Discord bot
//!
//! Connects to the gateway through serenity, keeps the declared application
//! commands in sync with Discord and routes interactions, reactions, text
//! commands and gateway events to their handlers.

mod commands;
mod config;
mod convert;
mod dispatcher;
mod errors;
mod handlers;
mod health;
mod platform;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use discord_commands::{CommandClient, Platform};
use serenity::model::gateway::GatewayIntents;
use serenity::prelude::*;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::Responder;
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::handlers::Forwarder;
use crate::health::AppState;
use crate::platform::SerenityPlatform;

/// Discord bot CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/discord-bot.toml")]
    config: String,

    /// Discord bot token (overrides config file)
    #[arg(long, env = "DISCORD_BOT_TOKEN")]
    bot_token: Option<String>,

    /// Print sync diffs and the declaration dump
    #[arg(short, long)]
    verbose: bool,

    /// Health check server port
    #[arg(long, env = "HEALTH_CHECK_PORT", default_value = "3001")]
    health_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "discord_bot=debug,discord_commands=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Discord bot");

    let args = Args::parse();

    let mut config = if std::path::Path::new(&args.config).exists() {
        info!("Loading config from file: {}", args.config);
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, loading from environment");
        Config::from_env()?
    };
    if let Some(bot_token) = args.bot_token {
        config.discord.bot_token = bot_token;
    }
    if args.verbose {
        config.discord.silent = false;
    }
    if config.discord.bot_token.is_empty() {
        anyhow::bail!("No bot token: set discord.bot_token or DISCORD_BOT_TOKEN");
    }

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::DIRECT_MESSAGE_REACTIONS;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let mut client = Client::builder(&config.discord.bot_token, intents)
        .event_handler(Forwarder::new(events_tx))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Discord client: {}", e))?;

    let platform = SerenityPlatform::new(client.http.clone(), client.cache.clone());
    let registry = commands::registry(Responder::new(client.http.clone()));
    let commands = Arc::new(CommandClient::new(platform, registry, config.client_options()));

    commands
        .login(&config.discord.bot_token)
        .await
        .context("Failed to build declarations and log in")?;

    let health_state = AppState::new();
    health_state.set_built(commands.is_built());
    if let Some(username) = commands.platform().bot_username() {
        health_state.set_bot_username(username).await;
    }

    let health_port = args.health_port;
    let health_state_clone = health_state.clone();
    tokio::spawn(async move {
        if let Err(e) = health::start_health_server(health_state_clone, health_port).await {
            error!("Health server error: {}", e);
        }
    });

    let dispatcher = Dispatcher::new(commands.clone(), health_state, config.sync);
    tokio::spawn(dispatcher.run(events_rx));

    // Graceful shutdown: close all shards on SIGTERM or Ctrl+C.
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        info!("Shutdown signal received, stopping Discord client...");
        shard_manager.shutdown_all().await;
    });

    info!("Starting Discord gateway connection...");

    // Blocks until all shards are stopped
    client
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Discord client error: {}", e))?;

    commands.unbind();
    info!("Discord bot stopped");
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => warn!("SIGTERM handler unavailable: {}", e),
        }
    }
    tokio::signal::ctrl_c().await.ok();
}
