//! ayylmao - replies "lmao" to every "ayy"
//!
//! Reference bot for the library: connects once, services the gateway until the connection
//! drops or the process is interrupted, and answers matching messages over REST.

use async_trait::async_trait;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use libdiscord::observability::init_default_logging;
use libdiscord::{
    BotConfig, CallbackReason, ClientSettings, Context, ContextInfo, EventContext, EventHandler,
    GatewayState, HandlerResult, LogLevel, Payload,
};
use serde_json::Value;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const SERVICE_TIMEOUT: Duration = Duration::from_millis(20);

/// Discord bot that answers "ayy" with "lmao"
#[derive(Parser)]
#[command(name = "ayylmao")]
#[command(version)]
struct Cli {
    /// Bot token
    #[arg(short = 't', long, env = "DISCORD_BOT_TOKEN", hide_env_values = true)]
    bot_token: Option<String>,

    /// Log level bitmask (error=1, warning=2, info=4, notice=8, debug=16)
    #[arg(short = 'l', long)]
    log_level: Option<u32>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

struct AyyLmao;

#[async_trait]
impl EventHandler for AyyLmao {
    async fn on_event(
        &mut self,
        ctx: &EventContext<'_>,
        reason: CallbackReason,
        payload: Option<&Payload>,
    ) -> HandlerResult {
        match reason {
            CallbackReason::Ready => {
                ctx.logger().info("bot is ready");
            }
            CallbackReason::MessageCreate => {
                let content = payload.and_then(|p| p.get("content")).and_then(Value::as_str);
                let channel = payload
                    .and_then(|p| p.get("channel_id"))
                    .and_then(Value::as_str);
                if let (Some("ayy"), Some(channel)) = (content, channel) {
                    ctx.post_message(channel, "lmao").await?;
                    ctx.logger().debug(format!("said lmao in {channel}"));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if cli.bot_token.is_none() && cli.config.is_none() {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "a bot token is required: pass -t/--bot-token or set DISCORD_BOT_TOKEN",
            )
            .exit();
    }

    init_default_logging();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            let config = BotConfig::load_from_file(path)?;
            config.validate()?;
            Some(config)
        }
        None => None,
    };

    let token = match (cli.bot_token, &config) {
        (Some(token), _) => token,
        (None, Some(config)) => config.token()?,
        (None, None) => return Err("no bot token configured".into()),
    };

    let mask = match (cli.log_level, &config) {
        (Some(mask), _) => mask,
        (None, Some(config)) => config.bot.log_level,
        (None, None) => LogLevel::all().bits(),
    };
    let log_level =
        LogLevel::from_mask(mask).ok_or_else(|| format!("invalid log level bitmask {mask}"))?;

    let settings = config
        .as_ref()
        .map(BotConfig::settings)
        .unwrap_or_else(ClientSettings::default);

    let info = ContextInfo::new(token, AyyLmao)
        .with_log_level(log_level)
        .with_settings(settings);
    let mut ctx = Context::new(info)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, shutting down...");
            flag.store(true, Ordering::SeqCst);
        }
    });

    ctx.connect().await?;

    while !interrupted.load(Ordering::SeqCst)
        && ctx.gateway_connection_state() != GatewayState::Disconnected
    {
        ctx.service(SERVICE_TIMEOUT).await;
    }

    let stats = ctx.stats().clone();
    ctx.destroy().await;
    info!(
        events = stats.events_dispatched,
        handler_failures = stats.handler_failures,
        "ayylmao stopped"
    );
    Ok(())
}
