//! LADDERBOT — zig-zag martingale ladder auto-trader
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the market connection, notifier and ladder store into a session,
//! then runs the session, health monitor and control API until Ctrl-C.

use anyhow::Result;
use clap::Parser;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use ladderbot::config::{AlertsConfig, AppConfig};
use ladderbot::dashboard::{self, routes::ControlState};
use ladderbot::ladder::{
    Collaborators, EngineSettings, EngineTiming, LadderEngine, StopToken, TradeGate,
};
use ladderbot::market::paper::PaperExchange;
use ladderbot::market::polymarket::GammaQuotes;
use ladderbot::notify::telegram::TelegramNotifier;
use ladderbot::notify::{LogNotifier, Notifier, NotifyContext};
use ladderbot::session::health::HealthMonitor;
use ladderbot::session::Session;
use ladderbot::storage::JsonLadderStore;

const BANNER: &str = r#"
 _        _    ____  ____  _____ ____  ____   ___ _____
| |      / \  |  _ \|  _ \| ____|  _ \| __ ) / _ \_   _|
| |     / _ \ | | | | | | |  _| | |_) |  _ \| | | || |
| |___ / ___ \| |_| | |_| | |___|  _ <| |_) | |_| || |
|_____/_/   \_\____/|____/|_____|_| \_\____/ \___/ |_|

  Zig-zag ladder auto-trader
  v0.1.0
"#;

#[derive(Debug, Parser)]
#[command(name = "ladderbot", version, about = "Zig-zag ladder auto-trader")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Arm the ladder immediately instead of waiting for a start command.
    #[arg(long)]
    autostart: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let args = Args::parse();
    let cfg = AppConfig::load(&args.config)?;

    init_logging();

    println!("{BANNER}");
    let market_url = cfg.market_url();
    info!(
        session = %cfg.session.name,
        market = %cfg.session.market_slug,
        url = %market_url,
        default_entry_price = %cfg.session.default_entry_price,
        initial_cash = %cfg.paper.initial_cash,
        "LADDERBOT starting up"
    );

    // -- Market connection -------------------------------------------------

    let quotes = GammaQuotes::new(cfg.session.market_slug.clone())?;
    let exchange = Arc::new(
        PaperExchange::new(quotes, cfg.paper.initial_cash, market_url.clone())
            .with_wallet_confirm(Duration::from_millis(cfg.timing.wallet_confirm_ms)),
    );

    // -- Notifier ----------------------------------------------------------

    let ctx = NotifyContext {
        account_label: cfg
            .alerts
            .account_label
            .clone()
            .unwrap_or_else(|| cfg.session.name.clone()),
        market: cfg.session.market_slug.clone(),
    };
    let shutdown = StopToken::new();
    let notifier = build_notifier(&cfg.alerts, ctx, &shutdown);

    // -- Engine and session ------------------------------------------------

    let collab = Collaborators {
        feed: exchange.clone(),
        gateway: exchange.clone(),
        history: exchange.clone(),
        notifier,
    };
    let settings = EngineSettings {
        default_entry_price: cfg.session.default_entry_price,
        percents: cfg.stakes,
        timing: EngineTiming::from(&cfg.timing),
    };
    let engine = LadderEngine::new(collab, settings, TradeGate::new(), StopToken::new())?;

    let store = Arc::new(JsonLadderStore::new(cfg.store.path.clone()));
    let (session, handle) = Session::new(
        engine,
        store,
        market_url,
        Duration::from_millis(cfg.session.tick_interval_ms),
    );
    let session_task = tokio::spawn(session.run());

    // An explicitly configured URL overrides the one restored from the store.
    if let Some(url) = cfg.session.market_url.as_deref() {
        handle.set_market_url(url).await?;
    }

    // -- Health monitor ----------------------------------------------------

    let monitor = HealthMonitor::new(exchange.clone(), handle.clone(), cfg.health.clone());
    let monitor_task = tokio::spawn(monitor.run(shutdown.clone()));

    // -- Control API -------------------------------------------------------

    if cfg.control.enabled {
        let state = Arc::new(ControlState::new(handle.clone()));
        if let Err(e) = dashboard::spawn_dashboard(state, cfg.control.port).await {
            error!(error = %e, "Control API failed to start, continuing without it");
        }
    }

    if args.autostart || cfg.session.autostart {
        handle.start().await?;
    } else {
        info!("Waiting for a start command");
    }

    // -- Graceful shutdown -------------------------------------------------

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    shutdown.stop();
    if let Err(e) = handle.shutdown().await {
        warn!(error = %e, "Session already gone");
    }
    if let Err(e) = session_task.await {
        error!(error = %e, "Session task panicked");
    }
    let _ = monitor_task.await;

    let view = handle.view();
    info!(
        cycle_id = view.cycle_id,
        trade_count = view.trade_count,
        sell_count = view.sell_count,
        "LADDERBOT shut down"
    );
    Ok(())
}

/// Telegram when both env vars resolve, log-only otherwise.
fn build_notifier(
    alerts: &AlertsConfig,
    ctx: NotifyContext,
    shutdown: &StopToken,
) -> Arc<dyn Notifier> {
    let token = alerts
        .telegram_bot_token_env
        .as_deref()
        .and_then(|env| AppConfig::resolve_env(env).ok());
    let chat_id = alerts
        .telegram_chat_id_env
        .as_deref()
        .and_then(|env| AppConfig::resolve_env(env).ok());

    match (token, chat_id) {
        (Some(token), Some(chat_id)) => {
            match TelegramNotifier::new(SecretString::new(token), chat_id, ctx.clone()) {
                Ok(telegram) => {
                    info!("Trade notifications via Telegram");
                    return Arc::new(telegram.with_stop(shutdown.clone()));
                }
                Err(e) => warn!(error = %e, "Telegram notifier unavailable"),
            }
        }
        _ => info!("No Telegram credentials, trade notifications go to the log"),
    }
    Arc::new(LogNotifier::new(ctx))
}

/// Initialise the tracing subscriber.
///
/// Set `LADDERBOT_LOG_JSON=1` for JSON output. Filter with `RUST_LOG`.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ladderbot=info"));

    let json_logging = std::env::var("LADDERBOT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
