//! # sto-runner
//!
//! Console front end for the stop-one trading terminal.
//!
//! Loads a JSON configuration file, connects to the terminal backend, streams
//! klines for the active symbol into a headless chart, and reads staging and
//! trading commands from stdin.
//!
//! # Usage
//!
//! ```bash
//! sto-runner config.json --log-level info
//! ```

mod commands;
mod feed;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sto_core::prefs::Prefs;
use sto_core::types::{OrderKey, PriceBar, Side};
use sto_stage::{ChartSurface, HeadlessChart, PointerInput, RiskSizer, StagingController, TradingDesk};
use sto_td::{StateChange, StoreCommand, TerminalApi, TerminalClient, TerminalEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::commands::{Command, HELP};
use crate::feed::KlineFeed;

/// Plot height of the headless chart; console `y` arguments are in these pixels.
const CHART_HEIGHT_PX: f64 = 1000.0;

const TAB_PREF: &str = "ui.tab";

type Desk = TradingDesk<HeadlessChart, TerminalClient>;

/// Stop-one Trading Terminal Runner.
#[derive(Parser)]
#[command(name = "sto-runner", about = "Stop-one Trading Terminal Runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,

    /// Do not subscribe to the exchange kline stream.
    #[arg(long)]
    no_feed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Initialize logging
    sto_core::logging::init_logging(&cli.log_level, cli.log_dir.as_deref(), "sto-runner");

    info!("sto-runner starting, config={}, log_level={}", cli.config, cli.log_level);

    // 2. Load configuration
    let config = sto_core::config::load_config(&cli.config)?;
    info!(
        "config loaded: {} {} leverage={} backend={}",
        config.trading.symbol, config.market.interval, config.trading.leverage, config.session.url
    );

    // 3. Preferences
    let mut prefs = Prefs::open(&config.prefs.path, &config.prefs.root_key);
    let tab: String = prefs.get(TAB_PREF, "trade".to_string());
    info!("[prefs] tab={tab}");

    // 4. Terminal client and desk
    let (client, mut events) = TerminalClient::start(&config);
    let client = Arc::new(client);

    let sizer = RiskSizer::new(config.trading.risk_fraction, config.trading.leverage);
    let controller = StagingController::new(&config.trading.symbol, sizer, config.trading.reward_ratio);
    let mut chart = HeadlessChart::new(CHART_HEIGHT_PX);
    chart.set_data(&format!("{} {}", config.trading.symbol, config.market.interval), &[]);
    let mut desk: Desk = TradingDesk::new(chart, Arc::clone(&client), controller);

    // 5. Market feed
    let (mut feed, mut bars) = if cli.no_feed {
        (None, None)
    } else {
        let (feed, bars) =
            KlineFeed::start(&config.market, &config.trading.symbol, config.session.reconnect_interval());
        (Some(feed), Some(bars))
    };

    info!("ready, type 'help' for commands, Ctrl+C to stop");

    // 6. Event loop
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            Some(event) = events.recv() => on_terminal_event(&mut desk, &client, &event),
            Some(bar) = next_bar(bars.as_mut()) => {
                desk.on_bar(bar);
                client.apply_command(StoreCommand::PriceTick(bar.close));
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match commands::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(cmd)) if is_client_request(&cmd) => {
                        let client = Arc::clone(&client);
                        tokio::spawn(async move {
                            if let Err(e) = client_request(cmd, &client).await {
                                warn!("[console] {e:#}");
                            }
                        });
                    }
                    Ok(Some(cmd)) => tokio::select! {
                        res = execute(cmd, &mut desk, &client, &mut prefs) => {
                            if let Err(e) = res {
                                warn!("[console] {e:#}");
                            }
                        }
                        _ = tokio::signal::ctrl_c() => {
                            info!("shutdown signal received");
                            break;
                        }
                    },
                    Ok(None) => {}
                    Err(e) => warn!("[console] {e}"),
                },
                Ok(None) | Err(_) => {
                    info!("[console] stdin closed, Ctrl+C to stop");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    // 7. Stop
    if let Some(feed) = feed.as_mut() {
        feed.stop().await;
    }
    if let Err(e) = client.stop().await {
        error!("error stopping terminal client: {e}");
    }
    info!("stopped, goodbye");
    Ok(())
}

async fn next_bar(bars: Option<&mut mpsc::UnboundedReceiver<PriceBar>>) -> Option<PriceBar> {
    match bars {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn on_terminal_event(desk: &mut Desk, client: &Arc<TerminalClient>, event: &TerminalEvent) {
    match event {
        TerminalEvent::Connected => {
            // Re-sync the whole account on every (re)connect.
            let client = Arc::clone(client);
            tokio::spawn(async move {
                if let Err(e) = client.bootstrap().await {
                    warn!("[terminal] bootstrap failed: {e:#}");
                }
            });
        }
        TerminalEvent::Disconnected => warn!("[terminal] backend disconnected, retrying"),
        TerminalEvent::Changed(StateChange::ServerStatus(status)) => info!("[terminal] backend status: {status}"),
        TerminalEvent::Changed(StateChange::ServerError(msg)) => error!("[terminal] backend error: {msg}"),
        TerminalEvent::Changed(StateChange::StrategyAccepted) => info!("[terminal] strategy accepted"),
        TerminalEvent::Changed(_) => {}
    }
    if desk.on_event(event) {
        info!("[desk] {}", desk.status_line());
    }
}

async fn execute(cmd: Command, desk: &mut Desk, client: &TerminalClient, prefs: &mut Prefs) -> Result<()> {
    match cmd {
        Command::Status => {
            let snapshot = client.snapshot();
            info!(
                "[console] {} price={} deposit={} connected={} pending={:?}",
                snapshot.symbol,
                snapshot.current_price,
                snapshot.deposit,
                client.is_connected(),
                client.pending_requests()
            );
            info!("[console] {}", desk.status_line());
        }
        cmd @ (Command::Buy(_) | Command::Sell(_) | Command::CancelAll | Command::Cancel(_)) => {
            client_request(cmd, client).await?
        }
        Command::Press(y) => pointer(desk, PointerInput::SecondaryDown { y }).await?,
        Command::Move(y) => pointer(desk, PointerInput::Move { y }).await?,
        Command::Release => pointer(desk, PointerInput::Release).await?,
        Command::Drag(line, y) => pointer(desk, PointerInput::LineDrag { line, y }).await?,
        Command::Drop(line) => pointer(desk, PointerInput::LineDrop { line }).await?,
        Command::Confirm => {
            desk.confirm().await?;
        }
        Command::Clear => {
            if !desk.clear() {
                info!("[console] nothing to clear");
            }
        }
        Command::Orders => {
            let orders = client.with_store(|s| s.open_orders().clone());
            info!("[console] {} open order(s)", orders.all.len());
            for order in &orders.all {
                info!("[console]   {order:?}");
            }
            let plan = client.with_store(|s| s.unrealized_strategy());
            if plan.is_full {
                info!("[console] resting plan: {} entry={} sl={} tp={}", plan.position_side, plan.entry, plan.sl, plan.tp);
            }
        }
        Command::Positions => {
            let positions = client.with_store(|s| s.positions().to_vec());
            info!("[console] {} position(s)", positions.len());
            for p in &positions {
                info!(
                    "[console]   {} {} entry={} notional={} pnl={} sl={:?} tp={:?}",
                    p.symbol,
                    p.position_side,
                    p.entry_price,
                    p.notional,
                    p.unrealized_profit,
                    p.stop_trigger(),
                    p.take_profit_trigger()
                );
            }
        }
        Command::Tab(name) => {
            prefs.set(TAB_PREF, &name)?;
            info!("[prefs] tab={name}");
        }
        Command::Help => info!("[console] {HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

/// Commands that only talk to the backend; the loop runs them on their own task.
fn is_client_request(cmd: &Command) -> bool {
    matches!(cmd, Command::Buy(_) | Command::Sell(_) | Command::CancelAll | Command::Cancel(_))
}

async fn client_request(cmd: Command, client: &TerminalClient) -> Result<()> {
    match cmd {
        Command::Buy(usd) => client.market_order(Side::Buy, usd).await,
        Command::Sell(usd) => client.market_order(Side::Sell, usd).await,
        Command::CancelAll => client.cancel_all_orders().await,
        Command::Cancel(OrderKey::Client(id)) => client.cancel_order(&id).await,
        Command::Cancel(OrderKey::Algo(id)) => client.cancel_algo_order(id).await,
        _ => Ok(()),
    }
}

async fn pointer(desk: &mut Desk, input: PointerInput) -> Result<()> {
    let outcome = desk.pointer(input).await?;
    info!("[desk] {outcome:?}: {}", desk.status_line());
    Ok(())
}
