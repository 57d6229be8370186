// ============================================================================
// MarketDeck - Vue marché en terminal
// ============================================================================
// Cartes coins / stocks avec mini graphiques, prix temps réel (polling 6s,
// flags ▲/▼ pendant 3s), logos résolus via la config distante et bouton
// favori relié à la watchlist de l'utilisateur.
//
// Architecture :
// - Event loop synchrone (render -> input -> update), App possédée par la loop
// - Runtime tokio : worker de commandes (réseau) + tâche de polling des prix
// - Communication par channels : AppCommand -> worker, AppResult -> loop,
//   PriceSnapshot -> loop
// ============================================================================

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use marketdeck::api::{HttpBackend, LogoProbe, MarketDataSource, WatchlistSource};
use marketdeck::app::App;
use marketdeck::config::AppConfig;
use marketdeck::models::{normalize_logo_symbol, AssetKind, CardData, CoinRecord};
use marketdeck::services::favorite::{submit_favorite, FavoriteError, FavoriteRequest};
use marketdeck::services::{LogoService, PricePoller, PriceSnapshot};
use marketdeck::ui::{events::EventHandler, render, Event};

// ============================================================================
// AppCommand / AppResult : protocole loop <-> worker
// ============================================================================

/// Commandes envoyées au worker
#[derive(Debug, Clone)]
enum AppCommand {
    /// Charger (ou recharger) coins et stocks
    LoadMarket { limit: usize },

    /// Raffiner les logos en async puis vérifier qu'ils se chargent
    RefineLogos { symbols: Vec<String> },

    /// Ajouter / retirer un symbole de la watchlist
    ToggleFavorite { request: FavoriteRequest },
}

/// Résultats renvoyés par le worker
#[derive(Debug)]
enum AppResult {
    /// Cartes prêtes, logos résolus en sync ; None si ce type a échoué
    MarketLoaded {
        coins: Option<Vec<CardData>>,
        stocks: Option<Vec<CardData>>,
    },

    /// Chargement échoué pour un type d'actif
    LoadError { kind: AssetKind, error: String },

    /// URLs de logo validées (clé : symbole en majuscules)
    LogosRefined { logos: HashMap<String, String> },

    /// Logo injoignable : remplacé par le fallback
    LogoFallback { symbol: String, url: String },

    /// Mutation de watchlist terminée
    FavoriteDone {
        kind: AssetKind,
        symbol: String,
        result: Result<(), FavoriteError>,
    },
}

/// Collaborateurs partagés par les tâches du worker
#[derive(Clone)]
struct Services {
    market: Arc<dyn MarketDataSource>,
    watchlist: Arc<dyn WatchlistSource>,
    probe: Arc<dyn LogoProbe>,
    logos: Arc<LogoService>,
}

// ============================================================================
// Initialisation du logging
// ============================================================================
// Une TUI ne peut pas écrire sur stdout : on log dans un fichier à rotation
// quotidienne. RUST_LOG surcharge le filtre par défaut.
// ============================================================================

fn init_logging(config: &AppConfig) -> Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_dir = config.log_dir.clone();

    std::fs::create_dir_all(&log_dir).context("Échec de la création du répertoire de logs")?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir.clone(), "marketdeck.log");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketdeck=debug,info".into()),
        )
        .init();

    info!(?log_dir, "Logging initialisé");
    Ok(())
}

// ============================================================================
// Point d'entrée
// ============================================================================

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("Configuration invalide")?;
    config.validate()?;

    init_logging(&config).unwrap_or_else(|e| {
        eprintln!("⚠️  Warning: Failed to initialize logging: {}", e);
        eprintln!("   Continuing without logging...");
    });

    info!(api_url = %config.api_url, user = ?config.user_email, "MarketDeck starting up");

    // Runtime tokio : le worker et le polling y tournent, la loop reste sync.
    // enter() permet tokio::spawn depuis le thread principal.
    let runtime = tokio::runtime::Runtime::new().context("Échec de la création du runtime tokio")?;
    let _runtime_guard = runtime.enter();

    let backend = Arc::new(HttpBackend::new(&config.api_url, config.http_timeout)?);
    let services = Services {
        market: backend.clone(),
        watchlist: backend.clone(),
        probe: backend.clone(),
        logos: Arc::new(LogoService::new(backend.clone())),
    };

    let (command_tx, command_rx) = mpsc::unbounded_channel::<AppCommand>();
    let (result_tx, result_rx) = mpsc::unbounded_channel::<AppResult>();

    info!("Spawning background worker");
    runtime.spawn(run_worker(command_rx, result_tx, services.clone()));

    let (mut poller, price_rx) = PricePoller::new(services.market.clone());

    let mut app = App::new(config.user(), config.card_variant, config.card_context);

    // Chargement initial + polling démarré d'office
    app.start_loading(Some("Chargement du marché...".to_string()));
    let _ = command_tx.send(AppCommand::LoadMarket {
        limit: config.coin_limit,
    });
    poller.start();
    app.is_polling = poller.is_polling();

    debug!("Setting up terminal");
    let mut terminal = setup_terminal()?;

    let events = EventHandler::new();
    let mut channels = LoopChannels {
        command_tx,
        result_rx,
        price_rx,
        coin_limit: config.coin_limit,
    };

    info!("Starting event loop");
    let result = run(&mut terminal, &mut app, &events, &mut channels, &mut poller);

    debug!("Restoring terminal");
    restore_terminal(&mut terminal)?;

    poller.stop();

    match &result {
        Ok(_) => info!("Application exited normally"),
        Err(e) => error!(error = ?e, "Application exited with error"),
    }

    result
}

// ============================================================================
// Worker : exécute les commandes réseau
// ============================================================================
// Chaque commande est traitée dans sa propre tâche : un favori n'attend pas
// la fin d'un rechargement du marché.
// ============================================================================

async fn run_worker(
    mut command_rx: UnboundedReceiver<AppCommand>,
    result_tx: UnboundedSender<AppResult>,
    services: Services,
) {
    while let Some(command) = command_rx.recv().await {
        info!(?command, "Worker received command");

        let services = services.clone();
        let result_tx = result_tx.clone();

        tokio::spawn(async move {
            match command {
                AppCommand::LoadMarket { limit } => load_market(&services, limit, &result_tx).await,
                AppCommand::RefineLogos { symbols } => refine_logos(&services, symbols, &result_tx).await,
                AppCommand::ToggleFavorite { request } => {
                    let result = submit_favorite(services.watchlist.as_ref(), &request).await;
                    let _ = result_tx.send(AppResult::FavoriteDone {
                        kind: request.kind,
                        symbol: request.symbol,
                        result,
                    });
                }
            }
        });
    }

    info!("Worker exiting (channel closed)");
}

/// Charge coins et stocks en parallèle, logos résolus en sync
async fn load_market(services: &Services, limit: usize, result_tx: &UnboundedSender<AppResult>) {
    // La config des logos est chargée avant la construction des cartes
    let (coins, stocks, _) = tokio::join!(
        services.market.get_top_coins(limit),
        services.market.get_us_stock_home_display(),
        services.logos.refresh_config_if_stale()
    );

    let coins = match coins {
        Ok(records) => Some(build_cards(services, AssetKind::Coin, &records)),
        Err(e) => {
            error!(error = ?e, "Failed to load coins");
            let _ = result_tx.send(AppResult::LoadError {
                kind: AssetKind::Coin,
                error: format!("{:#}", e),
            });
            None
        }
    };

    let stocks = match stocks {
        Ok(records) => Some(build_cards(services, AssetKind::Stock, &records)),
        Err(e) => {
            error!(error = ?e, "Failed to load stocks");
            let _ = result_tx.send(AppResult::LoadError {
                kind: AssetKind::Stock,
                error: format!("{:#}", e),
            });
            None
        }
    };

    info!(
        coins = coins.as_ref().map(Vec::len),
        stocks = stocks.as_ref().map(Vec::len),
        "Market loaded"
    );
    let _ = result_tx.send(AppResult::MarketLoaded { coins, stocks });
}

fn build_cards(services: &Services, kind: AssetKind, records: &[CoinRecord]) -> Vec<CardData> {
    let symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
    let logos = services.logos.resolve_many_sync(&symbols);

    records
        .iter()
        .map(|record| {
            let logo = logos
                .get(&normalize_logo_symbol(&record.symbol))
                .cloned()
                .unwrap_or_else(|| services.logos.fallback_url());
            CardData::from_record(kind, record, logo)
        })
        .collect()
}

/// Reconstruction sur la config fraîche, puis vérification de chaque URL
///
/// Un logo injoignable est remplacé une seule fois par le fallback.
async fn refine_logos(services: &Services, symbols: Vec<String>, result_tx: &UnboundedSender<AppResult>) {
    let refs: Vec<&str> = symbols.iter().map(String::as_str).collect();
    let logos = services.logos.refine_many(&refs).await;
    let _ = result_tx.send(AppResult::LogosRefined {
        logos: logos.clone(),
    });

    let replaced = services
        .logos
        .verify_logos(services.probe.as_ref(), &logos)
        .await;
    for (symbol, url) in replaced {
        let _ = result_tx.send(AppResult::LogoFallback { symbol, url });
    }
}

// ============================================================================
// Event Loop Principal
// ============================================================================

struct LoopChannels {
    command_tx: UnboundedSender<AppCommand>,
    result_rx: UnboundedReceiver<AppResult>,
    price_rx: UnboundedReceiver<PriceSnapshot>,
    coin_limit: usize,
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &EventHandler,
    channels: &mut LoopChannels,
    poller: &mut PricePoller,
) -> Result<()> {
    while app.is_running() {
        // 0. Résultats du worker et snapshots de prix
        drain_results(app, channels);
        drain_prices(app, &mut channels.price_rx);

        // 1. Render
        terminal.draw(|frame| render(frame, app))?;

        // 2. Input
        match events.next() {
            Ok(event) => handle_event(app, event, channels, poller),
            Err(e) => warn!(error = ?e, "Failed to read terminal event"),
        }

        // 3. Update
        app.tick(Instant::now());
    }

    Ok(())
}

fn drain_results(app: &mut App, channels: &mut LoopChannels) {
    loop {
        let result = match channels.result_rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                error!("Worker disconnected!");
                break;
            }
        };

        match result {
            AppResult::MarketLoaded { coins, stocks } => {
                app.stop_loading();

                let symbols: Vec<String> = coins
                    .iter()
                    .chain(stocks.iter())
                    .flatten()
                    .map(|card| card.symbol.clone())
                    .collect();

                if let Some(coins) = coins {
                    app.set_cards(AssetKind::Coin, coins);
                }
                if let Some(stocks) = stocks {
                    app.set_cards(AssetKind::Stock, stocks);
                }

                if !symbols.is_empty() {
                    let _ = channels.command_tx.send(AppCommand::RefineLogos { symbols });
                }
            }
            AppResult::LoadError { kind, error } => {
                app.set_status(format!("Échec du chargement ({}) : {}", kind.label(), error));
            }
            AppResult::LogosRefined { logos } => {
                debug!(count = logos.len(), "Applying refined logos");
                app.apply_logos(&logos);
            }
            AppResult::LogoFallback { symbol, url } => {
                app.apply_logo_fallback(&symbol, &url);
            }
            AppResult::FavoriteDone { kind, symbol, result } => {
                let outcome = app.complete_favorite(kind, &symbol, result, Instant::now());
                info!(symbol = %symbol, ?outcome, "Favorite completed");
            }
        }
    }
}

/// Applique tous les snapshots en attente (le plus récent gagne)
fn drain_prices(app: &mut App, price_rx: &mut UnboundedReceiver<PriceSnapshot>) {
    while let Ok(snapshot) = price_rx.try_recv() {
        app.apply_price_tick(snapshot, Instant::now());
    }
}

// ============================================================================
// Gestion des événements
// ============================================================================

fn handle_event(app: &mut App, event: Event, channels: &LoopChannels, poller: &mut PricePoller) {
    use marketdeck::ui::events::{
        is_context_event, is_down_event, is_enter_event, is_escape_event, is_favorite_event,
        is_polling_event, is_quit_event, is_reload_event, is_space_event, is_tab_event,
        is_up_event, is_variant_event,
    };

    if let Event::Key(_) = event {
        if !is_quit_event(&event) {
            app.cancel_quit();
        }
    }

    match event {
        Event::Key(_) if is_quit_event(&event) => {
            if app.is_awaiting_quit_confirmation() {
                info!("User confirmed quit");
                app.quit();
            } else {
                info!("User requested quit (awaiting confirmation)");
                app.request_quit();
            }
        }

        Event::Key(_) if is_up_event(&event) && app.is_on_dashboard() => app.navigate_up(),
        Event::Key(_) if is_down_event(&event) && app.is_on_dashboard() => app.navigate_down(),

        Event::Key(_) if is_tab_event(&event) && app.is_on_dashboard() => {
            app.next_tab();
            debug!(tab = app.tab.label(), "User switched tab");
        }

        Event::Key(_) if is_enter_event(&event) && app.is_on_dashboard() => {
            app.open_detail();
        }

        Event::Key(_) if (is_escape_event(&event) || is_space_event(&event)) && app.is_on_detail() => {
            debug!("User returned to dashboard");
            app.show_dashboard();
        }

        Event::Key(_) if is_favorite_event(&event) => {
            if let Some(request) = app.press_favorite() {
                let _ = channels.command_tx.send(AppCommand::ToggleFavorite { request });
            }
        }

        Event::Key(_) if is_polling_event(&event) => {
            if poller.is_polling() {
                poller.stop();
            } else {
                poller.start();
            }
            app.is_polling = poller.is_polling();
        }

        Event::Key(_) if is_reload_event(&event) => {
            info!("User requested market reload");
            app.clear_status();
            app.start_loading(Some("Rechargement du marché...".to_string()));
            let _ = channels.command_tx.send(AppCommand::LoadMarket {
                limit: channels.coin_limit,
            });
        }

        Event::Key(_) if is_variant_event(&event) => app.next_variant(),
        Event::Key(_) if is_context_event(&event) => app.next_context(),

        Event::Key(_) | Event::Tick => {}
    }
}

// ============================================================================
// Setup et restauration du terminal
// ============================================================================

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(|e| e.into())
}

/// Restaure le terminal, même si la loop a échoué
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    Ok(())
}
