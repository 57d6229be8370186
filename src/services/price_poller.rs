// ============================================================================
// Service : polling des prix temps réel
// ============================================================================
// Deux parties :
// - PricePoller : tâche tokio qui récupère la map symbole -> prix toutes les
//   6 secondes et l'envoie au propriétaire via un channel
// - PriceBoard  : état côté propriétaire (snapshot précédent, flags de
//   direction) ; calcule up/down entre deux snapshots
//
// CONCEPT : State machine Idle / Polling
// - start() : (re)démarre le planning, fetch immédiat
// - stop()  : empêche les ticks futurs ; un fetch en cours se termine et son
//   résultat est quand même livré
// - Drop    : arrête la tâche (ressource liée à la durée de vie du handle)
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::MarketDataSource;
use crate::models::{price_key, PriceDirection};

/// Période du polling
pub const POLL_INTERVAL: Duration = Duration::from_secs(6);

/// Durée d'affichage des flags de direction
pub const DIRECTION_HOLD: Duration = Duration::from_secs(3);

// ============================================================================
// PriceSnapshot
// ============================================================================

/// Map symbole (minuscules) -> dernier prix connu
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSnapshot {
    prices: HashMap<String, f64>,
}

impl PriceSnapshot {
    /// Construit un snapshot en normalisant les clés en minuscules
    pub fn from_prices(raw: HashMap<String, f64>) -> Self {
        let prices = raw
            .into_iter()
            .map(|(symbol, price)| (price_key(&symbol), price))
            .collect();
        Self { prices }
    }

    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.prices.get(&price_key(symbol)).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.prices.iter()
    }
}

/// Compare deux snapshots : Up/Down pour chaque symbole présent dans les deux
/// dont le prix a changé
pub fn diff_snapshots(previous: &PriceSnapshot, current: &PriceSnapshot) -> HashMap<String, PriceDirection> {
    current
        .iter()
        .filter_map(|(symbol, &new_price)| {
            let old_price = *previous.prices.get(symbol)?;
            if new_price > old_price {
                Some((symbol.clone(), PriceDirection::Up))
            } else if new_price < old_price {
                Some((symbol.clone(), PriceDirection::Down))
            } else {
                None
            }
        })
        .collect()
}

// ============================================================================
// PriceBoard : état côté propriétaire
// ============================================================================

/// Snapshot précédent + flags de direction en cours d'affichage
#[derive(Debug, Default)]
pub struct PriceBoard {
    snapshot: Option<PriceSnapshot>,
    directions: HashMap<String, PriceDirection>,
    clear_at: Option<Instant>,
}

impl PriceBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applique un nouveau snapshot et retourne les directions détectées
    ///
    /// Le tout premier snapshot ne produit aucun flag (pas de référence).
    /// Le snapshot stocké est remplacé dans tous les cas.
    pub fn apply(&mut self, fresh: PriceSnapshot, now: Instant) -> HashMap<String, PriceDirection> {
        let changes = match &self.snapshot {
            Some(previous) => diff_snapshots(previous, &fresh),
            None => {
                debug!(symbols = fresh.len(), "First price snapshot, skipping diff");
                HashMap::new()
            }
        };

        if !changes.is_empty() {
            debug!(changed = changes.len(), "Price directions detected");
            self.directions.extend(changes.iter().map(|(s, d)| (s.clone(), *d)));
            self.clear_at = Some(now + DIRECTION_HOLD);
        }

        self.snapshot = Some(fresh);
        changes
    }

    /// Efface tous les flags si leur fenêtre d'affichage est écoulée
    ///
    /// Retourne true si des flags ont été effacés.
    pub fn clear_expired(&mut self, now: Instant) -> bool {
        match self.clear_at {
            Some(deadline) if now >= deadline => {
                self.directions.clear();
                self.clear_at = None;
                true
            }
            _ => false,
        }
    }

    pub fn direction(&self, symbol: &str) -> PriceDirection {
        self.directions
            .get(&price_key(symbol))
            .copied()
            .unwrap_or_default()
    }

    /// Prix du dernier snapshot pour ce symbole
    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.snapshot.as_ref()?.get(symbol)
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }
}

// ============================================================================
// PricePoller : tâche de polling
// ============================================================================

/// Handle du polling : possède la tâche, l'arrête à la destruction
pub struct PricePoller {
    source: Arc<dyn MarketDataSource>,
    sender: mpsc::UnboundedSender<PriceSnapshot>,
    period: Duration,
    /// Some tant que le polling est actif ; le drop du sender arrête la tâche
    stop_tx: Option<oneshot::Sender<()>>,
}

impl PricePoller {
    /// Crée un poller (Idle) et le receiver des snapshots
    pub fn new(source: Arc<dyn MarketDataSource>) -> (Self, mpsc::UnboundedReceiver<PriceSnapshot>) {
        Self::with_period(source, POLL_INTERVAL)
    }

    pub fn with_period(
        source: Arc<dyn MarketDataSource>,
        period: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<PriceSnapshot>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let poller = Self {
            source,
            sender,
            period,
            stop_tx: None,
        };
        (poller, receiver)
    }

    /// Démarre (ou redémarre) le polling : un fetch immédiat puis un par période
    ///
    /// Doit être appelé dans un contexte tokio.
    pub fn start(&mut self) {
        self.stop();

        let (stop_tx, stop_rx) = oneshot::channel();
        self.stop_tx = Some(stop_tx);

        let source = Arc::clone(&self.source);
        let sender = self.sender.clone();
        let period = self.period;

        info!(period_secs = period.as_secs(), "Starting real-time price polling");
        tokio::spawn(poll_loop(source, sender, period, stop_rx));
    }

    /// Arrête le polling (idempotent)
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
            info!("Stopped real-time price polling");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.stop_tx.is_some()
    }
}

impl Drop for PricePoller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Boucle de polling
///
/// Le signal d'arrêt n'est observé qu'entre deux ticks : un fetch commencé va
/// jusqu'au bout. Si le receiver a disparu, l'envoi est ignoré.
async fn poll_loop(
    source: Arc<dyn MarketDataSource>,
    sender: mpsc::UnboundedSender<PriceSnapshot>,
    period: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                match source.get_all_real_time_prices().await {
                    Ok(prices) => {
                        debug!(count = prices.len(), "Real-time prices received");
                        if sender.send(PriceSnapshot::from_prices(prices)).is_err() {
                            debug!("Price receiver dropped, stopping poll loop");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = ?e, "Real-time price fetch failed");
                    }
                }
            }
        }
    }

    debug!("Poll loop exited");
}

// ============================================================================
// Tests unitaires
// ============================================================================
