// ============================================================================
// Backend en mémoire pour les tests
// ============================================================================
// Implémente tous les traits de l'API avec des réponses scriptées et des
// compteurs d'appels (pour vérifier qu'un appel réseau n'a PAS eu lieu).
// ============================================================================

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::api::{ConfigSource, LogoProbe, MarketDataSource, MutationResponse, WatchlistSource};
use crate::models::CoinRecord;

/// Backend mock : chaque champ est modifiable depuis le test
#[derive(Default)]
pub struct MockBackend {
    /// Valeurs de config ; une clé absente retourne la valeur par défaut
    pub config: Mutex<HashMap<String, String>>,
    /// Si true, get_config échoue
    pub config_fails: Mutex<bool>,
    pub config_calls: AtomicUsize,

    pub coins: Mutex<Vec<CoinRecord>>,
    pub stocks: Mutex<Vec<CoinRecord>>,

    /// Réponses successives du polling temps réel (Err(message) = échec)
    pub price_ticks: Mutex<VecDeque<std::result::Result<HashMap<String, f64>, String>>>,
    pub price_calls: AtomicUsize,

    /// Réponse des mutations watchlist (Err(message) = erreur transport)
    pub mutation: Mutex<Option<std::result::Result<MutationResponse, String>>>,
    pub mutation_calls: AtomicUsize,
    /// Dernière mutation reçue : (opération, email, symbole)
    pub last_mutation: Mutex<Option<(String, String, String)>>,

    /// URLs de logos considérées cassées
    pub broken_logos: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend dont la config distante contient base + fallback
    pub fn with_logo_config(base_url: &str, fallback_url: &str) -> Self {
        let backend = Self::default();
        {
            let mut config = backend.config.lock().unwrap();
            config.insert("logo_base_url".to_string(), base_url.to_string());
            config.insert("logo_fallback_url".to_string(), fallback_url.to_string());
        }
        backend
    }

    pub fn set_config_fails(&self, fails: bool) {
        *self.config_fails.lock().unwrap() = fails;
    }

    pub fn push_prices(&self, prices: &[(&str, f64)]) {
        let map = prices.iter().map(|(s, p)| (s.to_string(), *p)).collect();
        self.price_ticks.lock().unwrap().push_back(Ok(map));
    }

    pub fn push_price_failure(&self, message: &str) {
        self.price_ticks.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn set_mutation(&self, response: std::result::Result<MutationResponse, String>) {
        *self.mutation.lock().unwrap() = Some(response);
    }

    fn record_mutation(&self, operation: &str, email: &str, symbol: &str) -> Result<MutationResponse> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_mutation.lock().unwrap() =
            Some((operation.to_string(), email.to_string(), symbol.to_string()));

        match self.mutation.lock().unwrap().clone() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(MutationResponse::ok()),
        }
    }
}

#[async_trait]
impl ConfigSource for MockBackend {
    async fn get_config(&self, key: &str, default: &str) -> Result<String> {
        self.config_calls.fetch_add(1, Ordering::SeqCst);
        // Laisse les autres tâches s'exécuter (simule la latence réseau)
        tokio::task::yield_now().await;

        if *self.config_fails.lock().unwrap() {
            anyhow::bail!("config service unavailable");
        }
        Ok(self
            .config
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string()))
    }
}

#[async_trait]
impl MarketDataSource for MockBackend {
    async fn get_top_coins(&self, limit: usize) -> Result<Vec<CoinRecord>> {
        Ok(self.coins.lock().unwrap().iter().take(limit).cloned().collect())
    }

    async fn get_us_stock_home_display(&self) -> Result<Vec<CoinRecord>> {
        Ok(self.stocks.lock().unwrap().clone())
    }

    async fn get_all_real_time_prices(&self) -> Result<HashMap<String, f64>> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        match self.price_ticks.lock().unwrap().pop_front() {
            Some(Ok(prices)) => Ok(prices),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(HashMap::new()),
        }
    }
}

#[async_trait]
impl WatchlistSource for MockBackend {
    async fn add_user_coin(&self, email: &str, symbol: &str) -> Result<MutationResponse> {
        self.record_mutation("add_coin", email, symbol)
    }

    async fn remove_user_coin(&self, email: &str, symbol: &str) -> Result<MutationResponse> {
        self.record_mutation("remove_coin", email, symbol)
    }

    async fn add_user_stock(&self, email: &str, symbol: &str) -> Result<MutationResponse> {
        self.record_mutation("add_stock", email, symbol)
    }

    async fn remove_user_stock(&self, email: &str, symbol: &str) -> Result<MutationResponse> {
        self.record_mutation("remove_stock", email, symbol)
    }
}

#[async_trait]
impl LogoProbe for MockBackend {
    async fn probe_logo(&self, url: &str) -> Result<()> {
        if self.broken_logos.lock().unwrap().iter().any(|u| u == url) {
            anyhow::bail!("broken logo");
        }
        Ok(())
    }
}
