// ============================================================================
// Service : résolution des logos
// ============================================================================
// Associe un symbole ("btc") à l'URL de son logo ("<base>BTC.png").
//
// - resolve_sync  : cache ou construction immédiate avec la config connue
//                   (même périmée), ne bloque jamais
// - resolve_async : cache ou rafraîchissement de la config puis construction
// - report_load_failure : remplace l'entrée par l'URL de fallback
// - refine_many   : reconstruit les entrées bâties sur une ancienne base
// - verify_logos  : sonde les URLs et applique report_load_failure
//
// La config distante (base + fallback) est rafraîchie au plus une fois par
// fenêtre de 5 minutes. Les appels concurrents partagent le même fetch.
//
// CONCEPTS RUST :
// 1. Arc<Self> : le service est partagé entre l'UI et le worker async
// 2. std::sync::Mutex / RwLock : sections critiques courtes, jamais à travers
//    un .await
// 3. tokio::sync::Mutex : verrou "single-flight" tenu pendant le fetch
// ============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::api::{ConfigSource, LogoProbe};
use crate::models::normalize_logo_symbol;

/// Durée de validité de la config distante
pub const CONFIG_TTL: Duration = Duration::from_secs(5 * 60);

/// Clés de config distante
pub const BASE_URL_KEY: &str = "logo_base_url";
pub const FALLBACK_URL_KEY: &str = "logo_fallback_url";

/// Valeurs utilisées tant que la config distante n'a jamais été chargée
pub const DEFAULT_BASE_URL: &str = "https://static.marketdeck.app/logos/";
pub const DEFAULT_FALLBACK_URL: &str = "https://static.marketdeck.app/logos/default.png";

/// Erreur de construction d'une URL de logo
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogoError {
    #[error("URL de base des logos invalide : {0:?}")]
    InvalidBaseUrl(String),
}

/// Config distante connue à un instant donné
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    pub base_url: String,
    pub fallback_url: String,
    /// None tant qu'aucun fetch n'a réussi
    pub last_fetched_at: Option<Instant>,
}

impl ConfigSnapshot {
    fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
        match self.last_fetched_at {
            Some(fetched_at) => now.saturating_duration_since(fetched_at) >= ttl,
            None => true,
        }
    }
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            fallback_url: DEFAULT_FALLBACK_URL.to_string(),
            last_fetched_at: None,
        }
    }
}

/// URL de logo validée : la base doit être une URL http(s)
pub fn build_logo_url(base_url: &str, symbol: &str) -> Result<String, LogoError> {
    let base = base_url.trim();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(LogoError::InvalidBaseUrl(base_url.to_string()));
    }
    Ok(format!("{}{}.png", base, symbol))
}

/// Service de résolution des logos
pub struct LogoService {
    config_source: Arc<dyn ConfigSource>,

    /// Symbole (MAJUSCULES) -> URL
    cache: Mutex<HashMap<String, String>>,

    config: RwLock<ConfigSnapshot>,

    /// Sérialise les fetchs de config (single-flight)
    refresh_lock: tokio::sync::Mutex<()>,

    /// Un rafraîchissement en arrière-plan est déjà programmé
    background_refresh: AtomicBool,

    ttl: Duration,
}

impl LogoService {
    pub fn new(config_source: Arc<dyn ConfigSource>) -> Self {
        Self::with_ttl(config_source, CONFIG_TTL)
    }

    /// Constructeur avec TTL personnalisé
    pub fn with_ttl(config_source: Arc<dyn ConfigSource>, ttl: Duration) -> Self {
        Self {
            config_source,
            cache: Mutex::new(HashMap::new()),
            config: RwLock::new(ConfigSnapshot::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
            background_refresh: AtomicBool::new(false),
            ttl,
        }
    }

    // ========================================================================
    // Résolution
    // ========================================================================

    /// Résolution immédiate : cache, sinon construction avec la config actuelle
    ///
    /// Si la config est périmée et qu'un runtime tokio est disponible, un
    /// rafraîchissement est lancé en arrière-plan ; l'URL retournée utilise
    /// quand même l'ancienne config.
    pub fn resolve_sync(self: &Arc<Self>, symbol: &str) -> String {
        let key = normalize_logo_symbol(symbol);
        if key.is_empty() {
            return self.fallback_url();
        }

        if let Some(url) = self.cached(&key) {
            return url;
        }

        self.schedule_refresh_if_stale();

        let base_url = self.snapshot().base_url;
        let url = format!("{}{}.png", base_url, key);
        self.store(&key, &url);
        url
    }

    /// Résolution async : attend le rafraîchissement de la config si périmée
    ///
    /// Une erreur interne met l'URL de fallback en cache pour ce symbole ;
    /// elle y reste jusqu'à clear_cache().
    #[instrument(skip(self))]
    pub async fn resolve_async(&self, symbol: &str) -> String {
        let key = normalize_logo_symbol(symbol);
        if key.is_empty() {
            return self.fallback_url();
        }

        if let Some(url) = self.cached(&key) {
            return url;
        }

        self.refresh_config_if_stale().await;

        let snapshot = self.snapshot();
        let url = match build_logo_url(&snapshot.base_url, &key) {
            Ok(url) => url,
            Err(e) => {
                warn!(symbol = %key, error = %e, "Falling back to default logo");
                snapshot.fallback_url
            }
        };

        self.store(&key, &url);
        url
    }

    /// Signale l'échec de chargement d'un logo : l'entrée devient le fallback
    pub fn report_load_failure(&self, symbol: &str, failed_url: &str) -> String {
        let fallback = self.fallback_url();
        let key = normalize_logo_symbol(symbol);
        if key.is_empty() {
            return fallback;
        }

        warn!(symbol = %key, failed_url = %failed_url, "Logo failed to load, using fallback");
        self.store(&key, &fallback);
        fallback
    }

    /// resolve_sync appliqué à chaque symbole
    pub fn resolve_many_sync(self: &Arc<Self>, symbols: &[&str]) -> HashMap<String, String> {
        symbols
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| (normalize_logo_symbol(s), self.resolve_sync(s)))
            .collect()
    }

    /// resolve_async appliqué à chaque symbole, en parallèle
    ///
    /// Chaque symbole se résout indépendamment : un échec ne fait que
    /// retomber sur le fallback pour ce symbole.
    pub async fn resolve_many_async(&self, symbols: &[&str]) -> HashMap<String, String> {
        let keys: Vec<&str> = symbols.iter().copied().filter(|s| !s.trim().is_empty()).collect();
        let urls = join_all(keys.iter().map(|s| self.resolve_async(s))).await;

        keys.iter()
            .map(|s| normalize_logo_symbol(s))
            .zip(urls)
            .collect()
    }

    /// Rafraîchit la config puis reconstruit les entrées bâties sur une
    /// ancienne base
    ///
    /// Seules les URLs construites `<base>SYMBOLE.png` sont reconstruites :
    /// une entrée passée au fallback reste en place (échec collant).
    pub async fn refine_many(&self, symbols: &[&str]) -> HashMap<String, String> {
        self.refresh_config_if_stale().await;

        let snapshot = self.snapshot();
        {
            let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            for symbol in symbols {
                let key = normalize_logo_symbol(symbol);
                let current = format!("{}{}.png", snapshot.base_url, key);
                let outdated = match cache.get(&key) {
                    Some(url) => url.ends_with(&format!("{}.png", key)) && *url != current,
                    None => false,
                };
                if outdated {
                    debug!(symbol = %key, "Dropping logo built from an outdated base");
                    cache.remove(&key);
                }
            }
        }

        self.resolve_many_async(symbols).await
    }

    /// Vérifie chaque URL avec la sonde ; un logo injoignable passe au fallback
    ///
    /// Retourne les symboles remplacés et leur nouvelle URL. Les URLs qui
    /// sont déjà le fallback ne sont pas sondées.
    pub async fn verify_logos(
        &self,
        probe: &dyn LogoProbe,
        logos: &HashMap<String, String>,
    ) -> HashMap<String, String> {
        let fallback = self.fallback_url();
        let checks = logos
            .iter()
            .filter(|(_, url)| **url != fallback)
            .map(|(symbol, url)| async move { (symbol, url, probe.probe_logo(url).await) });

        let mut replaced = HashMap::new();
        for (symbol, url, outcome) in join_all(checks).await {
            if let Err(e) = outcome {
                debug!(symbol = %symbol, error = %e, "Logo probe failed");
                replaced.insert(symbol.clone(), self.report_load_failure(symbol, url));
            }
        }
        replaced
    }

    /// Vide le cache (n'affecte pas un fetch de config en cours)
    pub fn clear_cache(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let count = cache.len();
        cache.clear();
        info!(cleared = count, "Logo cache cleared");
    }

    // ========================================================================
    // Config distante
    // ========================================================================

    /// Rafraîchit la config si elle est périmée
    ///
    /// Retourne true si un fetch a réussi pendant cet appel. Les appelants
    /// concurrents attendent le verrou puis revérifient la fraîcheur : un
    /// seul fetch sert tout le monde. En cas d'échec, last_fetched_at n'est
    /// pas avancé et le prochain appel réessaie.
    pub async fn refresh_config_if_stale(&self) -> bool {
        if !self.is_config_stale() {
            return false;
        }

        let _guard = self.refresh_lock.lock().await;
        if !self.is_config_stale() {
            debug!("Config refreshed by a concurrent caller");
            return false;
        }

        let current = self.snapshot();
        let base = self
            .config_source
            .get_config(BASE_URL_KEY, &current.base_url)
            .await;
        let fallback = self
            .config_source
            .get_config(FALLBACK_URL_KEY, &current.fallback_url)
            .await;

        match (base, fallback) {
            (Ok(base_url), Ok(fallback_url)) => {
                let mut config = self.config.write().unwrap_or_else(|poisoned| poisoned.into_inner());
                *config = ConfigSnapshot {
                    base_url,
                    fallback_url,
                    last_fetched_at: Some(Instant::now()),
                };
                info!(base_url = %config.base_url, "Logo config refreshed");
                true
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = ?e, "Logo config refresh failed, keeping previous values");
                false
            }
        }
    }

    /// Programme un rafraîchissement en arrière-plan (un seul à la fois)
    fn schedule_refresh_if_stale(self: &Arc<Self>) {
        if !self.is_config_stale() {
            return;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!("No tokio runtime, skipping background config refresh");
                return;
            }
        };

        if self.background_refresh.swap(true, Ordering::SeqCst) {
            return;
        }

        let service = Arc::clone(self);
        handle.spawn(async move {
            service.refresh_config_if_stale().await;
            service.background_refresh.store(false, Ordering::SeqCst);
        });
    }

    fn is_config_stale(&self) -> bool {
        self.snapshot().is_stale(Instant::now(), self.ttl)
    }

    // ========================================================================
    // Accès
    // ========================================================================

    /// Copie de la config courante
    pub fn snapshot(&self) -> ConfigSnapshot {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn fallback_url(&self) -> String {
        self.snapshot().fallback_url
    }

    /// URL en cache pour ce symbole (normalisé)
    pub fn cached(&self, symbol: &str) -> Option<String> {
        let key = normalize_logo_symbol(symbol);
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
            .cloned()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    fn store(&self, key: &str, url: &str) {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), url.to_string());
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockBackend;

    const BASE: &str = "https://cdn.test/logos/";
    const FALLBACK: &str = "https://cdn.test/logos/fallback.png";

    fn service(backend: &Arc<MockBackend>) -> Arc<LogoService> {
        Arc::new(LogoService::new(backend.clone()))
    }

    #[test]
    fn test_resolve_sync_without_runtime_uses_defaults() {
        let backend = Arc::new(MockBackend::with_logo_config(BASE, FALLBACK));
        let logos = service(&backend);

        let url = logos.resolve_sync("btc");
        assert_eq!(url, format!("{}BTC.png", DEFAULT_BASE_URL));
        assert_eq!(logos.cached("BTC"), Some(url));
        // Pas de runtime : aucun fetch
        assert_eq!(backend.config_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_resolve_sync_empty_symbol_returns_fallback() {
        let backend = Arc::new(MockBackend::new());
        let logos = service(&backend);

        assert_eq!(logos.resolve_sync(""), DEFAULT_FALLBACK_URL);
        assert_eq!(logos.resolve_sync("   "), DEFAULT_FALLBACK_URL);
        assert_eq!(logos.cache_len(), 0);
    }

    #[test]
    fn test_resolve_sync_never_empty() {
        let backend = Arc::new(MockBackend::new());
        let logos = service(&backend);

        for symbol in ["", "a", "BTC", "brk.b", "  eth ", "ÉTÉ"] {
            assert!(!logos.resolve_sync(symbol).is_empty());
        }
    }

    #[tokio::test]
    async fn test_resolve_sync_triggers_background_refresh() {
        let backend = Arc::new(MockBackend::with_logo_config(BASE, FALLBACK));
        let logos = service(&backend);

        // Premier appel : config par défaut (pas encore chargée)
        let first = logos.resolve_sync("eth");
        assert_eq!(first, format!("{}ETH.png", DEFAULT_BASE_URL));

        // Laisse le rafraîchissement en arrière-plan se terminer
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(logos.snapshot().base_url, BASE);

        // Nouveau symbole : nouvelle config ; ancien symbole : toujours en cache
        assert_eq!(logos.resolve_sync("sol"), format!("{}SOL.png", BASE));
        assert_eq!(logos.resolve_sync("ETH"), first);
    }

    #[tokio::test]
    async fn test_refine_many_moves_sync_entries_to_configured_base() {
        let backend = Arc::new(MockBackend::with_logo_config(BASE, FALLBACK));
        let logos = service(&backend);

        // Résolution sync avant tout fetch : base par défaut
        let early = logos.resolve_many_sync(&["btc", "doge"]);
        assert_eq!(early["BTC"], format!("{}BTC.png", DEFAULT_BASE_URL));

        // Un échec de chargement reste collant
        let sticky = logos.report_load_failure("doge", &early["DOGE"]);

        let refined = logos.refine_many(&["btc", "doge"]).await;
        assert_eq!(logos.snapshot().base_url, BASE);
        assert_eq!(refined["BTC"], format!("{}BTC.png", BASE));
        assert_eq!(logos.cached("btc"), Some(format!("{}BTC.png", BASE)));
        assert_eq!(refined["DOGE"], sticky);
    }

    #[tokio::test]
    async fn test_resolve_async_fetches_config_then_caches() {
        let backend = Arc::new(MockBackend::with_logo_config(BASE, FALLBACK));
        let logos = service(&backend);

        let url = logos.resolve_async("btc").await;
        assert_eq!(url, format!("{}BTC.png", BASE));
        assert_eq!(backend.config_calls.load(Ordering::SeqCst), 2);

        // Cache hit : pas de nouveau fetch
        assert_eq!(logos.resolve_async("BTC").await, url);
        assert_eq!(backend.config_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_resolve_async_invalid_base_is_sticky_fallback() {
        let backend = Arc::new(MockBackend::with_logo_config("not-a-url/", FALLBACK));
        let logos = service(&backend);

        assert_eq!(logos.resolve_async("doge").await, FALLBACK);
        assert_eq!(logos.cached("DOGE").as_deref(), Some(FALLBACK));

        // La config est corrigée : le fallback reste jusqu'au clear
        backend
            .config
            .lock()
            .unwrap()
            .insert(BASE_URL_KEY.to_string(), BASE.to_string());
        assert_eq!(logos.resolve_async("doge").await, FALLBACK);

        logos.clear_cache();
        assert_eq!(logos.cache_len(), 0);
    }

    #[tokio::test]
    async fn test_report_load_failure_is_sticky() {
        let backend = Arc::new(MockBackend::with_logo_config(BASE, FALLBACK));
        let logos = service(&backend);

        let url = logos.resolve_async("xrp").await;
        assert_ne!(url, FALLBACK);

        assert_eq!(logos.report_load_failure("xrp", &url), FALLBACK);
        assert_eq!(logos.resolve_sync("XRP"), FALLBACK);
        assert_eq!(logos.report_load_failure("xrp", FALLBACK), FALLBACK);
        assert_eq!(logos.resolve_sync("xrp"), FALLBACK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_refresh_respects_ttl() {
        let backend = Arc::new(MockBackend::with_logo_config(BASE, FALLBACK));
        let logos = service(&backend);

        assert!(logos.refresh_config_if_stale().await);
        let fetched_at = logos.snapshot().last_fetched_at;
        assert!(fetched_at.is_some());

        // Deuxième appel dans la fenêtre : no-op
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!logos.refresh_config_if_stale().await);
        assert_eq!(logos.snapshot().last_fetched_at, fetched_at);

        // Après le TTL : nouveau fetch
        tokio::time::advance(CONFIG_TTL).await;
        assert!(logos.refresh_config_if_stale().await);
        assert_ne!(logos.snapshot().last_fetched_at, fetched_at);
    }

    #[tokio::test]
    async fn test_config_failure_keeps_values_and_retries() {
        let backend = Arc::new(MockBackend::with_logo_config(BASE, FALLBACK));
        backend.set_config_fails(true);
        let logos = service(&backend);

        assert!(!logos.refresh_config_if_stale().await);
        let snapshot = logos.snapshot();
        assert_eq!(snapshot.base_url, DEFAULT_BASE_URL);
        assert!(snapshot.last_fetched_at.is_none());

        // L'URL est quand même construite avec les anciennes valeurs
        assert_eq!(logos.resolve_async("ada").await, format!("{}ADA.png", DEFAULT_BASE_URL));

        backend.set_config_fails(false);
        assert!(logos.refresh_config_if_stale().await);
        assert_eq!(logos.snapshot().base_url, BASE);
    }

    #[tokio::test]
    async fn test_concurrent_refresh_is_single_flight() {
        let backend = Arc::new(MockBackend::with_logo_config(BASE, FALLBACK));
        let logos = service(&backend);

        let symbols = ["btc", "eth", "sol", "ada", ""];
        let urls = logos.resolve_many_async(&symbols).await;

        assert_eq!(urls.len(), 4);
        assert_eq!(urls.get("SOL").map(String::as_str), Some("https://cdn.test/logos/SOL.png"));
        // Un seul fetch (2 clés) malgré 4 résolutions concurrentes
        assert_eq!(backend.config_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_verify_logos_replaces_broken_urls_once() {
        let backend = Arc::new(MockBackend::with_logo_config(BASE, FALLBACK));
        let logos = service(&backend);

        let urls = logos.resolve_many_async(&["btc", "eth"]).await;
        backend
            .broken_logos
            .lock()
            .unwrap()
            .push(format!("{}ETH.png", BASE));

        let replaced = logos.verify_logos(&*backend, &urls).await;
        assert_eq!(replaced.len(), 1);
        assert_eq!(replaced.get("ETH").map(String::as_str), Some(FALLBACK));
        assert_eq!(logos.cached("eth").as_deref(), Some(FALLBACK));
        assert_eq!(logos.cached("btc"), Some(format!("{}BTC.png", BASE)));

        // Le fallback n'est jamais resondé
        let again = logos.verify_logos(&*backend, &replaced).await;
        assert!(again.is_empty());
    }

    #[test]
    fn test_resolve_many_sync() {
        let backend = Arc::new(MockBackend::new());
        let logos = service(&backend);

        let urls = logos.resolve_many_sync(&["aapl", "tsla", ""]);
        assert_eq!(urls.len(), 2);
        assert!(urls["AAPL"].ends_with("AAPL.png"));
    }

    #[test]
    fn test_build_logo_url() {
        assert_eq!(build_logo_url(BASE, "BTC").unwrap(), "https://cdn.test/logos/BTC.png");
        assert!(matches!(build_logo_url("", "BTC"), Err(LogoError::InvalidBaseUrl(_))));
    }
}
