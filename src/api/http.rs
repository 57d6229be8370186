// ============================================================================
// API Client : backend HTTP
// ============================================================================
// Implémente tous les collaborateurs (config, marché, watchlist, sonde logo)
// au-dessus de reqwest.
//
// CONCEPTS RUST :
// 1. async/await : appels réseau non-bloquants
// 2. Result<T, E> + Context : erreurs avec contexte lisible
// 3. Serde : DTOs "wire" avec champs optionnels, convertis en types validés
//    à la frontière (les valeurs par défaut sont appliquées ici, une fois)
// ============================================================================

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use reqwest::header::RANGE;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{ConfigSource, LogoProbe, MarketDataSource, MutationResponse, WatchlistSource};
use crate::models::{CoinRecord, PricePoint};

// ============================================================================
// Structures "wire" : le JSON tel que renvoyé par l'API
// ============================================================================
// CONCEPT RUST : #[serde(rename_all = "camelCase")]
// - "marketCap" (JSON) -> market_cap (Rust)
// - Tous les champs sont optionnels : l'API n'est pas fiable sur leur présence
// ============================================================================

/// Liste renvoyée nue ou enveloppée dans { "data": [...] }
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListEnvelope<T> {
    Wrapped { data: Vec<T> },
    Bare(Vec<T>),
}

impl<T> ListEnvelope<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListEnvelope::Wrapped { data } => data,
            ListEnvelope::Bare(items) => items,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinRecordWire {
    symbol: Option<String>,
    name: Option<String>,
    price: Option<Value>,
    #[serde(alias = "priceChangePercent24h")]
    change_24h: Option<Value>,
    rank: Option<u32>,
    market_cap: Option<Value>,
    #[serde(alias = "volume24h")]
    volume: Option<Value>,
    #[serde(default)]
    price_history: Vec<PricePointWire>,
}

#[derive(Debug, Deserialize)]
struct PricePointWire {
    price: Option<Value>,
    /// Timestamp Unix en millisecondes
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ConfigValueWire {
    value: Option<String>,
}

#[derive(Debug, Serialize)]
struct WatchlistMutationBody<'a> {
    email: &'a str,
    symbol: &'a str,
}

/// Convertit un nombre JSON (ou une chaîne numérique) en f64
fn value_to_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

impl CoinRecordWire {
    /// Convertit le DTO en CoinRecord, None si le symbole est absent
    fn into_record(self) -> Option<CoinRecord> {
        let symbol = self.symbol.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())?;

        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| symbol.clone());

        let history = self
            .price_history
            .into_iter()
            .filter_map(|point| {
                let price = point.price.as_ref().and_then(value_to_f64)?;
                let timestamp = DateTime::from_timestamp_millis(point.timestamp?)?;
                Some(PricePoint::new(price, timestamp))
            })
            .collect();

        Some(CoinRecord {
            name,
            price: self.price.as_ref().and_then(value_to_f64).unwrap_or(0.0),
            change_24h: self.change_24h.as_ref().and_then(value_to_f64).unwrap_or(0.0),
            rank: self.rank,
            market_cap: self.market_cap.as_ref().and_then(value_to_f64),
            volume: self.volume.as_ref().and_then(value_to_f64),
            history,
            symbol,
        })
    }
}

/// Convertit une liste de DTOs en enregistrements, en ignorant les invalides
fn parse_records(wires: Vec<CoinRecordWire>) -> Vec<CoinRecord> {
    let total = wires.len();
    let records: Vec<CoinRecord> = wires.into_iter().filter_map(CoinRecordWire::into_record).collect();

    if records.len() < total {
        warn!(
            skipped = total - records.len(),
            total = total,
            "Skipped market records without symbol"
        );
    }
    records
}

/// Convertit la map des prix temps réel, en ignorant les valeurs non numériques
fn parse_price_map(raw: HashMap<String, Value>) -> HashMap<String, f64> {
    let mut prices = HashMap::with_capacity(raw.len());
    for (symbol, value) in raw {
        match value_to_f64(&value) {
            Some(price) => {
                prices.insert(symbol, price);
            }
            None => debug!(symbol = %symbol, "Ignoring non-numeric real-time price"),
        }
    }
    prices
}

// ============================================================================
// HttpBackend
// ============================================================================

/// Client HTTP vers l'API backend
///
/// Le client reqwest est construit une fois (pool de connexions partagé).
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Crée un backend pour `base_url` (ex: "http://localhost:8080")
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("marketdeck/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Échec de la création du client HTTP")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Construit l'URL complète d'un endpoint
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET + désérialisation JSON
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url = %url, "Sending GET request");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Échec de la requête HTTP vers {}", url))?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, url = %url, "Backend returned error status");
            anyhow::bail!("Le backend a retourné une erreur : HTTP {}", status);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Échec du parsing JSON de {}", url))
    }

    /// POST/DELETE d'une mutation de watchlist
    ///
    /// Un statut d'erreur avec un corps { success, error } est renvoyé tel quel
    /// (Ok) : c'est là que le backend signale une session expirée.
    async fn send_mutation(
        &self,
        method: reqwest::Method,
        path: &str,
        email: &str,
        symbol: &str,
    ) -> Result<MutationResponse> {
        let url = self.endpoint(path);
        debug!(url = %url, method = %method, symbol = %symbol, "Sending watchlist mutation");

        let response = self
            .client
            .request(method, &url)
            .json(&WatchlistMutationBody { email, symbol })
            .send()
            .await
            .context("Échec de la requête de mise à jour de la watchlist")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Échec de la lecture de la réponse watchlist")?;

        interpret_mutation(status, &body)
    }
}

/// Interprète la réponse d'une mutation de watchlist
///
/// - corps { success, error } lisible : renvoyé tel quel (même sur statut
///   d'erreur s'il porte un message)
/// - statut d'erreur sans message exploitable : erreur
/// - succès HTTP avec corps vide : mutation réussie
/// - succès HTTP avec corps illisible : réussie aussi, mais signalé en warn
fn interpret_mutation(status: StatusCode, body: &str) -> Result<MutationResponse> {
    match serde_json::from_str::<MutationResponse>(body) {
        Ok(parsed) if status.is_success() || parsed.error.is_some() => Ok(parsed),
        _ if !status.is_success() => {
            warn!(status = %status, "Watchlist mutation failed without error payload");
            anyhow::bail!("Mise à jour de la watchlist refusée : HTTP {}", status)
        }
        Ok(parsed) => Ok(parsed),
        _ if body.trim().is_empty() => Ok(MutationResponse::ok()),
        Err(e) => {
            warn!(
                status = %status,
                error = %e,
                body = %truncate(body, 200),
                "Unreadable watchlist response body, assuming success"
            );
            Ok(MutationResponse::ok())
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Lecture d'un statut de sonde de logo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeVerdict {
    Reachable,
    /// HEAD non supporté par le serveur : réessayer en GET partiel
    RetryWithGet,
    Broken,
}

fn probe_verdict(status: StatusCode) -> ProbeVerdict {
    if status.is_success() {
        ProbeVerdict::Reachable
    } else if status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED {
        ProbeVerdict::RetryWithGet
    } else {
        ProbeVerdict::Broken
    }
}

#[async_trait]
impl ConfigSource for HttpBackend {
    #[instrument(skip(self, default))]
    async fn get_config(&self, key: &str, default: &str) -> Result<String> {
        let url = self.endpoint(&format!("/api/config/{}", key));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Échec de la requête de configuration")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("Config key not defined, using default");
            return Ok(default.to_string());
        }
        if !response.status().is_success() {
            anyhow::bail!("Config distante indisponible : HTTP {}", response.status());
        }

        let wire: ConfigValueWire = response
            .json()
            .await
            .context("Échec du parsing de la valeur de configuration")?;

        Ok(wire
            .value
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string()))
    }
}

#[async_trait]
impl MarketDataSource for HttpBackend {
    #[instrument(skip(self))]
    async fn get_top_coins(&self, limit: usize) -> Result<Vec<CoinRecord>> {
        let url = self.endpoint(&format!("/api/coins/top?limit={}", limit));
        let envelope: ListEnvelope<CoinRecordWire> = self.get_json(&url).await?;
        let records = parse_records(envelope.into_vec());
        info!(count = records.len(), "Fetched top coins");
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn get_us_stock_home_display(&self) -> Result<Vec<CoinRecord>> {
        let url = self.endpoint("/api/stocks/home");
        let envelope: ListEnvelope<CoinRecordWire> = self.get_json(&url).await?;
        let records = parse_records(envelope.into_vec());
        info!(count = records.len(), "Fetched US stock home display");
        Ok(records)
    }

    async fn get_all_real_time_prices(&self) -> Result<HashMap<String, f64>> {
        let url = self.endpoint("/api/prices/realtime");
        let raw: HashMap<String, Value> = self.get_json(&url).await?;
        let prices = parse_price_map(raw);
        debug!(count = prices.len(), "Fetched real-time prices");
        Ok(prices)
    }
}

#[async_trait]
impl WatchlistSource for HttpBackend {
    async fn add_user_coin(&self, email: &str, symbol: &str) -> Result<MutationResponse> {
        self.send_mutation(reqwest::Method::POST, "/api/watchlist/coins", email, symbol)
            .await
    }

    async fn remove_user_coin(&self, email: &str, symbol: &str) -> Result<MutationResponse> {
        self.send_mutation(reqwest::Method::DELETE, "/api/watchlist/coins", email, symbol)
            .await
    }

    async fn add_user_stock(&self, email: &str, symbol: &str) -> Result<MutationResponse> {
        self.send_mutation(reqwest::Method::POST, "/api/watchlist/stocks", email, symbol)
            .await
    }

    async fn remove_user_stock(&self, email: &str, symbol: &str) -> Result<MutationResponse> {
        self.send_mutation(reqwest::Method::DELETE, "/api/watchlist/stocks", email, symbol)
            .await
    }
}

#[async_trait]
impl LogoProbe for HttpBackend {
    async fn probe_logo(&self, url: &str) -> Result<()> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .with_context(|| format!("Logo injoignable : {}", url))?;

        let status = match probe_verdict(response.status()) {
            ProbeVerdict::Reachable => return Ok(()),
            ProbeVerdict::Broken => response.status(),
            ProbeVerdict::RetryWithGet => {
                debug!(url = %url, status = %response.status(), "HEAD refused, probing with ranged GET");
                self.client
                    .get(url)
                    .header(RANGE, "bytes=0-0")
                    .send()
                    .await
                    .with_context(|| format!("Logo injoignable : {}", url))?
                    .status()
            }
        };

        if probe_verdict(status) != ProbeVerdict::Reachable {
            anyhow::bail!("Logo indisponible : HTTP {}", status);
        }
        Ok(())
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================
