// ============================================================================
// Module : api
// ============================================================================
// Interfaces des collaborateurs externes (config distante, données marché,
// watchlist, vérification des logos) et leur implémentation HTTP.
//
// CONCEPT RUST : Traits comme points d'injection
// - Les services reçoivent un Arc<dyn Trait> au lieu d'un client global
// - Les tests injectent un mock (voir mock.rs)
// - #[async_trait] rend les méthodes async utilisables via dyn
// ============================================================================

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::CoinRecord;

pub mod http; // Client HTTP (reqwest)

#[cfg(test)]
pub mod mock; // Backend en mémoire pour les tests

pub use http::HttpBackend;

/// Accès à la configuration distante
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Retourne la valeur de `key`, ou `default` si elle n'est pas définie
    async fn get_config(&self, key: &str, default: &str) -> Result<String>;
}

/// Accès aux données marché
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn get_top_coins(&self, limit: usize) -> Result<Vec<CoinRecord>>;

    async fn get_us_stock_home_display(&self) -> Result<Vec<CoinRecord>>;

    /// Prix temps réel de tous les symboles suivis (symbole -> prix)
    async fn get_all_real_time_prices(&self) -> Result<HashMap<String, f64>>;
}

/// Réponse d'une mutation de watchlist
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl MutationResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub(crate) fn failed(message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.to_string()),
        }
    }
}

/// Mutations de la watchlist utilisateur
#[async_trait]
pub trait WatchlistSource: Send + Sync {
    async fn add_user_coin(&self, email: &str, symbol: &str) -> Result<MutationResponse>;
    async fn remove_user_coin(&self, email: &str, symbol: &str) -> Result<MutationResponse>;
    async fn add_user_stock(&self, email: &str, symbol: &str) -> Result<MutationResponse>;
    async fn remove_user_stock(&self, email: &str, symbol: &str) -> Result<MutationResponse>;
}

/// Vérifie qu'une URL de logo est chargeable
///
/// Un terminal n'a pas de chargeur d'images : cette sonde remplace
/// l'événement "image load error" et déclenche le fallback du service logo.
#[async_trait]
pub trait LogoProbe: Send + Sync {
    async fn probe_logo(&self, url: &str) -> Result<()>;
}
