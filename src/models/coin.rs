// ============================================================================
// Structure : CoinRecord
// ============================================================================
// Représente un actif (crypto ou action US) tel que renvoyé par l'API marché,
// une fois validé.
//
// CONCEPTS RUST :
// 1. Enum pour le type d'actif : le compilateur force à gérer Coin ET Stock
// 2. DateTime<Utc> : horodatage des points d'historique
// 3. Option<T> : champs réellement optionnels (rang, capitalisation)
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Type d'actif affiché par une carte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    /// Cryptomonnaie (ex: BTC, ETH)
    Coin,
    /// Action US (ex: AAPL, TSLA)
    Stock,
}

impl AssetKind {
    /// Nom de la route de détail pour ce type d'actif
    pub fn detail_route(&self) -> &'static str {
        match self {
            AssetKind::Coin => "CoinDetail",
            AssetKind::Stock => "StockDetail",
        }
    }

    /// Label court pour l'affichage (onglets)
    pub fn label(&self) -> &'static str {
        match self {
            AssetKind::Coin => "Crypto",
            AssetKind::Stock => "US Stocks",
        }
    }

    /// Onglet suivant (cycle)
    pub fn next(&self) -> AssetKind {
        match self {
            AssetKind::Coin => AssetKind::Stock,
            AssetKind::Stock => AssetKind::Coin,
        }
    }
}

/// Un point de l'historique court de prix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl PricePoint {
    pub fn new(price: f64, timestamp: DateTime<Utc>) -> Self {
        Self { price, timestamp }
    }
}

/// Enregistrement marché validé
///
/// Les valeurs par défaut sont appliquées à la frontière (voir api::http) :
/// une fois construit, un CoinRecord a toujours un symbole, un nom et un prix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinRecord {
    /// Symbole (ex: "BTC", "AAPL")
    pub symbol: String,

    /// Nom complet (ex: "Bitcoin")
    pub name: String,

    /// Dernier prix connu
    pub price: f64,

    /// Variation sur 24h en pourcentage
    pub change_24h: f64,

    /// Rang (capitalisation), absent pour certaines actions
    pub rank: Option<u32>,

    pub market_cap: Option<f64>,

    pub volume: Option<f64>,

    /// Historique court pour le mini graphique
    pub history: Vec<PricePoint>,
}

impl CoinRecord {
    /// Constructeur minimal (historique vide, pas de rang)
    pub fn new(symbol: String, name: String, price: f64, change_24h: f64) -> Self {
        Self {
            symbol,
            name,
            price,
            change_24h,
            rank: None,
            market_cap: None,
            volume: None,
            history: Vec::new(),
        }
    }

    /// Ajoute un historique (builder)
    pub fn with_history(mut self, history: Vec<PricePoint>) -> Self {
        self.history = history;
        self
    }

    /// Ajoute un rang (builder)
    pub fn with_rank(mut self, rank: u32) -> Self {
        self.rank = Some(rank);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_kind_routes() {
        assert_eq!(AssetKind::Coin.detail_route(), "CoinDetail");
        assert_eq!(AssetKind::Stock.detail_route(), "StockDetail");
        assert_eq!(AssetKind::Coin.next(), AssetKind::Stock);
        assert_eq!(AssetKind::Stock.next(), AssetKind::Coin);
    }

    #[test]
    fn test_record_builders() {
        let record = CoinRecord::new("BTC".to_string(), "Bitcoin".to_string(), 100.0, 1.5)
            .with_rank(1)
            .with_history(vec![PricePoint::new(99.0, Utc::now())]);

        assert_eq!(record.rank, Some(1));
        assert_eq!(record.history.len(), 1);
        assert!(record.market_cap.is_none());
    }
}
