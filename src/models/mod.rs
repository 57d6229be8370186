// ============================================================================
// Module : models
// ============================================================================
// Structures de données de l'application : enregistrements marché validés,
// modèles de vue des cartes, normalisation des symboles.
// ============================================================================

pub mod card;   // Modèle de vue des cartes + formatage
pub mod coin;   // Enregistrements marché (crypto / actions)
pub mod symbol; // Normalisation des symboles (logos vs prix)

// Re-export des structures principales pour simplifier les imports
// On peut faire : use marketdeck::models::CardData;
pub use card::{format_compact, format_price, CardData, NavigationTarget, PriceDirection};
pub use coin::{AssetKind, CoinRecord, PricePoint};
pub use symbol::{normalize_logo_symbol, price_key};
