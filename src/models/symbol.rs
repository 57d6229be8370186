// ============================================================================
// Normalisation des symboles
// ============================================================================
// Deux normalisations distinctes coexistent :
// - cache des logos : MAJUSCULES ("btc" -> "BTC")
// - snapshot des prix temps réel : minuscules ("BTC" -> "btc")
//
// Elles ne doivent jamais être mélangées : l'API temps réel renvoie des clés
// minuscules, alors que les URLs de logos sont construites en majuscules.
// ============================================================================

/// Clé du cache des logos : symbole trimé en majuscules
pub fn normalize_logo_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Clé du snapshot de prix : symbole trimé en minuscules
pub fn price_key(symbol: &str) -> String {
    symbol.trim().to_lowercase()
}
