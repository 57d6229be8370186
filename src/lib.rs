// ============================================================================
// MarketDeck - Library
// ============================================================================
// Expose les modules publics pour le binaire TUI et les tests
// ============================================================================

pub mod api;      // Sources de données (HTTP + traits)
pub mod app;      // État de l'application
pub mod config;   // Configuration (variables d'environnement)
pub mod models;   // Structures de données
pub mod services; // Logos, polling des prix, favoris
pub mod ui;       // Interface utilisateur
