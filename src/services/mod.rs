// ============================================================================
// Module : services
// ============================================================================
// Services côté client : résolution des logos, polling des prix temps réel,
// bouton favori. Chaque service est construit explicitement et injecté
// (pas de singleton global).
// ============================================================================

pub mod favorite;     // Bouton favori (state machine + mutation watchlist)
pub mod logo;         // Résolution et cache des URLs de logos
pub mod price_poller; // Polling des prix + flags de direction

pub use favorite::{FavoriteOutcome, FavoriteToggle, UserSession};
pub use logo::LogoService;
pub use price_poller::{PriceBoard, PricePoller, PriceSnapshot};
