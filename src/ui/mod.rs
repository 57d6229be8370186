// ============================================================================
// Module : ui
// ============================================================================
// Interface terminal : cartes, mini graphiques, écran de détail, clavier.
// mini_chart et layout sont purs (aucune dépendance au terminal).
// ============================================================================

pub mod chart;      // Widget Chart des mini graphiques + écran de détail
pub mod dashboard;  // Vue marché (onglets, cartes, footer)
pub mod events;     // Gestion des événements clavier
pub mod layout;     // Politique visuelle des cartes
pub mod mini_chart; // Calcul des chemins du mini graphique

pub use dashboard::render;
pub use events::{Event, EventHandler};
