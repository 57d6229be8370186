// ============================================================================
// Layout des cartes
// ============================================================================
// Politique visuelle pure : (variante, contexte) -> CardLayout.
// Aucune donnée ni I/O ici : le rendu (dashboard.rs) consomme le résultat.
// ============================================================================

use std::fmt;
use std::str::FromStr;

use ratatui::style::Color;

/// Densité d'une carte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CardVariant {
    #[default]
    Default,
    Compact,
    Detailed,
    Large,
}

/// Contexte d'affichage de la carte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CardContext {
    Home,
    #[default]
    Market,
    Search,
}

impl CardVariant {
    pub fn label(&self) -> &'static str {
        match self {
            CardVariant::Default => "default",
            CardVariant::Compact => "compact",
            CardVariant::Detailed => "detailed",
            CardVariant::Large => "large",
        }
    }

    /// Variante suivante (cycle)
    pub fn next(&self) -> CardVariant {
        match self {
            CardVariant::Default => CardVariant::Compact,
            CardVariant::Compact => CardVariant::Detailed,
            CardVariant::Detailed => CardVariant::Large,
            CardVariant::Large => CardVariant::Default,
        }
    }
}

impl CardContext {
    pub fn label(&self) -> &'static str {
        match self {
            CardContext::Home => "home",
            CardContext::Market => "market",
            CardContext::Search => "search",
        }
    }

    pub fn next(&self) -> CardContext {
        match self {
            CardContext::Home => CardContext::Market,
            CardContext::Market => CardContext::Search,
            CardContext::Search => CardContext::Home,
        }
    }
}

impl fmt::Display for CardVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for CardContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CardVariant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(CardVariant::Default),
            "compact" => Ok(CardVariant::Compact),
            "detailed" => Ok(CardVariant::Detailed),
            "large" => Ok(CardVariant::Large),
            other => anyhow::bail!("Variante de carte inconnue : {}", other),
        }
    }
}

impl FromStr for CardContext {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "home" => Ok(CardContext::Home),
            "market" => Ok(CardContext::Market),
            "search" => Ok(CardContext::Search),
            other => anyhow::bail!("Contexte de carte inconnu : {}", other),
        }
    }
}

/// Ce qu'une carte affiche et sur combien de lignes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardLayout {
    /// Hauteur en lignes terminal (bordures comprises)
    pub height: u16,
    pub show_chart: bool,
    /// Dimensions du repère du mini graphique
    pub chart_width: f64,
    pub chart_height: f64,
    pub chart_fill: bool,
    pub show_rank: bool,
    /// Capitalisation + volume
    pub show_stats: bool,
    pub show_logo_url: bool,
    pub accent: Color,
}

/// Calcule le layout d'une carte
pub fn card_layout(variant: CardVariant, context: CardContext) -> CardLayout {
    let mut layout = match variant {
        CardVariant::Compact => CardLayout {
            height: 3,
            show_chart: false,
            chart_width: 0.0,
            chart_height: 0.0,
            chart_fill: false,
            show_rank: false,
            show_stats: false,
            show_logo_url: false,
            accent: Color::Cyan,
        },
        CardVariant::Default => CardLayout {
            height: 4,
            show_chart: true,
            chart_width: 60.0,
            chart_height: 24.0,
            chart_fill: false,
            show_rank: true,
            show_stats: false,
            show_logo_url: false,
            accent: Color::Cyan,
        },
        CardVariant::Detailed => CardLayout {
            height: 6,
            show_chart: true,
            chart_width: 100.0,
            chart_height: 40.0,
            chart_fill: true,
            show_rank: true,
            show_stats: true,
            show_logo_url: true,
            accent: Color::Cyan,
        },
        CardVariant::Large => CardLayout {
            height: 8,
            show_chart: true,
            chart_width: 120.0,
            chart_height: 48.0,
            chart_fill: true,
            show_rank: true,
            show_stats: true,
            show_logo_url: false,
            accent: Color::Cyan,
        },
    };

    match context {
        CardContext::Home => {
            // Accueil : pas de rang, accent vert
            layout.show_rank = false;
            layout.accent = Color::Green;
        }
        CardContext::Market => {}
        CardContext::Search => {
            // Recherche : résultats denses, pas de graphique
            layout.show_chart = false;
            layout.chart_fill = false;
            layout.height = layout.height.min(4);
            layout.accent = Color::Yellow;
        }
    }

    layout
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variants_and_contexts() {
        assert_eq!("Detailed".parse::<CardVariant>().unwrap(), CardVariant::Detailed);
        assert_eq!(" home ".parse::<CardContext>().unwrap(), CardContext::Home);
        assert!("huge".parse::<CardVariant>().is_err());
    }

    #[test]
    fn test_cycles_cover_all_variants() {
        let mut variant = CardVariant::Default;
        for _ in 0..4 {
            variant = variant.next();
        }
        assert_eq!(variant, CardVariant::Default);
        assert_eq!(CardContext::Search.next(), CardContext::Home);
    }

    #[test]
    fn test_compact_has_no_chart() {
        let layout = card_layout(CardVariant::Compact, CardContext::Market);
        assert!(!layout.show_chart);
        assert_eq!(layout.height, 3);
    }

    #[test]
    fn test_search_context_hides_chart() {
        let layout = card_layout(CardVariant::Large, CardContext::Search);
        assert!(!layout.show_chart);
        assert!(layout.height <= 4);
        assert_eq!(layout.accent, Color::Yellow);
    }

    #[test]
    fn test_detailed_market_shows_everything() {
        let layout = card_layout(CardVariant::Detailed, CardContext::Market);
        assert!(layout.show_chart && layout.chart_fill && layout.show_stats && layout.show_rank);
        assert!(layout.show_logo_url);
    }

    #[test]
    fn test_home_context_hides_rank() {
        assert!(!card_layout(CardVariant::Default, CardContext::Home).show_rank);
    }
}
