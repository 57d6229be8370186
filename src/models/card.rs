// ============================================================================
// Structure : CardData
// ============================================================================
// Modèle de vue d'une carte (crypto ou action) : projection dénormalisée d'un
// CoinRecord + logo résolu + flag de direction transitoire + état du bouton
// favori.
//
// CONCEPTS RUST :
// 1. Composition : CardData contient un FavoriteToggle (state machine)
// 2. Methods : formatage du prix, calcul de la route de détail
// 3. BTreeMap : paramètres de navigation triés (affichage et tests stables)
// ============================================================================

use std::collections::BTreeMap;

use crate::models::{price_key, AssetKind, CoinRecord, PricePoint};
use crate::services::favorite::FavoriteToggle;

/// Direction transitoire du prix (calculée entre deux ticks de polling)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceDirection {
    Up,
    Down,
    #[default]
    None,
}

impl PriceDirection {
    /// Flèche affichée à côté du prix
    pub fn arrow(&self) -> &'static str {
        match self {
            PriceDirection::Up => "▲",
            PriceDirection::Down => "▼",
            PriceDirection::None => " ",
        }
    }
}

/// Cible de navigation : nom de route + paramètres
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTarget {
    pub route: String,
    pub params: BTreeMap<String, String>,
}

impl NavigationTarget {
    pub fn new(route: &str) -> Self {
        Self {
            route: route.to_string(),
            params: BTreeMap::new(),
        }
    }

    /// Ajoute un paramètre (builder)
    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }
}

/// Carte affichée dans la vue marché
#[derive(Debug, Clone)]
pub struct CardData {
    pub kind: AssetKind,
    pub symbol: String,
    pub name: String,
    pub rank: Option<u32>,

    /// Dernier prix numérique (mis à jour par le polling)
    pub price: f64,

    /// Prix formaté ("67,123.45")
    pub price_display: String,

    pub change_percent: f64,
    pub market_cap: Option<f64>,
    pub volume: Option<f64>,

    /// URL du logo (résolution sync puis raffinée en async)
    pub logo_url: String,

    pub history: Vec<PricePoint>,

    /// Flag de direction, remis à None après la fenêtre d'affichage
    pub direction: PriceDirection,

    /// Bouton favori de cette carte
    pub favorite: FavoriteToggle,
}

impl CardData {
    /// Construit une carte à partir d'un enregistrement marché et d'un logo
    pub fn from_record(kind: AssetKind, record: &CoinRecord, logo_url: String) -> Self {
        Self {
            kind,
            symbol: record.symbol.clone(),
            name: record.name.clone(),
            rank: record.rank,
            price: record.price,
            price_display: format_price(record.price),
            change_percent: record.change_24h,
            market_cap: record.market_cap,
            volume: record.volume,
            logo_url,
            history: record.history.clone(),
            direction: PriceDirection::None,
            favorite: FavoriteToggle::default(),
        }
    }

    /// Clé de cette carte dans le snapshot des prix (minuscules)
    pub fn price_key(&self) -> String {
        price_key(&self.symbol)
    }

    /// Met à jour le prix affiché (indépendant du flag de direction)
    pub fn update_price(&mut self, price: f64) {
        self.price = price;
        self.price_display = format_price(price);
    }

    /// Variation 24h positive ou nulle
    pub fn is_positive(&self) -> bool {
        self.change_percent >= 0.0
    }

    /// Variation formatée avec signe ("+2.34%")
    pub fn change_display(&self) -> String {
        format!("{:+.2}%", self.change_percent)
    }

    /// Cible de navigation vers l'écran de détail
    pub fn detail_route(&self) -> NavigationTarget {
        NavigationTarget::new(self.kind.detail_route())
            .param("symbol", &self.symbol)
            .param("name", &self.name)
    }
}

// ============================================================================
// Formatage
// ============================================================================

/// Formate un prix avec séparateurs de milliers et 2 à 6 décimales
///
/// Exemples : 67123.4 -> "67,123.40", 0.00012345 -> "0.000123",
/// 1234567.891 -> "1,234,567.891"
pub fn format_price(price: f64) -> String {
    if !price.is_finite() {
        return "—".to_string();
    }

    let raw = format!("{:.6}", price.abs());
    let (int_part, frac_part) = raw.split_once('.').unwrap_or((raw.as_str(), ""));

    let mut frac = frac_part.trim_end_matches('0').to_string();
    while frac.len() < 2 {
        frac.push('0');
    }

    let sign = if price < 0.0 && raw.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };

    format!("{}{}.{}", sign, group_thousands(int_part), frac)
}

/// Insère une virgule toutes les 3 chiffres en partant de la droite
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Formate un grand montant de façon compacte ("1.23B", "45.6M")
pub fn format_compact(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e12 {
        format!("{:.2}T", value / 1e12)
    } else if abs >= 1e9 {
        format!("{:.2}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.2}K", value / 1e3)
    } else {
        format!("{:.2}", value)
    }
}
