// ============================================================================
// Mini Chart - Calcul du chemin vectoriel
// ============================================================================
// Fonction pure : série de prix -> points normalisés + chemin "M x y L x y".
// Pas d'état, pas d'I/O. Le rendu terminal (canvas) consomme `points`.
//
// Repère : origine en haut à gauche, y croît vers le bas (comme SVG).
// ============================================================================

use ratatui::style::Color;

use crate::models::PricePoint;

/// Marge fixe sur les 4 côtés
pub const CHART_MARGIN: f64 = 2.0;

/// Palette d'une courbe (trait + remplissage translucide)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartPalette {
    pub stroke: &'static str,
    pub fill: &'static str,
    /// Équivalent terminal du trait
    pub terminal: Color,
}

pub const POSITIVE_PALETTE: ChartPalette = ChartPalette {
    stroke: "#16C784",
    fill: "rgba(22, 199, 132, 0.1)",
    terminal: Color::Rgb(22, 199, 132),
};

pub const NEGATIVE_PALETTE: ChartPalette = ChartPalette {
    stroke: "#EA3943",
    fill: "rgba(234, 57, 67, 0.1)",
    terminal: Color::Rgb(234, 57, 67),
};

/// Résultat du rendu
#[derive(Debug, Clone, PartialEq)]
pub struct MiniChart {
    pub width: f64,
    pub height: f64,
    /// Points (x, y) normalisés, de gauche à droite
    pub points: Vec<(f64, f64)>,
    /// Polyligne ; None si moins de 2 points
    pub line_path: Option<String>,
    /// Forme fermée sous la courbe, seulement si demandée
    pub fill_path: Option<String>,
    pub palette: ChartPalette,
}

impl MiniChart {
    pub fn is_empty(&self) -> bool {
        self.line_path.is_none()
    }

    /// Ordonnée de la ligne de base (marge basse)
    pub fn baseline(&self) -> f64 {
        self.height - CHART_MARGIN
    }
}

/// Calcule le mini graphique d'une série de prix
///
/// L'ordre d'entrée n'est pas fiable : la série est retriée par timestamp.
/// Une série constante place tous les points au milieu vertical.
pub fn render_mini_chart(
    series: &[PricePoint],
    width: f64,
    height: f64,
    positive: bool,
    with_fill: bool,
) -> MiniChart {
    let palette = if positive { POSITIVE_PALETTE } else { NEGATIVE_PALETTE };

    let mut chart = MiniChart {
        width,
        height,
        points: Vec::new(),
        line_path: None,
        fill_path: None,
        palette,
    };

    if series.len() < 2 {
        return chart;
    }

    let mut sorted = series.to_vec();
    sorted.sort_by_key(|point| point.timestamp);

    let (min, max) = sorted.iter().fold((f64::MAX, f64::MIN), |(min, max), point| {
        (min.min(point.price), max.max(point.price))
    });
    let range = max - min;

    let inner_width = (width - 2.0 * CHART_MARGIN).max(0.0);
    let inner_height = (height - 2.0 * CHART_MARGIN).max(0.0);
    let last_index = (sorted.len() - 1) as f64;

    chart.points = sorted
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let x = CHART_MARGIN + (i as f64 / last_index) * inner_width;
            let y = if range > 0.0 {
                let normalized = (point.price - min) / range;
                CHART_MARGIN + (1.0 - normalized) * inner_height
            } else {
                height / 2.0
            };
            (x, y)
        })
        .collect();

    chart.line_path = Some(polyline_path(&chart.points));

    if with_fill {
        chart.fill_path = Some(fill_path(&chart.points, chart.baseline()));
    }

    chart
}

/// "M x0 y0 L x1 y1 ..."
fn polyline_path(points: &[(f64, f64)]) -> String {
    points
        .iter()
        .enumerate()
        .map(|(i, (x, y))| {
            let command = if i == 0 { "M" } else { "L" };
            format!("{} {:.2} {:.2}", command, x, y)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Ligne de base -> premier point -> tous les points -> base sous le dernier -> Z
fn fill_path(points: &[(f64, f64)], baseline: f64) -> String {
    let (first_x, _) = points[0];
    let (last_x, _) = points[points.len() - 1];

    let mut path = format!("M {:.2} {:.2}", first_x, baseline);
    for (x, y) in points {
        path.push_str(&format!(" L {:.2} {:.2}", x, y));
    }
    path.push_str(&format!(" L {:.2} {:.2} Z", last_x, baseline));
    path
}
