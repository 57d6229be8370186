// ============================================================================
// Chart - Mini graphiques et écran de détail
// ============================================================================
// Convertit un MiniChart (repère y vers le bas) en datasets du widget Chart
// de ratatui (repère y vers le haut), et dessine l'écran de détail d'une
// carte : en-tête prix / variation, grand graphique, statistiques.
// ============================================================================

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use crate::app::App;
use crate::models::{format_compact, CardData, PriceDirection};
use crate::ui::mini_chart::{render_mini_chart, MiniChart};

/// Repère du graphique de l'écran de détail
const DETAIL_CHART_WIDTH: f64 = 200.0;
const DETAIL_CHART_HEIGHT: f64 = 80.0;

/// Pas horizontal des colonnes de remplissage
const FILL_STEP: f64 = 1.0;

// ============================================================================
// Conversion MiniChart -> Chart
// ============================================================================

/// Données prêtes à dessiner (retournées en y vers le haut)
pub struct ChartData {
    pub line: Vec<(f64, f64)>,
    /// Colonnes verticales base -> courbe, vide sans remplissage
    pub fill: Vec<(f64, f64)>,
}

impl ChartData {
    pub fn from_chart(chart: &MiniChart) -> Self {
        let flip = |(x, y): (f64, f64)| (x, chart.height - y);
        let line: Vec<(f64, f64)> = chart.points.iter().copied().map(flip).collect();

        let fill = if chart.fill_path.is_some() {
            fill_columns(&line, chart.height - chart.baseline())
        } else {
            Vec::new()
        };

        Self { line, fill }
    }
}

/// Zigzag base -> courbe -> base à chaque pas : une seule polyligne qui
/// remplit la zone sous la courbe
fn fill_columns(line: &[(f64, f64)], base: f64) -> Vec<(f64, f64)> {
    let mut columns = Vec::new();

    for segment in line.windows(2) {
        let (x0, y0) = segment[0];
        let (x1, y1) = segment[1];
        let span = x1 - x0;
        if span <= 0.0 {
            continue;
        }

        let mut x = x0;
        while x < x1 {
            let y = y0 + (y1 - y0) * (x - x0) / span;
            columns.extend([(x, base), (x, y), (x, base)]);
            x += FILL_STEP;
        }
    }

    if let Some(&(x, y)) = line.last() {
        columns.extend([(x, base), (x, y), (x, base)]);
    }

    columns
}

/// Widget Chart sans axes visibles pour un mini graphique
pub fn mini_chart_widget<'a>(chart: &MiniChart, data: &'a ChartData) -> Chart<'a> {
    let color = chart.palette.terminal;
    let mut datasets = Vec::new();

    if !data.fill.is_empty() {
        datasets.push(
            Dataset::default()
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(color).add_modifier(Modifier::DIM))
                .data(&data.fill),
        );
    }

    datasets.push(
        Dataset::default()
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(color))
            .data(&data.line),
    );

    Chart::new(datasets)
        .x_axis(Axis::default().bounds([0.0, chart.width]))
        .y_axis(Axis::default().bounds([0.0, chart.height]))
}

// ============================================================================
// Écran de détail
// ============================================================================

/// Dessine le détail de la carte sélectionnée
pub fn render_detail(frame: &mut Frame, app: &App, area: Rect) {
    let card = match app.selected_card() {
        Some(card) => card,
        None => {
            render_no_data(frame, area, "Aucune carte sélectionnée");
            return;
        }
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // En-tête
            Constraint::Min(0),    // Graphique
            Constraint::Length(4), // Statistiques
        ])
        .split(area)
        .to_vec();

    render_detail_header(frame, app, card, chunks[0]);
    render_detail_chart(frame, card, chunks[1]);
    render_detail_stats(frame, card, chunks[2]);
}

fn render_detail_header(frame: &mut Frame, app: &App, card: &CardData, area: Rect) {
    let route = app
        .navigation
        .as_ref()
        .map(|target| target.route.as_str())
        .unwrap_or("");

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" {} {} - {} ", route, card.symbol, card.name));

    let change_color = if card.is_positive() { Color::Green } else { Color::Red };

    let line = Line::from(vec![
        Span::raw(format!("{} ", card.favorite.glyph())),
        Span::raw("Prix: "),
        Span::styled(
            format!("{}{}", card.price_display, direction_suffix(card.direction)),
            Style::default()
                .fg(direction_color(card.direction))
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(card.change_display(), Style::default().fg(change_color)),
        Span::raw("  "),
        Span::styled(
            "[ESC]",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" Retour"),
    ]);

    let paragraph = Paragraph::new(vec![line])
        .block(block)
        .alignment(Alignment::Center);

    frame.render_widget(paragraph, area);
}

fn render_detail_chart(frame: &mut Frame, card: &CardData, area: Rect) {
    let chart = render_mini_chart(
        &card.history,
        DETAIL_CHART_WIDTH,
        DETAIL_CHART_HEIGHT,
        card.is_positive(),
        true,
    );

    if chart.is_empty() {
        render_no_data(frame, area, &format!("Pas d'historique pour {}", card.symbol));
        return;
    }

    let data = ChartData::from_chart(&chart);
    let widget = mini_chart_widget(&chart, &data).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" {} - {} points ", card.symbol, card.history.len())),
    );

    frame.render_widget(widget, area);
}

fn render_detail_stats(frame: &mut Frame, card: &CardData, area: Rect) {
    let rank = card
        .rank
        .map(|r| format!("#{}", r))
        .unwrap_or_else(|| "-".to_string());
    let market_cap = card.market_cap.map(format_compact).unwrap_or_else(|| "-".to_string());
    let volume = card.volume.map(format_compact).unwrap_or_else(|| "-".to_string());

    let lines = vec![
        Line::from(vec![
            Span::styled("Rang: ", Style::default().fg(Color::Gray)),
            Span::raw(rank),
            Span::styled("  Cap.: ", Style::default().fg(Color::Gray)),
            Span::raw(market_cap),
            Span::styled("  Volume: ", Style::default().fg(Color::Gray)),
            Span::raw(volume),
        ]),
        Line::from(Span::styled(
            card.logo_url.clone(),
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(paragraph, area);
}

// ============================================================================
// Helpers partagés avec le dashboard
// ============================================================================

/// Flèche affichée après le prix tant que le flag est actif
pub fn direction_suffix(direction: PriceDirection) -> String {
    match direction {
        PriceDirection::None => String::new(),
        other => format!(" {}", other.arrow()),
    }
}

pub fn direction_color(direction: PriceDirection) -> Color {
    match direction {
        PriceDirection::Up => Color::Green,
        PriceDirection::Down => Color::Red,
        PriceDirection::None => Color::White,
    }
}

/// Message quand il n'y a rien à dessiner
fn render_no_data(frame: &mut Frame, area: Rect, message: &str) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" ⚠ ");

    let text = vec![
        Line::from(""),
        Line::from(Span::styled(message, Style::default().fg(Color::Red))),
        Line::from(""),
        Line::from(Span::styled("[ESC] Retour", Style::default().fg(Color::Gray))),
    ];

    let paragraph = Paragraph::new(text)
        .block(block)
        .alignment(Alignment::Center);

    frame.render_widget(paragraph, area);
}
