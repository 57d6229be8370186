// ============================================================================
// Dashboard - Rendu de la vue marché
// ============================================================================
// En-tête, onglets Coins / Stocks, liste de cartes (une Block par carte,
// dimensionnée par card_layout), footer avec statut et raccourcis.
// ============================================================================

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use crate::app::{App, Screen};
use crate::models::{format_compact, AssetKind, CardData};
use crate::ui::chart::{self, direction_color, direction_suffix, mini_chart_widget, ChartData};
use crate::ui::layout::{card_layout, CardLayout};
use crate::ui::mini_chart::render_mini_chart;

/// Dessine l'interface complète
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = create_layout(frame.size());

    render_header(frame, app, chunks[0]);

    match app.current_screen {
        Screen::Dashboard => {
            render_tabs(frame, app, chunks[1]);
            render_cards(frame, app, chunks[2]);
        }
        Screen::Detail => {
            // Le détail occupe onglets + contenu
            let area = chunks[1].union(chunks[2]);
            chart::render_detail(frame, app, area);
        }
    }

    render_footer(frame, app, chunks[3]);
}

/// Header, onglets, contenu, footer
fn create_layout(area: Rect) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(4),
        ])
        .split(area)
        .to_vec()
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" MarketDeck ")
        .title_alignment(Alignment::Center);

    let user = app
        .user
        .as_ref()
        .map(|u| u.email.clone())
        .unwrap_or_else(|| "non connecté".to_string());

    let mut spans = vec![
        Span::styled(user, Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(
            format!("{} / {}", app.variant, app.context),
            Style::default().fg(Color::Gray),
        ),
        Span::raw("  "),
    ];

    if app.is_polling {
        spans.push(Span::styled("● live", Style::default().fg(Color::Green)));
    } else {
        spans.push(Span::styled("○ pause", Style::default().fg(Color::DarkGray)));
    }

    if app.is_loading_data() {
        let message = app.loading_message.as_deref().unwrap_or("Chargement...");
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("⏳ {}", message),
            Style::default().fg(Color::Yellow),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans))
        .block(block)
        .alignment(Alignment::Center);

    frame.render_widget(paragraph, area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles = vec![
        format!(" Coins ({}) ", app.coins.len()),
        format!(" Stocks ({}) ", app.stocks.len()),
    ];
    let selected = match app.tab {
        AssetKind::Coin => 0,
        AssetKind::Stock => 1,
    };

    let tabs = Tabs::new(titles)
        .select(selected)
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(Color::Gray))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    frame.render_widget(tabs, area);
}

// ============================================================================
// Cartes
// ============================================================================

fn render_cards(frame: &mut Frame, app: &App, area: Rect) {
    let cards = app.cards();

    if cards.is_empty() {
        let message = if app.is_loading_data() {
            "Chargement du marché..."
        } else {
            "Aucune donnée"
        };
        let paragraph = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(message, Style::default().fg(Color::Gray))),
        ])
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);

        frame.render_widget(paragraph, area);
        return;
    }

    let layout = card_layout(app.variant, app.context);
    let (start, count) = visible_window(cards.len(), app.selected_index, area.height, layout.height);

    let mut y = area.y;
    for (index, card) in cards.iter().enumerate().skip(start).take(count) {
        let card_area = Rect::new(area.x, y, area.width, layout.height).intersection(area);
        render_card(frame, card, &layout, index == app.selected_index, card_area);
        y += layout.height;
    }
}

/// Fenêtre de cartes visibles : garde la sélection à l'écran
fn visible_window(total: usize, selected: usize, available: u16, card_height: u16) -> (usize, usize) {
    let per_page = ((available / card_height.max(1)) as usize).max(1);
    let start = (selected + 1).saturating_sub(per_page);
    (start, per_page.min(total.saturating_sub(start)))
}

fn render_card(frame: &mut Frame, card: &CardData, layout: &CardLayout, selected: bool, area: Rect) {
    let border_style = if selected {
        Style::default().fg(layout.accent).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let title = match card.rank {
        Some(rank) if layout.show_rank => format!(" #{} {} ", rank, card.symbol),
        _ => format!(" {} ", card.symbol),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let show_chart = layout.show_chart && card.history.len() >= 2 && inner.width > 30;
    let (text_area, chart_area) = if show_chart {
        let split = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(24), Constraint::Percentage(40)])
            .split(inner);
        (split[0], Some(split[1]))
    } else {
        (inner, None)
    };

    frame.render_widget(Paragraph::new(card_lines(card, layout)), text_area);

    if let Some(chart_area) = chart_area {
        let chart = render_mini_chart(
            &card.history,
            layout.chart_width,
            layout.chart_height,
            card.is_positive(),
            layout.chart_fill,
        );
        let data = ChartData::from_chart(&chart);
        frame.render_widget(mini_chart_widget(&chart, &data), chart_area);
    }
}

/// Lignes de texte d'une carte, selon le layout
fn card_lines(card: &CardData, layout: &CardLayout) -> Vec<Line<'static>> {
    let change_color = if card.is_positive() { Color::Green } else { Color::Red };

    let mut lines = vec![Line::from(vec![
        Span::styled(
            format!("{} ", card.favorite.glyph()),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled(
            format!("{:<18}", card.name),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("{:>14}{}", card.price_display, direction_suffix(card.direction)),
            Style::default()
                .fg(direction_color(card.direction))
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(card.change_display(), Style::default().fg(change_color)),
    ])];

    if layout.show_stats {
        let market_cap = card.market_cap.map(format_compact).unwrap_or_else(|| "-".to_string());
        let volume = card.volume.map(format_compact).unwrap_or_else(|| "-".to_string());
        lines.push(Line::from(vec![
            Span::styled("Cap. ", Style::default().fg(Color::Gray)),
            Span::raw(market_cap),
            Span::styled("  Vol. ", Style::default().fg(Color::Gray)),
            Span::raw(volume),
        ]));
    }

    if layout.show_logo_url {
        lines.push(Line::from(Span::styled(
            card.logo_url.clone(),
            Style::default().fg(Color::DarkGray),
        )));
    }

    lines
}

// ============================================================================
// Footer : statut + raccourcis
// ============================================================================

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let status = match &app.status_message {
        Some(message) => Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Yellow),
        )),
        None => Line::from(""),
    };

    let shortcuts = if app.is_awaiting_quit_confirmation() {
        Line::from(vec![
            Span::styled(
                "⚠  Appuyez sur ",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "[q]",
                Style::default()
                    .fg(Color::Red)
                    .add_modifier(Modifier::BOLD)
                    .add_modifier(Modifier::SLOW_BLINK),
            ),
            Span::styled(
                " à nouveau pour quitter, ou n'importe quelle autre touche pour annuler ⚠",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
        ])
    } else if app.is_on_detail() {
        Line::from(vec![
            key_span("[Esc / espace]"),
            Span::raw(" Retour  "),
            key_span("[f]"),
            Span::raw(" Favori  "),
            key_span("[q]"),
            Span::raw(" Quit"),
        ])
    } else {
        Line::from(vec![
            key_span("[q]"),
            Span::raw(" Quit  "),
            key_span("[↑↓ / j k]"),
            Span::raw(" Naviguer  "),
            key_span("[Tab]"),
            Span::raw(" Onglet  "),
            key_span("[Enter]"),
            Span::raw(" Détail  "),
            key_span("[f]"),
            Span::raw(" Favori  "),
            key_span("[p]"),
            Span::raw(" Live  "),
            key_span("[r]"),
            Span::raw(" Recharger  "),
            key_span("[v/c]"),
            Span::raw(" Vue"),
        ])
    };

    let paragraph = Paragraph::new(vec![status, shortcuts])
        .block(block)
        .alignment(Alignment::Center);

    frame.render_widget(paragraph, area);
}

fn key_span(label: &'static str) -> Span<'static> {
    Span::styled(label, Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
}
