// ============================================================================
// Structure : App
// ============================================================================
// État global de la vue marché :
// - deux listes de cartes (coins, stocks) et l'onglet actif
// - PriceBoard : dernier snapshot de prix + flags de direction
// - utilisateur connecté (ou non) pour le bouton favori
// - variante / contexte des cartes, écran courant, statut, quit en deux temps
//
// Tous les effets (réseau, timers) sont pilotés depuis main.rs : App ne fait
// que recevoir des résultats et des instants explicites.
// ============================================================================

use std::collections::HashMap;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::models::{normalize_logo_symbol, AssetKind, CardData, NavigationTarget, PriceDirection};
use crate::services::favorite::{FavoriteError, FavoriteRequest, PressDecision};
use crate::services::{FavoriteOutcome, PriceBoard, PriceSnapshot, UserSession};
use crate::ui::layout::{CardContext, CardVariant};

/// Écrans de l'application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    /// Liste des cartes de l'onglet actif
    Dashboard,

    /// Détail de la carte sélectionnée
    Detail,
}

/// État principal de l'application
pub struct App {
    pub running: bool,
    pub current_screen: Screen,

    /// Onglet actif
    pub tab: AssetKind,
    pub coins: Vec<CardData>,
    pub stocks: Vec<CardData>,

    /// Index de la carte sélectionnée dans l'onglet actif
    pub selected_index: usize,

    pub prices: PriceBoard,
    pub user: Option<UserSession>,

    pub variant: CardVariant,
    pub context: CardContext,

    /// Dernière cible de navigation (écran de détail)
    pub navigation: Option<NavigationTarget>,

    /// Message affiché dans le footer (issue d'un favori, erreur de chargement)
    pub status_message: Option<String>,

    /// Quit en deux temps : première pression de 'q' -> true
    pub confirm_quit: bool,

    pub is_loading: bool,
    pub loading_message: Option<String>,

    /// Polling des prix actif (reflète l'état du PricePoller)
    pub is_polling: bool,
}

impl App {
    pub fn new(user: Option<UserSession>, variant: CardVariant, context: CardContext) -> Self {
        Self {
            running: true,
            current_screen: Screen::Dashboard,
            tab: AssetKind::Coin,
            coins: Vec::new(),
            stocks: Vec::new(),
            selected_index: 0,
            prices: PriceBoard::new(),
            user,
            variant,
            context,
            navigation: None,
            status_message: None,
            confirm_quit: false,
            is_loading: false,
            loading_message: None,
            is_polling: false,
        }
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // ========================================================================
    // Cartes et navigation
    // ========================================================================

    /// Cartes de l'onglet actif
    pub fn cards(&self) -> &[CardData] {
        match self.tab {
            AssetKind::Coin => &self.coins,
            AssetKind::Stock => &self.stocks,
        }
    }

    fn cards_of_mut(&mut self, kind: AssetKind) -> &mut Vec<CardData> {
        match kind {
            AssetKind::Coin => &mut self.coins,
            AssetKind::Stock => &mut self.stocks,
        }
    }

    fn all_cards_mut(&mut self) -> impl Iterator<Item = &mut CardData> {
        self.coins.iter_mut().chain(self.stocks.iter_mut())
    }

    pub fn selected_card(&self) -> Option<&CardData> {
        self.cards().get(self.selected_index)
    }

    pub fn navigate_up(&mut self) {
        self.selected_index = self.selected_index.saturating_sub(1);
    }

    pub fn navigate_down(&mut self) {
        let max_index = self.cards().len().saturating_sub(1);
        self.selected_index = (self.selected_index + 1).min(max_index);
    }

    /// Onglet suivant, sélection remise en haut
    pub fn next_tab(&mut self) {
        self.tab = self.tab.next();
        self.selected_index = 0;
    }

    pub fn next_variant(&mut self) {
        self.variant = self.variant.next();
    }

    pub fn next_context(&mut self) {
        self.context = self.context.next();
    }

    /// Remplace les cartes d'un type
    ///
    /// L'état favori d'un symbole déjà affiché est conservé. Le prix reste
    /// celui du chargement : seul apply_price_tick pousse les snapshots.
    pub fn set_cards(&mut self, kind: AssetKind, mut cards: Vec<CardData>) {
        let previous: HashMap<String, CardData> = self
            .cards_of_mut(kind)
            .drain(..)
            .map(|card| (card.price_key(), card))
            .collect();

        for card in cards.iter_mut() {
            if let Some(old) = previous.get(&card.price_key()) {
                card.favorite = old.favorite.clone();
            }
            card.direction = self.prices.direction(&card.symbol);
        }

        info!(kind = kind.label(), count = cards.len(), "Cards updated");
        *self.cards_of_mut(kind) = cards;

        let max_index = self.cards().len().saturating_sub(1);
        self.selected_index = self.selected_index.min(max_index);
    }

    // ========================================================================
    // Prix temps réel
    // ========================================================================

    /// Applique un snapshot de prix à toutes les cartes
    ///
    /// Le prix affiché est mis à jour dès qu'un prix frais existe pour la
    /// carte, que la direction ait changé ou non. Retourne le nombre de
    /// cartes mises à jour.
    pub fn apply_price_tick(&mut self, snapshot: PriceSnapshot, now: Instant) -> usize {
        let changes = self.prices.apply(snapshot, now);
        let prices = &self.prices;

        let mut updated = 0;
        for card in self.coins.iter_mut().chain(self.stocks.iter_mut()) {
            if let Some(price) = prices.price(&card.symbol) {
                card.update_price(price);
                updated += 1;
            }
            card.direction = prices.direction(&card.symbol);
        }

        debug!(updated, changed = changes.len(), "Price tick applied");
        updated
    }

    /// Tick : expiration des flags de direction et des confirmations favori
    pub fn tick(&mut self, now: Instant) {
        if self.prices.clear_expired(now) {
            for card in self.all_cards_mut() {
                card.direction = PriceDirection::None;
            }
        }

        for card in self.all_cards_mut() {
            card.favorite.tick(now);
        }
    }

    // ========================================================================
    // Favoris
    // ========================================================================

    /// Appui sur le bouton favori de la carte sélectionnée
    ///
    /// Retourne la requête à envoyer au worker, le cas échéant.
    pub fn press_favorite(&mut self) -> Option<FavoriteRequest> {
        let user = self.user.clone();
        let index = self.selected_index;
        let card = self.cards_of_mut(self.tab).get_mut(index)?;

        let decision = card.favorite.press(user.as_ref(), &card.symbol, card.kind);
        let symbol = card.symbol.clone();

        match decision {
            PressDecision::Ignored => None,
            PressDecision::LoginRequired => {
                self.set_status(login_required_message());
                None
            }
            PressDecision::Submit(request) => {
                debug!(symbol = %symbol, add = request.add, "Favorite submitted");
                Some(request)
            }
        }
    }

    /// Applique le résultat d'une mutation de watchlist
    ///
    /// La carte est retrouvée par type et symbole : la sélection a pu bouger.
    pub fn complete_favorite(
        &mut self,
        kind: AssetKind,
        symbol: &str,
        result: Result<(), FavoriteError>,
        now: Instant,
    ) -> FavoriteOutcome {
        let key = crate::models::price_key(symbol);
        let card = match self
            .cards_of_mut(kind)
            .iter_mut()
            .find(|card| card.price_key() == key)
        {
            Some(card) => card,
            None => return FavoriteOutcome::Ignored,
        };

        let outcome = card.favorite.complete(&result, now);
        let name = card.symbol.clone();

        match &outcome {
            FavoriteOutcome::Added => self.set_status(format!("{} ajouté à la watchlist", name)),
            FavoriteOutcome::Removed => self.set_status(format!("{} retiré de la watchlist", name)),
            FavoriteOutcome::LoginRequired => self.set_status(login_required_message()),
            FavoriteOutcome::Failed(message) => {
                self.set_status(format!("Échec de la mise à jour de {} : {}", name, message))
            }
            FavoriteOutcome::Ignored => {}
        }

        outcome
    }

    // ========================================================================
    // Logos
    // ========================================================================

    /// Applique des URLs de logo (clé : symbole en majuscules)
    pub fn apply_logos(&mut self, logos: &HashMap<String, String>) {
        for card in self.all_cards_mut() {
            if let Some(url) = logos.get(&normalize_logo_symbol(&card.symbol)) {
                card.logo_url = url.clone();
            }
        }
    }

    /// Remplace le logo d'un symbole par le fallback
    pub fn apply_logo_fallback(&mut self, symbol: &str, fallback_url: &str) {
        let key = normalize_logo_symbol(symbol);
        for card in self.all_cards_mut() {
            if normalize_logo_symbol(&card.symbol) == key {
                card.logo_url = fallback_url.to_string();
            }
        }
    }

    // ========================================================================
    // Écrans
    // ========================================================================

    /// Ouvre le détail de la carte sélectionnée
    pub fn open_detail(&mut self) -> Option<&NavigationTarget> {
        let target = self.selected_card()?.detail_route();
        info!(route = %target.route, "Opening detail screen");
        self.navigation = Some(target);
        self.current_screen = Screen::Detail;
        self.navigation.as_ref()
    }

    pub fn show_dashboard(&mut self) {
        self.current_screen = Screen::Dashboard;
    }

    pub fn is_on_dashboard(&self) -> bool {
        self.current_screen == Screen::Dashboard
    }

    pub fn is_on_detail(&self) -> bool {
        self.current_screen == Screen::Detail
    }

    // ========================================================================
    // Statut, chargement, quit
    // ========================================================================

    pub fn set_status(&mut self, message: String) {
        self.status_message = Some(message);
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    pub fn request_quit(&mut self) {
        self.confirm_quit = true;
    }

    pub fn cancel_quit(&mut self) {
        self.confirm_quit = false;
    }

    pub fn is_awaiting_quit_confirmation(&self) -> bool {
        self.confirm_quit
    }

    pub fn start_loading(&mut self, message: Option<String>) {
        self.is_loading = true;
        self.loading_message = message;
    }

    pub fn stop_loading(&mut self) {
        self.is_loading = false;
        self.loading_message = None;
    }

    pub fn is_loading_data(&self) -> bool {
        self.is_loading
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new(None, CardVariant::default(), CardContext::default())
    }
}

fn login_required_message() -> String {
    "Connexion requise pour modifier la watchlist".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CoinRecord;
    use crate::services::favorite::FavoriteState;
    use crate::services::price_poller::DIRECTION_HOLD;
    use std::collections::HashMap;
    use std::time::Duration;

    fn card(kind: AssetKind, symbol: &str, price: f64) -> CardData {
        let record = CoinRecord::new(symbol.to_string(), symbol.to_string(), price, 1.0);
        CardData::from_record(kind, &record, String::new())
    }

    fn app_with_coins() -> App {
        let mut app = App::new(
            Some(UserSession::new("alice@example.com")),
            CardVariant::Default,
            CardContext::Market,
        );
        app.set_cards(
            AssetKind::Coin,
            vec![card(AssetKind::Coin, "BTC", 100.0), card(AssetKind::Coin, "ETH", 10.0)],
        );
        app
    }

    fn snapshot(pairs: &[(&str, f64)]) -> PriceSnapshot {
        PriceSnapshot::from_prices(pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect())
    }

    #[test]
    fn test_app_creation() {
        let app = App::default();
        assert!(app.is_running());
        assert!(app.cards().is_empty());
        assert!(app.is_on_dashboard());
        assert!(!app.is_polling);
    }

    #[test]
    fn test_navigation_clamps() {
        let mut app = app_with_coins();
        app.navigate_down();
        app.navigate_down();
        assert_eq!(app.selected_index, 1);
        app.navigate_up();
        app.navigate_up();
        assert_eq!(app.selected_index, 0);
    }

    #[test]
    fn test_next_tab_resets_selection() {
        let mut app = app_with_coins();
        app.navigate_down();
        app.next_tab();
        assert_eq!(app.tab, AssetKind::Stock);
        assert_eq!(app.selected_index, 0);
        assert!(app.cards().is_empty());
    }

    #[test]
    fn test_first_tick_updates_prices_without_directions() {
        let mut app = app_with_coins();
        let updated = app.apply_price_tick(snapshot(&[("btc", 101.0)]), Instant::now());

        assert_eq!(updated, 1);
        assert_eq!(app.coins[0].price, 101.0);
        assert_eq!(app.coins[0].price_display, "101.00");
        assert_eq!(app.coins[0].direction, PriceDirection::None);
        assert_eq!(app.coins[1].price, 10.0);
    }

    #[test]
    fn test_directions_set_then_cleared_after_hold() {
        let mut app = app_with_coins();
        let start = Instant::now();

        app.apply_price_tick(snapshot(&[("btc", 100.0), ("eth", 10.0)]), start);
        app.apply_price_tick(snapshot(&[("btc", 105.0), ("eth", 9.0)]), start);

        assert_eq!(app.coins[0].direction, PriceDirection::Up);
        assert_eq!(app.coins[1].direction, PriceDirection::Down);

        app.tick(start + DIRECTION_HOLD - Duration::from_millis(1));
        assert_eq!(app.coins[0].direction, PriceDirection::Up);

        app.tick(start + DIRECTION_HOLD);
        assert_eq!(app.coins[0].direction, PriceDirection::None);
        assert_eq!(app.coins[1].direction, PriceDirection::None);
        // Le prix reste celui du dernier snapshot
        assert_eq!(app.coins[0].price, 105.0);
    }

    #[test]
    fn test_press_favorite_without_user_sets_login_status() {
        let mut app = app_with_coins();
        app.user = None;

        assert!(app.press_favorite().is_none());
        assert_eq!(app.coins[0].favorite.state(), FavoriteState::Idle);
        assert!(app.status_message.as_deref().unwrap_or("").contains("Connexion requise"));
    }

    #[test]
    fn test_favorite_round_trip_through_app() {
        let mut app = app_with_coins();
        let request = app.press_favorite().unwrap();
        assert_eq!(request.symbol, "BTC");
        assert!(request.add);
        assert!(app.coins[0].favorite.is_busy());

        // Second appui pendant l'envoi : ignoré
        assert!(app.press_favorite().is_none());

        let outcome = app.complete_favorite(AssetKind::Coin, "btc", Ok(()), Instant::now());
        assert_eq!(outcome, FavoriteOutcome::Added);
        assert!(app.coins[0].favorite.is_favorite());
        assert_eq!(app.status_message.as_deref(), Some("BTC ajouté à la watchlist"));
    }

    #[test]
    fn test_favorite_session_expired_maps_to_login() {
        let mut app = app_with_coins();
        app.press_favorite().unwrap();

        let outcome = app.complete_favorite(
            AssetKind::Coin,
            "BTC",
            Err(FavoriteError::LoginRequired),
            Instant::now(),
        );
        assert_eq!(outcome, FavoriteOutcome::LoginRequired);
        assert!(!app.coins[0].favorite.is_favorite());
        assert_eq!(app.coins[0].favorite.state(), FavoriteState::Idle);
    }

    #[test]
    fn test_set_cards_keeps_favorite_state() {
        let mut app = app_with_coins();
        app.press_favorite().unwrap();
        app.complete_favorite(AssetKind::Coin, "BTC", Ok(()), Instant::now());

        app.set_cards(AssetKind::Coin, vec![card(AssetKind::Coin, "BTC", 99.0)]);
        assert!(app.coins[0].favorite.is_favorite());
    }

    #[test]
    fn test_reload_keeps_fresh_market_price() {
        let mut app = app_with_coins();
        app.apply_price_tick(snapshot(&[("btc", 100.0)]), Instant::now());

        // Polling en pause puis rechargement : le prix du marché l'emporte
        app.set_cards(AssetKind::Coin, vec![card(AssetKind::Coin, "BTC", 200.0)]);
        assert_eq!(app.coins[0].price, 200.0);
        assert_eq!(app.coins[0].price_display, "200.00");

        // Le tick suivant reprend la main
        app.apply_price_tick(snapshot(&[("btc", 201.5)]), Instant::now());
        assert_eq!(app.coins[0].price, 201.5);
    }

    #[test]
    fn test_logo_updates() {
        let mut app = app_with_coins();
        let logos: HashMap<String, String> =
            [("BTC".to_string(), "https://cdn/BTC.png".to_string())].into_iter().collect();

        app.apply_logos(&logos);
        assert_eq!(app.coins[0].logo_url, "https://cdn/BTC.png");
        assert_eq!(app.coins[1].logo_url, "");

        app.apply_logo_fallback("btc", "https://cdn/default.png");
        assert_eq!(app.coins[0].logo_url, "https://cdn/default.png");
    }

    #[test]
    fn test_open_detail_builds_navigation() {
        let mut app = app_with_coins();
        let target = app.open_detail().cloned().unwrap();

        assert_eq!(target.route, "CoinDetail");
        assert_eq!(target.params.get("symbol").map(String::as_str), Some("BTC"));
        assert!(app.is_on_detail());

        app.show_dashboard();
        assert!(app.is_on_dashboard());
    }

    #[test]
    fn test_two_step_quit() {
        let mut app = App::default();
        app.request_quit();
        assert!(app.is_awaiting_quit_confirmation());
        app.cancel_quit();
        assert!(!app.is_awaiting_quit_confirmation());
        app.quit();
        assert!(!app.is_running());
    }
}
