// ============================================================================
// Service : bouton favori (watchlist utilisateur)
// ============================================================================
// State machine par carte :
//
//   Idle --press--> Submitting --succès--> Confirmed (3s) --> Idle
//                        |
//                        +--échec--> Idle (erreur remontée à l'appelant)
//
// - Sans utilisateur connecté : LoginRequired, aucun appel réseau
// - Pendant Submitting : le bouton est désactivé (press ignoré)
// - Un message contenant "登录已过期" (session expirée) est routé vers
//   LoginRequired au lieu d'un échec générique
//
// CONCEPT RUST : séparation état / effet
// - press() et complete() sont synchrones et testables sans réseau
// - submit_favorite() est l'effet async (appel à la watchlist)
// ============================================================================

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::WatchlistSource;
use crate::models::AssetKind;

/// Durée d'affichage de la confirmation après un succès
pub const CONFIRMATION_HOLD: Duration = Duration::from_secs(3);

/// Marqueurs de session expirée (recherchés dans le message d'erreur)
pub const SESSION_EXPIRED_MARKERS: &[&str] = &["登录已过期", "session expired"];

/// Utilisateur connecté
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    pub email: String,
}

impl UserSession {
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
        }
    }
}

/// Le message signale-t-il une session expirée ?
pub fn is_session_expired(message: &str) -> bool {
    let lowered = message.to_lowercase();
    SESSION_EXPIRED_MARKERS
        .iter()
        .any(|marker| lowered.contains(&marker.to_lowercase()))
}

/// Erreur d'une mutation de watchlist
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FavoriteError {
    /// Session absente ou expirée : l'utilisateur doit se reconnecter
    #[error("connexion requise")]
    LoginRequired,

    #[error("{0}")]
    Failed(String),
}

impl FavoriteError {
    /// Classe un message d'erreur brut
    fn from_message(message: &str) -> Self {
        if is_session_expired(message) {
            FavoriteError::LoginRequired
        } else {
            FavoriteError::Failed(message.to_string())
        }
    }
}

/// Requête de mutation préparée par press()
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteRequest {
    pub email: String,
    pub symbol: String,
    pub kind: AssetKind,
    /// true : ajout, false : retrait
    pub add: bool,
}

/// Décision prise à l'appui sur le bouton
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PressDecision {
    /// Déjà en cours : appui ignoré
    Ignored,
    /// Pas d'utilisateur : aucun appel réseau
    LoginRequired,
    /// Appel réseau à effectuer
    Submit(FavoriteRequest),
}

/// Résultat final présenté à l'appelant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavoriteOutcome {
    Ignored,
    LoginRequired,
    Added,
    Removed,
    Failed(String),
}

/// États du bouton
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FavoriteState {
    #[default]
    Idle,
    Submitting,
    /// Confirmation affichée jusqu'à `until`
    Confirmed { until: Instant },
}

/// Bouton favori d'une carte
#[derive(Debug, Clone, Default)]
pub struct FavoriteToggle {
    state: FavoriteState,
    is_favorite: bool,
    /// Ajout ou retrait en cours (fixé par press)
    pending_add: bool,
}

impl FavoriteToggle {
    pub fn new(is_favorite: bool) -> Self {
        Self {
            is_favorite,
            ..Self::default()
        }
    }

    pub fn state(&self) -> FavoriteState {
        self.state
    }

    pub fn is_favorite(&self) -> bool {
        self.is_favorite
    }

    /// Bouton désactivé pendant l'envoi
    pub fn is_busy(&self) -> bool {
        self.state == FavoriteState::Submitting
    }

    /// Glyphe affiché sur la carte
    pub fn glyph(&self) -> &'static str {
        match self.state {
            FavoriteState::Submitting => "…",
            FavoriteState::Confirmed { .. } => "✓",
            FavoriteState::Idle if self.is_favorite => "★",
            FavoriteState::Idle => "☆",
        }
    }

    /// Appui sur le bouton
    pub fn press(&mut self, user: Option<&UserSession>, symbol: &str, kind: AssetKind) -> PressDecision {
        if self.is_busy() {
            debug!(symbol = %symbol, "Favorite press ignored while submitting");
            return PressDecision::Ignored;
        }

        let user = match user {
            Some(user) => user,
            None => {
                info!(symbol = %symbol, "Favorite press without user, login required");
                return PressDecision::LoginRequired;
            }
        };

        self.state = FavoriteState::Submitting;
        self.pending_add = !self.is_favorite;

        PressDecision::Submit(FavoriteRequest {
            email: user.email.clone(),
            symbol: symbol.to_string(),
            kind,
            add: self.pending_add,
        })
    }

    /// Applique le résultat de l'appel réseau
    pub fn complete(&mut self, result: &Result<(), FavoriteError>, now: Instant) -> FavoriteOutcome {
        if !self.is_busy() {
            return FavoriteOutcome::Ignored;
        }

        match result {
            Ok(()) => {
                self.is_favorite = self.pending_add;
                self.state = FavoriteState::Confirmed {
                    until: now + CONFIRMATION_HOLD,
                };
                if self.pending_add {
                    FavoriteOutcome::Added
                } else {
                    FavoriteOutcome::Removed
                }
            }
            Err(FavoriteError::LoginRequired) => {
                self.state = FavoriteState::Idle;
                FavoriteOutcome::LoginRequired
            }
            Err(FavoriteError::Failed(message)) => {
                self.state = FavoriteState::Idle;
                FavoriteOutcome::Failed(message.clone())
            }
        }
    }

    /// Fin de la confirmation
    pub fn tick(&mut self, now: Instant) {
        if let FavoriteState::Confirmed { until } = self.state {
            if now >= until {
                self.state = FavoriteState::Idle;
            }
        }
    }
}

/// Effectue la mutation décrite par la requête
pub async fn submit_favorite(
    service: &dyn WatchlistSource,
    request: &FavoriteRequest,
) -> Result<(), FavoriteError> {
    let email = request.email.as_str();
    let symbol = request.symbol.as_str();

    let response = match (request.kind, request.add) {
        (AssetKind::Coin, true) => service.add_user_coin(email, symbol).await,
        (AssetKind::Coin, false) => service.remove_user_coin(email, symbol).await,
        (AssetKind::Stock, true) => service.add_user_stock(email, symbol).await,
        (AssetKind::Stock, false) => service.remove_user_stock(email, symbol).await,
    };

    match response {
        Ok(response) if response.success => {
            info!(symbol = %symbol, add = request.add, "Watchlist updated");
            Ok(())
        }
        Ok(response) => {
            let message = response
                .error
                .unwrap_or_else(|| "Mise à jour de la watchlist refusée".to_string());
            warn!(symbol = %symbol, error = %message, "Watchlist update rejected");
            Err(FavoriteError::from_message(&message))
        }
        Err(e) => {
            warn!(symbol = %symbol, error = ?e, "Watchlist update failed");
            Err(FavoriteError::from_message(&format!("{:#}", e)))
        }
    }
}

/// Enchaîne press -> submit -> complete pour un propriétaire unique
///
/// L'application découpe ce cycle entre la loop et le worker
/// (App::press_favorite, submit_favorite, App::complete_favorite).
#[cfg(test)]
pub(crate) async fn toggle_favorite(
    toggle: &mut FavoriteToggle,
    user: Option<&UserSession>,
    service: &dyn WatchlistSource,
    symbol: &str,
    kind: AssetKind,
) -> FavoriteOutcome {
    let request = match toggle.press(user, symbol, kind) {
        PressDecision::Submit(request) => request,
        PressDecision::LoginRequired => return FavoriteOutcome::LoginRequired,
        PressDecision::Ignored => return FavoriteOutcome::Ignored,
    };

    let result = submit_favorite(service, &request).await;
    toggle.complete(&result, Instant::now())
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockBackend;
    use crate::api::MutationResponse;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_press_without_user_never_calls_network() {
        let backend = MockBackend::new();
        let mut toggle = FavoriteToggle::default();

        let outcome = toggle_favorite(&mut toggle, None, &backend, "BTC", AssetKind::Coin).await;

        assert_eq!(outcome, FavoriteOutcome::LoginRequired);
        assert_eq!(backend.mutation_calls.load(Ordering::SeqCst), 0);
        assert_eq!(toggle.state(), FavoriteState::Idle);
    }

    #[tokio::test]
    async fn test_successful_add_confirms_then_idles() {
        let backend = MockBackend::new();
        let user = UserSession::new("alice@example.com");
        let mut toggle = FavoriteToggle::default();

        let outcome = toggle_favorite(&mut toggle, Some(&user), &backend, "ETH", AssetKind::Coin).await;
        assert_eq!(outcome, FavoriteOutcome::Added);
        assert!(toggle.is_favorite());
        assert_eq!(toggle.glyph(), "✓");

        let last = backend.last_mutation.lock().unwrap().clone();
        assert_eq!(
            last,
            Some(("add_coin".to_string(), "alice@example.com".to_string(), "ETH".to_string()))
        );

        let until = match toggle.state() {
            FavoriteState::Confirmed { until } => until,
            other => panic!("unexpected state {:?}", other),
        };
        toggle.tick(until - Duration::from_millis(1));
        assert_eq!(toggle.glyph(), "✓");
        toggle.tick(until);
        assert_eq!(toggle.state(), FavoriteState::Idle);
        assert_eq!(toggle.glyph(), "★");
    }

    #[tokio::test]
    async fn test_remove_stock_routes_to_stock_endpoint() {
        let backend = MockBackend::new();
        let user = UserSession::new("bob@example.com");
        let mut toggle = FavoriteToggle::new(true);

        let outcome = toggle_favorite(&mut toggle, Some(&user), &backend, "AAPL", AssetKind::Stock).await;
        assert_eq!(outcome, FavoriteOutcome::Removed);
        assert!(!toggle.is_favorite());

        let (operation, _, _) = backend.last_mutation.lock().unwrap().clone().unwrap();
        assert_eq!(operation, "remove_stock");
    }

    #[tokio::test]
    async fn test_session_expired_routes_to_login() {
        let backend = MockBackend::new();
        backend.set_mutation(Ok(MutationResponse::failed("登录已过期，请重新登录")));
        let user = UserSession::new("alice@example.com");
        let mut toggle = FavoriteToggle::default();

        let outcome = toggle_favorite(&mut toggle, Some(&user), &backend, "BTC", AssetKind::Coin).await;
        assert_eq!(outcome, FavoriteOutcome::LoginRequired);
        assert!(!toggle.is_favorite());
        assert_eq!(toggle.state(), FavoriteState::Idle);
    }

    #[tokio::test]
    async fn test_transport_error_with_session_marker_routes_to_login() {
        let backend = MockBackend::new();
        backend.set_mutation(Err("HTTP 401: 登录已过期".to_string()));
        let user = UserSession::new("alice@example.com");
        let mut toggle = FavoriteToggle::default();

        let outcome = toggle_favorite(&mut toggle, Some(&user), &backend, "BTC", AssetKind::Coin).await;
        assert_eq!(outcome, FavoriteOutcome::LoginRequired);
    }

    #[tokio::test]
    async fn test_generic_failure_reverts_to_idle() {
        let backend = MockBackend::new();
        backend.set_mutation(Ok(MutationResponse::failed("quota exceeded")));
        let user = UserSession::new("alice@example.com");
        let mut toggle = FavoriteToggle::default();

        let outcome = toggle_favorite(&mut toggle, Some(&user), &backend, "BTC", AssetKind::Coin).await;
        assert_eq!(outcome, FavoriteOutcome::Failed("quota exceeded".to_string()));
        assert_eq!(toggle.state(), FavoriteState::Idle);
        assert_eq!(toggle.glyph(), "☆");
    }

    #[test]
    fn test_press_is_ignored_while_submitting() {
        let user = UserSession::new("alice@example.com");
        let mut toggle = FavoriteToggle::default();

        assert!(matches!(
            toggle.press(Some(&user), "BTC", AssetKind::Coin),
            PressDecision::Submit(FavoriteRequest { add: true, .. })
        ));
        assert!(toggle.is_busy());
        assert_eq!(toggle.press(Some(&user), "BTC", AssetKind::Coin), PressDecision::Ignored);
    }

    #[test]
    fn test_complete_without_press_is_ignored() {
        let mut toggle = FavoriteToggle::default();
        assert_eq!(toggle.complete(&Ok(()), Instant::now()), FavoriteOutcome::Ignored);
        assert!(!toggle.is_favorite());
    }

    #[test]
    fn test_is_session_expired() {
        assert!(is_session_expired("错误：登录已过期"));
        assert!(is_session_expired("Session expired, please sign in"));
        assert!(!is_session_expired("network unreachable"));
    }
}
