// ============================================================================
// Configuration
// ============================================================================
// Lue depuis l'environnement (après dotenvy::dotenv() dans main).
// Chaque variable a une valeur par défaut sauf l'email utilisateur :
// sans email, aucun utilisateur n'est connecté.
// ============================================================================

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::services::UserSession;
use crate::ui::layout::{CardContext, CardVariant};

pub const ENV_API_URL: &str = "MARKETDECK_API_URL";
pub const ENV_USER_EMAIL: &str = "MARKETDECK_USER_EMAIL";
pub const ENV_COIN_LIMIT: &str = "MARKETDECK_COIN_LIMIT";
pub const ENV_CARD_VARIANT: &str = "MARKETDECK_CARD_VARIANT";
pub const ENV_CARD_CONTEXT: &str = "MARKETDECK_CARD_CONTEXT";
pub const ENV_HTTP_TIMEOUT: &str = "MARKETDECK_HTTP_TIMEOUT_SECS";
pub const ENV_LOG_DIR: &str = "MARKETDECK_LOG_DIR";

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_COIN_LIMIT: usize = 20;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Configuration de l'application
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub user_email: Option<String>,
    pub coin_limit: usize,
    pub card_variant: CardVariant,
    pub card_context: CardContext,
    pub http_timeout: Duration,
    pub log_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            user_email: None,
            coin_limit: DEFAULT_COIN_LIMIT,
            card_variant: CardVariant::default(),
            card_context: CardContext::default(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            log_dir: default_log_dir(),
        }
    }
}

impl AppConfig {
    /// Lit la configuration depuis les variables d'environnement
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Lit la configuration depuis une source clé -> valeur quelconque
    ///
    /// Les valeurs vides sont traitées comme absentes.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(url) = get(ENV_API_URL) {
            config.api_url = url.trim_end_matches('/').to_string();
        }

        config.user_email = get(ENV_USER_EMAIL);

        if let Some(raw) = get(ENV_COIN_LIMIT) {
            config.coin_limit = raw
                .parse()
                .with_context(|| format!("{} doit être un nombre entier : {}", ENV_COIN_LIMIT, raw))?;
        }

        if let Some(raw) = get(ENV_CARD_VARIANT) {
            config.card_variant = raw.parse()?;
        }

        if let Some(raw) = get(ENV_CARD_CONTEXT) {
            config.card_context = raw.parse()?;
        }

        if let Some(raw) = get(ENV_HTTP_TIMEOUT) {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("{} doit être un nombre entier : {}", ENV_HTTP_TIMEOUT, raw))?;
            config.http_timeout = Duration::from_secs(secs);
        }

        if let Some(dir) = get(ENV_LOG_DIR) {
            config.log_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Vérifie les bornes et le schéma de l'URL
    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            bail!("{} doit commencer par http:// ou https:// : {}", ENV_API_URL, self.api_url);
        }

        if !(1..=250).contains(&self.coin_limit) {
            bail!("{} doit être compris entre 1 et 250 : {}", ENV_COIN_LIMIT, self.coin_limit);
        }

        let timeout = self.http_timeout.as_secs();
        if !(1..=120).contains(&timeout) {
            bail!("{} doit être compris entre 1 et 120 : {}", ENV_HTTP_TIMEOUT, timeout);
        }

        Ok(())
    }

    /// Utilisateur connecté, s'il y en a un
    pub fn user(&self) -> Option<UserSession> {
        self.user_email.as_deref().map(UserSession::new)
    }
}

/// Répertoire de logs par défaut : données locales, sinon ./logs
fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("marketdeck").join("logs"))
        .unwrap_or_else(|| PathBuf::from("./logs"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = AppConfig::from_lookup(|_| None).unwrap();

        assert_eq!(config.api_url, "http://localhost:8080");
        assert_eq!(config.coin_limit, 20);
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert!(config.user().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reads_all_variables() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_API_URL, "https://api.example.com/"),
            (ENV_USER_EMAIL, "alice@example.com"),
            (ENV_COIN_LIMIT, "50"),
            (ENV_CARD_VARIANT, "detailed"),
            (ENV_CARD_CONTEXT, "home"),
            (ENV_HTTP_TIMEOUT, "30"),
            (ENV_LOG_DIR, "/tmp/md-logs"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://api.example.com");
        assert_eq!(config.user(), Some(UserSession::new("alice@example.com")));
        assert_eq!(config.coin_limit, 50);
        assert_eq!(config.card_variant, CardVariant::Detailed);
        assert_eq!(config.card_context, CardContext::Home);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.log_dir, PathBuf::from("/tmp/md-logs"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_email_means_no_user() {
        let config = AppConfig::from_lookup(lookup(&[(ENV_USER_EMAIL, "   ")])).unwrap();
        assert!(config.user().is_none());
    }

    #[test]
    fn test_rejects_unparsable_values() {
        assert!(AppConfig::from_lookup(lookup(&[(ENV_COIN_LIMIT, "many")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[(ENV_CARD_VARIANT, "huge")])).is_err());
    }

    #[test]
    fn test_validate_bounds() {
        let mut config = AppConfig::default();
        config.coin_limit = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.http_timeout = Duration::from_secs(500);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.api_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }
}
