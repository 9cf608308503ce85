//! Admin access token for the Keycloak admin API.
//!
//! Tokens come from the resource-owner password grant and are cached until
//! shortly before they expire.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};

use idsync_core::{DirectoryError, DirectorySettings};

use crate::model::TokenResponse;

/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

struct CachedToken {
    value: SecretString,
    refresh_at: Instant,
}

pub(crate) struct TokenSource {
    token_url: String,
    username: String,
    password: SecretString,
    client_id: String,
    client_secret: Option<SecretString>,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(settings: &DirectorySettings) -> Self {
        Self {
            token_url: format!(
                "{}/realms/{}/protocol/openid-connect/token",
                settings.url, settings.realm
            ),
            username: settings.username.clone(),
            password: settings.password.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            cached: Mutex::new(None),
        }
    }

    /// Current token, fetching a new one when none is cached or the cached
    /// one is about to expire.
    pub fn bearer(&self, agent: &ureq::Agent) -> Result<SecretString, DirectoryError> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch(agent)?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    /// Drop the cached token so the next call fetches a new one.
    pub fn invalidate(&self) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn fetch(&self, agent: &ureq::Agent) -> Result<CachedToken, DirectoryError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "password"),
            ("client_id", &self.client_id),
            ("username", &self.username),
            ("password", self.password.expose_secret()),
        ];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.expose_secret()));
        }

        let response = agent
            .post(&self.token_url)
            .send_form(&form)
            .map_err(|err| match err {
                ureq::Error::Status(code, _) => {
                    DirectoryError::Auth(format!("token endpoint answered {code}"))
                }
                ureq::Error::Transport(t) => DirectoryError::unavailable("token", t.to_string()),
            })?;
        let token: TokenResponse = response
            .into_json()
            .map_err(|e| DirectoryError::Auth(format!("unreadable token response: {e}")))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        tracing::debug!(expires_in = token.expires_in, "obtained directory admin token");
        Ok(CachedToken {
            value: SecretString::from(token.access_token),
            refresh_at: Instant::now() + lifetime,
        })
    }
}
