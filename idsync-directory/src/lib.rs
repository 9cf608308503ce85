//! # idsync-directory
//!
//! Keycloak admin REST implementation of [`idsync_core::Directory`].
//!
//! All calls are blocking. Listings are paged with `first`/`max` until a
//! short page is returned; an expired token is refreshed once per request
//! when the server answers `401`.

mod auth;
mod model;

use std::collections::BTreeSet;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;

use idsync_core::{Directory, DirectoryError, DirectorySettings, UpstreamGroup, UpstreamUser};

use crate::auth::TokenSource;
use crate::model::{GroupRepresentation, GroupSummary, UserRepresentation};

/// Default number of entries requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Blocking Keycloak admin API client scoped to one realm.
pub struct KeycloakDirectory {
    agent: ureq::Agent,
    admin_base: String,
    token: TokenSource,
    page_size: usize,
}

impl KeycloakDirectory {
    pub fn new(settings: &DirectorySettings, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            admin_base: format!("{}/admin/realms/{}", settings.url, settings.realm),
            token: TokenSource::new(settings),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the page size used for listings.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, DirectoryError> {
        let url = format!("{}{}", self.admin_base, path);
        let mut retried = false;
        loop {
            let bearer = self.token.bearer(&self.agent)?;
            let mut request = self
                .agent
                .get(&url)
                .set("Authorization", &format!("Bearer {}", bearer.expose_secret()));
            for (name, value) in query {
                request = request.query(name, value);
            }

            match request.call() {
                Ok(response) => {
                    return response.into_json().map_err(|e| DirectoryError::Decode {
                        operation,
                        message: e.to_string(),
                    });
                }
                Err(ureq::Error::Status(401, _)) if !retried => {
                    tracing::debug!(operation, "directory token rejected, refreshing");
                    self.token.invalidate();
                    retried = true;
                }
                Err(ureq::Error::Status(code, response)) => {
                    let body = response.into_string().unwrap_or_default();
                    return Err(DirectoryError::unavailable(
                        operation,
                        format!("{url} answered {code}: {}", body.trim()),
                    ));
                }
                Err(ureq::Error::Transport(t)) => {
                    return Err(DirectoryError::unavailable(operation, t.to_string()));
                }
            }
        }
    }

    fn get_paged<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
    ) -> Result<Vec<T>, DirectoryError> {
        let mut items = Vec::new();
        let mut first = 0usize;
        loop {
            let page: Vec<T> = self.get_json(
                operation,
                path,
                &[
                    ("first", first.to_string()),
                    ("max", self.page_size.to_string()),
                ],
            )?;
            let len = page.len();
            items.extend(page);
            if len < self.page_size {
                break;
            }
            first += len;
        }
        Ok(items)
    }

    fn user_groups(&self, user_id: &str) -> Result<BTreeSet<String>, DirectoryError> {
        let groups: Vec<GroupSummary> =
            self.get_paged("list_user_groups", &format!("/users/{user_id}/groups"))?;
        Ok(groups.into_iter().map(|g| g.name).collect())
    }
}

impl Directory for KeycloakDirectory {
    fn list_users(&self) -> Result<Vec<UpstreamUser>, DirectoryError> {
        let reps: Vec<UserRepresentation> = self.get_paged("list_users", "/users")?;
        let mut users = Vec::with_capacity(reps.len());
        for rep in reps {
            let groups = self.user_groups(&rep.id)?;
            users.push(rep.into_upstream(groups));
        }
        tracing::debug!(count = users.len(), "listed directory users");
        Ok(users)
    }

    fn list_groups(&self) -> Result<Vec<UpstreamGroup>, DirectoryError> {
        let summaries: Vec<GroupSummary> = self.get_paged("list_groups", "/groups")?;
        let mut groups = Vec::new();
        for summary in GroupSummary::flatten(summaries) {
            let detail: GroupRepresentation =
                self.get_json("get_group", &format!("/groups/{}", summary.id), &[])?;
            groups.push(UpstreamGroup::from(detail));
        }
        tracing::debug!(count = groups.len(), "listed directory groups");
        Ok(groups)
    }
}
