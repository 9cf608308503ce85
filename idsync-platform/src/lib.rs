//! # idsync-platform
//!
//! Gitea API v1 implementation of [`idsync_core::Platform`].
//!
//! Every call is blocking and authenticated with the admin access token.
//! Listings are paged with `page`/`limit` until an empty page is returned.
//! The server may cap `limit` below what was asked for, so a short page is
//! not taken as the last one.
//! Organization rosters live in the organization's `Members` team.

mod model;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;

use idsync_core::{
    DownstreamOrganization, DownstreamUser, Platform, PlatformError, PlatformSettings, TeamId,
    UserSpec, MEMBERSHIP_TEAM_NAME,
};

use crate::model::{
    CreateOrgOption, CreateTeamOption, CreateUserOption, EditUserOption, Organization, Team,
    TeamMember, User, MEMBERSHIP_TEAM_UNITS,
};

/// Page size for organization listings.
pub const ORGANIZATION_PAGE_SIZE: usize = 10;

/// Page size for every other listing.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Blocking Gitea admin API client.
pub struct GiteaPlatform {
    agent: ureq::Agent,
    api_base: String,
    api_key: SecretString,
    org_owner: String,
    page_size: usize,
    org_page_size: usize,
}

impl GiteaPlatform {
    pub fn new(settings: &PlatformSettings, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            api_base: format!("{}/api/v1", settings.url),
            api_key: settings.api_key.clone(),
            org_owner: settings.org_owner.clone(),
            page_size: DEFAULT_PAGE_SIZE,
            org_page_size: ORGANIZATION_PAGE_SIZE,
        }
    }

    /// Override both page sizes.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self.org_page_size = page_size.max(1);
        self
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        self.agent
            .request(method, &format!("{}{}", self.api_base, path))
            .set(
                "Authorization",
                &format!("token {}", self.api_key.expose_secret()),
            )
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, PlatformError> {
        let mut request = self.request("GET", path);
        for (name, value) in query {
            request = request.query(name, value);
        }
        let response = request.call().map_err(|e| query_error(operation, e))?;
        response.into_json().map_err(|e| PlatformError::Decode {
            operation,
            message: e.to_string(),
        })
    }

    fn get_paged<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        limit: usize,
    ) -> Result<Vec<T>, PlatformError> {
        let mut items = Vec::new();
        let mut page = 0usize;
        loop {
            page += 1;
            let batch: Vec<T> = self.get_json(
                operation,
                path,
                &[("page", page.to_string()), ("limit", limit.to_string())],
            )?;
            if batch.is_empty() {
                break;
            }
            items.extend(batch);
        }
        Ok(items)
    }

    fn send_json<B: Serialize>(
        &self,
        operation: &'static str,
        method: &str,
        path: &str,
        body: &B,
    ) -> Result<(), PlatformError> {
        self.request(method, path)
            .send_json(body)
            .map(drop)
            .map_err(|e| query_error(operation, e))
    }

    fn send_empty(
        &self,
        operation: &'static str,
        method: &str,
        path: &str,
    ) -> Result<(), PlatformError> {
        self.request(method, path)
            .call()
            .map(drop)
            .map_err(|e| query_error(operation, e))
    }

    fn team_members(&self, team: TeamId) -> Result<Vec<String>, PlatformError> {
        let members: Vec<TeamMember> = self.get_paged(
            "list_team_members",
            &format!("/teams/{team}/members"),
            self.page_size,
        )?;
        Ok(members.into_iter().map(|m| m.login).collect())
    }

    fn require_team(&self, organization: &str) -> Result<TeamId, PlatformError> {
        self.membership_team_id(organization)?
            .ok_or_else(|| PlatformError::MembershipTeamMissing {
                organization: organization.to_owned(),
            })
    }
}

impl Platform for GiteaPlatform {
    fn list_users(&self) -> Result<Vec<DownstreamUser>, PlatformError> {
        let users: Vec<User> = self.get_paged("list_users", "/admin/users", self.page_size)?;
        tracing::debug!(count = users.len(), "listed platform users");
        Ok(users.into_iter().map(DownstreamUser::from).collect())
    }

    fn create_user(&self, spec: &UserSpec) -> Result<(), PlatformError> {
        self.send_json(
            "create_user",
            "POST",
            "/admin/users",
            &CreateUserOption::from(spec),
        )
    }

    fn update_user(&self, login: &str, spec: &UserSpec) -> Result<(), PlatformError> {
        self.send_json(
            "update_user",
            "PATCH",
            &format!("/admin/users/{login}"),
            &EditUserOption::update(spec),
        )
    }

    fn disable_user(&self, user: &DownstreamUser) -> Result<(), PlatformError> {
        self.send_json(
            "disable_user",
            "PATCH",
            &format!("/admin/users/{}", user.login),
            &EditUserOption::disable(user),
        )
    }

    fn list_organizations(&self) -> Result<Vec<DownstreamOrganization>, PlatformError> {
        let orgs: Vec<Organization> =
            self.get_paged("list_organizations", "/admin/orgs", self.org_page_size)?;

        let mut out = Vec::with_capacity(orgs.len());
        for name in orgs.into_iter().filter_map(Organization::org_name) {
            let membership_team = self.membership_team_id(&name)?;
            let members = match membership_team {
                Some(team) => self.team_members(team)?.into_iter().collect(),
                None => Default::default(),
            };
            out.push(DownstreamOrganization {
                name,
                membership_team,
                members,
            });
        }
        tracing::debug!(count = out.len(), "listed platform organizations");
        Ok(out)
    }

    fn create_organization(&self, name: &str) -> Result<(), PlatformError> {
        self.send_json(
            "create_organization",
            "POST",
            &format!("/admin/users/{}/orgs", self.org_owner),
            &CreateOrgOption {
                username: name,
                visibility: "private",
            },
        )?;
        tracing::debug!(organization = name, "creating membership team");
        self.send_json(
            "create_team",
            "POST",
            &format!("/orgs/{name}/teams"),
            &CreateTeamOption {
                name: MEMBERSHIP_TEAM_NAME,
                permission: "write",
                units: &MEMBERSHIP_TEAM_UNITS,
            },
        )
    }

    fn membership_team_id(&self, organization: &str) -> Result<Option<TeamId>, PlatformError> {
        let teams: Vec<Team> = self.get_paged(
            "list_teams",
            &format!("/orgs/{organization}/teams"),
            self.page_size,
        )?;
        Ok(teams
            .into_iter()
            .find(|team| team.name == MEMBERSHIP_TEAM_NAME)
            .map(|team| TeamId(team.id)))
    }

    fn add_member(&self, organization: &str, login: &str) -> Result<(), PlatformError> {
        let team = self.require_team(organization)?;
        self.send_empty(
            "add_team_member",
            "PUT",
            &format!("/teams/{team}/members/{login}"),
        )
    }

    fn remove_member(&self, organization: &str, login: &str) -> Result<(), PlatformError> {
        let team = self.require_team(organization)?;
        self.send_empty(
            "remove_team_member",
            "DELETE",
            &format!("/teams/{team}/members/{login}"),
        )
    }
}

fn query_error(operation: &'static str, err: ureq::Error) -> PlatformError {
    match err {
        ureq::Error::Status(code, response) => {
            let url = response.get_url().to_owned();
            let body = response.into_string().unwrap_or_default();
            PlatformError::query_failed(operation, format!("{url} answered {code}: {}", body.trim()))
        }
        ureq::Error::Transport(t) => PlatformError::query_failed(operation, t.to_string()),
    }
}
