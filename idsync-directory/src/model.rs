//! Keycloak admin API representations and their mapping onto core types.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use idsync_core::{UpstreamGroup, UpstreamUser};

/// User attribute holding the display name.
pub(crate) const DISPLAY_NAME_ATTRIBUTE: &str = "name";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserRepresentation {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl UserRepresentation {
    pub fn into_upstream(self, groups: BTreeSet<String>) -> UpstreamUser {
        let display_name = self
            .attributes
            .get(DISPLAY_NAME_ATTRIBUTE)
            .and_then(|values| values.first())
            .cloned();
        UpstreamUser {
            id: self.id,
            username: self.username,
            email: self.email,
            display_name,
            enabled: self.enabled,
            groups,
        }
    }
}

/// Entry of a group listing or a user's group list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GroupSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sub_groups: Vec<GroupSummary>,
}

impl GroupSummary {
    /// Depth-first flattening of nested groups, parents first.
    pub fn flatten(groups: Vec<GroupSummary>) -> Vec<GroupSummary> {
        let mut out = Vec::new();
        let mut stack: Vec<GroupSummary> = groups.into_iter().rev().collect();
        while let Some(mut group) = stack.pop() {
            let children = std::mem::take(&mut group.sub_groups);
            stack.extend(children.into_iter().rev());
            out.push(group);
        }
        out
    }
}

/// Group detail, which carries attributes.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GroupRepresentation {
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl From<GroupRepresentation> for UpstreamGroup {
    fn from(group: GroupRepresentation) -> Self {
        UpstreamGroup {
            name: group.name,
            attributes: group.attributes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    60
}
