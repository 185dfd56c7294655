use std::{borrow::Cow, collections::BTreeMap};

use k8s_openapi::{ClusterResourceScope, apimachinery::pkg::apis::meta::v1::ObjectMeta};
use kube::{Resource, core::TypeMeta};
use kube_derive::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Points at the secret holding the directory service token.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct CredentialRef {
    pub namespace: String,
    pub name: String,
}

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[kube(
    group = "github.homerow.ca",
    version = "v1",
    kind = "GroupSync",
    status = "GroupSyncStatus",
    printcolumn = r#"{"name":"Organization","type":"string","jsonPath":".spec.organization"}"#,
    printcolumn = r#"{"name":"Last Sync","type":"string","jsonPath":".status.lastSyncTime"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.lastSyncStatus"}"#
)]
pub struct GroupSyncSpec {
    pub organization: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_ref: Option<CredentialRef>,
    #[serde(default)]
    pub sync_all_teams: bool,
    #[serde(default)]
    pub create_missing_groups: bool,
    /// Source team slug to target group name. An empty or missing value means
    /// the group is named after the team.
    #[serde(default)]
    pub teams: BTreeMap<String, Option<String>>,
}

impl GroupSyncSpec {
    /// Rejects specs that can never produce a successful pass.
    pub fn validate(&self) -> Result<()> {
        if self.organization.trim().is_empty() {
            return Err(Error::Configuration("organization is required".to_owned()));
        }
        if !self.sync_all_teams && self.teams.is_empty() {
            return Err(Error::Configuration(
                "no teams configured and syncAllTeams is false".to_owned(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupSyncStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_status: Option<String>,
}

/// OpenShift `user.openshift.io/v1` Group. Cluster scoped, membership is a
/// flat list of user names.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Group {
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    pub metadata: ObjectMeta,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub users: Vec<String>,
}

impl Group {
    pub fn new(name: &str) -> Self {
        Self {
            types: Some(TypeMeta {
                api_version: Self::api_version(&()).into_owned(),
                kind: Self::kind(&()).into_owned(),
            }),
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                ..ObjectMeta::default()
            },
            users: Vec::new(),
        }
    }
}

impl Resource for Group {
    type DynamicType = ();
    type Scope = ClusterResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        "Group".into()
    }

    fn group(_: &()) -> Cow<'_, str> {
        "user.openshift.io".into()
    }

    fn version(_: &()) -> Cow<'_, str> {
        "v1".into()
    }

    fn plural(_: &()) -> Cow<'_, str> {
        "groups".into()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

// The API server reports an empty group as `users: null`.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<String>>::deserialize(deserializer).map(Option::unwrap_or_default)
}
