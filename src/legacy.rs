//! Groups that configure their own sync through labels and annotations.
//!
//! A group labelled `github.homerow.ca/sync=true` names its organization and
//! team in annotations. The annotations are turned into a single-team
//! `GroupSyncSpec` that may only update the group, never create it.

use std::collections::BTreeMap;

use kube::ResourceExt;

use crate::{
    crds::{CredentialRef, Group, GroupSyncSpec},
    error::{Error, Result},
};

pub const SYNC_LABEL: &str = "github.homerow.ca/sync";
pub const ORGANIZATION_ANNOTATION: &str = "github.homerow.ca/organization";
pub const TEAM_ANNOTATION: &str = "github.homerow.ca/team";
pub const SECRET_ANNOTATION: &str = "github.homerow.ca/secret";

/// Label selector for the legacy group watcher.
pub fn label_selector() -> String {
    format!("{SYNC_LABEL}=true")
}

pub fn is_selected(group: &Group) -> bool {
    group.labels().get(SYNC_LABEL).map(String::as_str) == Some("true")
}

/// Translates a group's annotations into a spec. Secrets named by
/// annotation are read from `secret_namespace`.
pub fn spec_from_annotations(group: &Group, secret_namespace: &str) -> Result<GroupSyncSpec> {
    let annotations = group.annotations();
    let organization = required(annotations, ORGANIZATION_ANNOTATION)?;
    let team = required(annotations, TEAM_ANNOTATION)?;

    let credential_ref = annotations
        .get(SECRET_ANNOTATION)
        .filter(|s| !s.trim().is_empty())
        .map(|name| CredentialRef {
            namespace: secret_namespace.to_owned(),
            name: name.trim().to_owned(),
        });

    Ok(GroupSyncSpec {
        organization,
        credential_ref,
        sync_all_teams: false,
        create_missing_groups: false,
        teams: BTreeMap::from([(team, Some(group.name_any()))]),
    })
}

fn required(annotations: &BTreeMap<String, String>, key: &str) -> Result<String> {
    annotations
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| Error::Configuration(format!("group is missing the {key} annotation")))
}
