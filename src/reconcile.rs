use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use tracing::{info, instrument, warn};

use crate::{
    credentials::CredentialResolver,
    crds::{GroupSync, GroupSyncSpec, GroupSyncStatus},
    error::{Error, Result},
    github::{DirectoryFactory, list_team_members},
    groups::{GroupStore, WriteOutcome, apply_membership},
    teams::{plan_targets, select_teams},
};

#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn record_status(&self, sync: &GroupSync, status: &GroupSyncStatus) -> Result<()>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub skipped: Vec<String>,
}

impl SyncReport {
    fn record(&mut self, outcome: WriteOutcome, group: String) {
        match outcome {
            WriteOutcome::Created => self.created.push(group),
            WriteOutcome::Updated => self.updated.push(group),
            WriteOutcome::Unchanged => self.unchanged.push(group),
        }
    }

    pub fn writes(&self) -> usize {
        self.created.len() + self.updated.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "synced {} teams: {} created, {} updated, {} unchanged, {} skipped",
            self.created.len() + self.updated.len() + self.unchanged.len() + self.skipped.len(),
            self.created.len(),
            self.updated.len(),
            self.unchanged.len(),
            self.skipped.len(),
        )
    }
}

pub struct Reconciler {
    credentials: CredentialResolver,
    directories: Arc<dyn DirectoryFactory>,
    groups: Arc<dyn GroupStore>,
    status: Arc<dyn StatusStore>,
}

impl Reconciler {
    pub fn new(
        credentials: CredentialResolver,
        directories: Arc<dyn DirectoryFactory>,
        groups: Arc<dyn GroupStore>,
        status: Arc<dyn StatusStore>,
    ) -> Self {
        Self {
            credentials,
            directories,
            groups,
            status,
        }
    }

    #[instrument(skip_all, fields(groupsync = %sync.name_any()))]
    pub async fn reconcile(&self, sync: &GroupSync) -> Result<SyncReport> {
        let result = match sync.controller_owner_ref(&()) {
            Some(owner) => self.sync_teams(&sync.spec, Some(&owner)).await,
            None => Err(Error::Configuration(
                "GroupSync has no name or uid to own groups with".to_owned(),
            )),
        };

        let last_sync_status = match &result {
            Ok(report) => {
                info!(
                    created = ?report.created,
                    updated = ?report.updated,
                    skipped = ?report.skipped,
                    "{}",
                    report.summary()
                );
                report.summary()
            }
            Err(e) => format!("failed ({}): {e}", e.class()),
        };
        let status = GroupSyncStatus {
            last_sync_time: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            last_sync_status: Some(last_sync_status),
        };
        if let Err(e) = self.status.record_status(sync, &status).await {
            warn!(error = %e, "unable to record GroupSync status");
        }

        result
    }

    /// One reconcile pass: resolve the credential, select teams, then for
    /// each team fetch its roster and write the group. Stops at the first
    /// error except a missing group that may not be created.
    pub async fn sync_teams(
        &self,
        spec: &GroupSyncSpec,
        owner: Option<&OwnerReference>,
    ) -> Result<SyncReport> {
        spec.validate()?;

        let credential = self
            .credentials
            .resolve(spec.credential_ref.as_ref())
            .await?;
        let directory = self.directories.connect(credential)?;

        let teams = select_teams(spec, directory.as_ref()).await?;
        let targets = plan_targets(spec, teams)?;

        let mut report = SyncReport::default();
        for target in targets {
            let members =
                list_team_members(directory.as_ref(), &spec.organization, &target.team).await?;
            info!(team = %target.team, group = %target.group, ?members, "found members for team");

            let written = apply_membership(
                self.groups.as_ref(),
                &target.group,
                &members,
                owner,
                spec.create_missing_groups,
            )
            .await;

            match written {
                Ok(outcome) => report.record(outcome, target.group),
                Err(e) if e.is_group_not_found() => {
                    info!(team = %target.team, group = %target.group, "group not found (skipping)");
                    report.skipped.push(target.group);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }
}
