use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    Api, Client, ResourceExt,
    api::{Patch, PatchParams, PostParams},
};
use serde_json::json;

use crate::{
    credentials::SecretStore,
    crds::{Group, GroupSync, GroupSyncStatus},
    error::{Error, ResourceKind, Result},
    groups::GroupStore,
    reconcile::StatusStore,
};

/// Field manager recorded on everything this operator writes.
pub const FIELD_MANAGER: &str = "groupsync.github.homerow.ca";

/// The API server as group, secret and status store.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_owned()),
            ..PostParams::default()
        }
    }
}

#[async_trait]
impl GroupStore for KubeStore {
    async fn get_group(&self, name: &str) -> Result<Option<Group>> {
        Api::<Group>::all(self.client.clone())
            .get_opt(name)
            .await
            .map_err(|e| Error::from_kube(e, ResourceKind::Group, name))
    }

    async fn create_group(&self, group: &Group) -> Result<Group> {
        Api::<Group>::all(self.client.clone())
            .create(&Self::post_params(), group)
            .await
            .map_err(|e| Error::from_kube(e, ResourceKind::Group, &group.name_any()))
    }

    async fn replace_group(&self, group: &Group) -> Result<Group> {
        let name = group.name_any();
        Api::<Group>::all(self.client.clone())
            .replace(&name, &Self::post_params(), group)
            .await
            .map_err(|e| Error::from_kube(e, ResourceKind::Group, &name))
    }
}

#[async_trait]
impl SecretStore for KubeStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        Api::<Secret>::namespaced(self.client.clone(), namespace)
            .get(name)
            .await
            .map_err(|e| Error::from_kube(e, ResourceKind::Secret, &format!("{namespace}/{name}")))
    }
}

#[async_trait]
impl StatusStore for KubeStore {
    async fn record_status(&self, sync: &GroupSync, status: &GroupSyncStatus) -> Result<()> {
        let name = sync.name_any();
        let patch = Patch::Merge(json!({ "status": status }));

        Api::<GroupSync>::all(self.client.clone())
            .patch_status(&name, &PatchParams::apply(FIELD_MANAGER), &patch)
            .await
            .map_err(|e| Error::from_kube(e, ResourceKind::GroupSync, &name))?;
        Ok(())
    }
}
