use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use tracing::{debug, info};

use crate::{
    crds::Group,
    error::{Error, ResourceKind, Result},
    membership::equal_ignoring_order,
};

#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn get_group(&self, name: &str) -> Result<Option<Group>>;

    async fn create_group(&self, group: &Group) -> Result<Group>;

    async fn replace_group(&self, group: &Group) -> Result<Group>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Brings group `name` to exactly `members`, issuing at most one write.
pub async fn apply_membership(
    store: &dyn GroupStore,
    name: &str,
    members: &[String],
    owner: Option<&OwnerReference>,
    create_missing: bool,
) -> Result<WriteOutcome> {
    let Some(mut group) = store.get_group(name).await? else {
        if !create_missing {
            return Err(Error::NotFound {
                kind: ResourceKind::Group,
                name: name.to_owned(),
            });
        }

        let mut group = Group::new(name);
        group.metadata.owner_references = owner.map(|o| vec![o.clone()]);
        group.users = members.to_vec();

        info!(group = name, ?members, "creating group");
        store.create_group(&group).await?;
        return Ok(WriteOutcome::Created);
    };

    if let Some(owner) = owner {
        set_owner(&mut group, name, owner)?;
    }

    if equal_ignoring_order(members, &group.users) {
        debug!(group = name, "no changes to group membership");
        return Ok(WriteOutcome::Unchanged);
    }

    info!(group = name, ?members, previous = ?group.users, "updating group membership");
    group.users = members.to_vec();
    store.replace_group(&group).await?;
    Ok(WriteOutcome::Updated)
}

fn set_owner(group: &mut Group, name: &str, owner: &OwnerReference) -> Result<()> {
    let refs = group.metadata.owner_references.get_or_insert_with(Vec::new);
    if refs.iter().any(|r| r.uid == owner.uid) {
        return Ok(());
    }
    if let Some(other) = refs.iter().find(|r| r.controller == Some(true)) {
        return Err(Error::OwnershipConflict {
            group: name.to_owned(),
            owner: format!("{}/{}", other.kind, other.name),
        });
    }
    refs.push(owner.clone());
    Ok(())
}
