//! In-memory stand-ins for the API server and the GitHub directory.

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use k8s_openapi::{ByteString, api::core::v1::Secret};
use kube::api::ObjectMeta;
use team_sync::{
    credentials::{Credential, CredentialResolver, SecretStore, TOKEN_KEY},
    crds::{CredentialRef, Group, GroupSync, GroupSyncSpec, GroupSyncStatus},
    error::{Error, ResourceKind, Result},
    github::{Directory, DirectoryFactory, Page},
    groups::GroupStore,
    reconcile::{Reconciler, StatusStore},
};

pub const SECRET_NAMESPACE: &str = "team-sync";
pub const SECRET_NAME: &str = "github-token";
pub const TOKEN: &str = "ghp_from_secret";

#[derive(Clone, Debug, PartialEq)]
pub enum Write {
    Create(Group),
    Replace(Group),
}

impl Write {
    pub fn group(&self) -> &Group {
        match self {
            Write::Create(g) | Write::Replace(g) => g,
        }
    }
}

/// Groups, secrets and status kept in memory, with every write recorded.
#[derive(Default)]
pub struct MemoryStore {
    groups: Mutex<BTreeMap<String, Group>>,
    secrets: Mutex<Vec<Secret>>,
    statuses: Mutex<Vec<GroupSyncStatus>>,
    writes: Mutex<Vec<Write>>,
    replace_attempts: Mutex<Vec<String>>,
    changed_after_read: Mutex<HashSet<String>>,
    version: Mutex<u64>,
    fail_status: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        let store = Self::default();
        store.add_secret(SECRET_NAMESPACE, SECRET_NAME, TOKEN);
        store
    }

    pub fn failing_status() -> Self {
        Self {
            fail_status: true,
            ..Self::new()
        }
    }

    fn bump(&self) -> String {
        let mut version = self.version.lock().unwrap();
        *version += 1;
        version.to_string()
    }

    pub fn add_secret(&self, namespace: &str, name: &str, token: &str) {
        self.secrets.lock().unwrap().push(Secret {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some(namespace.to_owned()),
                ..ObjectMeta::default()
            },
            data: Some(BTreeMap::from([(
                TOKEN_KEY.to_owned(),
                ByteString(token.as_bytes().to_vec()),
            )])),
            ..Secret::default()
        });
    }

    /// Seeds a group without recording a write.
    pub fn seed_group(&self, name: &str, users: &[&str]) -> Group {
        let mut group = Group::new(name);
        group.users = users.iter().map(|s| s.to_string()).collect();
        group.metadata.resource_version = Some(self.bump());
        self.groups
            .lock()
            .unwrap()
            .insert(name.to_owned(), group.clone());
        group
    }

    /// The next read of `name` is followed by a write from someone else.
    pub fn change_after_read(&self, name: &str) {
        self.changed_after_read
            .lock()
            .unwrap()
            .insert(name.to_owned());
    }

    pub fn group(&self, name: &str) -> Option<Group> {
        self.groups.lock().unwrap().get(name).cloned()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }

    /// Every replace call, accepted or not.
    pub fn replace_attempts(&self) -> Vec<String> {
        self.replace_attempts.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<GroupSyncStatus> {
        self.statuses.lock().unwrap().clone()
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn get_group(&self, name: &str) -> Result<Option<Group>> {
        let read = self.group(name);
        if self.changed_after_read.lock().unwrap().remove(name) {
            let version = self.bump();
            if let Some(group) = self.groups.lock().unwrap().get_mut(name) {
                group.metadata.resource_version = Some(version);
            }
        }
        Ok(read)
    }

    async fn create_group(&self, group: &Group) -> Result<Group> {
        let name = group.metadata.name.clone().unwrap_or_default();
        let mut groups = self.groups.lock().unwrap();
        if groups.contains_key(&name) {
            return Err(Error::Conflict {
                kind: ResourceKind::Group,
                name,
                message: "already exists".to_owned(),
            });
        }

        self.writes.lock().unwrap().push(Write::Create(group.clone()));
        let mut stored = group.clone();
        stored.metadata.resource_version = Some(self.bump());
        groups.insert(name, stored.clone());
        Ok(stored)
    }

    async fn replace_group(&self, group: &Group) -> Result<Group> {
        let name = group.metadata.name.clone().unwrap_or_default();
        self.replace_attempts.lock().unwrap().push(name.clone());
        let mut groups = self.groups.lock().unwrap();
        let Some(current) = groups.get(&name) else {
            return Err(Error::NotFound {
                kind: ResourceKind::Group,
                name,
            });
        };
        if current.metadata.resource_version != group.metadata.resource_version {
            return Err(Error::Conflict {
                kind: ResourceKind::Group,
                name,
                message: "the object has been modified".to_owned(),
            });
        }

        self.writes.lock().unwrap().push(Write::Replace(group.clone()));
        let mut stored = group.clone();
        stored.metadata.resource_version = Some(self.bump());
        groups.insert(name, stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        self.secrets
            .lock()
            .unwrap()
            .iter()
            .find(|s| {
                s.metadata.namespace.as_deref() == Some(namespace)
                    && s.metadata.name.as_deref() == Some(name)
            })
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: ResourceKind::Secret,
                name: format!("{namespace}/{name}"),
            })
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn record_status(&self, sync: &GroupSync, status: &GroupSyncStatus) -> Result<()> {
        if self.fail_status {
            return Err(Error::NotFound {
                kind: ResourceKind::GroupSync,
                name: sync.metadata.name.clone().unwrap_or_default(),
            });
        }
        self.statuses.lock().unwrap().push(status.clone());
        Ok(())
    }
}

/// An organization served page by page, with optional failing rosters.
#[derive(Default)]
pub struct FakeDirectory {
    teams: Vec<String>,
    members: BTreeMap<String, Vec<String>>,
    failing: HashSet<String>,
    member_requests: Mutex<Vec<String>>,
    credentials: Mutex<Vec<String>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn team(mut self, name: &str, members: &[&str]) -> Self {
        self.teams.push(name.to_owned());
        self.members.insert(
            name.to_owned(),
            members.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn failing_team(mut self, name: &str) -> Self {
        self.teams.push(name.to_owned());
        self.failing.insert(name.to_owned());
        self
    }

    /// Teams whose rosters were requested, once per team.
    pub fn member_requests(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.member_requests
            .lock()
            .unwrap()
            .iter()
            .filter(|t| seen.insert(t.to_string()))
            .cloned()
            .collect()
    }

    pub fn credentials(&self) -> Vec<String> {
        self.credentials.lock().unwrap().clone()
    }
}

fn slice(items: &[String], page: u32, per_page: u32) -> Page<String> {
    let start = ((page.max(1) - 1) * per_page) as usize;
    let end = (start + per_page as usize).min(items.len());
    Page {
        items: items.get(start..end).unwrap_or_default().to_vec(),
        next_page: if end < items.len() { page + 1 } else { 0 },
    }
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn teams_page(&self, _: &str, page: u32, per_page: u32) -> Result<Page<String>> {
        Ok(slice(&self.teams, page, per_page))
    }

    async fn team_members_page(
        &self,
        _: &str,
        team: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<String>> {
        self.member_requests.lock().unwrap().push(team.to_owned());
        if self.failing.contains(team) {
            return Err(Error::Directory {
                status: 503,
                message: "Service Unavailable".to_owned(),
            });
        }
        match self.members.get(team) {
            Some(members) => Ok(slice(members, page, per_page)),
            None => Err(Error::Directory {
                status: 404,
                message: "Not Found".to_owned(),
            }),
        }
    }
}

pub struct FakeFactory(pub Arc<FakeDirectory>);

impl DirectoryFactory for FakeFactory {
    fn connect(&self, credential: Credential) -> Result<Arc<dyn Directory>> {
        self.0
            .credentials
            .lock()
            .unwrap()
            .push(credential.expose().to_owned());
        Ok(self.0.clone())
    }
}

pub fn reconciler(
    store: &Arc<MemoryStore>,
    directories: Arc<dyn DirectoryFactory>,
    fallback: Option<&str>,
) -> Reconciler {
    Reconciler::new(
        CredentialResolver::new(store.clone(), fallback.and_then(Credential::new)),
        directories,
        store.clone(),
        store.clone(),
    )
}

pub fn spec(teams: &[(&str, Option<&str>)]) -> GroupSyncSpec {
    GroupSyncSpec {
        organization: "homerow".to_owned(),
        credential_ref: Some(CredentialRef {
            namespace: SECRET_NAMESPACE.to_owned(),
            name: SECRET_NAME.to_owned(),
        }),
        sync_all_teams: false,
        create_missing_groups: true,
        teams: teams
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_owned)))
            .collect(),
    }
}

pub fn groupsync(spec: GroupSyncSpec) -> GroupSync {
    let mut sync = GroupSync::new("platform", spec);
    sync.metadata.uid = Some("5f0c1a52-0d6e-4a55-a1b4-6b8e8f0c1d2e".to_owned());
    sync
}
