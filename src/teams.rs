use std::collections::{BTreeMap, HashSet};

use crate::{
    crds::GroupSyncSpec,
    error::{Error, Result},
    github::{Directory, list_teams},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TeamTarget {
    pub team: String,
    pub group: String,
}

/// Team slugs to sync. With `syncAllTeams` every team in the organization
/// is returned and the `teams` map only renames; otherwise exactly its keys.
pub async fn select_teams(spec: &GroupSyncSpec, directory: &dyn Directory) -> Result<Vec<String>> {
    if !spec.sync_all_teams {
        return Ok(spec.teams.keys().cloned().collect());
    }

    let mut seen = HashSet::new();
    Ok(list_teams(directory, &spec.organization)
        .await?
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect())
}

pub fn target_group_name(spec: &GroupSyncSpec, team: &str) -> String {
    spec.teams
        .get(team)
        .and_then(Option::as_deref)
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .unwrap_or(team)
        .to_owned()
}

/// Pairs each team with its group, refusing two teams that land on one group.
pub fn plan_targets(spec: &GroupSyncSpec, teams: Vec<String>) -> Result<Vec<TeamTarget>> {
    let mut owners: BTreeMap<String, String> = BTreeMap::new();
    let mut targets = Vec::with_capacity(teams.len());

    for team in teams {
        let group = target_group_name(spec, &team);
        if let Some(previous) = owners.insert(group.clone(), team.clone()) {
            return Err(Error::Configuration(format!(
                "teams '{previous}' and '{team}' both map to group '{group}'"
            )));
        }
        targets.push(TeamTarget { team, group });
    }

    Ok(targets)
}
