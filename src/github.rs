//! Paginated read access to the GitHub teams API.

use std::{collections::HashSet, future::Future, sync::Arc};

use async_trait::async_trait;
use reqwest::{
    Client, Url,
    header::{ACCEPT, HeaderMap, LINK},
};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    credentials::Credential,
    error::{Error, Result},
};

pub const PAGE_SIZE: u32 = 30;
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// One page of a listing. `next_page` is 0 on the last page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page: u32,
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn teams_page(&self, org: &str, page: u32, per_page: u32) -> Result<Page<String>>;

    async fn team_members_page(
        &self,
        org: &str,
        team: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<String>>;
}

pub trait DirectoryFactory: Send + Sync {
    fn connect(&self, credential: Credential) -> Result<Arc<dyn Directory>>;
}

pub async fn list_teams(directory: &dyn Directory, org: &str) -> Result<Vec<String>> {
    collect_pages(|page| directory.teams_page(org, page, PAGE_SIZE)).await
}

/// Member logins of `team`, deduplicated in directory order.
pub async fn list_team_members(
    directory: &dyn Directory,
    org: &str,
    team: &str,
) -> Result<Vec<String>> {
    let members =
        collect_pages(|page| directory.team_members_page(org, team, page, PAGE_SIZE)).await?;

    let mut seen = HashSet::with_capacity(members.len());
    Ok(members
        .into_iter()
        .filter(|m| seen.insert(m.clone()))
        .collect())
}

// Any failing page discards everything fetched so far.
async fn collect_pages<F, Fut>(mut fetch: F) -> Result<Vec<String>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<String>>>,
{
    let mut items = Vec::new();
    let mut page = 1;
    loop {
        let next = fetch(page).await?;
        items.extend(next.items);
        if next.next_page == 0 {
            break;
        }
        page = next.next_page;
    }
    Ok(items)
}

#[derive(Deserialize)]
struct TeamEntry {
    slug: String,
}

#[derive(Deserialize)]
struct MemberEntry {
    login: String,
}

#[derive(Clone, Debug)]
pub struct GitHubClient {
    api_url: Url,
    credential: Credential,
    http: Client,
}

impl GitHubClient {
    pub fn new(api_url: Url, credential: Credential, http: Client) -> Self {
        Self {
            api_url,
            credential,
            http,
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                Error::Configuration(format!("'{}' cannot be a base url", self.api_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: Url,
        page: u32,
        per_page: u32,
    ) -> Result<Page<T>> {
        debug!(%url, page, "GitHub GET");
        let response = self
            .http
            .get(url)
            .query(&[("per_page", per_page), ("page", page)])
            .bearer_auth(self.credential.expose())
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_owned());
            return Err(Error::Directory {
                status: status.as_u16(),
                message,
            });
        }

        let next_page = next_page(response.headers());
        let items = response.json::<Vec<T>>().await?;
        Ok(Page { items, next_page })
    }
}

#[async_trait]
impl Directory for GitHubClient {
    async fn teams_page(&self, org: &str, page: u32, per_page: u32) -> Result<Page<String>> {
        let url = self.url(&["orgs", org, "teams"])?;
        let page = self.get_page::<TeamEntry>(url, page, per_page).await?;
        Ok(Page {
            items: page.items.into_iter().map(|t| t.slug).collect(),
            next_page: page.next_page,
        })
    }

    async fn team_members_page(
        &self,
        org: &str,
        team: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<String>> {
        let url = self.url(&["orgs", org, "teams", team, "members"])?;
        let page = self.get_page::<MemberEntry>(url, page, per_page).await?;
        Ok(Page {
            items: page.items.into_iter().map(|m| m.login).collect(),
            next_page: page.next_page,
        })
    }
}

pub struct GitHubFactory {
    api_url: Url,
    http: Client,
}

impl GitHubFactory {
    pub fn new(api_url: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("team-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_http_client(api_url, http)
    }

    pub fn with_http_client(api_url: &str, http: Client) -> Result<Self> {
        let api_url = Url::parse(api_url)
            .map_err(|e| Error::Configuration(format!("invalid GitHub API url '{api_url}': {e}")))?;
        Ok(Self { api_url, http })
    }
}

impl DirectoryFactory for GitHubFactory {
    fn connect(&self, credential: Credential) -> Result<Arc<dyn Directory>> {
        Ok(Arc::new(GitHubClient::new(
            self.api_url.clone(),
            credential,
            self.http.clone(),
        )))
    }
}

/// Page number of the `rel="next"` entry in a `Link` header, 0 if there is none.
fn next_page(headers: &HeaderMap) -> u32 {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .find(|link| link.split(';').skip(1).any(|p| p.trim() == r#"rel="next""#))
        .and_then(|link| {
            let target = link.split(';').next()?.trim();
            let target = target.strip_prefix('<')?.strip_suffix('>')?;
            Url::parse(target).ok()
        })
        .and_then(|url| {
            url.query_pairs()
                .find(|(k, _)| k == "page")
                .and_then(|(_, v)| v.parse().ok())
        })
        .unwrap_or(0)
}
