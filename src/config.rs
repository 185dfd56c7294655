use std::time::Duration;

use clap::Args;

use crate::{credentials::Credential, github::DEFAULT_API_URL};

#[derive(Args, Clone, Debug)]
pub struct Settings {
    /// Token used when a GroupSync does not reference a secret, or the
    /// referenced secret has no token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Base URL of the GitHub REST API
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub github_api_url: String,

    /// Seconds between periodic resyncs of every GroupSync
    #[arg(long, env = "TEAM_SYNC_RESYNC_INTERVAL_SECS", default_value_t = 300)]
    pub resync_interval_secs: u64,

    /// Seconds to wait before retrying a failed pass
    #[arg(long, env = "TEAM_SYNC_ERROR_REQUEUE_SECS", default_value_t = 60)]
    pub error_requeue_secs: u64,

    /// Also sync groups configured through github.homerow.ca annotations
    #[arg(long, env = "TEAM_SYNC_LEGACY_ANNOTATIONS")]
    pub legacy_annotations: bool,

    /// Namespace holding secrets named by legacy annotations
    #[arg(long, env = "POD_NAMESPACE", default_value = "default")]
    pub secret_namespace: String,
}

impl Settings {
    pub fn fallback_credential(&self) -> Option<Credential> {
        self.github_token.clone().and_then(Credential::new)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }
}
