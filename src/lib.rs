use std::{sync::Arc, time::Duration};

use futures::{StreamExt, future};
use kube::{
    Api, Client, ResourceExt,
    config::KubeConfigOptions,
    runtime::{Controller, WatchStreamExt, controller::Action, predicates, reflector, watcher},
};
use tracing::{debug, error, info, warn};

pub mod config;
pub mod credentials;
pub mod crds;
pub mod error;
pub mod github;
pub mod groups;
pub mod kube_store;
pub mod legacy;
pub mod membership;
pub mod reconcile;
pub mod teams;

use config::Settings;
use credentials::CredentialResolver;
use crds::*;
use error::Error;
use github::GitHubFactory;
use kube_store::KubeStore;
use reconcile::Reconciler;

pub struct Context {
    pub reconciler: Reconciler,
    pub resync_interval: Duration,
    pub error_requeue: Duration,
    pub secret_namespace: String,
}

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let options = KubeConfigOptions::default();

    // Load kubeconfig if it's present otherwise fall back to cluster config
    let config = kube::Config::from_kubeconfig(&options)
        .await
        .or_else(|_| kube::Config::incluster())?;
    let client = Client::try_from(config)?;

    let store = Arc::new(KubeStore::new(client.clone()));
    let reconciler = Reconciler::new(
        CredentialResolver::new(store.clone(), settings.fallback_credential()),
        Arc::new(GitHubFactory::new(&settings.github_api_url)?),
        store.clone(),
        store,
    );
    let ctx = Arc::new(Context {
        reconciler,
        resync_interval: settings.resync_interval(),
        error_requeue: settings.error_requeue(),
        secret_namespace: settings.secret_namespace.clone(),
    });

    // Status patches leave the generation alone, so they never start a pass.
    let (reader, writer) = reflector::store();
    let specs = watcher(Api::<GroupSync>::all(client.clone()), watcher::Config::default())
        .default_backoff()
        .reflect(writer)
        .applied_objects()
        .predicate_filter(predicates::generation);

    let groupsyncs = Controller::for_stream(specs, reader)
        .owns(Api::<Group>::all(client.clone()), watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile_groupsync, groupsync_error_policy, ctx.clone())
        .for_each(|res| async move {
            match res {
                Ok((o, _)) => debug!("GroupSync '{}' reconciled", o.name),
                Err(e) => warn!("GroupSync controller error: {}", e),
            }
        });

    if settings.legacy_annotations {
        info!("Syncing annotated groups ({})", legacy::label_selector());
        let annotated = Controller::new(
            Api::<Group>::all(client),
            watcher::Config::default().labels(&legacy::label_selector()),
        )
        .shutdown_on_signal()
        .run(reconcile_annotated_group, annotated_error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((o, _)) => debug!("Group '{}' reconciled", o.name),
                Err(e) => warn!("Group controller error: {}", e),
            }
        });
        future::join(groupsyncs, annotated).await;
    } else {
        groupsyncs.await;
    }

    info!("Controllers shut down");
    Ok(())
}

async fn reconcile_groupsync(sync: Arc<GroupSync>, ctx: Arc<Context>) -> Result<Action, Error> {
    if sync.metadata.deletion_timestamp.is_some() {
        debug!("GroupSync '{}' is being deleted", sync.name_any());
        return Ok(Action::await_change());
    }

    ctx.reconciler.reconcile(&sync).await?;
    Ok(Action::requeue(ctx.resync_interval))
}

fn groupsync_error_policy(sync: Arc<GroupSync>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        class = %error.class(),
        "Failed to sync GroupSync '{}': {}",
        sync.name_any(),
        error
    );
    Action::requeue(ctx.error_requeue)
}

async fn reconcile_annotated_group(group: Arc<Group>, ctx: Arc<Context>) -> Result<Action, Error> {
    if !legacy::is_selected(&group) || group.metadata.deletion_timestamp.is_some() {
        return Ok(Action::await_change());
    }

    let spec = legacy::spec_from_annotations(&group, &ctx.secret_namespace)?;
    let report = ctx.reconciler.sync_teams(&spec, None).await?;
    info!("Group '{}': {}", group.name_any(), report.summary());
    Ok(Action::requeue(ctx.resync_interval))
}

fn annotated_error_policy(group: Arc<Group>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        class = %error.class(),
        "Failed to sync group '{}': {}",
        group.name_any(),
        error
    );
    Action::requeue(ctx.error_requeue)
}
