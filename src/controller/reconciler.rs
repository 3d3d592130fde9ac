//! Main reconciler for Astro resources
//!
//! Implements the controller pattern using kube-rs runtime.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::{
    api::{Api, Patch, PatchParams},
    client::Client,
    runtime::{
        controller::{self, Action, Controller},
        watcher::Config,
    },
    ResourceExt,
};
use rand::Rng;
use tracing::{error, info, instrument};

use crate::config::OperatorConfig;
use crate::crd::{Astro, AstroStatus};
use crate::error::{Error, Result};

use super::engine::{self, ReconcileSettings};
use super::resources::{astro_namespace, MANAGER};
use super::runtime::KubeRuntime;

/// Requeue delay after a status write lost against a newer revision
const STALE_REQUEUE: Duration = Duration::from_secs(1);

/// Shared state for the controller
pub struct ControllerState {
    pub client: Client,
    pub runtime: KubeRuntime,
    pub settings: ReconcileSettings,
    /// Watch a single namespace instead of the whole cluster
    pub namespace: Option<String>,
    /// Maximum number of Astros reconciled in parallel (0 = unbounded)
    pub concurrency: u16,
}

impl ControllerState {
    pub fn new(client: Client, config: &OperatorConfig) -> Self {
        Self {
            runtime: KubeRuntime::new(client.clone()),
            client,
            settings: config.reconcile_settings(),
            namespace: config.namespace.clone(),
            concurrency: config.concurrency,
        }
    }

    fn api<K>(&self) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

/// Main entry point to start the controller
pub async fn run_controller(state: Arc<ControllerState>) -> Result<()> {
    let astros: Api<Astro> = state.api();

    info!("Starting Astro controller");

    // Verify CRD exists
    match astros.list(&Default::default()).await {
        Ok(_) => info!("Astro CRD is available"),
        Err(e) => {
            error!("Astro CRD not found. Please install the CRD first: {:?}", e);
            return Err(Error::ConfigError("Astro CRD not installed".to_string()));
        }
    }

    // Per-object passes are serialized by the runtime; this only bounds
    // how many distinct Astros run at once.
    let config = controller::Config::default().concurrency(state.concurrency);

    Controller::new(astros, Config::default())
        .with_config(config)
        // Readiness of owned workloads re-triggers the owning Astro
        .owns::<Deployment>(state.api(), Config::default())
        .owns::<Service>(state.api(), Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, state)
        .for_each(|res| async move {
            match res {
                Ok(obj) => info!("Reconciled: {:?}", obj),
                Err(e) => error!("Reconcile error: {:?}", e),
            }
        })
        .await;

    Ok(())
}

/// The main reconciliation function
///
/// This function is called whenever:
/// - An Astro is created or updated
/// - An owned Deployment or Service changes
/// - The requeue timer expires
#[instrument(skip(ctx), fields(name = %obj.name_any(), namespace = obj.namespace().as_deref()))]
async fn reconcile(obj: Arc<Astro>, ctx: Arc<ControllerState>) -> Result<Action> {
    info!(
        "Reconciling Astro {}/{} ({} stars)",
        astro_namespace(&obj),
        obj.name_any(),
        obj.spec.stars.len()
    );

    let outcome = engine::run_pass(&obj, &ctx.runtime, &ctx.settings, chrono::Utc::now()).await;

    if obj.status.as_ref() != Some(&outcome.status)
        && !update_status(&ctx.client, &obj, &outcome.status).await?
    {
        info!(
            "Astro {} changed since this pass read it, retrying",
            obj.name_any()
        );
        return Ok(Action::requeue(STALE_REQUEUE));
    }

    Ok(match outcome.requeue {
        Some(interval) => Action::requeue(with_jitter(interval)),
        None => {
            info!(
                "Astro {} reached terminal phase {:?}",
                obj.name_any(),
                outcome.status.phase
            );
            Action::await_change()
        }
    })
}

/// Write the whole status subresource in a single patch
///
/// Returns `false` when the Astro moved on since `astro` was read; the
/// status computed from it is discarded.
async fn update_status(client: &Client, astro: &Astro, status: &AstroStatus) -> Result<bool> {
    let api: Api<Astro> = Api::namespaced(client.clone(), &astro_namespace(astro));

    let patch = status_patch(astro, status);
    match api
        .patch_status(
            &astro.name_any(),
            &PatchParams::apply(MANAGER),
            &Patch::Merge(&patch),
        )
        .await
    {
        Ok(_) => Ok(true),
        Err(e) if is_stale_write(&e) => Ok(false),
        Err(e) => Err(Error::KubeError(e)),
    }
}

/// Status patch guarded by the resource version the pass started from
fn status_patch(astro: &Astro, status: &AstroStatus) -> serde_json::Value {
    let mut patch = serde_json::json!({ "status": status });
    if let Some(version) = &astro.metadata.resource_version {
        patch["metadata"] = serde_json::json!({ "resourceVersion": version });
    }
    patch
}

fn is_stale_write(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 409)
}

/// Spread requeues of many Astros over up to a tenth of the interval
fn with_jitter(interval: Duration) -> Duration {
    let max = (interval.as_millis() / 10) as u64;
    if max == 0 {
        return interval;
    }
    interval + Duration::from_millis(rand::rng().random_range(0..=max))
}

/// Error policy determines how to handle reconciliation errors
fn error_policy(astro: Arc<Astro>, error: &Error, _ctx: Arc<ControllerState>) -> Action {
    error!("Reconciliation error for {}: {:?}", astro.name_any(), error);

    // Use shorter retry for retriable errors
    let retry_duration = if error.is_retriable() {
        Duration::from_secs(15)
    } else {
        Duration::from_secs(60)
    };

    Action::requeue(with_jitter(retry_duration))
}
