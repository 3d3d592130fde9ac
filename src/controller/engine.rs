//! A single reconciliation pass over one Astro
//!
//! The pass reads the declared graph and the observed world, launches the
//! current ready frontier and folds every star's state into a new status.
//! It never fails: graph and launch problems become conditions, transient
//! runtime problems shorten the requeue interval.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::crd::{star_condition_type, Astro, AstroCondition, AstroPhase, AstroRef, AstroStatus};
use crate::dag::{blocked_by_failure, has_forward_progress, next_batch, Graph, NodeState, NodeStates};

use super::launcher;
use super::resources::{astro_namespace, workload_name};
use super::runtime::{Readiness, WorkloadRuntime};

/// Settings shared by every pass
#[derive(Clone, Debug)]
pub struct ReconcileSettings {
    /// Requeue interval while the workflow is progressing
    pub requeue_interval: Duration,
    /// Requeue interval after a transient runtime error
    pub retry_interval: Duration,
    /// Name of the Astermule instance recorded on each Astro
    pub astermule_name: String,
    /// Namespace of the Astermule instance; defaults to the Astro's namespace
    pub astermule_namespace: Option<String>,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            requeue_interval: Duration::from_secs(30),
            retry_interval: Duration::from_secs(15),
            astermule_name: "astermule".to_string(),
            astermule_namespace: None,
        }
    }
}

impl ReconcileSettings {
    fn astermule_ref(&self, astro: &Astro) -> AstroRef {
        let namespace = self
            .astermule_namespace
            .clone()
            .unwrap_or_else(|| astro_namespace(astro));
        AstroRef::new(self.astermule_name.as_str(), namespace)
    }
}

/// Result of a pass: the status to write and when to look again
#[derive(Clone, Debug, PartialEq)]
pub struct PassOutcome {
    pub status: AstroStatus,
    /// `None` once the Astro reached a terminal phase
    pub requeue: Option<Duration>,
}

/// Run one reconciliation pass
#[instrument(skip_all, fields(astro = %astro.metadata.name.as_deref().unwrap_or_default()))]
pub async fn run_pass(
    astro: &Astro,
    runtime: &dyn WorkloadRuntime,
    settings: &ReconcileSettings,
    now: DateTime<Utc>,
) -> PassOutcome {
    let mut status = astro.status.clone().unwrap_or_default();

    if status.is_terminal() {
        debug!("Astro is in terminal phase {:?}, nothing to do", status.phase);
        return PassOutcome {
            status,
            requeue: None,
        };
    }

    let graph = match Graph::build(&astro.spec) {
        Ok(graph) => graph,
        Err(err) => {
            warn!("Invalid star graph: {}", err);
            status.transition(
                AstroCondition::phase(AstroPhase::Failed, now)
                    .with_reason(err.reason(), err.to_string()),
            );
            return PassOutcome {
                status,
                requeue: None,
            };
        }
    };

    status.node_number = count(graph.len());
    initialize(&mut status, astro, settings, graph.len(), now);

    let mut retry = false;
    let mut states = observe(&mut status, astro, &graph, runtime, now, &mut retry).await;

    for name in next_batch(&graph, &states) {
        let Some(star) = graph.get(name) else {
            continue;
        };
        match launcher::launch(runtime, astro, star).await {
            Ok(launched) => {
                status.record_launch(launched.deployment, launched.service);
                status.push_condition(
                    AstroCondition::star(name, AstroPhase::Launched, now)
                        .with_reason("WorkloadCreated", format!("star {} launched", name)),
                );
                states.insert(name.to_string(), NodeState::Launched);
            }
            Err(err) if err.is_transient() => {
                warn!("Transient error launching star {}: {}", name, err);
                retry = true;
            }
            Err(err) => {
                warn!("Failed to launch star {}: {}", name, err);
                status.push_condition(
                    AstroCondition::star(name, AstroPhase::Failed, now)
                        .with_reason(err.reason(), err.to_string()),
                );
                states.insert(name.to_string(), NodeState::Failed);
            }
        }
    }

    aggregate(&mut status, &graph, &states, now);

    let requeue = if status.is_terminal() {
        None
    } else if retry {
        Some(settings.retry_interval)
    } else {
        Some(settings.requeue_interval)
    };

    PassOutcome { status, requeue }
}

fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// One-time initialization followed by the move to Ready
fn initialize(
    status: &mut AstroStatus,
    astro: &Astro,
    settings: &ReconcileSettings,
    stars: usize,
    now: DateTime<Utc>,
) {
    if !status.workflow_engine_initialized {
        status.workflow_engine_initialized = true;
        status.transition(
            AstroCondition::phase(AstroPhase::Initialized, now)
                .with_reason("GraphValidated", format!("{} stars validated", stars)),
        );
        info!("Workflow engine initialized with {} stars", stars);
    }

    if !status.astermule_ref.is_set() {
        status.astermule_ref = settings.astermule_ref(astro);
    }

    if matches!(status.phase, None | Some(AstroPhase::Initialized)) {
        status.transition(AstroCondition::phase(AstroPhase::Ready, now));
    }
}

/// Derive the state of every star from status history and the runtime
async fn observe(
    status: &mut AstroStatus,
    astro: &Astro,
    graph: &Graph<'_>,
    runtime: &dyn WorkloadRuntime,
    now: DateTime<Utc>,
    retry: &mut bool,
) -> NodeStates {
    let mut states = NodeStates::new();

    for star in graph.nodes() {
        let name = star.name.as_str();
        let failed = status
            .latest_condition(&star_condition_type(name))
            .is_some_and(|c| c.status == AstroPhase::Failed);
        if failed {
            states.insert(name.to_string(), NodeState::Failed);
            continue;
        }

        let workload = workload_name(astro, name);
        let Some(reference) = status
            .deployment_ref
            .iter()
            .find(|r| r.name_is(&workload))
            .cloned()
        else {
            continue;
        };

        let state = match runtime.readiness(&reference).await {
            Ok(Readiness::Ready) => {
                status.push_condition(
                    AstroCondition::star(name, AstroPhase::Succeeded, now)
                        .with_reason("WorkloadReady", format!("deployment {} is ready", workload)),
                );
                NodeState::Ready
            }
            Ok(Readiness::Progressing) => NodeState::Launched,
            Ok(Readiness::Missing) => {
                warn!("Deployment {} for star {} is missing", workload, name);
                NodeState::Launched
            }
            Ok(Readiness::Failed(message)) => {
                status.push_condition(
                    AstroCondition::star(name, AstroPhase::Failed, now)
                        .with_reason("WorkloadFailed", message),
                );
                NodeState::Failed
            }
            // A failed read says nothing about the workload itself
            Err(err) => {
                warn!("Could not observe star {}: {}", name, err);
                *retry = true;
                NodeState::Launched
            }
        };
        states.insert(name.to_string(), state);
    }

    states
}

/// Fold star states into counts and the resource phase
fn aggregate(status: &mut AstroStatus, graph: &Graph<'_>, states: &NodeStates, now: DateTime<Utc>) {
    let of = |state: NodeState| states.values().filter(|s| **s == state).count();
    let ready = of(NodeState::Ready);
    let failed = of(NodeState::Failed);
    status.ready_node_number = count(ready);

    if failed > 0 && !has_forward_progress(graph, states) {
        let failed_names: Vec<&str> = graph
            .nodes()
            .map(|s| s.name.as_str())
            .filter(|name| states.get(*name) == Some(&NodeState::Failed))
            .collect();
        let blocked: Vec<&str> = blocked_by_failure(graph, states).into_iter().collect();
        let mut message = format!("failed stars: {}", failed_names.join(", "));
        if !blocked.is_empty() {
            message.push_str(&format!("; blocked stars: {}", blocked.join(", ")));
        }
        warn!("Astro failed: {}", message);
        status.transition(
            AstroCondition::phase(AstroPhase::Failed, now).with_reason("StarFailed", message),
        );
    } else if failed == 0 && ready == graph.len() {
        info!("All {} stars are ready", ready);
        status.transition(AstroCondition::phase(AstroPhase::Succeeded, now).with_reason(
            "AllStarsReady",
            format!("{} of {} stars ready", ready, graph.len()),
        ));
    } else if of(NodeState::Launched) + ready > 0 {
        status.transition(AstroCondition::phase(AstroPhase::Launched, now));
    }
}
