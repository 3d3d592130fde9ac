//! Astro Custom Resource Definition
//!
//! An Astro declares a directed acyclic graph of stars. The controller
//! launches each star once its dependencies are ready and reports progress
//! through the status subresource.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{AstroCondition, AstroPhase, AstroRef, AstroStar, PHASE_CONDITION};

/// The Astro CRD spec
///
/// # Example
///
/// ```yaml
/// apiVersion: astro.io/v1alpha1
/// kind: Astro
/// metadata:
///   name: shop
/// spec:
///   stars:
///     - name: db
///       type: docker
///       image: postgres:16
///       port: 5432
///     - name: api
///       type: docker
///       dependencies: [db]
///       image: ghcr.io/acme/shop-api:1.2
///       action: GET
///       target: /orders
///       port: 8080
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "astro.io",
    version = "v1alpha1",
    kind = "Astro",
    plural = "astros",
    shortname = "astro",
    namespaced,
    status = "AstroStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase","description":"The working phase of astro."}"#,
    printcolumn = r#"{"name":"NodeNumber","type":"integer","jsonPath":".status.nodeNumber","description":"The number of nodes in a directed acyclic graph."}"#,
    printcolumn = r#"{"name":"ReadyNodeNumber","type":"integer","jsonPath":".status.readyNodeNumber","description":"The number of ready nodes in a directed acyclic graph."}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AstroSpec {
    /// Stars of the graph, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stars: Vec<AstroStar>,
}

/// Status subresource, written only by the controller
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AstroStatus {
    /// Set once the graph has validated; never reset
    #[serde(default)]
    pub workflow_engine_initialized: bool,

    /// Append-only transition history
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<AstroCondition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<AstroPhase>,

    /// Deployments of launched stars, in launch order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deployment_ref: Vec<AstroRef>,

    /// Services of launched stars, in launch order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_ref: Vec<AstroRef>,

    #[serde(default)]
    pub astermule_ref: AstroRef,

    #[serde(default)]
    pub node_number: i32,

    #[serde(default)]
    pub ready_node_number: i32,
}

impl AstroStatus {
    /// Most recent condition of the given type
    pub fn latest_condition(&self, type_: &str) -> Option<&AstroCondition> {
        self.conditions.iter().rev().find(|c| c.type_ == type_)
    }

    /// Append a condition unless it repeats the latest status of its type.
    /// Returns whether the history changed.
    pub fn push_condition(&mut self, condition: AstroCondition) -> bool {
        if self
            .latest_condition(&condition.type_)
            .is_some_and(|latest| latest.status == condition.status)
        {
            return false;
        }
        self.conditions.push(condition);
        true
    }

    /// Move to a new phase, recording the transition.
    ///
    /// Terminal phases are sticky: once reached, further calls are ignored.
    pub fn transition(&mut self, condition: AstroCondition) -> bool {
        debug_assert_eq!(condition.type_, PHASE_CONDITION);
        if self.is_terminal() || self.phase == Some(condition.status) {
            return false;
        }
        self.phase = Some(condition.status);
        self.push_condition(condition);
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_some_and(|p| p.is_terminal())
    }

    /// Whether a deployment with this name has already been recorded
    pub fn has_deployment(&self, name: &str) -> bool {
        self.deployment_ref.iter().any(|r| r.name_is(name))
    }

    /// Record a launched star's references, at most once per workload name
    pub fn record_launch(&mut self, deployment: AstroRef, service: AstroRef) -> bool {
        let Some(name) = deployment.name.as_deref() else {
            return false;
        };
        if self.has_deployment(name) {
            return false;
        }
        self.deployment_ref.push(deployment);
        if !self.service_ref.iter().any(|r| r.name == service.name) {
            self.service_ref.push(service);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use kube::CustomResourceExt;

    use super::*;

    #[test]
    fn test_crd_metadata() {
        let crd = Astro::crd();
        assert_eq!(crd.spec.group, "astro.io");
        assert_eq!(crd.spec.names.kind, "Astro");
        assert_eq!(crd.spec.names.plural, "astros");
        assert_eq!(
            crd.spec.names.short_names,
            Some(vec!["astro".to_string()])
        );
        let version = &crd.spec.versions[0];
        assert_eq!(version.name, "v1alpha1");
        assert_eq!(
            version.additional_printer_columns.as_ref().map(Vec::len),
            Some(3)
        );
    }

    #[test]
    fn test_push_condition_skips_adjacent_duplicates() {
        let mut status = AstroStatus::default();
        let now = Utc::now();
        assert!(status.push_condition(AstroCondition::star("a", AstroPhase::Launched, now)));
        assert!(!status.push_condition(AstroCondition::star("a", AstroPhase::Launched, now)));
        assert!(status.push_condition(AstroCondition::star("b", AstroPhase::Launched, now)));
        assert!(status.push_condition(AstroCondition::star("a", AstroPhase::Succeeded, now)));
        assert_eq!(status.conditions.len(), 3);
    }

    #[test]
    fn test_terminal_phase_is_sticky() {
        let mut status = AstroStatus::default();
        let now = Utc::now();
        assert!(status.transition(AstroCondition::phase(AstroPhase::Initialized, now)));
        assert!(status.transition(AstroCondition::phase(AstroPhase::Failed, now)));
        assert!(!status.transition(AstroCondition::phase(AstroPhase::Launched, now)));
        assert_eq!(status.phase, Some(AstroPhase::Failed));
        assert_eq!(status.conditions.len(), 2);
    }

    #[test]
    fn test_record_launch_is_idempotent() {
        let mut status = AstroStatus::default();
        let dep = AstroRef::new("shop-api", "default");
        let svc = AstroRef::new("shop-api", "default");
        assert!(status.record_launch(dep.clone(), svc.clone()));
        assert!(!status.record_launch(dep, svc));
        assert_eq!(status.deployment_ref.len(), 1);
        assert_eq!(status.service_ref.len(), 1);
    }

    #[test]
    fn test_status_field_names() {
        let status = AstroStatus {
            workflow_engine_initialized: true,
            phase: Some(AstroPhase::Ready),
            node_number: 2,
            ..Default::default()
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["workflowEngineInitialized"], true);
        assert_eq!(value["phase"], "Ready");
        assert_eq!(value["nodeNumber"], 2);
        assert_eq!(value["readyNodeNumber"], 0);
    }
}
