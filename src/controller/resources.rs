//! Kubernetes resource builders for stars
//!
//! Every launched star is backed by one Deployment and one Service, both
//! named after the Astro and the star and owned by the Astro for garbage
//! collection.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Resource, ResourceExt};
use sha2::{Digest, Sha256};

use crate::crd::{Astro, AstroStar};

use super::runtime::Readiness;

pub const MANAGER: &str = "astro-operator";
pub const ASTRO_LABEL: &str = "astro.io/astro";
pub const STAR_LABEL: &str = "astro.io/star";
pub const ACTION_ANNOTATION: &str = "astro.io/action";
pub const TARGET_ANNOTATION: &str = "astro.io/target";

/// Longest name a Service may carry (RFC 1035 label)
const MAX_NAME_LEN: usize = 63;
const NAME_HASH_LEN: usize = 8;

/// Namespace of an Astro, falling back to "default"
pub fn astro_namespace(astro: &Astro) -> String {
    astro.namespace().unwrap_or_else(|| "default".to_string())
}

/// Name shared by the Deployment and Service of a star
///
/// `<astro>-<star>-<hash>`: a readable DNS label followed by a hash of the
/// exact names, so stars differing only in case or punctuation never share
/// a workload. Always a valid RFC 1035 label.
pub fn workload_name(astro: &Astro, star: &str) -> String {
    let astro_name = astro.name_any();
    let digest = hex::encode(Sha256::digest(format!("{}/{}", astro_name, star)));
    let hash = &digest[..NAME_HASH_LEN];

    let mut readable = dns_label(&format!("{}-{}", astro_name, star));
    if !readable.starts_with(|c: char| c.is_ascii_alphabetic()) {
        readable.insert_str(0, "star-");
    }
    readable.truncate(MAX_NAME_LEN - NAME_HASH_LEN - 1);
    format!("{}-{}", readable.trim_end_matches('-'), hash)
}

/// Lower-case alphanumerics with single dashes in between
fn dns_label(raw: &str) -> String {
    let mut label = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            label.push(c.to_ascii_lowercase());
        } else if !label.is_empty() && !label.ends_with('-') {
            label.push('-');
        }
    }
    label.trim_end_matches('-').to_string()
}

/// Labels that identify a star's pods; also used as the selector
fn selector_labels(astro: &Astro, star: &AstroStar) -> BTreeMap<String, String> {
    BTreeMap::from([
        (ASTRO_LABEL.to_string(), astro.name_any()),
        (STAR_LABEL.to_string(), star.name.clone()),
    ])
}

/// Get the standard labels for a star's resources
fn standard_labels(astro: &Astro, star: &AstroStar) -> BTreeMap<String, String> {
    let mut labels = selector_labels(astro, star);
    labels.insert("app.kubernetes.io/name".to_string(), "astro-star".to_string());
    labels.insert("app.kubernetes.io/instance".to_string(), astro.name_any());
    labels.insert("app.kubernetes.io/component".to_string(), star.name.clone());
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        MANAGER.to_string(),
    );
    labels
}

fn annotations(star: &AstroStar) -> Option<BTreeMap<String, String>> {
    let mut annotations = BTreeMap::new();
    if !star.action.is_empty() {
        annotations.insert(ACTION_ANNOTATION.to_string(), star.action.clone());
    }
    if !star.target.is_empty() {
        annotations.insert(TARGET_ANNOTATION.to_string(), star.target.clone());
    }
    (!annotations.is_empty()).then_some(annotations)
}

/// Create an OwnerReference for garbage collection
pub fn owner_reference(astro: &Astro) -> OwnerReference {
    OwnerReference {
        api_version: Astro::api_version(&()).to_string(),
        kind: Astro::kind(&()).to_string(),
        name: astro.name_any(),
        uid: astro.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

fn metadata(astro: &Astro, star: &AstroStar) -> ObjectMeta {
    ObjectMeta {
        name: Some(workload_name(astro, &star.name)),
        namespace: Some(astro_namespace(astro)),
        labels: Some(standard_labels(astro, star)),
        annotations: annotations(star),
        owner_references: Some(vec![owner_reference(astro)]),
        ..Default::default()
    }
}

// ============================================================================
// Deployment
// ============================================================================

/// Build the Deployment running a docker star's image
pub fn build_deployment(astro: &Astro, star: &AstroStar) -> Deployment {
    let selector = selector_labels(astro, star);

    Deployment {
        metadata: metadata(astro, star),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(selector),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(standard_labels(astro, star)),
                    annotations: annotations(star),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![build_container(star)],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

fn build_container(star: &AstroStar) -> Container {
    let env = [
        ("ASTRO_STAR", &star.name),
        ("ASTRO_ACTION", &star.action),
        ("ASTRO_TARGET", &star.target),
    ]
    .into_iter()
    .filter(|(_, value)| !value.is_empty())
    .map(|(name, value)| EnvVar {
        name: name.to_string(),
        value: Some(value.clone()),
        ..Default::default()
    })
    .collect();

    Container {
        name: "star".to_string(),
        image: Some(star.image.clone()),
        ports: Some(vec![ContainerPort {
            container_port: star.port,
            ..Default::default()
        }]),
        env: Some(env),
        ..Default::default()
    }
}

// ============================================================================
// Service
// ============================================================================

/// Build the Service exposing a docker star's port
pub fn build_service(astro: &Astro, star: &AstroStar) -> Service {
    Service {
        metadata: metadata(astro, star),
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(astro, star)),
            ports: Some(vec![ServicePort {
                name: Some("star".to_string()),
                port: star.port,
                target_port: Some(IntOrString::Int(star.port)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        status: None,
    }
}

// ============================================================================
// Readiness
// ============================================================================

/// Derive readiness from a Deployment's observed status
pub fn deployment_readiness(deployment: &Deployment) -> Readiness {
    let status = deployment.status.as_ref();

    let stalled = status
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conditions| {
            conditions.iter().find(|c| {
                c.type_ == "Progressing"
                    && c.status == "False"
                    && c.reason.as_deref() == Some("ProgressDeadlineExceeded")
            })
        });
    if let Some(condition) = stalled {
        return Readiness::Failed(
            condition
                .message
                .clone()
                .unwrap_or_else(|| "progress deadline exceeded".to_string()),
        );
    }

    let desired = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1)
        .max(1);
    let ready = status.and_then(|s| s.ready_replicas).unwrap_or(0);

    if ready >= desired {
        Readiness::Ready
    } else {
        Readiness::Progressing
    }
}
