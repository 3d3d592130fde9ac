//! Workload runtime port
//!
//! The reconciliation pass needs exactly three verbs from the cluster:
//! create-if-absent for a Deployment, create-if-absent for a Service and a
//! readiness probe for a recorded Deployment.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::crd::AstroRef;
use crate::error::RuntimeError;

use super::resources::deployment_readiness;

/// Observed readiness of a star's workload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Progressing,
    /// The workload will not become ready without intervention
    Failed(String),
    /// The recorded workload no longer exists
    Missing,
}

#[async_trait]
pub trait WorkloadRuntime: Send + Sync {
    /// Create the Deployment unless one with the same name exists
    async fn ensure_deployment(&self, deployment: &Deployment) -> Result<AstroRef, RuntimeError>;

    /// Create the Service unless one with the same name exists
    async fn ensure_service(&self, service: &Service) -> Result<AstroRef, RuntimeError>;

    /// Observe the readiness of a previously created Deployment
    async fn readiness(&self, deployment: &AstroRef) -> Result<Readiness, RuntimeError>;
}

/// [`WorkloadRuntime`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeRuntime {
    client: Client,
}

impl KubeRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn create_if_absent<K>(&self, desired: &K) -> Result<AstroRef, RuntimeError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned
            + Serialize,
    {
        let name = desired.name_any();
        let namespace = desired.namespace().unwrap_or_else(|| "default".to_string());
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        let reference = AstroRef::new(name.as_str(), namespace.as_str());

        let existing = match api.get_opt(&name).await.map_err(RuntimeError::from_kube)? {
            Some(existing) => existing,
            None => match api.create(&PostParams::default(), desired).await {
                Ok(_) => {
                    info!("Created {} {}/{}", K::kind(&()), namespace, name);
                    return Ok(reference);
                }
                // Lost a race with another writer; fall through to the ownership check
                Err(kube::Error::Api(e)) if e.code == 409 => api
                    .get(&name)
                    .await
                    .map_err(RuntimeError::from_kube)?,
                Err(e) => return Err(RuntimeError::from_kube(e)),
            },
        };

        ensure_same_owner(desired, &existing)?;
        debug!("{} {}/{} already exists", K::kind(&()), namespace, name);
        Ok(reference)
    }
}

/// An existing object only counts as ours when it shares the desired controller owner
fn ensure_same_owner<K: Resource<DynamicType = ()>>(
    desired: &K,
    existing: &K,
) -> Result<(), RuntimeError> {
    let Some(owner) = desired.owner_references().first() else {
        return Ok(());
    };
    if existing
        .owner_references()
        .iter()
        .any(|o| o.uid == owner.uid)
    {
        Ok(())
    } else {
        Err(RuntimeError::Conflict(format!(
            "{} {} exists and is not owned by {} {}",
            K::kind(&()),
            existing.name_any(),
            owner.kind,
            owner.name
        )))
    }
}

#[async_trait]
impl WorkloadRuntime for KubeRuntime {
    async fn ensure_deployment(&self, deployment: &Deployment) -> Result<AstroRef, RuntimeError> {
        self.create_if_absent(deployment).await
    }

    async fn ensure_service(&self, service: &Service) -> Result<AstroRef, RuntimeError> {
        self.create_if_absent(service).await
    }

    async fn readiness(&self, deployment: &AstroRef) -> Result<Readiness, RuntimeError> {
        let (Some(name), Some(namespace)) = (&deployment.name, &deployment.namespace) else {
            return Ok(Readiness::Missing);
        };
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        match api.get_opt(name).await.map_err(RuntimeError::from_kube)? {
            Some(found) => Ok(deployment_readiness(&found)),
            None => Ok(Readiness::Missing),
        }
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

    use super::*;

    fn service(owner_uid: Option<&str>) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some("shop-api".to_string()),
                owner_references: owner_uid.map(|uid| {
                    vec![OwnerReference {
                        kind: "Astro".to_string(),
                        name: "shop".to_string(),
                        uid: uid.to_string(),
                        ..Default::default()
                    }]
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_same_owner_is_accepted() {
        assert!(ensure_same_owner(&service(Some("uid-1")), &service(Some("uid-1"))).is_ok());
    }

    #[test]
    fn test_foreign_object_is_conflict() {
        let err = ensure_same_owner(&service(Some("uid-1")), &service(Some("uid-2"))).unwrap_err();
        assert!(matches!(err, RuntimeError::Conflict(_)));

        let err = ensure_same_owner(&service(Some("uid-1")), &service(None)).unwrap_err();
        assert!(matches!(err, RuntimeError::Conflict(_)));
    }
}
