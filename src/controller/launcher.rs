//! Star launcher
//!
//! Each star variant describes the workload it needs; the launcher submits
//! that description to the runtime. Adding a variant never touches the
//! scheduler or the status aggregation.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use tracing::{info, instrument};

use crate::crd::{Astro, AstroRef, AstroStar, StarType};
use crate::error::LaunchError;

use super::resources;
use super::runtime::WorkloadRuntime;

/// Kubernetes objects backing one star
#[derive(Clone, Debug)]
pub struct WorkloadDescriptor {
    pub deployment: Deployment,
    pub service: Service,
}

/// References recorded on the Astro after a successful launch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchedStar {
    pub deployment: AstroRef,
    pub service: AstroRef,
}

/// Capability implemented by every star variant
pub trait StarVariant: Send + Sync {
    fn kind(&self) -> StarType;

    /// Translate a star into the objects that run it
    fn describe_workload(
        &self,
        astro: &Astro,
        star: &AstroStar,
    ) -> Result<WorkloadDescriptor, LaunchError>;
}

/// Container image exposed through a Service
pub struct DockerStar;

impl StarVariant for DockerStar {
    fn kind(&self) -> StarType {
        StarType::Docker
    }

    fn describe_workload(
        &self,
        astro: &Astro,
        star: &AstroStar,
    ) -> Result<WorkloadDescriptor, LaunchError> {
        if star.image.trim().is_empty() {
            return Err(LaunchError::InvalidStar(format!(
                "docker star '{}' has no image",
                star.name
            )));
        }
        if !(1..=65535).contains(&star.port) {
            return Err(LaunchError::InvalidStar(format!(
                "docker star '{}' has invalid port {}",
                star.name, star.port
            )));
        }

        Ok(WorkloadDescriptor {
            deployment: resources::build_deployment(astro, star),
            service: resources::build_service(astro, star),
        })
    }
}

/// Resolve the variant implementation for a star
pub fn variant_for(star: &AstroStar) -> Result<&'static dyn StarVariant, LaunchError> {
    match star.variant().map_err(LaunchError::UnsupportedVariant)? {
        StarType::Docker => Ok(&DockerStar),
    }
}

/// Launch a single star: describe its workload and create it if absent
#[instrument(skip_all, fields(star = %star.name, kind = %star.star_type))]
pub async fn launch(
    runtime: &dyn WorkloadRuntime,
    astro: &Astro,
    star: &AstroStar,
) -> Result<LaunchedStar, LaunchError> {
    let variant = variant_for(star)?;
    let descriptor = variant.describe_workload(astro, star)?;

    let deployment = runtime.ensure_deployment(&descriptor.deployment).await?;
    let service = runtime.ensure_service(&descriptor.service).await?;

    info!(
        "Launched {} star {} as {:?}",
        variant.kind(),
        star.name,
        deployment.name
    );
    Ok(LaunchedStar {
        deployment,
        service,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use kube::ResourceExt;

    use super::*;
    use crate::controller::runtime::Readiness;
    use crate::crd::AstroSpec;
    use crate::error::RuntimeError;

    #[derive(Default)]
    struct RecordingRuntime {
        created: Mutex<Vec<String>>,
        reject_services: bool,
    }

    #[async_trait]
    impl WorkloadRuntime for RecordingRuntime {
        async fn ensure_deployment(
            &self,
            deployment: &Deployment,
        ) -> Result<AstroRef, RuntimeError> {
            let name = deployment.name_any();
            self.created.lock().unwrap().push(format!("deployment/{name}"));
            Ok(AstroRef::new(name, "default"))
        }

        async fn ensure_service(&self, service: &Service) -> Result<AstroRef, RuntimeError> {
            if self.reject_services {
                return Err(RuntimeError::Rejected("port already allocated".into()));
            }
            let name = service.name_any();
            self.created.lock().unwrap().push(format!("service/{name}"));
            Ok(AstroRef::new(name, "default"))
        }

        async fn readiness(&self, _deployment: &AstroRef) -> Result<Readiness, RuntimeError> {
            Ok(Readiness::Progressing)
        }
    }

    fn star(star_type: &str) -> AstroStar {
        AstroStar {
            name: "web".to_string(),
            star_type: star_type.to_string(),
            image: "nginx:1.25".to_string(),
            port: 80,
            ..Default::default()
        }
    }

    fn astro() -> Astro {
        Astro::new("site", AstroSpec::default())
    }

    #[test]
    fn test_launch_docker_star() {
        let runtime = RecordingRuntime::default();
        let launched = tokio_test::block_on(launch(&runtime, &astro(), &star("docker"))).unwrap();

        assert_eq!(launched.deployment, AstroRef::new("site-web", "default"));
        assert_eq!(launched.service, AstroRef::new("site-web", "default"));
        assert_eq!(
            *runtime.created.lock().unwrap(),
            vec!["deployment/site-web", "service/site-web"]
        );
    }

    #[test]
    fn test_unsupported_variant() {
        let runtime = RecordingRuntime::default();
        let err = tokio_test::block_on(launch(&runtime, &astro(), &star("lambda"))).unwrap_err();

        assert_eq!(err, LaunchError::UnsupportedVariant("lambda".into()));
        assert!(runtime.created.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_docker_star() {
        let mut missing_image = star("docker");
        missing_image.image.clear();
        assert!(matches!(
            DockerStar.describe_workload(&astro(), &missing_image),
            Err(LaunchError::InvalidStar(_))
        ));

        let mut bad_port = star("docker");
        bad_port.port = 0;
        assert!(matches!(
            DockerStar.describe_workload(&astro(), &bad_port),
            Err(LaunchError::InvalidStar(_))
        ));
    }

    #[test]
    fn test_runtime_rejection_is_launch_error() {
        let runtime = RecordingRuntime {
            reject_services: true,
            ..Default::default()
        };
        let err = tokio_test::block_on(launch(&runtime, &astro(), &star("docker"))).unwrap_err();
        assert_eq!(err.reason(), "Rejected");
        assert!(!err.is_transient());
    }
}
