//! Data Transfer Objects for the REST API
//!
//! These types are used for API responses.

use kube::ResourceExt;
use serde::Serialize;

use crate::crd::{Astro, AstroPhase, AstroStatus};

/// Response for listing Astros
#[derive(Debug, Serialize)]
pub struct AstroListResponse {
    pub items: Vec<AstroSummary>,
    pub total: usize,
}

/// Summary of an Astro for list views
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AstroSummary {
    pub name: String,
    pub namespace: String,
    pub phase: Option<AstroPhase>,
    pub node_number: i32,
    pub ready_node_number: i32,
}

impl From<&Astro> for AstroSummary {
    fn from(astro: &Astro) -> Self {
        let status = astro.status.clone().unwrap_or_default();
        Self {
            name: astro.name_any(),
            namespace: astro.namespace().unwrap_or_default(),
            phase: status.phase,
            node_number: status.node_number,
            ready_node_number: status.ready_node_number,
        }
    }
}

/// A star with its declared dependencies
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StarSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub star_type: String,
    pub dependencies: Vec<String>,
}

/// Response for a single Astro
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AstroDetailResponse {
    pub name: String,
    pub namespace: String,
    pub stars: Vec<StarSummary>,
    pub status: AstroStatus,
    pub created_at: Option<String>,
}

impl From<&Astro> for AstroDetailResponse {
    fn from(astro: &Astro) -> Self {
        Self {
            name: astro.name_any(),
            namespace: astro.namespace().unwrap_or_default(),
            stars: astro
                .spec
                .stars
                .iter()
                .map(|s| StarSummary {
                    name: s.name.clone(),
                    star_type: s.star_type.clone(),
                    dependencies: s.dependencies.clone(),
                })
                .collect(),
            status: astro.status.clone().unwrap_or_default(),
            created_at: astro
                .metadata
                .creation_timestamp
                .as_ref()
                .map(|t| t.0.to_rfc3339()),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}
