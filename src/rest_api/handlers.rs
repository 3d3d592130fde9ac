//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use kube::api::{Api, ListParams};
use tracing::warn;

use crate::controller::ControllerState;
use crate::crd::Astro;

use super::dto::{AstroDetailResponse, AstroListResponse, AstroSummary, ErrorResponse, HealthResponse};

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List Astros visible to the operator
pub async fn list_astros(State(state): State<Arc<ControllerState>>) -> impl IntoResponse {
    let api: Api<Astro> = match &state.namespace {
        Some(ns) => Api::namespaced(state.client.clone(), ns),
        None => Api::all(state.client.clone()),
    };

    match api.list(&ListParams::default()).await {
        Ok(list) => {
            let items: Vec<AstroSummary> = list.items.iter().map(AstroSummary::from).collect();
            let total = items.len();
            (StatusCode::OK, Json(AstroListResponse { items, total })).into_response()
        }
        Err(e) => {
            warn!("Failed to list Astros: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("list_failed", &e.to_string())),
            )
                .into_response()
        }
    }
}

/// Get a single Astro with its full status
pub async fn get_astro(
    State(state): State<Arc<ControllerState>>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    let api: Api<Astro> = Api::namespaced(state.client.clone(), &namespace);

    match api.get_opt(&name).await {
        Ok(Some(astro)) => (StatusCode::OK, Json(AstroDetailResponse::from(&astro))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "not_found",
                &format!("Astro {}/{} not found", namespace, name),
            )),
        )
            .into_response(),
        Err(e) => {
            warn!("Failed to get Astro {}/{}: {:?}", namespace, name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("get_failed", &e.to_string())),
            )
                .into_response()
        }
    }
}
