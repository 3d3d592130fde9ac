//! Astro operator: reconciles `Astro` workflow graphs on Kubernetes
//!
//! An Astro declares a DAG of stars. The controller validates the graph,
//! launches each star's Deployment and Service once its dependencies are
//! ready and aggregates readiness into the resource phase.

pub mod config;
pub mod controller;
pub mod crd;
pub mod dag;
pub mod error;
pub mod telemetry;

#[cfg(feature = "rest-api")]
pub mod rest_api;

pub use crate::error::{Error, Result};
