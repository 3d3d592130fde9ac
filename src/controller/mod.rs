//! Astro controller
//!
//! Watches Astro resources and drives each one through its lifecycle by
//! launching stars in dependency order.

pub mod engine;
pub mod launcher;
mod reconciler;
pub mod resources;
pub mod runtime;

pub use engine::{run_pass, PassOutcome, ReconcileSettings};
pub use launcher::{launch, variant_for, DockerStar, LaunchedStar, StarVariant, WorkloadDescriptor};
pub use reconciler::{run_controller, ControllerState};
pub use runtime::{KubeRuntime, Readiness, WorkloadRuntime};
