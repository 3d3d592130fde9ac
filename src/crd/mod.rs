//! Custom Resource Definitions for the Astro operator
//!
//! This module defines the `Astro` CRD: a DAG of deployable stars.

mod astro;
mod types;

pub use astro::{Astro, AstroSpec, AstroStatus};
pub use types::*;
