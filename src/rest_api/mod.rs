//! Read-only REST API exposing Astro status

mod dto;
mod handlers;
mod server;

pub use dto::*;
pub use server::run_server;
