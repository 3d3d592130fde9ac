//! Astro Operator Entry Point
//!
//! Starts the Kubernetes controller and optional REST API server.

use std::sync::Arc;

use astro_operator::config::OperatorConfig;
use astro_operator::{controller, telemetry, Error};
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = OperatorConfig::parse();
    config.validate()?;

    telemetry::init(config.log_format, config.otlp_endpoint.as_deref())?;
    if config.otlp_endpoint.is_some() {
        info!("OpenTelemetry tracing initialized");
    } else {
        info!("OpenTelemetry tracing disabled (OTEL_EXPORTER_OTLP_ENDPOINT not set)");
    }

    info!("Starting Astro operator v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Kubernetes client
    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;

    info!("Connected to Kubernetes cluster");

    // Create shared controller state
    let state = Arc::new(controller::ControllerState::new(client, &config));

    #[cfg(feature = "rest-api")]
    {
        let api_state = state.clone();
        let addr = config.api_addr;
        tokio::spawn(async move {
            if let Err(e) = astro_operator::rest_api::run_server(api_state, addr).await {
                tracing::error!("REST API server error: {:?}", e);
            }
        });
    }

    // Run the main controller loop
    let result = controller::run_controller(state).await;

    // Flush any remaining traces
    telemetry::shutdown();

    result
}
