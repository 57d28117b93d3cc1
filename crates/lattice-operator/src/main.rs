//! Lattice ingress operator - programs Contour HTTPProxies from Knative Ingresses

use clap::Parser;
use kube::{Client, CustomResourceExt};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use lattice_common::crd::{HttpProxy, Ingress};
use lattice_common::telemetry::{init_telemetry, TelemetryConfig};
use lattice_operator::config::OperatorConfig;
use lattice_operator::controller_runner::build_ingress_controller;

/// Lattice - Knative Ingress controller for Contour
#[derive(Parser, Debug)]
#[command(name = "lattice-operator", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    #[command(flatten)]
    config: OperatorConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        for crd in [Ingress::crd(), HttpProxy::crd()] {
            let yaml = serde_yaml::to_string(&crd)
                .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
            println!("---\n{yaml}");
        }
        return Ok(());
    }

    init_telemetry(TelemetryConfig {
        service_name: "lattice-operator".to_string(),
        format: cli.config.log_format,
    })?;

    run_controller(cli.config).await
}

async fn run_controller(config: OperatorConfig) -> anyhow::Result<()> {
    tracing::info!("Lattice ingress controller starting...");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    let shutdown = CancellationToken::new();
    let controller = build_ingress_controller(client, &config, shutdown.clone());

    let signals = tokio::spawn(cancel_on_signal(shutdown));
    controller.await;
    signals.abort();

    tracing::info!("Lattice ingress controller stopped");
    Ok(())
}

/// Cancel `shutdown` on SIGTERM or SIGINT
async fn cancel_on_signal(shutdown: CancellationToken) {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(error = %e, "failed to install SIGTERM handler");
            return;
        }
    };

    tokio::select! {
        _ = terminate.recv() => tracing::info!("received SIGTERM, shutting down"),
        _ = tokio::signal::ctrl_c() => tracing::info!("received SIGINT, shutting down"),
    }
    shutdown.cancel();
}
