//! Controller runner - builds the ingress controller future
//!
//! Construction is kept separate from `main` so the caller decides how the
//! future is driven and when shutdown is triggered.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};
use tokio_util::sync::CancellationToken;

use lattice_common::crd::{HttpProxy, Ingress};
use lattice_ingress::controller::{error_policy, reconcile, IngressContext};

use crate::config::OperatorConfig;

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Build the Ingress controller future.
///
/// The controller watches Ingresses (in one namespace or all) plus the
/// HTTPProxies they own, so edits to a proxy re-trigger its parent. When
/// `shutdown` is cancelled the controller stops taking new work and
/// in-flight store calls are aborted.
pub fn build_ingress_controller(
    client: Client,
    config: &OperatorConfig,
    shutdown: CancellationToken,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    let ctx = Arc::new(IngressContext::from_client(
        client.clone(),
        config.ingress_settings(),
        shutdown.clone(),
    ));

    let (ingresses, proxies): (Api<Ingress>, Api<HttpProxy>) = match config.namespace.as_deref() {
        Some(namespace) => {
            tracing::info!(namespace, "watching a single namespace");
            (
                Api::namespaced(client.clone(), namespace),
                Api::namespaced(client, namespace),
            )
        }
        None => (Api::all(client.clone()), Api::all(client)),
    };

    tracing::info!(class = %config.ingress_class, "- Ingress controller");

    Box::pin(
        Controller::new(
            ingresses,
            WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
        )
        .owns(
            proxies,
            WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
        )
        .graceful_shutdown_on(shutdown.cancelled_owned())
        .run(reconcile, error_policy, ctx)
        .for_each(log_reconcile_result("Ingress")),
    )
}

/// Creates a closure for logging reconciliation results.
fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::warn!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
