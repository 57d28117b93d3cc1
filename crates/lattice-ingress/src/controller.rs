//! Ingress controller implementation
//!
//! Reconciles one Ingress at a time: compile the HTTPProxies it should own,
//! sync them into the cluster, then report the outcome on the Ingress status.
//!
//! Ingresses of another class, ones being deleted, and keys that no longer
//! resolve are dropped. Deleted Ingresses need no work here since their
//! proxies carry an owner reference and are garbage collected by Kubernetes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::core::Selector;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Client, Resource, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use lattice_common::crd::{HttpProxy, Ingress, LoadBalancerIngressStatus};
use lattice_common::events::{actions, reasons, EventPublisher};
use lattice_common::kube_utils::split_meta_namespace_key;
use lattice_common::{KubeEventPublisher, CONTOUR_INGRESS_CLASS, DEFAULT_PRIVATE_LB_DOMAIN};
#[cfg(test)]
use lattice_common::NoopEventPublisher;

use crate::compiler::ProxyCompiler;
use crate::status;
use crate::sync::{sync_proxies, SyncSummary};
use crate::Error;

/// Reason set on NetworkConfigured when compiling or syncing fails
pub const REASON_RECONCILE_FAILED: &str = "ReconcileFailed";

/// Field manager used for status patches
const FIELD_MANAGER: &str = "lattice-ingress-controller";

/// Requeue delay after a retryable error
const RETRY_DELAY: Duration = Duration::from_secs(30);

// =============================================================================
// Kubernetes client abstraction
// =============================================================================

/// Trait abstracting the Kubernetes operations of the ingress controller
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IngressKubeClient: Send + Sync {
    /// Get an Ingress by namespace and name, `None` if it does not exist
    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, Error>;

    /// List HTTPProxies in a namespace matching a label selector
    async fn list_proxies(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<HttpProxy>, Error>;

    /// Create an HTTPProxy
    async fn create_proxy(&self, proxy: &HttpProxy) -> Result<HttpProxy, Error>;

    /// Replace an existing HTTPProxy
    async fn update_proxy(&self, proxy: &HttpProxy) -> Result<HttpProxy, Error>;

    /// Delete every HTTPProxy in a namespace matching a label selector
    async fn delete_proxies(&self, namespace: &str, selector: &Selector) -> Result<(), Error>;

    /// Write the status of an Ingress, guarded by its resourceVersion
    async fn update_ingress_status(&self, ingress: &Ingress) -> Result<Ingress, Error>;
}

/// Real Kubernetes client implementation
pub struct IngressKubeClientImpl {
    client: Client,
}

impl IngressKubeClientImpl {
    /// Create a new IngressKubeClientImpl wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn proxies(&self, namespace: &str) -> Api<HttpProxy> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn namespace_of<K: Resource>(obj: &K) -> Result<String, Error> {
    let meta = obj.meta();
    meta.namespace.clone().ok_or_else(|| {
        let name = meta.name.as_deref().unwrap_or_default();
        Error::internal_with_context("IngressKubeClient", format!("{} has no namespace", name))
    })
}

#[async_trait]
impl IngressKubeClient for IngressKubeClientImpl {
    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, Error> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_proxies(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<HttpProxy>, Error> {
        let params = ListParams::default().labels_from(selector);
        Ok(self.proxies(namespace).list(&params).await?.items)
    }

    async fn create_proxy(&self, proxy: &HttpProxy) -> Result<HttpProxy, Error> {
        let namespace = namespace_of(proxy)?;
        Ok(self
            .proxies(&namespace)
            .create(&PostParams::default(), proxy)
            .await?)
    }

    async fn update_proxy(&self, proxy: &HttpProxy) -> Result<HttpProxy, Error> {
        let namespace = namespace_of(proxy)?;
        Ok(self
            .proxies(&namespace)
            .replace(&proxy.name_any(), &PostParams::default(), proxy)
            .await?)
    }

    async fn delete_proxies(&self, namespace: &str, selector: &Selector) -> Result<(), Error> {
        let params = ListParams::default().labels_from(selector);
        self.proxies(namespace)
            .delete_collection(&DeleteParams::default(), &params)
            .await?;
        Ok(())
    }

    async fn update_ingress_status(&self, ingress: &Ingress) -> Result<Ingress, Error> {
        let namespace = namespace_of(ingress)?;
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), &namespace);
        // resourceVersion makes the API server reject the patch on conflict
        let status_patch = serde_json::json!({
            "metadata": { "resourceVersion": ingress.resource_version() },
            "status": ingress.status,
        });

        Ok(api
            .patch_status(
                &ingress.name_any(),
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&status_patch),
            )
            .await?)
    }
}

/// Await a store call unless `cancel` fires first
pub(crate) async fn guarded<T, F>(
    cancel: &CancellationToken,
    op: &str,
    call: F,
) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::cancelled(op)),
        result = call => result,
    }
}

// =============================================================================
// Controller context
// =============================================================================

/// Settings of the ingress controller
#[derive(Clone, Debug)]
pub struct IngressSettings {
    /// Ingress class this controller manages
    pub ingress_class: String,
    /// Addresses reported as the public load balancer
    pub public_load_balancers: Vec<LoadBalancerIngressStatus>,
    /// Addresses reported as the private load balancer
    pub private_load_balancers: Vec<LoadBalancerIngressStatus>,
    /// Delay before a successfully reconciled Ingress is checked again
    pub resync_period: Duration,
}

impl Default for IngressSettings {
    fn default() -> Self {
        Self {
            ingress_class: CONTOUR_INGRESS_CLASS.to_string(),
            public_load_balancers: Vec::new(),
            private_load_balancers: vec![LoadBalancerIngressStatus::internal(
                DEFAULT_PRIVATE_LB_DOMAIN,
            )],
            resync_period: Duration::from_secs(600),
        }
    }
}

impl IngressSettings {
    /// True if the Ingress carries this controller's class
    pub fn manages(&self, ingress: &Ingress) -> bool {
        ingress.ingress_class() == Some(self.ingress_class.as_str())
    }
}

/// Controller context for Ingress reconciliation
///
/// Holds shared state needed by the reconciler. Collaborators are injected
/// so tests can swap in mocks or the in-memory store.
pub struct IngressContext {
    /// Kubernetes client for store operations (trait object for testability)
    pub kube: Arc<dyn IngressKubeClient>,
    /// Event publisher for emitting Kubernetes Events
    pub events: Arc<dyn EventPublisher>,
    /// Controller settings
    pub settings: IngressSettings,
    /// Cancelled on shutdown, aborting in-flight store calls
    pub shutdown: CancellationToken,
}

impl IngressContext {
    /// Create a new IngressContext with the given dependencies
    pub fn new(
        kube: Arc<dyn IngressKubeClient>,
        events: Arc<dyn EventPublisher>,
        settings: IngressSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            kube,
            events,
            settings,
            shutdown,
        }
    }

    /// Create a context backed by a real Kubernetes client
    pub fn from_client(
        client: Client,
        settings: IngressSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self::new(
            Arc::new(IngressKubeClientImpl::new(client.clone())),
            Arc::new(KubeEventPublisher::new(client, FIELD_MANAGER)),
            settings,
            shutdown,
        )
    }

    /// Create a context for testing with default settings and no events
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn IngressKubeClient>) -> Self {
        Self::new(
            kube,
            Arc::new(NoopEventPublisher),
            IngressSettings::default(),
            CancellationToken::new(),
        )
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Reconcile the Ingress identified by a `namespace/name` key.
///
/// Malformed keys and missing Ingresses are logged and dropped. Returns the
/// reconcile error if compiling or syncing failed, otherwise the status
/// write error if that failed.
#[instrument(skip(ctx, cancel))]
pub async fn reconcile_key(
    key: &str,
    ctx: &IngressContext,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let (namespace, name) = match split_meta_namespace_key(key) {
        Ok(parts) => parts,
        Err(e) => {
            error!(error = %e, "dropping malformed key");
            return Ok(());
        }
    };

    let fetched = guarded(cancel, "get_ingress", ctx.kube.get_ingress(&namespace, &name)).await?;
    let Some(ingress) = fetched else {
        info!("ingress no longer exists");
        return Ok(());
    };

    reconcile_ingress(&ingress, ctx, cancel).await
}

/// Reconcile an Ingress as read from the store or watch cache.
///
/// The given object is never modified; all changes happen on a clone.
pub async fn reconcile_ingress(
    original: &Ingress,
    ctx: &IngressContext,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    if !ctx.settings.manages(original) {
        debug!(class = ?original.ingress_class(), "ingress class not managed here, skipping");
        return Ok(());
    }
    if original.is_being_deleted() {
        debug!("ingress is being deleted, skipping");
        return Ok(());
    }

    let mut ingress = original.clone();
    let result = converge(&mut ingress, ctx, cancel).await;

    // Shutting down: leave the status for the next process
    if cancel.is_cancelled() {
        return result.and(Err(Error::cancelled("reconcile")));
    }

    let changed = status::should_write(original.status.as_ref(), ingress.status.as_ref());
    let status_result = if changed {
        write_status(&ingress, ctx, cancel).await
    } else {
        debug!("status unchanged, skipping update");
        Ok(())
    };

    if let Err(e) = &result {
        warn!(error = %e, "ingress reconciliation failed");
        publish_warning(&ingress, ctx, reasons::INTERNAL_ERROR, actions::RECONCILE, e).await;
    }

    result.and(status_result)
}

/// Compile and sync, recording the outcome on the status of `ingress`
async fn converge(
    ingress: &mut Ingress,
    ctx: &IngressContext,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    ingress
        .status
        .get_or_insert_with(Default::default)
        .initialize_conditions();

    let outcome = compile_and_sync(ingress, ctx, cancel).await;

    let generation = ingress.generation();
    let status = ingress.status.get_or_insert_with(Default::default);
    match outcome {
        Ok(summary) => {
            info!(
                created = summary.created,
                updated = summary.updated,
                unchanged = summary.unchanged,
                deleted = summary.deleted,
                generation,
                "HTTPProxies in sync"
            );
            status.mark_network_configured();
            status.mark_load_balancer_ready(
                Vec::new(),
                ctx.settings.public_load_balancers.clone(),
                ctx.settings.private_load_balancers.clone(),
            );
            status.observed_generation = Some(generation);
            Ok(())
        }
        Err(e) => {
            status.mark_network_failed(REASON_RECONCILE_FAILED, &e.to_string());
            Err(e)
        }
    }
}

async fn compile_and_sync(
    ingress: &Ingress,
    ctx: &IngressContext,
    cancel: &CancellationToken,
) -> Result<SyncSummary, Error> {
    let desired = ProxyCompiler::compile(ingress)?;
    sync_proxies(ingress, &desired, ctx.kube.as_ref(), cancel).await
}

async fn write_status(
    ingress: &Ingress,
    ctx: &IngressContext,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let Some(next) = ingress.status.as_ref() else {
        return Ok(());
    };
    let namespace = ingress.namespace().unwrap_or_default();

    match status::write_back(ctx.kube.as_ref(), &namespace, &ingress.name_any(), next, cancel)
        .await
    {
        Ok(_) => Ok(()),
        Err(e) => {
            warn!(error = %e, "failed to update ingress status");
            publish_warning(ingress, ctx, reasons::UPDATE_FAILED, actions::UPDATE_STATUS, &e)
                .await;
            Err(e)
        }
    }
}

async fn publish_warning(
    ingress: &Ingress,
    ctx: &IngressContext,
    reason: &str,
    action: &str,
    error: &Error,
) {
    ctx.events
        .publish(
            &ingress.object_ref(&()),
            EventType::Warning,
            reason,
            action,
            Some(error.to_string()),
        )
        .await;
}

/// Reconcile entry point for `kube::runtime::Controller`
///
/// Runs on the cached object and requeues after the resync period so
/// external drift of the proxies is eventually corrected.
#[instrument(skip(ingress, ctx), fields(ingress = %ingress.name_any(), namespace = ?ingress.namespace()))]
pub async fn reconcile(ingress: Arc<Ingress>, ctx: Arc<IngressContext>) -> Result<Action, Error> {
    let cancel = ctx.shutdown.child_token();
    reconcile_ingress(&ingress, &ctx, &cancel).await?;
    Ok(Action::requeue(ctx.settings.resync_period))
}

/// Error policy for the ingress controller
///
/// - Retryable errors (transient): requeue after 30 seconds
/// - Non-retryable errors (invalid spec): await a change to the Ingress
pub fn error_policy(ingress: Arc<Ingress>, error: &Error, _ctx: Arc<IngressContext>) -> Action {
    error!(
        ?error,
        ingress = %ingress.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(RETRY_DELAY)
    } else {
        Action::await_change()
    }
}
