//! Child HTTPProxy synchronization
//!
//! Brings the HTTPProxies owned by an Ingress in line with the compiled set:
//! missing proxies are created, drifted ones updated in place, and proxies
//! left over from earlier generations are deleted.
//!
//! Proxies are found by label, never by name. Creates and updates run in
//! compiled order and the first failure aborts the sync, so the generation
//! sweep only runs once every current proxy is in place. Running the sync
//! again after a failure picks up where it stopped.

use kube::ResourceExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use lattice_common::crd::{HttpProxy, Ingress};
use lattice_common::kube_utils::{proxy_selector, stale_generation_selector};

use crate::controller::{guarded, IngressKubeClient};
use crate::Error;

/// What a sync did, for logging
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Proxies created
    pub created: usize,
    /// Proxies updated in place
    pub updated: usize,
    /// Proxies already matching the compiled state
    pub unchanged: usize,
    /// Proxies from other generations deleted by the sweep
    pub deleted: usize,
}

/// Reconcile the HTTPProxies of `ingress` against `desired`.
///
/// `desired` is the output of [`crate::compiler::ProxyCompiler::compile`]
/// for the same ingress. More than one existing proxy for a host is
/// reported as [`Error::DuplicateProxies`] and left for an operator.
pub async fn sync_proxies(
    ingress: &Ingress,
    desired: &[HttpProxy],
    kube: &dyn IngressKubeClient,
    cancel: &CancellationToken,
) -> Result<SyncSummary, Error> {
    let name = ingress.name_any();
    let namespace = ingress.namespace().unwrap_or_default();
    let mut summary = SyncSummary::default();

    for proxy in desired {
        let fqdn = proxy.fqdn().unwrap_or_default();
        let selector = proxy_selector(&name, fqdn);
        let existing =
            guarded(cancel, "list_proxies", kube.list_proxies(&namespace, &selector)).await?;

        match existing.as_slice() {
            [] => {
                guarded(cancel, "create_proxy", kube.create_proxy(proxy)).await?;
                debug!(proxy = %proxy.name_any(), fqdn, "created HTTPProxy");
                summary.created += 1;
            }
            [current] if is_up_to_date(current, proxy) => {
                summary.unchanged += 1;
            }
            [current] => {
                let mut update = current.clone();
                update.metadata.labels = proxy.metadata.labels.clone();
                update.metadata.annotations = proxy.metadata.annotations.clone();
                update.spec = proxy.spec.clone();

                guarded(cancel, "update_proxy", kube.update_proxy(&update)).await?;
                debug!(proxy = %update.name_any(), fqdn, "updated HTTPProxy");
                summary.updated += 1;
            }
            found => {
                return Err(Error::duplicate_proxies(
                    &namespace,
                    &name,
                    fqdn,
                    found.len(),
                ));
            }
        }
    }

    let stale = stale_generation_selector(&name, ingress.generation());
    let leftovers =
        guarded(cancel, "list_proxies", kube.list_proxies(&namespace, &stale)).await?;
    if !leftovers.is_empty() {
        guarded(cancel, "delete_proxies", kube.delete_proxies(&namespace, &stale)).await?;
        info!(
            count = leftovers.len(),
            selector = %stale,
            "deleted HTTPProxies from previous generations"
        );
        summary.deleted = leftovers.len();
    }

    Ok(summary)
}

/// True when the fields the controller owns already match
fn is_up_to_date(current: &HttpProxy, desired: &HttpProxy) -> bool {
    current.metadata.labels == desired.metadata.labels
        && current.metadata.annotations == desired.metadata.annotations
        && current.spec == desired.spec
}
