//! Ingress status write-back
//!
//! Status is only written when it actually changed. Condition timestamps are
//! kept for unchanged conditions, so a steady-state reconcile computes a
//! status equal to the stored one and no write (and no watch event) happens.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use lattice_common::crd::{Ingress, IngressStatus};

use crate::controller::{guarded, IngressKubeClient};
use crate::Error;

/// Whether `next` differs from `previous` and needs writing
pub fn should_write(previous: Option<&IngressStatus>, next: Option<&IngressStatus>) -> bool {
    previous != next
}

/// Write `status` onto the live Ingress `namespace/name`.
///
/// The live object is re-read first: if it is gone, or already carries this
/// status, nothing is written. Otherwise only the status is copied onto the
/// live object and submitted with its resourceVersion, so a concurrent
/// writer surfaces as a retryable conflict.
///
/// Returns the stored Ingress, or `None` if it no longer exists.
pub async fn write_back(
    kube: &dyn IngressKubeClient,
    namespace: &str,
    name: &str,
    status: &IngressStatus,
    cancel: &CancellationToken,
) -> Result<Option<Ingress>, Error> {
    let Some(mut live) = guarded(cancel, "get_ingress", kube.get_ingress(namespace, name)).await?
    else {
        debug!("ingress deleted before status update");
        return Ok(None);
    };

    if live.status.as_ref() == Some(status) {
        debug!("live status already up to date");
        return Ok(Some(live));
    }

    live.status = Some(status.clone());
    let updated = guarded(
        cancel,
        "update_ingress_status",
        kube.update_ingress_status(&live),
    )
    .await?;
    Ok(Some(updated))
}
