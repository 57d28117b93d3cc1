//! Warning events attached to Ingresses.
//!
//! Publishing never fails from the caller's point of view; a rejected event
//! is logged and the reconcile carries on.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Sink for Kubernetes events about an object
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Record `reason`/`action` (and an optional note) against `regarding`
    async fn publish(
        &self,
        regarding: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Publishes through the API server with a `kube` Recorder
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// `controller` is reported as the event's reportingComponent
    pub fn new(client: Client, controller: &str) -> Self {
        let reporter = Reporter {
            controller: controller.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        regarding: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, regarding).await {
            warn!(reason, action, error = %e, "dropping ingress event");
        }
    }
}

/// Discards every event
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _regarding: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Event reasons (`kubectl get events` REASON column)
pub mod reasons {
    /// Compiling or syncing the HTTPProxies of an Ingress failed
    pub const INTERNAL_ERROR: &str = "InternalError";
    /// The Ingress status could not be written
    pub const UPDATE_FAILED: &str = "UpdateFailed";
}

/// Event actions
pub mod actions {
    /// Compile and sync
    pub const RECONCILE: &str = "Reconcile";
    /// Status write-back
    pub const UPDATE_STATUS: &str = "UpdateStatus";
}
