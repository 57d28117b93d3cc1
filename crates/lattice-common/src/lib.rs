//! Common types for the Lattice ingress controller: CRDs, errors, events, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod events;
pub mod kube_utils;
pub mod telemetry;

pub use error::Error;
pub use events::{EventPublisher, KubeEventPublisher, NoopEventPublisher};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Annotation selecting which ingress implementation owns a Knative Ingress
pub const INGRESS_CLASS_ANNOTATION: &str = "networking.knative.dev/ingress.class";

/// Ingress class value handled by this controller
pub const CONTOUR_INGRESS_CLASS: &str = "contour.ingress.networking.knative.dev";

/// Annotation carrying the Contour class on generated HTTPProxy resources
pub const PROXY_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

/// Contour class for publicly reachable proxies
pub const PROXY_CLASS_PUBLIC: &str = "contour";

/// Contour class for cluster-local proxies
pub const PROXY_CLASS_INTERNAL: &str = "contour-internal";

/// Label naming the parent Ingress of a generated HTTPProxy
pub const LABEL_PARENT: &str = "ingress.parent";

/// Label carrying the parent generation a HTTPProxy was synthesized from
pub const LABEL_GENERATION: &str = "ingress.generation";

/// Label carrying the virtual host of a HTTPProxy
pub const LABEL_FQDN: &str = "ingress.fqdn";

/// Default in-cluster domain of the Envoy service fronting cluster-local traffic
pub const DEFAULT_PRIVATE_LB_DOMAIN: &str = "envoy-internal.projectcontour.svc.cluster.local";
