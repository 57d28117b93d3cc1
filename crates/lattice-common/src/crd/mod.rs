//! Custom Resource Definitions used by the ingress controller
//!
//! - [`Ingress`]: the Knative networking Ingress (parent, desired state)
//! - [`HttpProxy`]: the Contour HTTPProxy (child, consumed by the data plane)

pub mod duration;
mod http_proxy;
mod ingress;
mod types;

pub use http_proxy::{
    HeaderValue, HeadersPolicy, HttpProxy, HttpProxySpec, RetryPolicy, Route, Service,
    TimeoutPolicy, VirtualHost,
};
pub use ingress::{
    HttpIngressPath, HttpIngressRuleValue, HttpRetry, Ingress, IngressBackendSplit, IngressRule,
    IngressSpec, IngressStatus, IngressVisibility, LoadBalancerIngressStatus, LoadBalancerStatus,
    CONDITION_LOAD_BALANCER_READY, CONDITION_NETWORK_CONFIGURED, CONDITION_READY,
};
pub use types::{find_condition, set_condition, Condition, ConditionStatus};
