//! Knative networking Ingress Custom Resource Definition
//!
//! The Ingress is the parent resource: it declares which hosts route to
//! which weighted set of backend services, and reports through its status
//! whether the network has been programmed and where the load balancers are.
//!
//! Status conditions form a small dependency set: `Ready` is derived from
//! `NetworkConfigured` and `LoadBalancerReady`.

use std::collections::BTreeMap;
use std::time::Duration;

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{find_condition, set_condition, Condition, ConditionStatus};

/// Condition type summarizing all dependent conditions
pub const CONDITION_READY: &str = "Ready";
/// Condition type set once the HTTPProxies have been programmed
pub const CONDITION_NETWORK_CONFIGURED: &str = "NetworkConfigured";
/// Condition type set once load balancer addresses are known
pub const CONDITION_LOAD_BALANCER_READY: &str = "LoadBalancerReady";

const DEPENDENT_CONDITIONS: [&str; 2] = [CONDITION_LOAD_BALANCER_READY, CONDITION_NETWORK_CONFIGURED];

/// Specification of a Knative Ingress
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "networking.internal.knative.dev",
    version = "v1alpha1",
    kind = "Ingress",
    plural = "ingresses",
    shortname = "kingress",
    namespaced,
    status = "IngressStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    /// Routing rules, evaluated in order
    #[serde(default)]
    pub rules: Vec<IngressRule>,
}

/// Who may reach the hosts of a rule
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum IngressVisibility {
    /// Reachable from outside the cluster
    #[default]
    #[serde(rename = "ExternalIP")]
    ExternalIp,
    /// Reachable only from inside the cluster
    ClusterLocal,
}

/// A set of hosts sharing one HTTP routing configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressRule {
    /// Hostnames this rule answers for
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Whether the hosts are public or cluster-local
    #[serde(default)]
    pub visibility: IngressVisibility,

    /// HTTP routing for the hosts
    #[serde(default)]
    pub http: HttpIngressRuleValue,
}

/// HTTP paths of a rule
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpIngressRuleValue {
    /// Path routes; exactly one is supported
    #[serde(default)]
    pub paths: Vec<HttpIngressPath>,
}

/// A single HTTP route: optional timeout and retries plus weighted backends
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpIngressPath {
    /// Path prefix to match (defaults to all paths)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Weighted backends receiving the traffic
    #[serde(default)]
    pub splits: Vec<IngressBackendSplit>,

    /// Response timeout for the route
    #[serde(default, with = "super::duration::option", skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub timeout: Option<Duration>,

    /// Retry policy for the route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<HttpRetry>,
}

/// A weighted backend service
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressBackendSplit {
    /// Namespace of the backend service
    #[serde(default)]
    pub service_namespace: String,

    /// Name of the backend service
    pub service_name: String,

    /// Port of the backend service
    pub service_port: IntOrString,

    /// Share of traffic routed to this backend
    #[serde(default)]
    pub percent: i32,

    /// Headers added to requests sent to this backend
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub append_headers: BTreeMap<String, String>,
}

/// Retry policy of a route
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpRetry {
    /// Number of retry attempts
    pub attempts: i32,

    /// Timeout of each attempt
    #[serde(default, with = "super::duration::option", skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub per_try_timeout: Option<Duration>,
}

/// Observed state of a Knative Ingress
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngressStatus {
    /// Generation last fully processed by the controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Status conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Load balancers serving all traffic (deprecated in favor of public/private)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<LoadBalancerStatus>,

    /// Load balancers serving public traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_load_balancer: Option<LoadBalancerStatus>,

    /// Load balancers serving cluster-local traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_load_balancer: Option<LoadBalancerStatus>,
}

/// A set of load balancer addresses
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerStatus {
    /// Addresses through which the ingress is reachable
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress: Vec<LoadBalancerIngressStatus>,
}

/// A single load balancer address
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerIngressStatus {
    /// IP address of the load balancer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Externally resolvable domain of the load balancer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// In-cluster domain of the load balancer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_internal: Option<String>,

    /// Whether the load balancer is only reachable from the mesh
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub mesh_only: bool,
}

impl LoadBalancerIngressStatus {
    /// An address reachable through an in-cluster domain
    pub fn internal(domain: impl Into<String>) -> Self {
        Self {
            domain_internal: Some(domain.into()),
            ..Default::default()
        }
    }

    /// An address reachable through an external domain
    pub fn external(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            ..Default::default()
        }
    }
}

impl IngressStatus {
    /// Set every condition that is not yet present to Unknown.
    ///
    /// Conditions already reported keep their state, so initializing a
    /// converged status is a no-op.
    pub fn initialize_conditions(&mut self) {
        for type_ in DEPENDENT_CONDITIONS.iter().chain([CONDITION_READY].iter()) {
            if find_condition(&self.conditions, type_).is_none() {
                set_condition(
                    &mut self.conditions,
                    Condition::new(*type_, ConditionStatus::Unknown, "", ""),
                );
            }
        }
        self.recompute_ready();
    }

    /// Mark the HTTPProxies as programmed
    pub fn mark_network_configured(&mut self) {
        set_condition(
            &mut self.conditions,
            Condition::new(CONDITION_NETWORK_CONFIGURED, ConditionStatus::True, "", ""),
        );
        self.recompute_ready();
    }

    /// Mark programming of the HTTPProxies as failed
    pub fn mark_network_failed(&mut self, reason: &str, message: &str) {
        set_condition(
            &mut self.conditions,
            Condition::new(
                CONDITION_NETWORK_CONFIGURED,
                ConditionStatus::False,
                reason,
                message,
            ),
        );
        self.recompute_ready();
    }

    /// Record the load balancer addresses and mark them ready
    pub fn mark_load_balancer_ready(
        &mut self,
        load_balancer: Vec<LoadBalancerIngressStatus>,
        public: Vec<LoadBalancerIngressStatus>,
        private: Vec<LoadBalancerIngressStatus>,
    ) {
        self.load_balancer = Some(LoadBalancerStatus {
            ingress: load_balancer,
        });
        self.public_load_balancer = Some(LoadBalancerStatus { ingress: public });
        self.private_load_balancer = Some(LoadBalancerStatus { ingress: private });
        set_condition(
            &mut self.conditions,
            Condition::new(CONDITION_LOAD_BALANCER_READY, ConditionStatus::True, "", ""),
        );
        self.recompute_ready();
    }

    /// Look up a condition by type
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        find_condition(&self.conditions, type_)
    }

    /// True when the Ready condition is True
    pub fn is_ready(&self) -> bool {
        self.condition(CONDITION_READY)
            .map(|c| c.status == ConditionStatus::True)
            .unwrap_or(false)
    }

    /// Derive Ready from the dependent conditions.
    ///
    /// Any False dependent makes Ready False with that dependent's reason;
    /// all True makes Ready True; anything else is Unknown.
    fn recompute_ready(&mut self) {
        let dependents: Vec<Option<&Condition>> = DEPENDENT_CONDITIONS
            .iter()
            .map(|t| find_condition(&self.conditions, t))
            .collect();

        let ready = if let Some(failed) = dependents
            .iter()
            .flatten()
            .find(|c| c.status == ConditionStatus::False)
        {
            Condition::new(
                CONDITION_READY,
                ConditionStatus::False,
                failed.reason.clone(),
                failed.message.clone(),
            )
        } else if dependents
            .iter()
            .all(|c| c.map(|c| c.status == ConditionStatus::True).unwrap_or(false))
        {
            Condition::new(CONDITION_READY, ConditionStatus::True, "", "")
        } else {
            Condition::new(CONDITION_READY, ConditionStatus::Unknown, "", "")
        };
        set_condition(&mut self.conditions, ready);
    }
}

impl Ingress {
    /// The ingress class annotation, if set
    pub fn ingress_class(&self) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(crate::INGRESS_CLASS_ANNOTATION))
            .map(String::as_str)
    }

    /// True once deletion of this ingress has started
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// The current generation, zero if the API server has not set one
    pub fn generation(&self) -> i64 {
        self.metadata.generation.unwrap_or_default()
    }
}
