//! Contour HTTPProxy Custom Resource Definition
//!
//! HTTPProxy is the child resource consumed by the Contour data plane. Only
//! the fields the ingress controller writes are modeled; anything else set
//! on a live object is dropped on update, which is what we want since the
//! controller owns the whole spec.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification of a Contour HTTPProxy
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "projectcontour.io",
    version = "v1",
    kind = "HTTPProxy",
    root = "HttpProxy",
    plural = "httpproxies",
    shortname = "proxy",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct HttpProxySpec {
    /// Virtual host served by this proxy
    #[serde(default, rename = "virtualhost", skip_serializing_if = "Option::is_none")]
    pub virtual_host: Option<VirtualHost>,

    /// Routes of the virtual host
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
}

/// A fully qualified virtual host
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHost {
    /// Fully qualified domain name
    pub fqdn: String,
}

/// A route to a weighted set of services
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Upstream services receiving traffic
    #[serde(default)]
    pub services: Vec<Service>,

    /// Timeouts applied to the route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_policy: Option<TimeoutPolicy>,

    /// Retries applied to the route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
}

/// An upstream service
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Kubernetes Service name
    pub name: String,

    /// Service port
    pub port: i32,

    /// Relative weight of this service
    #[serde(default)]
    pub weight: u32,

    /// Headers rewritten on requests sent to this service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_headers_policy: Option<HeadersPolicy>,
}

/// Request header rewrites
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HeadersPolicy {
    /// Headers to set, replacing any existing value
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set: Vec<HeaderValue>,
}

/// A single header name and value
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct HeaderValue {
    /// Header name
    pub name: String,
    /// Header value
    pub value: String,
}

/// Route timeouts
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutPolicy {
    /// Time to wait for a complete response
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub response: String,
}

/// Route retries
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Maximum number of retries
    #[serde(default)]
    pub count: u32,

    /// Timeout of each attempt
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub per_try_timeout: String,
}

impl HttpProxy {
    /// The virtual host fqdn, if set
    pub fn fqdn(&self) -> Option<&str> {
        self.spec.virtual_host.as_ref().map(|vh| vh.fqdn.as_str())
    }
}
