//! HTTPProxy compiler
//!
//! Turns an Ingress into the full set of HTTPProxies it should own: one
//! proxy per `(rule, host)` pair. Compilation is pure, so the same Ingress
//! always compiles to the same proxies, and all-or-nothing: one invalid rule
//! rejects the whole Ingress.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Resource, ResourceExt};

use lattice_common::crd::duration::format_duration;
use lattice_common::crd::{
    HeaderValue, HeadersPolicy, HttpIngressPath, HttpProxy, HttpProxySpec, HttpRetry,
    IngressBackendSplit, IngressRule, IngressVisibility, RetryPolicy, Route, Service,
    TimeoutPolicy, VirtualHost,
};
use lattice_common::kube_utils::{child_name, proxy_labels};
use lattice_common::{PROXY_CLASS_ANNOTATION, PROXY_CLASS_INTERNAL, PROXY_CLASS_PUBLIC};

use crate::crd::Ingress;
use crate::Error;

/// Compiles Ingresses into HTTPProxies
pub struct ProxyCompiler;

impl ProxyCompiler {
    /// Compile the HTTPProxies an Ingress should own, in rule then host order.
    ///
    /// Every proxy carries the parent/generation/fqdn labels, the Contour
    /// class annotation for its rule's visibility, and a controller owner
    /// reference back to the Ingress.
    pub fn compile(ingress: &Ingress) -> Result<Vec<HttpProxy>, Error> {
        let name = ingress.name_any();
        let namespace = ingress.namespace().ok_or_else(|| {
            Error::validation_for_field(&name, "metadata.namespace", "ingress has no namespace")
        })?;
        let owner = ingress.controller_owner_ref(&()).ok_or_else(|| {
            Error::validation_for_field(
                &name,
                "metadata.uid",
                "ingress has no uid, cannot own HTTPProxies",
            )
        })?;
        let generation = ingress.generation();

        let mut proxies = Vec::new();
        for (index, rule) in ingress.spec.rules.iter().enumerate() {
            let route = compile_route(&name, index, rule)?;
            let class = proxy_class(rule.visibility);

            for host in &rule.hosts {
                let spec = HttpProxySpec {
                    virtual_host: Some(VirtualHost { fqdn: host.clone() }),
                    routes: vec![route.clone()],
                };
                let mut proxy = HttpProxy::new(&child_name(&name, host), spec);
                proxy.metadata.namespace = Some(namespace.clone());
                proxy.metadata.labels = Some(proxy_labels(&name, generation, host));
                proxy.metadata.annotations = Some(BTreeMap::from([(
                    PROXY_CLASS_ANNOTATION.to_string(),
                    class.to_string(),
                )]));
                proxy.metadata.owner_references = Some(vec![owner.clone()]);
                proxies.push(proxy);
            }
        }

        Ok(proxies)
    }
}

/// Contour ingress class serving a visibility
fn proxy_class(visibility: IngressVisibility) -> &'static str {
    match visibility {
        IngressVisibility::ExternalIp => PROXY_CLASS_PUBLIC,
        IngressVisibility::ClusterLocal => PROXY_CLASS_INTERNAL,
    }
}

fn compile_route(ingress: &str, index: usize, rule: &IngressRule) -> Result<Route, Error> {
    let path: &HttpIngressPath = match rule.http.paths.as_slice() {
        [path] => path,
        paths => return Err(Error::unsupported_path_count(ingress, index, paths.len())),
    };

    let services = path
        .splits
        .iter()
        .enumerate()
        .map(|(split_index, split)| compile_service(ingress, index, split_index, split))
        .collect::<Result<Vec<_>, _>>()?;

    let retry_policy = path
        .retries
        .as_ref()
        .map(|retries| compile_retry(ingress, index, retries))
        .transpose()?;

    Ok(Route {
        services,
        timeout_policy: path.timeout.map(|timeout| TimeoutPolicy {
            response: format_duration(timeout),
        }),
        retry_policy,
    })
}

fn compile_retry(ingress: &str, index: usize, retries: &HttpRetry) -> Result<RetryPolicy, Error> {
    let count = u32::try_from(retries.attempts).map_err(|_| {
        Error::validation_for_field(
            ingress,
            format!("spec.rules[{}].http.paths[0].retries.attempts", index),
            format!("retry attempts must not be negative, got {}", retries.attempts),
        )
    })?;

    Ok(RetryPolicy {
        count,
        per_try_timeout: retries
            .per_try_timeout
            .map(format_duration)
            .unwrap_or_default(),
    })
}

fn compile_service(
    ingress: &str,
    rule: usize,
    index: usize,
    split: &IngressBackendSplit,
) -> Result<Service, Error> {
    let field = |name: &str| format!("spec.rules[{}].http.paths[0].splits[{}].{}", rule, index, name);

    let port = match &split.service_port {
        IntOrString::Int(port) => *port,
        IntOrString::String(raw) => raw.parse::<i32>().map_err(|_| {
            Error::validation_for_field(
                ingress,
                field("servicePort"),
                format!("named port '{}' is not supported", raw),
            )
        })?,
    };

    let weight = u32::try_from(split.percent).map_err(|_| {
        Error::validation_for_field(
            ingress,
            field("percent"),
            format!("percent must not be negative, got {}", split.percent),
        )
    })?;

    // BTreeMap iteration keeps the header order stable
    let request_headers_policy = (!split.append_headers.is_empty()).then(|| HeadersPolicy {
        set: split
            .append_headers
            .iter()
            .map(|(name, value)| HeaderValue {
                name: name.clone(),
                value: value.clone(),
            })
            .collect(),
    });

    Ok(Service {
        name: split.service_name.clone(),
        port,
        weight,
        request_headers_policy,
    })
}
