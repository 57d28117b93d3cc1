//! Error types for the Lattice ingress controller
//!
//! Errors are structured with fields to aid debugging in production.
//! Each variant carries the ingress, namespace, or host it concerns so a
//! warning event on the parent object is self-explanatory.

use thiserror::Error;

/// Main error type for Lattice ingress operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Validation error for an Ingress spec
    #[error("validation error for {ingress}: {message}")]
    Validation {
        /// Name of the ingress with invalid configuration
        ingress: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.rules[0].http.paths")
        field: Option<String>,
    },

    /// A rule carries a number of HTTP paths other than exactly one
    #[error("ingress {ingress}: rule {rule} has {paths} HTTP paths, exactly one is supported")]
    UnsupportedPathCount {
        /// Name of the ingress
        ingress: String,
        /// Index of the offending rule
        rule: usize,
        /// Number of paths found on the rule
        paths: usize,
    },

    /// More than one HTTPProxy claims the same (ingress, host) pair
    #[error("found {count} HTTPProxies in {namespace} for ingress {ingress} and host {fqdn}")]
    DuplicateProxies {
        /// Namespace of the ingress
        namespace: String,
        /// Name of the ingress
        ingress: String,
        /// The virtual host claimed more than once
        fqdn: String,
        /// How many proxies matched
        count: usize,
    },

    /// Work queue key could not be split into namespace and name
    #[error("invalid resource key: {key}")]
    InvalidKey {
        /// The offending key
        key: String,
    },

    /// The caller cancelled the operation before it completed
    #[error("cancelled [{context}]")]
    Cancelled {
        /// Operation that was interrupted (e.g., "create_proxy")
        context: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "reconciler", "controller")
        context: String,
    },
}

impl Error {
    /// Create a validation error with ingress context and field path
    pub fn validation_for_field(
        ingress: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            ingress: ingress.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create an unsupported path count error for a rule
    pub fn unsupported_path_count(ingress: impl Into<String>, rule: usize, paths: usize) -> Self {
        Self::UnsupportedPathCount {
            ingress: ingress.into(),
            rule,
            paths,
        }
    }

    /// Create a duplicate proxies error
    pub fn duplicate_proxies(
        namespace: impl Into<String>,
        ingress: impl Into<String>,
        fqdn: impl Into<String>,
        count: usize,
    ) -> Self {
        Self::DuplicateProxies {
            namespace: namespace.into(),
            ingress: ingress.into(),
            fqdn: fqdn.into(),
            count,
        }
    }

    /// Create an invalid key error
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey { key: key.into() }
    }

    /// Create a cancellation error for the given operation
    pub fn cancelled(context: impl Into<String>) -> Self {
        Self::Cancelled {
            context: context.into(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Spec problems (validation, unsupported path counts, malformed keys) are
    /// not retryable: nothing changes until the Ingress is edited, and an edit
    /// triggers a fresh reconcile anyway. Kubernetes errors are retried unless
    /// the API server rejected the request itself; conflicts (409) and
    /// throttling (429) are retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if matches!(ae.code, 400 | 401 | 403 | 422)
            ),
            Error::Validation { .. } => false,
            Error::UnsupportedPathCount { .. } => false,
            Error::DuplicateProxies { .. } => true,
            Error::InvalidKey { .. } => false,
            Error::Cancelled { .. } => true,
            Error::Internal { .. } => true,
        }
    }

}
