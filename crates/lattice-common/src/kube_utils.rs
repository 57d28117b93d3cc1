//! Kubernetes helpers shared by the ingress controller
//!
//! - Work queue key parsing (`namespace/name`)
//! - Deterministic child resource naming
//! - Label selectors used to discover and garbage-collect generated HTTPProxies

use std::collections::BTreeMap;

use kube::core::{Expression, Selector};
use sha2::{Digest, Sha256};

use crate::{Error, LABEL_FQDN, LABEL_GENERATION, LABEL_PARENT};

/// Longest name we generate for a child resource (DNS-1123 label length)
pub const MAX_CHILD_NAME_LEN: usize = 63;

/// Length of the hash suffix used when a child name must be shortened
const HASH_SUFFIX_LEN: usize = 16;

/// Split a work queue key of the form `namespace/name` (or bare `name`).
///
/// A bare name yields an empty namespace, mirroring cluster-scoped keys.
/// Keys with more than one `/` or an empty name are rejected.
pub fn split_meta_namespace_key(key: &str) -> Result<(String, String), Error> {
    let parts: Vec<&str> = key.split('/').collect();
    match parts.as_slice() {
        [name] if !name.is_empty() => Ok((String::new(), name.to_string())),
        [namespace, name] if !name.is_empty() => Ok((namespace.to_string(), name.to_string())),
        _ => Err(Error::invalid_key(key)),
    }
}

/// Compute a deterministic hash of the input string, returning a 16-char hex digest.
///
/// Uses truncated SHA-256 so the value is stable across toolchains and can be
/// persisted in resource names.
pub fn deterministic_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..HASH_SUFFIX_LEN / 2])
}

/// Derive the name of a child resource from its parent and a suffix (the host).
///
/// The name is a readable `{parent}-{suffix}` prefix, truncated to fit
/// [`MAX_CHILD_NAME_LEN`], followed by a hash of the `(parent, suffix)` pair.
/// The pair is hashed with a `/` separator, which neither part can contain,
/// so `x` + `y-z.com` and `x-y` + `z.com` get different names.
pub fn child_name(parent: &str, suffix: &str) -> String {
    let hash = deterministic_hash(&format!("{}/{}", parent, suffix));
    let keep = MAX_CHILD_NAME_LEN - HASH_SUFFIX_LEN - 1;
    let prefix: String = format!("{}-{}", parent, suffix)
        .to_ascii_lowercase()
        .chars()
        .take(keep)
        .collect();
    let prefix = prefix.trim_end_matches(['-', '.']);
    format!("{}-{}", prefix, hash)
}

/// Labels identifying a generated HTTPProxy
pub fn proxy_labels(parent: &str, generation: i64, fqdn: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_PARENT.to_string(), parent.to_string()),
        (LABEL_GENERATION.to_string(), generation.to_string()),
        (LABEL_FQDN.to_string(), fqdn.to_string()),
    ])
}

/// Selector for the HTTPProxy owned by `parent` for `fqdn`, at any generation
pub fn proxy_selector(parent: &str, fqdn: &str) -> Selector {
    Selector::from_iter([
        Expression::Equal(LABEL_PARENT.to_string(), parent.to_string()),
        Expression::Equal(LABEL_FQDN.to_string(), fqdn.to_string()),
    ])
}

/// Selector for HTTPProxies of `parent` synthesized from any other generation
pub fn stale_generation_selector(parent: &str, generation: i64) -> Selector {
    Selector::from_iter([
        Expression::Equal(LABEL_PARENT.to_string(), parent.to_string()),
        Expression::NotEqual(LABEL_GENERATION.to_string(), generation.to_string()),
    ])
}
