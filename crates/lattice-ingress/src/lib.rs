//! Ingress reconciliation for Lattice
//!
//! This crate turns Knative Ingresses into Contour HTTPProxies:
//!
//! - **Compiler**: synthesizes the desired HTTPProxies for an Ingress (pure)
//! - **Sync**: creates/updates those proxies and prunes ones from older generations
//! - **Status**: writes the Ingress status back only when it changed
//! - **Controller**: per-key reconcile entry point wiring the above together

pub mod compiler;
pub mod controller;
pub mod status;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub(crate) use lattice_common::{crd, Error};
