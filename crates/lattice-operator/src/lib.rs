//! Lattice ingress operator: configuration and controller wiring

#![deny(missing_docs)]

/// Command-line and environment configuration
pub mod config;
/// Builds the ingress controller future
pub mod controller_runner;
