//! Operator configuration
//!
//! Every flag can also be set through its `LATTICE_*` environment variable,
//! which is how the in-cluster Deployment configures the operator.

use std::time::Duration;

use clap::Args;

use lattice_common::crd::LoadBalancerIngressStatus;
use lattice_common::telemetry::LogFormat;
use lattice_common::{CONTOUR_INGRESS_CLASS, DEFAULT_PRIVATE_LB_DOMAIN};
use lattice_ingress::controller::IngressSettings;

/// Settings of the ingress controller process
#[derive(Args, Debug, Clone)]
pub struct OperatorConfig {
    /// Ingress class to manage; Ingresses of any other class are ignored
    #[arg(long, env = "LATTICE_INGRESS_CLASS", default_value = CONTOUR_INGRESS_CLASS)]
    pub ingress_class: String,

    /// Only watch Ingresses in this namespace (default: all namespaces)
    #[arg(long, env = "LATTICE_WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// In-cluster domain reported as the private load balancer
    #[arg(long, env = "LATTICE_PRIVATE_LB_DOMAIN", default_value = DEFAULT_PRIVATE_LB_DOMAIN)]
    pub private_lb_domain: String,

    /// External domain reported as the public load balancer
    #[arg(long, env = "LATTICE_PUBLIC_LB_DOMAIN")]
    pub public_lb_domain: Option<String>,

    /// Seconds between periodic reconciles of a healthy Ingress
    #[arg(
        long,
        env = "LATTICE_RESYNC_SECS",
        default_value_t = 600,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub resync_secs: u64,

    /// Log output format (json or plain)
    #[arg(long, env = "LATTICE_LOG_FORMAT", default_value = "json")]
    pub log_format: LogFormat,
}

impl OperatorConfig {
    /// Controller settings derived from this configuration
    pub fn ingress_settings(&self) -> IngressSettings {
        IngressSettings {
            ingress_class: self.ingress_class.clone(),
            public_load_balancers: self
                .public_lb_domain
                .iter()
                .map(LoadBalancerIngressStatus::external)
                .collect(),
            private_load_balancers: vec![LoadBalancerIngressStatus::internal(
                &self.private_lb_domain,
            )],
            resync_period: Duration::from_secs(self.resync_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        config: OperatorConfig,
    }

    fn parse(args: &[&str]) -> Result<OperatorConfig, clap::Error> {
        TestCli::try_parse_from(std::iter::once("lattice-operator").chain(args.iter().copied()))
            .map(|cli| cli.config)
    }

    #[test]
    fn defaults_match_contour() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.ingress_class, CONTOUR_INGRESS_CLASS);
        assert_eq!(config.namespace, None);
        assert_eq!(config.resync_secs, 600);
        assert_eq!(config.log_format, LogFormat::Json);

        let settings = config.ingress_settings();
        assert!(settings.public_load_balancers.is_empty());
        assert_eq!(
            settings.private_load_balancers,
            vec![LoadBalancerIngressStatus::internal(DEFAULT_PRIVATE_LB_DOMAIN)]
        );
        assert_eq!(settings.resync_period, Duration::from_secs(600));
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--ingress-class",
            "custom.ingress.networking.knative.dev",
            "--namespace",
            "serving",
            "--public-lb-domain",
            "envoy.example.com",
            "--resync-secs",
            "30",
            "--log-format",
            "plain",
        ])
        .unwrap();

        assert_eq!(config.namespace.as_deref(), Some("serving"));
        assert_eq!(config.log_format, LogFormat::Plain);

        let settings = config.ingress_settings();
        assert_eq!(settings.ingress_class, "custom.ingress.networking.knative.dev");
        assert_eq!(
            settings.public_load_balancers,
            vec![LoadBalancerIngressStatus::external("envoy.example.com")]
        );
        assert_eq!(settings.resync_period, Duration::from_secs(30));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(parse(&["--resync-secs", "0"]).is_err());
        assert!(parse(&["--log-format", "xml"]).is_err());
    }
}
