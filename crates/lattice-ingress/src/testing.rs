//! Test fixtures and an in-memory Kubernetes store

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::core::{Selector, SelectorExt};
use kube::runtime::events::EventType;
use kube::ResourceExt;

use lattice_common::crd::{
    HttpIngressPath, HttpIngressRuleValue, HttpProxy, Ingress, IngressBackendSplit, IngressRule,
    IngressSpec, IngressVisibility,
};
use lattice_common::{EventPublisher, CONTOUR_INGRESS_CLASS, INGRESS_CLASS_ANNOTATION};

use crate::controller::IngressKubeClient;
use crate::Error;

// =========================================================================
// Fixtures
// =========================================================================

/// An Ingress in `default` with a uid, the Contour class and the given rules
pub(crate) fn ingress(name: &str, generation: i64, rules: Vec<IngressRule>) -> Ingress {
    let mut ingress = Ingress::new(name, IngressSpec { rules });
    ingress.metadata = ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some("default".to_string()),
        uid: Some(format!("uid-{}", name)),
        generation: Some(generation),
        annotations: Some(BTreeMap::from([(
            INGRESS_CLASS_ANNOTATION.to_string(),
            CONTOUR_INGRESS_CLASS.to_string(),
        )])),
        ..Default::default()
    };
    ingress
}

pub(crate) fn rule(
    hosts: &[&str],
    visibility: IngressVisibility,
    paths: Vec<HttpIngressPath>,
) -> IngressRule {
    IngressRule {
        hosts: hosts.iter().map(|h| h.to_string()).collect(),
        visibility,
        http: HttpIngressRuleValue { paths },
    }
}

pub(crate) fn path(splits: Vec<IngressBackendSplit>) -> HttpIngressPath {
    HttpIngressPath {
        splits,
        ..Default::default()
    }
}

pub(crate) fn split(service: &str, port: i32, percent: i32) -> IngressBackendSplit {
    IngressBackendSplit {
        service_namespace: "default".to_string(),
        service_name: service.to_string(),
        service_port: IntOrString::Int(port),
        percent,
        append_headers: BTreeMap::new(),
    }
}

/// A public rule routing `hosts` to a single revision
pub(crate) fn simple_rule(hosts: &[&str]) -> IngressRule {
    rule(
        hosts,
        IngressVisibility::ExternalIp,
        vec![path(vec![split("hello-00001", 80, 100)])],
    )
}

// =========================================================================
// In-memory store
// =========================================================================

/// Number of calls made per store operation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Calls {
    pub get: usize,
    pub list: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub status: usize,
}

impl Calls {
    /// Calls that change the store
    pub fn writes(&self) -> usize {
        self.create + self.update + self.delete + self.status
    }
}

#[derive(Default)]
struct FakeState {
    ingresses: BTreeMap<(String, String), Ingress>,
    proxies: BTreeMap<(String, String), HttpProxy>,
    calls: Calls,
    fail_create_at: Option<usize>,
    fail_status_updates: bool,
    next_version: u64,
}

impl FakeState {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }
}

/// In-memory IngressKubeClient with label selector matching, call counters
/// and failure injection
#[derive(Default)]
pub(crate) struct FakeKube {
    state: Mutex<FakeState>,
}

fn key_of<K: ResourceExt>(obj: &K) -> (String, String) {
    (obj.namespace().unwrap_or_default(), obj.name_any())
}

fn injected(op: &str) -> Error {
    Error::from(kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("injected {} failure", op),
        reason: "InternalError".to_string(),
        code: 500,
    }))
}

impl FakeKube {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ingress(self, ingress: Ingress) -> Self {
        self.put_ingress(ingress);
        self
    }

    /// Insert or replace an Ingress as if a user edited it
    pub fn put_ingress(&self, mut ingress: Ingress) {
        let mut state = self.state.lock().unwrap();
        ingress.metadata.resource_version = Some(state.bump());
        state.ingresses.insert(key_of(&ingress), ingress);
    }

    pub fn with_proxy(self, proxy: HttpProxy) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let mut proxy = proxy;
            proxy.metadata.resource_version = Some(state.bump());
            state.proxies.insert(key_of(&proxy), proxy);
        }
        self
    }

    /// Make the nth create call (1-based, counted from now on) fail
    pub fn fail_create_at(self, nth: usize) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.fail_create_at = Some(state.calls.create + nth);
        }
        self
    }

    pub fn fail_status_updates(self) -> Self {
        self.state.lock().unwrap().fail_status_updates = true;
        self
    }

    pub fn ingress(&self, namespace: &str, name: &str) -> Option<Ingress> {
        let state = self.state.lock().unwrap();
        state
            .ingresses
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// All proxies, ordered by namespace then name
    pub fn proxies(&self) -> Vec<HttpProxy> {
        self.state.lock().unwrap().proxies.values().cloned().collect()
    }

    pub fn proxy_fqdns(&self) -> Vec<String> {
        self.proxies()
            .iter()
            .filter_map(|p| p.fqdn().map(str::to_string))
            .collect()
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls
    }

    pub fn reset_calls(&self) {
        self.state.lock().unwrap().calls = Calls::default();
    }
}

fn matches(selector: &Selector, proxy: &HttpProxy) -> bool {
    selector.matches(proxy.metadata.labels.as_ref().unwrap_or(&BTreeMap::new()))
}

#[async_trait]
impl IngressKubeClient for FakeKube {
    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.get += 1;
        Ok(state
            .ingresses
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn list_proxies(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<HttpProxy>, Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.list += 1;
        Ok(state
            .proxies
            .iter()
            .filter(|((ns, _), proxy)| ns == namespace && matches(selector, proxy))
            .map(|(_, proxy)| proxy.clone())
            .collect())
    }

    async fn create_proxy(&self, proxy: &HttpProxy) -> Result<HttpProxy, Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.create += 1;
        if state.fail_create_at == Some(state.calls.create) {
            return Err(injected("create"));
        }
        let key = key_of(proxy);
        if state.proxies.contains_key(&key) {
            return Err(Error::from(kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: format!("httpproxies \"{}\" already exists", key.1),
                reason: "AlreadyExists".to_string(),
                code: 409,
            })));
        }
        let mut created = proxy.clone();
        created.metadata.uid = Some(format!("uid-{}", key.1));
        created.metadata.resource_version = Some(state.bump());
        state.proxies.insert(key, created.clone());
        Ok(created)
    }

    async fn update_proxy(&self, proxy: &HttpProxy) -> Result<HttpProxy, Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.update += 1;
        let key = key_of(proxy);
        if !state.proxies.contains_key(&key) {
            return Err(Error::from(kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: format!("httpproxies \"{}\" not found", key.1),
                reason: "NotFound".to_string(),
                code: 404,
            })));
        }
        let mut updated = proxy.clone();
        updated.metadata.resource_version = Some(state.bump());
        state.proxies.insert(key, updated.clone());
        Ok(updated)
    }

    async fn delete_proxies(&self, namespace: &str, selector: &Selector) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.delete += 1;
        state
            .proxies
            .retain(|(ns, _), proxy| !(ns == namespace && matches(selector, proxy)));
        Ok(())
    }

    async fn update_ingress_status(&self, ingress: &Ingress) -> Result<Ingress, Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.status += 1;
        if state.fail_status_updates {
            return Err(injected("status update"));
        }
        let key = key_of(ingress);
        let version = state.bump();
        let stored = state.ingresses.get_mut(&key).ok_or_else(|| {
            Error::from(kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: format!("ingresses \"{}\" not found", key.1),
                reason: "NotFound".to_string(),
                code: 404,
            }))
        })?;
        stored.status = ingress.status.clone();
        stored.metadata.resource_version = Some(version);
        Ok(stored.clone())
    }
}

// =========================================================================
// Event recording
// =========================================================================

/// A published event
#[derive(Clone, Debug)]
pub(crate) struct RecordedEvent {
    pub warning: bool,
    pub reason: String,
    pub note: Option<String>,
}

/// EventPublisher that keeps everything it is given
#[derive(Default)]
pub(crate) struct RecordingEvents {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEvents {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        _action: &str,
        note: Option<String>,
    ) {
        self.events.lock().unwrap().push(RecordedEvent {
            warning: matches!(type_, EventType::Warning),
            reason: reason.to_string(),
            note,
        });
    }
}
