//! [`EndpointRegistry`] – (kind, name)-unique endpoint store.
//!
//! One registry per interface controller.  Entries keep their registration
//! order within each kind because teardown must run in exactly the reverse
//! order: a later endpoint may implicitly depend on an earlier one (e.g. a
//! service server publishing status through an earlier publisher).
//!
//! Registering under a live (kind, name) stops the previous endpoint before
//! the replacement is attached – never two live middleware resources under
//! the same name.

use rosim_middleware::{EndpointHandle, Ros2Client};
use rosim_types::EndpointKind;
use tracing::debug;

struct Entry {
    name: String,
    handle: EndpointHandle,
}

/// Ordered, per-kind store of live endpoint handles.
#[derive(Default)]
pub struct EndpointRegistry {
    publishers: Vec<Entry>,
    subscribers: Vec<Entry>,
    service_clients: Vec<Entry>,
    service_servers: Vec<Entry>,
    action_clients: Vec<Entry>,
    action_servers: Vec<Entry>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lane(&self, kind: EndpointKind) -> &Vec<Entry> {
        match kind {
            EndpointKind::Publisher => &self.publishers,
            EndpointKind::Subscriber => &self.subscribers,
            EndpointKind::ServiceClient => &self.service_clients,
            EndpointKind::ServiceServer => &self.service_servers,
            EndpointKind::ActionClient => &self.action_clients,
            EndpointKind::ActionServer => &self.action_servers,
        }
    }

    fn lane_mut(&mut self, kind: EndpointKind) -> &mut Vec<Entry> {
        match kind {
            EndpointKind::Publisher => &mut self.publishers,
            EndpointKind::Subscriber => &mut self.subscribers,
            EndpointKind::ServiceClient => &mut self.service_clients,
            EndpointKind::ServiceServer => &mut self.service_servers,
            EndpointKind::ActionClient => &mut self.action_clients,
            EndpointKind::ActionServer => &mut self.action_servers,
        }
    }

    /// Register `handle` under (kind, name).
    ///
    /// If the name is already live under that kind, the prior endpoint is
    /// stopped first and the replacement takes its place at the end of the
    /// registration order.
    pub fn register(
        &mut self,
        client: &dyn Ros2Client,
        kind: EndpointKind,
        name: impl Into<String>,
        handle: EndpointHandle,
    ) {
        let name = name.into();
        self.unregister(client, kind, &name);
        debug!(kind = %kind, name = %name, "endpoint registered");
        self.lane_mut(kind).push(Entry { name, handle });
    }

    /// Stop and remove the endpoint under (kind, name).  Missing names are a
    /// no-op.
    pub fn unregister(&mut self, client: &dyn Ros2Client, kind: EndpointKind, name: &str) {
        let lane = self.lane_mut(kind);
        if let Some(pos) = lane.iter().position(|e| e.name == name) {
            let entry = lane.remove(pos);
            debug!(kind = %kind, name = %name, "endpoint unregistered");
            client.stop_endpoint(&entry.handle);
        }
    }

    /// Look up a live endpoint.
    pub fn get(&self, kind: EndpointKind, name: &str) -> Option<&EndpointHandle> {
        self.lane(kind)
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.handle)
    }

    /// All live endpoints of `kind`, in registration order.
    pub fn all(&self, kind: EndpointKind) -> Vec<&EndpointHandle> {
        self.lane(kind).iter().map(|e| &e.handle).collect()
    }

    /// Registered names of `kind`, in registration order.
    pub fn names(&self, kind: EndpointKind) -> Vec<&str> {
        self.lane(kind).iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self, kind: EndpointKind) -> usize {
        self.lane(kind).len()
    }

    pub fn total_len(&self) -> usize {
        EndpointKind::ALL.iter().map(|k| self.lane(*k).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    /// Stop and remove every endpoint of `kind`, newest first.
    pub fn drain(&mut self, client: &dyn Ros2Client, kind: EndpointKind) {
        let lane = self.lane_mut(kind);
        while let Some(entry) = lane.pop() {
            debug!(kind = %kind, name = %entry.name, "draining endpoint");
            client.stop_endpoint(&entry.handle);
        }
    }
}
