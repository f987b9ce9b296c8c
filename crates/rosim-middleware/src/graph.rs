//! [`SimGraph`] – in-process ROS 2 discovery graph.
//!
//! Implements [`Ros2Client`] without any DDS transport: nodes and endpoints
//! are records in a shared table, and every create/destroy publishes a
//! [`GraphEvent`] on a [`tokio::sync::broadcast`] channel – the same
//! observable effect a real middleware produces on its discovery graph.
//!
//! Messages published to a topic are routed to the inboxes of matching
//! subscriber endpoints; the owning side picks its inbox up once via
//! [`SimGraph::take_inbox`] and drains it on its own tick.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rosim_types::{EndpointKind, GraphEvent, GraphEventPayload, QosProfile, RosimError};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;
use uuid::Uuid;

use crate::client::{EndpointHandle, NodeHandle, Ros2Client};
use crate::inbox::{SubscriptionInbox, TopicMessage};

/// Default discovery-event channel capacity.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Poll interval for [`SimGraph::service_available_within`].
const SERVICE_POLL_INTERVAL: Duration = Duration::from_millis(10);

struct EndpointRecord {
    handle: EndpointHandle,
    /// Fully-qualified topic/service/action name.
    resolved_name: String,
    /// Delivery queue, subscribers only.
    sender: Option<mpsc::UnboundedSender<TopicMessage>>,
}

#[derive(Default)]
struct GraphState {
    nodes: HashMap<Uuid, NodeHandle>,
    endpoints: HashMap<Uuid, EndpointRecord>,
    /// Inboxes created for subscriber endpoints, awaiting pickup.
    pending_inboxes: HashMap<Uuid, SubscriptionInbox>,
    /// Endpoint names whose next creation is forced to fail.
    injected_faults: HashSet<String>,
}

/// In-process middleware graph.  Clone-free: share it behind an `Arc`.
pub struct SimGraph {
    state: Mutex<GraphState>,
    events: broadcast::Sender<GraphEvent>,
}

impl SimGraph {
    /// Create a graph whose discovery-event channel buffers `capacity`
    /// events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            state: Mutex::new(GraphState::default()),
            events,
        }
    }

    fn state(&self) -> MutexGuard<'_, GraphState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, payload: GraphEventPayload) {
        // No discovery listeners is a normal condition.
        let _ = self.events.send(GraphEvent::now(payload));
    }

    /// Subscribe to discovery-graph events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<GraphEvent> {
        self.events.subscribe()
    }

    /// Force the next `create_endpoint` call for `name` to fail.
    ///
    /// Test facility for exercising the partial-initialization path.
    pub fn inject_endpoint_failure(&self, name: impl Into<String>) {
        self.state().injected_faults.insert(name.into());
    }

    /// Resolve an endpoint name against a node: absolute names pass through,
    /// relative names land in the node's namespace.
    pub fn resolve_name(node: &NodeHandle, name: &str) -> String {
        if let Some(stripped) = name.strip_prefix('/') {
            format!("/{stripped}")
        } else {
            let ns = node.namespace.trim_matches('/');
            if ns.is_empty() {
                format!("/{name}")
            } else {
                format!("/{ns}/{name}")
            }
        }
    }

    /// Deliver `payload` to every subscriber of `topic` (fully qualified).
    ///
    /// Returns the number of inboxes the message was queued into.
    pub fn publish(&self, topic: &str, payload: serde_json::Value) -> usize {
        let state = self.state();
        let mut delivered = 0;
        for record in state.endpoints.values() {
            if record.handle.kind != EndpointKind::Subscriber || record.resolved_name != topic {
                continue;
            }
            if let Some(sender) = &record.sender {
                let msg = TopicMessage {
                    topic: topic.to_string(),
                    payload: payload.clone(),
                    received_at: chrono::Utc::now(),
                };
                if sender.send(msg).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Pick up the delivery inbox of a subscriber endpoint.
    ///
    /// Each inbox can be taken exactly once; returns `None` for non-subscriber
    /// endpoints or when the inbox was already taken.
    pub fn take_inbox(&self, endpoint: &EndpointHandle) -> Option<SubscriptionInbox> {
        self.state().pending_inboxes.remove(&endpoint.id)
    }

    /// Whether a node with the given fully-qualified name is on the graph.
    pub fn node_exists(&self, fqn: &str) -> bool {
        self.state().nodes.values().any(|n| n.fqn() == fqn)
    }

    pub fn node_count(&self) -> usize {
        self.state().nodes.len()
    }

    pub fn endpoint_count(&self) -> usize {
        self.state().endpoints.len()
    }

    /// Resolved names of all live endpoints of `kind`, unordered.
    pub fn endpoint_names(&self, kind: EndpointKind) -> Vec<String> {
        self.state()
            .endpoints
            .values()
            .filter(|r| r.handle.kind == kind)
            .map(|r| r.resolved_name.clone())
            .collect()
    }

    /// Whether a service server is live under the given fully-qualified name.
    pub fn service_available(&self, service_fqn: &str) -> bool {
        self.state()
            .endpoints
            .values()
            .any(|r| r.handle.kind == EndpointKind::ServiceServer && r.resolved_name == service_fqn)
    }

    /// Poll until a service server appears or `timeout` elapses.
    ///
    /// Cancellable and non-blocking: the caller can drop the future at any
    /// point (e.g. when the owning entity is un-possessed mid-wait).
    pub async fn service_available_within(&self, service_fqn: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.service_available(service_fqn) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(SERVICE_POLL_INTERVAL).await;
        }
    }
}

impl Default for SimGraph {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl Ros2Client for SimGraph {
    fn create_node(&self, name: &str, namespace: &str) -> Result<NodeHandle, RosimError> {
        let handle = NodeHandle {
            id: Uuid::new_v4(),
            name: name.to_string(),
            namespace: namespace.trim_matches('/').to_string(),
        };
        let fqn = handle.fqn();
        {
            let mut state = self.state();
            if state.nodes.values().any(|n| n.fqn() == fqn) {
                return Err(RosimError::NodeCreation(format!(
                    "node '{fqn}' already exists on the graph"
                )));
            }
            state.nodes.insert(handle.id, handle.clone());
        }
        debug!(node = %fqn, "node created");
        self.emit(GraphEventPayload::NodeCreated { fqn });
        Ok(handle)
    }

    fn destroy_node(&self, node: &NodeHandle) {
        let (removed, orphans) = {
            let mut state = self.state();
            let removed = state.nodes.remove(&node.id);
            // Anything still bound to the node goes down with it.
            let orphan_ids: Vec<Uuid> = state
                .endpoints
                .values()
                .filter(|r| r.handle.node_id == node.id)
                .map(|r| r.handle.id)
                .collect();
            let mut orphans = Vec::new();
            for id in orphan_ids {
                if let Some(record) = state.endpoints.remove(&id) {
                    state.pending_inboxes.remove(&id);
                    orphans.push(record);
                }
            }
            (removed, orphans)
        };
        let Some(removed) = removed else {
            // Already gone: releasing twice is a no-op.
            return;
        };
        let fqn = removed.fqn();
        for record in orphans {
            self.emit(GraphEventPayload::EndpointStopped {
                kind: record.handle.kind,
                node_fqn: fqn.clone(),
                name: record.resolved_name,
            });
        }
        debug!(node = %fqn, "node destroyed");
        self.emit(GraphEventPayload::NodeDestroyed { fqn });
    }

    fn create_endpoint(
        &self,
        node: &NodeHandle,
        kind: EndpointKind,
        name: &str,
        type_name: &str,
        _qos: &QosProfile,
    ) -> Result<EndpointHandle, RosimError> {
        let resolved = Self::resolve_name(node, name);
        let handle = EndpointHandle {
            id: Uuid::new_v4(),
            kind,
            name: name.to_string(),
            type_name: type_name.to_string(),
            node_id: node.id,
        };
        {
            let mut state = self.state();
            if state.injected_faults.remove(name) {
                return Err(RosimError::EndpointRegistration {
                    kind,
                    name: name.to_string(),
                    reason: "injected middleware failure".to_string(),
                });
            }
            if !state.nodes.contains_key(&node.id) {
                return Err(RosimError::EndpointRegistration {
                    kind,
                    name: name.to_string(),
                    reason: format!("node '{}' is not on the graph", node.fqn()),
                });
            }
            let sender = if kind == EndpointKind::Subscriber {
                let (tx, rx) = mpsc::unbounded_channel();
                state
                    .pending_inboxes
                    .insert(handle.id, SubscriptionInbox::new(rx));
                Some(tx)
            } else {
                None
            };
            state.endpoints.insert(
                handle.id,
                EndpointRecord {
                    handle: handle.clone(),
                    resolved_name: resolved.clone(),
                    sender,
                },
            );
        }
        debug!(kind = %kind, endpoint = %resolved, node = %node.fqn(), "endpoint created");
        self.emit(GraphEventPayload::EndpointCreated {
            kind,
            node_fqn: node.fqn(),
            name: resolved,
        });
        Ok(handle)
    }

    fn stop_endpoint(&self, endpoint: &EndpointHandle) {
        let removed = {
            let mut state = self.state();
            state.pending_inboxes.remove(&endpoint.id);
            state.endpoints.remove(&endpoint.id)
        };
        let Some(record) = removed else {
            return;
        };
        let node_fqn = self
            .state()
            .nodes
            .get(&endpoint.node_id)
            .map(|n| n.fqn())
            .unwrap_or_default();
        debug!(kind = %record.handle.kind, endpoint = %record.resolved_name, "endpoint stopped");
        self.emit(GraphEventPayload::EndpointStopped {
            kind: record.handle.kind,
            node_fqn,
            name: record.resolved_name,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph_with_node(name: &str, ns: &str) -> (SimGraph, NodeHandle) {
        let graph = SimGraph::default();
        let node = graph.create_node(name, ns).unwrap();
        (graph, node)
    }

    #[tokio::test]
    async fn create_node_emits_discovery_event() {
        let graph = SimGraph::default();
        let mut events = graph.subscribe_events();

        let node = graph.create_node("robot_1_node", "robot_1").unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(
            event.payload,
            GraphEventPayload::NodeCreated {
                fqn: "/robot_1/robot_1_node".to_string()
            }
        );
        assert!(graph.node_exists(&node.fqn()));
    }

    #[test]
    fn duplicate_node_name_is_rejected() {
        let (graph, _node) = graph_with_node("robot_1_node", "robot_1");
        let result = graph.create_node("robot_1_node", "robot_1");
        assert!(
            matches!(result, Err(RosimError::NodeCreation(_))),
            "expected NodeCreation error, got: {result:?}"
        );
    }

    #[test]
    fn destroy_node_is_idempotent() {
        let (graph, node) = graph_with_node("robot_1_node", "robot_1");
        graph.destroy_node(&node);
        graph.destroy_node(&node);
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn destroy_node_takes_down_remaining_endpoints() {
        let (graph, node) = graph_with_node("robot_1_node", "robot_1");
        graph
            .create_endpoint(
                &node,
                EndpointKind::Publisher,
                "odom",
                "nav_msgs/msg/Odometry",
                &QosProfile::default(),
            )
            .unwrap();

        graph.destroy_node(&node);
        assert_eq!(graph.endpoint_count(), 0);
    }

    #[test]
    fn endpoint_on_missing_node_is_rejected() {
        let (graph, node) = graph_with_node("robot_1_node", "robot_1");
        graph.destroy_node(&node);

        let result = graph.create_endpoint(
            &node,
            EndpointKind::Publisher,
            "odom",
            "nav_msgs/msg/Odometry",
            &QosProfile::default(),
        );
        assert!(matches!(
            result,
            Err(RosimError::EndpointRegistration { .. })
        ));
    }

    #[test]
    fn injected_fault_fails_exactly_one_creation() {
        let (graph, node) = graph_with_node("robot_1_node", "robot_1");
        graph.inject_endpoint_failure("odom");

        let first = graph.create_endpoint(
            &node,
            EndpointKind::Publisher,
            "odom",
            "nav_msgs/msg/Odometry",
            &QosProfile::default(),
        );
        assert!(first.is_err());

        // The fault is consumed; the retry succeeds.
        let second = graph.create_endpoint(
            &node,
            EndpointKind::Publisher,
            "odom",
            "nav_msgs/msg/Odometry",
            &QosProfile::default(),
        );
        assert!(second.is_ok());
    }

    #[test]
    fn publish_routes_to_matching_subscriber_inbox() {
        let (graph, node) = graph_with_node("robot_1_node", "robot_1");
        let sub = graph
            .create_endpoint(
                &node,
                EndpointKind::Subscriber,
                "cmd_vel",
                "geometry_msgs/msg/Twist",
                &QosProfile::default(),
            )
            .unwrap();
        let mut inbox = graph.take_inbox(&sub).expect("inbox");

        let delivered = graph.publish("/robot_1/cmd_vel", json!({"linear": {"x": 0.5}}));
        assert_eq!(delivered, 1);

        let drained = inbox.try_drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].topic, "/robot_1/cmd_vel");
    }

    #[test]
    fn publish_to_unrelated_topic_delivers_nothing() {
        let (graph, node) = graph_with_node("robot_1_node", "robot_1");
        let sub = graph
            .create_endpoint(
                &node,
                EndpointKind::Subscriber,
                "cmd_vel",
                "geometry_msgs/msg/Twist",
                &QosProfile::default(),
            )
            .unwrap();
        let mut inbox = graph.take_inbox(&sub).expect("inbox");

        assert_eq!(graph.publish("/robot_2/cmd_vel", json!({})), 0);
        assert!(inbox.try_drain().is_empty());
    }

    #[test]
    fn inbox_can_be_taken_only_once() {
        let (graph, node) = graph_with_node("robot_1_node", "robot_1");
        let sub = graph
            .create_endpoint(
                &node,
                EndpointKind::Subscriber,
                "cmd_vel",
                "geometry_msgs/msg/Twist",
                &QosProfile::default(),
            )
            .unwrap();
        assert!(graph.take_inbox(&sub).is_some());
        assert!(graph.take_inbox(&sub).is_none());
    }

    #[tokio::test]
    async fn stopping_a_subscriber_ends_its_inbox() {
        let (graph, node) = graph_with_node("robot_1_node", "robot_1");
        let sub = graph
            .create_endpoint(
                &node,
                EndpointKind::Subscriber,
                "cmd_vel",
                "geometry_msgs/msg/Twist",
                &QosProfile::default(),
            )
            .unwrap();
        let mut inbox = graph.take_inbox(&sub).expect("inbox");

        graph.stop_endpoint(&sub);
        assert!(inbox.recv().await.is_none());
    }

    #[test]
    fn resolve_name_handles_absolute_and_relative() {
        let node = NodeHandle {
            id: Uuid::new_v4(),
            name: "n".to_string(),
            namespace: "robot_1".to_string(),
        };
        assert_eq!(SimGraph::resolve_name(&node, "/tf"), "/tf");
        assert_eq!(SimGraph::resolve_name(&node, "odom"), "/robot_1/odom");
    }

    #[tokio::test]
    async fn service_available_within_sees_late_server() {
        let (graph, node) = graph_with_node("robot_1_node", "robot_1");
        graph
            .create_endpoint(
                &node,
                EndpointKind::ServiceServer,
                "set_pose",
                "rosim_srvs/srv/SetPose",
                &QosProfile::default(),
            )
            .unwrap();

        assert!(
            graph
                .service_available_within("/robot_1/set_pose", Duration::from_millis(50))
                .await
        );
        assert!(
            !graph
                .service_available_within("/robot_1/missing", Duration::from_millis(30))
                .await
        );
    }
}
