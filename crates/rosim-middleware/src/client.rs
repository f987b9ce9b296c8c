//! The opaque middleware client boundary.
//!
//! The interface layer never links against a DDS stack directly; it drives
//! whatever implements [`Ros2Client`].  Handles are cheap identifiers – they
//! carry the fully-qualified names needed for logging and teardown but are
//! useless without the client that issued them.

use rosim_types::{EndpointKind, QosProfile, RosimError};
use uuid::Uuid;

/// Handle to one middleware node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHandle {
    pub id: Uuid,
    pub name: String,
    pub namespace: String,
}

impl NodeHandle {
    /// Fully-qualified node name, e.g. `/robot_1/robot_1_node`.
    pub fn fqn(&self) -> String {
        let ns = self.namespace.trim_matches('/');
        if ns.is_empty() {
            format!("/{}", self.name)
        } else {
            format!("/{}/{}", ns, self.name)
        }
    }
}

/// Handle to one communication endpoint bound to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointHandle {
    pub id: Uuid,
    pub kind: EndpointKind,
    /// Endpoint name as registered (topic, service, or action name).
    pub name: String,
    /// Message/service/action type, e.g. `nav_msgs/msg/Odometry`.
    pub type_name: String,
    pub node_id: Uuid,
}

/// Operations the interface lifecycle requires from a ROS 2 middleware.
///
/// # Contract
///
/// * `create_node` fails when the graph already carries a node with the same
///   fully-qualified name, or when the middleware is not running.
/// * `destroy_node` and `stop_endpoint` are idempotent: releasing a handle
///   that is already gone is a no-op, never an error.
/// * All operations complete promptly; nothing here blocks on network I/O.
pub trait Ros2Client: Send + Sync {
    /// Allocate a node and publish it into the discovery graph.
    fn create_node(&self, name: &str, namespace: &str) -> Result<NodeHandle, RosimError>;

    /// Remove a node (and anything still bound to it) from the graph.
    fn destroy_node(&self, node: &NodeHandle);

    /// Bind an endpoint of the given kind to `node`.
    fn create_endpoint(
        &self,
        node: &NodeHandle,
        kind: EndpointKind,
        name: &str,
        type_name: &str,
        qos: &QosProfile,
    ) -> Result<EndpointHandle, RosimError>;

    /// Stop an endpoint and remove it from the graph.
    fn stop_endpoint(&self, endpoint: &EndpointHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(name: &str, namespace: &str) -> NodeHandle {
        NodeHandle {
            id: Uuid::new_v4(),
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }

    #[test]
    fn fqn_joins_namespace_and_name() {
        assert_eq!(handle("robot_1_node", "robot_1").fqn(), "/robot_1/robot_1_node");
    }

    #[test]
    fn fqn_with_empty_namespace_is_rooted() {
        assert_eq!(handle("lone_node", "").fqn(), "/lone_node");
    }

    #[test]
    fn fqn_strips_redundant_slashes() {
        assert_eq!(handle("n", "/warehouse/cell_3/").fqn(), "/warehouse/cell_3/n");
    }
}
