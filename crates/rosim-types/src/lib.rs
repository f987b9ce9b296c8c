use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The six kinds of communication endpoint a ROS 2 node can own.
///
/// Endpoint names are unique per kind, not globally: a publisher and a
/// service server may both be registered under `"status"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Publisher,
    Subscriber,
    ServiceClient,
    ServiceServer,
    ActionClient,
    ActionServer,
}

impl EndpointKind {
    /// All kinds, in interface-initialization order (publishers first,
    /// action servers last).
    pub const ALL: [EndpointKind; 6] = [
        EndpointKind::Publisher,
        EndpointKind::Subscriber,
        EndpointKind::ServiceClient,
        EndpointKind::ServiceServer,
        EndpointKind::ActionClient,
        EndpointKind::ActionServer,
    ];
}

impl std::fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EndpointKind::Publisher => "publisher",
            EndpointKind::Subscriber => "subscriber",
            EndpointKind::ServiceClient => "service_client",
            EndpointKind::ServiceServer => "service_server",
            EndpointKind::ActionClient => "action_client",
            EndpointKind::ActionServer => "action_server",
        };
        write!(f, "{s}")
    }
}

/// Quality-of-service knobs handed to the middleware when an endpoint is
/// created.  The middleware treats this as an opaque tuning profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QosProfile {
    /// History depth (number of buffered messages).
    pub depth: usize,
    /// Reliable delivery vs. best-effort.
    pub reliable: bool,
    /// Latch the last message for late-joining subscribers.
    pub transient_local: bool,
}

impl Default for QosProfile {
    fn default() -> Self {
        Self {
            depth: 10,
            reliable: true,
            transient_local: false,
        }
    }
}

/// Spawn-time parameters supplied by whatever spawned the entity
/// (e.g. a `/SpawnEntity` service call).  When present, the namespace
/// override wins over every other namespace source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SpawnParameters {
    /// Namespace override for the entity's ROS 2 node.
    pub namespace: Option<String>,
}

/// Identity surface of a simulated robot entity.
///
/// The interface layer reads this but never owns the entity; the entity
/// itself (mesh, physics, possession plumbing) lives in the host simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityInfo {
    pub id: Uuid,
    /// Human-readable entity name, e.g. `"robot_1"`.
    pub name: String,
    /// Present only when the entity was spawned with explicit parameters.
    pub spawn_parameters: Option<SpawnParameters>,
}

impl EntityInfo {
    /// Build an entity identity with a fresh id and no spawn parameters.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            spawn_parameters: None,
        }
    }

    /// Attach a spawn-time namespace override.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.spawn_parameters = Some(SpawnParameters {
            namespace: Some(namespace.into()),
        });
        self
    }
}

/// The two recognized interface configuration options, plus the default
/// namespace they select between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InterfaceConfig {
    /// Namespace used when no spawn override exists and
    /// `use_entity_name_as_namespace` is off.
    #[serde(default)]
    pub default_namespace: String,
    /// Derive the node namespace from the entity's name.
    #[serde(default = "default_use_entity_name")]
    pub use_entity_name_as_namespace: bool,
}

fn default_use_entity_name() -> bool {
    true
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            default_namespace: String::new(),
            use_entity_name_as_namespace: true,
        }
    }
}

/// Observable lifecycle event on the middleware's discovery graph.
///
/// Creating or destroying a node or endpoint publishes exactly one of these;
/// it is the only externally visible effect of the interface lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: GraphEventPayload,
}

impl GraphEvent {
    pub fn now(payload: GraphEventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// What happened on the discovery graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphEventPayload {
    NodeCreated {
        fqn: String,
    },
    NodeDestroyed {
        fqn: String,
    },
    EndpointCreated {
        kind: EndpointKind,
        node_fqn: String,
        name: String,
    },
    EndpointStopped {
        kind: EndpointKind,
        node_fqn: String,
        name: String,
    },
}

/// Global error type for the interface lifecycle layer.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum RosimError {
    /// The middleware could not allocate a node (name clash, graph down).
    /// Fatal to that controller's Initialize; no partial node is left behind.
    #[error("Node creation failed: {0}")]
    NodeCreation(String),

    /// One endpoint could not be registered.  Non-fatal: the endpoint is
    /// skipped and the remaining interface hooks proceed.
    #[error("Failed to register {kind} '{name}': {reason}")]
    EndpointRegistration {
        kind: EndpointKind,
        name: String,
        reason: String,
    },

    /// Un-possession found no bound interface controller.  Informational;
    /// entities without ROS 2 interfaces are valid.
    #[error("No interface controller bound: {0}")]
    MissingController(String),

    /// Transport-level failure surfaced by the middleware client.
    #[error("Middleware error: {0}")]
    Middleware(String),
}
