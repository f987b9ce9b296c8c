//! [`NodeBinding`] – one middleware node scoped to one simulated entity.
//!
//! The namespace is resolved exactly once, when the node is created, and
//! never mutated afterwards.  Resolution order:
//!
//! 1. spawn-parameter override, when the entity was spawned with one;
//! 2. the entity's name, when `use_entity_name_as_namespace` is set;
//! 3. the configured default namespace.

use rosim_middleware::{NodeHandle, Ros2Client};
use rosim_types::{EntityInfo, InterfaceConfig, RosimError};
use tracing::{debug, info};
use uuid::Uuid;

/// Owns at most one middleware node on behalf of an [`InterfaceController`].
///
/// The node is created lazily by [`NodeBinding::create`] and released exactly
/// once by [`NodeBinding::release`]; releasing an already-released binding is
/// a no-op.
///
/// [`InterfaceController`]: crate::controller::InterfaceController
#[derive(Debug)]
pub struct NodeBinding {
    handle: Option<NodeHandle>,
    namespace: String,
    owner: Uuid,
}

impl NodeBinding {
    /// Resolve the namespace an entity's node would get under `config`.
    pub fn resolve_namespace(entity: &EntityInfo, config: &InterfaceConfig) -> String {
        if let Some(ns) = entity
            .spawn_parameters
            .as_ref()
            .and_then(|p| p.namespace.as_deref())
        {
            return ns.trim_matches('/').to_string();
        }
        if config.use_entity_name_as_namespace {
            return entity.name.clone();
        }
        config.default_namespace.trim_matches('/').to_string()
    }

    /// Create the entity's node and publish it into the discovery graph.
    ///
    /// # Errors
    ///
    /// Returns [`RosimError::NodeCreation`] when the middleware cannot
    /// allocate the node (name collision, graph down).  No binding is
    /// constructed in that case.
    pub fn create(
        client: &dyn Ros2Client,
        entity: &EntityInfo,
        config: &InterfaceConfig,
    ) -> Result<Self, RosimError> {
        let namespace = Self::resolve_namespace(entity, config);
        let node_name = format!("{}_node", entity.name);
        let handle = client.create_node(&node_name, &namespace)?;
        info!(entity = %entity.name, node = %handle.fqn(), "node binding created");
        Ok(Self {
            handle: Some(handle),
            namespace,
            owner: entity.id,
        })
    }

    /// The live node handle, if the binding has not been released.
    pub fn handle(&self) -> Option<&NodeHandle> {
        self.handle.as_ref()
    }

    /// Namespace resolved at creation.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Id of the entity this binding belongs to.
    pub fn owner(&self) -> Uuid {
        self.owner
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.is_some()
    }

    /// Destroy the middleware node.  Idempotent: a second release, or a
    /// release of a binding whose node never existed, does nothing.
    pub fn release(&mut self, client: &dyn Ros2Client) {
        if let Some(handle) = self.handle.take() {
            debug!(node = %handle.fqn(), "releasing node binding");
            client.destroy_node(&handle);
        }
    }
}
