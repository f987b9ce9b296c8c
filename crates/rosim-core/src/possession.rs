//! [`PossessionAdapter`] – binds an interface controller to an entity when
//! the entity is possessed, and unbinds it on un-possession.
//!
//! Deliberately thin: the adapter never creates endpoints itself, it only
//! drives the controller's two lifecycle entry points.  It holds the single
//! owning reference to the controller; moving possession between adapters
//! transfers that reference via [`PossessionAdapter::release_controller`],
//! never duplicates it.

use std::sync::Arc;

use rosim_middleware::Ros2Client;
use rosim_types::{EntityInfo, InterfaceConfig, RosimError};
use tracing::{info, warn};

use crate::controller::InterfaceController;

/// Per-agent possession adapter.
pub struct PossessionAdapter {
    client: Arc<dyn Ros2Client>,
    config: InterfaceConfig,
    controller: Option<InterfaceController>,
}

impl PossessionAdapter {
    pub fn new(client: Arc<dyn Ros2Client>, config: InterfaceConfig) -> Self {
        Self {
            client,
            config,
            controller: None,
        }
    }

    /// Handle a possession event for `entity`.
    ///
    /// A pre-attached controller (the component case) is adopted and re-runs
    /// the full lifecycle; otherwise the previously held controller is
    /// reused, and only if there is none is a default controller built.  The
    /// adopted controller is then initialized.
    ///
    /// Node-creation failure is logged here and reported to the caller; the
    /// adapter stays bound so a later possess can retry.
    pub fn on_possess(
        &mut self,
        entity: &EntityInfo,
        pre_attached: Option<InterfaceController>,
    ) -> Result<(), RosimError> {
        if let Some(attached) = pre_attached {
            // Replacing a held controller: tear the old one down so its
            // middleware resources cannot leak.
            if let Some(mut old) = self.controller.replace(attached) {
                warn!(entity = %entity.name, "possess replaced a bound controller; releasing the old one");
                old.deinitialize();
            }
        } else if self.controller.is_none() {
            self.controller = Some(InterfaceController::new(
                Arc::clone(&self.client),
                self.config.clone(),
            ));
        }

        // Invariant: bound by now.
        let Some(controller) = self.controller.as_mut() else {
            return Ok(());
        };
        controller.initialize(entity)
    }

    /// Handle an un-possession event.
    ///
    /// Entities without a ROS 2 interface are valid; a missing controller is
    /// logged at info level and swallowed.
    pub fn on_unpossess(&mut self) {
        match self.controller.as_mut() {
            Some(controller) => controller.deinitialize(),
            None => {
                let err = RosimError::MissingController(
                    "un-possess with no bound interface controller".to_string(),
                );
                info!(%err, "nothing to de-initialize");
            }
        }
    }

    /// Transfer the owned controller out, e.g. when possession moves to
    /// another adapter.
    pub fn release_controller(&mut self) -> Option<InterfaceController> {
        self.controller.take()
    }

    /// The currently bound controller, if any.
    pub fn controller(&self) -> Option<&InterfaceController> {
        self.controller.as_ref()
    }

    pub fn controller_mut(&mut self) -> Option<&mut InterfaceController> {
        self.controller.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::LifecycleState;
    use rosim_middleware::SimGraph;

    fn adapter(graph: &Arc<SimGraph>) -> PossessionAdapter {
        PossessionAdapter::new(
            Arc::clone(graph) as Arc<dyn Ros2Client>,
            InterfaceConfig::default(),
        )
    }

    #[test]
    fn possess_builds_and_initializes_a_default_controller() {
        let graph = Arc::new(SimGraph::default());
        let mut adapter = adapter(&graph);
        let entity = EntityInfo::named("robot_1");

        adapter.on_possess(&entity, None).unwrap();

        let controller = adapter.controller().expect("controller bound");
        assert!(controller.is_ready());
        assert_eq!(controller.namespace(), Some("robot_1"));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn possess_adopts_a_pre_attached_controller() {
        let graph = Arc::new(SimGraph::default());
        let mut adapter = adapter(&graph);
        let entity = EntityInfo::named("robot_1");

        // Component case: the entity carries its own (specialized) controller.
        let mut pre_attached = InterfaceController::bare(
            Arc::clone(&graph) as Arc<dyn Ros2Client>,
            InterfaceConfig::default(),
        );
        pre_attached.add_hook(crate::controller::HookStage::Publishers, |ctx| {
            ctx.add_publisher("scan", "sensor_msgs/msg/LaserScan");
            Ok(())
        });

        adapter.on_possess(&entity, Some(pre_attached)).unwrap();

        let controller = adapter.controller().expect("controller bound");
        assert!(controller.is_ready());
        assert!(
            controller
                .registry()
                .get(rosim_types::EndpointKind::Subscriber, "cmd_vel")
                .is_none(),
            "bare pre-attached controller must keep its own hook set"
        );
        assert!(
            controller
                .registry()
                .get(rosim_types::EndpointKind::Publisher, "scan")
                .is_some()
        );
    }

    #[test]
    fn unpossess_without_controller_is_not_fatal() {
        let graph = Arc::new(SimGraph::default());
        let mut adapter = adapter(&graph);
        // Must not panic, must not bind anything.
        adapter.on_unpossess();
        assert!(adapter.controller().is_none());
    }

    #[test]
    fn unpossess_closes_the_bound_controller() {
        let graph = Arc::new(SimGraph::default());
        let mut adapter = adapter(&graph);
        let entity = EntityInfo::named("robot_1");

        adapter.on_possess(&entity, None).unwrap();
        adapter.on_unpossess();

        let controller = adapter.controller().expect("still bound after un-possess");
        assert_eq!(controller.state(), LifecycleState::Closed);
        assert!(controller.registry().is_empty());
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn possession_transfer_moves_the_controller() {
        let graph = Arc::new(SimGraph::default());
        let mut first = adapter(&graph);
        let mut second = adapter(&graph);
        let entity = EntityInfo::named("robot_1");

        first.on_possess(&entity, None).unwrap();
        first.on_unpossess();
        let transferred = first.release_controller().expect("controller to transfer");
        assert!(first.controller().is_none());

        second.on_possess(&entity, Some(transferred)).unwrap();
        assert!(second.controller().expect("bound").is_ready());
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn repossess_after_unpossess_recreates_the_node() {
        let graph = Arc::new(SimGraph::default());
        let mut adapter = adapter(&graph);
        let entity = EntityInfo::named("robot_1");

        adapter.on_possess(&entity, None).unwrap();
        adapter.on_unpossess();
        assert_eq!(graph.node_count(), 0);

        adapter.on_possess(&entity, None).unwrap();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(
            adapter.controller().expect("bound").namespace(),
            Some("robot_1")
        );
    }
}
