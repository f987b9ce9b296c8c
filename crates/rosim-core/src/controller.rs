//! [`InterfaceController`] – the per-entity lifecycle state machine.
//!
//! `Initialize` creates the node binding, then runs seven hook stages in
//! fixed order: SetupParams, Publishers, Subscriptions, ServiceClients,
//! ServiceServers, ActionClients, ActionServers.  Each stage carries an
//! ordered chain of hook functions; the base hooks (odometry + tf
//! publishers, cmd_vel + joint_states subscriptions) are installed first and
//! specializations append theirs with [`InterfaceController::add_hook`], so
//! the base can never be skipped.
//!
//! A hook failure is logged and does not abort the remaining hooks: a robot
//! missing one optional endpoint must not lose the rest of its interfaces.
//! Only node creation is fatal to an `Initialize`, and it leaves no partial
//! node behind.
//!
//! `DeInitialize` stops all publishers first (they may still be referenced
//! by timers), drains the remaining kinds in reverse registration order,
//! releases the node binding, and is unconditionally safe to call – including
//! on a registry that is only partially populated.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use rosim_middleware::{EndpointHandle, NodeHandle, Ros2Client};
use rosim_types::{EndpointKind, EntityInfo, InterfaceConfig, QosProfile, RosimError};
use tracing::{debug, error, info, warn};

use crate::node::NodeBinding;
use crate::registry::EndpointRegistry;

/// Lifecycle of one interface controller.
///
/// `Closed` is behaviourally equivalent to `Uninitialized`: a controller may
/// be re-initialized after a full de-initialization, but never while already
/// `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
    DeInitializing,
    Closed,
}

/// The seven initialization stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    SetupParams,
    Publishers,
    Subscriptions,
    ServiceClients,
    ServiceServers,
    ActionClients,
    ActionServers,
}

impl HookStage {
    /// All stages, in the fixed order `initialize` runs them.
    pub const ORDER: [HookStage; 7] = [
        HookStage::SetupParams,
        HookStage::Publishers,
        HookStage::Subscriptions,
        HookStage::ServiceClients,
        HookStage::ServiceServers,
        HookStage::ActionClients,
        HookStage::ActionServers,
    ];
}

impl std::fmt::Display for HookStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HookStage::SetupParams => "setup_params",
            HookStage::Publishers => "publishers",
            HookStage::Subscriptions => "subscriptions",
            HookStage::ServiceClients => "service_clients",
            HookStage::ServiceServers => "service_servers",
            HookStage::ActionClients => "action_clients",
            HookStage::ActionServers => "action_servers",
        };
        write!(f, "{s}")
    }
}

/// A single initialization hook.
pub type Hook = Box<dyn Fn(&mut InterfaceContext<'_>) -> Result<(), RosimError> + Send + Sync>;

#[derive(Default)]
struct HookChain {
    setup_params: Vec<Hook>,
    publishers: Vec<Hook>,
    subscriptions: Vec<Hook>,
    service_clients: Vec<Hook>,
    service_servers: Vec<Hook>,
    action_clients: Vec<Hook>,
    action_servers: Vec<Hook>,
}

impl HookChain {
    fn stage_mut(&mut self, stage: HookStage) -> &mut Vec<Hook> {
        match stage {
            HookStage::SetupParams => &mut self.setup_params,
            HookStage::Publishers => &mut self.publishers,
            HookStage::Subscriptions => &mut self.subscriptions,
            HookStage::ServiceClients => &mut self.service_clients,
            HookStage::ServiceServers => &mut self.service_servers,
            HookStage::ActionClients => &mut self.action_clients,
            HookStage::ActionServers => &mut self.action_servers,
        }
    }
}

/// The view handed to every hook: the entity being wired up, the live node,
/// the parameter table seeded by SetupParams hooks, and checked registration
/// helpers.
pub struct InterfaceContext<'a> {
    client: &'a dyn Ros2Client,
    node: &'a NodeHandle,
    registry: &'a mut EndpointRegistry,
    params: &'a mut HashMap<String, String>,
    entity: &'a EntityInfo,
}

impl InterfaceContext<'_> {
    pub fn entity(&self) -> &EntityInfo {
        self.entity
    }

    pub fn node(&self) -> &NodeHandle {
        self.node
    }

    /// Set an interface parameter (frame name, topic prefix, …).
    ///
    /// SetupParams hooks run before any endpoint is created, so later stages
    /// see the final values.
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn param_or(&self, key: &str, default: &str) -> String {
        self.param(key).unwrap_or(default).to_string()
    }

    /// Create an endpoint on the middleware and register it in one step.
    ///
    /// A middleware failure is logged and swallowed: that one endpoint is
    /// skipped and `None` is returned, the rest of the stage proceeds.
    pub fn add_endpoint(
        &mut self,
        kind: EndpointKind,
        name: &str,
        type_name: &str,
        qos: &QosProfile,
    ) -> Option<EndpointHandle> {
        match self
            .client
            .create_endpoint(self.node, kind, name, type_name, qos)
        {
            Ok(handle) => {
                self.registry.register(self.client, kind, name, handle.clone());
                Some(handle)
            }
            Err(e) => {
                warn!(kind = %kind, name = %name, error = %e, "endpoint registration failed; skipping");
                None
            }
        }
    }

    pub fn add_publisher(&mut self, name: &str, type_name: &str) -> Option<EndpointHandle> {
        self.add_endpoint(EndpointKind::Publisher, name, type_name, &QosProfile::default())
    }

    pub fn add_subscription(&mut self, name: &str, type_name: &str) -> Option<EndpointHandle> {
        self.add_endpoint(EndpointKind::Subscriber, name, type_name, &QosProfile::default())
    }

    pub fn add_service_client(&mut self, name: &str, type_name: &str) -> Option<EndpointHandle> {
        self.add_endpoint(EndpointKind::ServiceClient, name, type_name, &QosProfile::default())
    }

    pub fn add_service_server(&mut self, name: &str, type_name: &str) -> Option<EndpointHandle> {
        self.add_endpoint(EndpointKind::ServiceServer, name, type_name, &QosProfile::default())
    }

    pub fn add_action_client(&mut self, name: &str, type_name: &str) -> Option<EndpointHandle> {
        self.add_endpoint(EndpointKind::ActionClient, name, type_name, &QosProfile::default())
    }

    pub fn add_action_server(&mut self, name: &str, type_name: &str) -> Option<EndpointHandle> {
        self.add_endpoint(EndpointKind::ActionServer, name, type_name, &QosProfile::default())
    }
}

// ---------------------------------------------------------------------------
// Base hooks
// ---------------------------------------------------------------------------

fn base_setup_params(ctx: &mut InterfaceContext<'_>) -> Result<(), RosimError> {
    ctx.set_param("odom_frame", "odom");
    ctx.set_param("base_frame", "base_footprint");
    ctx.set_param("odom_topic", "odom");
    ctx.set_param("tf_topic", "/tf");
    ctx.set_param("cmd_vel_topic", "cmd_vel");
    ctx.set_param("joint_states_topic", "joint_states");
    Ok(())
}

fn base_publishers(ctx: &mut InterfaceContext<'_>) -> Result<(), RosimError> {
    let odom = ctx.param_or("odom_topic", "odom");
    ctx.add_publisher(&odom, "nav_msgs/msg/Odometry");
    let tf = ctx.param_or("tf_topic", "/tf");
    ctx.add_publisher(&tf, "tf2_msgs/msg/TFMessage");
    Ok(())
}

fn base_subscriptions(ctx: &mut InterfaceContext<'_>) -> Result<(), RosimError> {
    let cmd_vel = ctx.param_or("cmd_vel_topic", "cmd_vel");
    ctx.add_subscription(&cmd_vel, "geometry_msgs/msg/Twist");
    let joint_states = ctx.param_or("joint_states_topic", "joint_states");
    ctx.add_subscription(&joint_states, "sensor_msgs/msg/JointState");
    Ok(())
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Owns one [`NodeBinding`] and one [`EndpointRegistry`] on behalf of a
/// single simulated entity.  Held (and transferred, never copied) by the
/// [`PossessionAdapter`][crate::possession::PossessionAdapter] that currently
/// possesses the entity.
pub struct InterfaceController {
    client: Arc<dyn Ros2Client>,
    config: InterfaceConfig,
    state: LifecycleState,
    node: Option<NodeBinding>,
    registry: EndpointRegistry,
    params: HashMap<String, String>,
    hooks: HookChain,
    entity_name: Option<String>,
}

impl InterfaceController {
    /// Controller with the base hooks installed: odometry + tf publishers and
    /// cmd_vel + joint_states subscriptions.
    pub fn new(client: Arc<dyn Ros2Client>, config: InterfaceConfig) -> Self {
        let mut controller = Self::bare(client, config);
        controller.add_hook(HookStage::SetupParams, base_setup_params);
        controller.add_hook(HookStage::Publishers, base_publishers);
        controller.add_hook(HookStage::Subscriptions, base_subscriptions);
        controller
    }

    /// Controller with no hooks at all.  Mostly useful for robots whose
    /// interface is built entirely from specialization hooks, and for tests.
    pub fn bare(client: Arc<dyn Ros2Client>, config: InterfaceConfig) -> Self {
        Self {
            client,
            config,
            state: LifecycleState::Uninitialized,
            node: None,
            registry: EndpointRegistry::new(),
            params: HashMap::new(),
            hooks: HookChain::default(),
            entity_name: None,
        }
    }

    /// Append a specialization hook to `stage`.  Hooks run in registration
    /// order, after any hooks already installed for the stage.
    pub fn add_hook<F>(&mut self, stage: HookStage, hook: F)
    where
        F: Fn(&mut InterfaceContext<'_>) -> Result<(), RosimError> + Send + Sync + 'static,
    {
        self.hooks.stage_mut(stage).push(Box::new(hook));
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == LifecycleState::Ready
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn node_binding(&self) -> Option<&NodeBinding> {
        self.node.as_ref()
    }

    /// Namespace of the live node binding, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.node.as_ref().map(|n| n.namespace())
    }

    /// Bring the interface up for `entity`.
    ///
    /// Valid only from `Uninitialized`/`Closed`; duplicate possession events
    /// log a warning and change nothing.  Hook failures are tolerated, so
    /// once the node exists this always reaches `Ready` – possibly with
    /// fewer endpoints than requested.
    ///
    /// # Errors
    ///
    /// Returns [`RosimError::NodeCreation`] when the middleware cannot
    /// allocate the node; the controller is left `Uninitialized` with no
    /// partial node.
    pub fn initialize(&mut self, entity: &EntityInfo) -> Result<(), RosimError> {
        match self.state {
            LifecycleState::Uninitialized | LifecycleState::Closed => {}
            state => {
                warn!(
                    entity = %entity.name,
                    state = ?state,
                    "initialize called on an active interface; ignoring duplicate possession"
                );
                return Ok(());
            }
        }
        self.state = LifecycleState::Initializing;
        self.params.clear();
        self.entity_name = Some(entity.name.clone());

        let binding = match NodeBinding::create(self.client.as_ref(), entity, &self.config) {
            Ok(binding) => binding,
            Err(e) => {
                error!(entity = %entity.name, error = %e, "node creation failed; interface stays down");
                self.state = LifecycleState::Uninitialized;
                return Err(e);
            }
        };
        self.node = Some(binding);

        for stage in HookStage::ORDER {
            self.run_stage(stage, entity);
        }

        self.state = LifecycleState::Ready;
        info!(
            entity = %entity.name,
            endpoints = self.registry.total_len(),
            "interface ready"
        );
        Ok(())
    }

    fn run_stage(&mut self, stage: HookStage, entity: &EntityInfo) {
        let Some(node_handle) = self.node.as_ref().and_then(|n| n.handle()).cloned() else {
            return;
        };
        // The chain is detached while it runs so hooks can borrow the
        // registry and params mutably; nothing can append mid-stage.
        let hooks = mem::take(self.hooks.stage_mut(stage));
        {
            let mut ctx = InterfaceContext {
                client: self.client.as_ref(),
                node: &node_handle,
                registry: &mut self.registry,
                params: &mut self.params,
                entity,
            };
            for hook in &hooks {
                if let Err(e) = hook(&mut ctx) {
                    warn!(stage = %stage, error = %e, "interface hook failed; continuing");
                }
            }
        }
        *self.hooks.stage_mut(stage) = hooks;
        debug!(stage = %stage, "hook stage complete");
    }

    /// Tear the interface down.
    ///
    /// Valid from `Ready` or `Initializing` (un-possession mid-init must
    /// still land in `Closed`); a no-op on an inactive controller.  Teardown
    /// never fails: middleware resources that are already gone are skipped.
    pub fn deinitialize(&mut self) {
        match self.state {
            LifecycleState::Ready | LifecycleState::Initializing => {}
            _ => {
                debug!("deinitialize on an inactive interface; no-op");
                return;
            }
        }
        self.state = LifecycleState::DeInitializing;

        let client = self.client.clone();
        // Publishers first: timers may still hold references to them.
        self.registry.drain(client.as_ref(), EndpointKind::Publisher);
        for kind in [
            EndpointKind::ActionServer,
            EndpointKind::ActionClient,
            EndpointKind::ServiceServer,
            EndpointKind::ServiceClient,
            EndpointKind::Subscriber,
        ] {
            self.registry.drain(client.as_ref(), kind);
        }

        if let Some(mut binding) = self.node.take() {
            binding.release(client.as_ref());
        }
        self.params.clear();
        self.state = LifecycleState::Closed;
        if let Some(name) = &self.entity_name {
            info!(entity = %name, "interface closed");
        }
    }
}
