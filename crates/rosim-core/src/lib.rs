//! `rosim-core` – per-entity ROS 2 interface lifecycle.
//!
//! One [`InterfaceController`] per simulated robot entity: it owns exactly
//! one middleware node, populates an [`EndpointRegistry`] through an ordered
//! chain of initialization hooks, and tears everything down deterministically
//! when the entity is un-possessed or destroyed.
//!
//! # Modules
//!
//! - [`node`] – [`NodeBinding`][node::NodeBinding]: one middleware node per
//!   controller, namespace resolved once at creation.
//! - [`registry`] – [`EndpointRegistry`]: (kind, name)-unique endpoint store
//!   with reverse-order teardown.
//! - [`controller`] – [`InterfaceController`]: the lifecycle state machine
//!   and its seven hook stages.
//! - [`possession`] – [`PossessionAdapter`]: binds a controller to an entity
//!   on possess/un-possess events.
//! - [`config`] – TOML/env loading for
//!   [`InterfaceConfig`][rosim_types::InterfaceConfig].

pub mod config;
pub mod controller;
pub mod node;
pub mod possession;
pub mod registry;

pub use controller::{HookStage, InterfaceContext, InterfaceController, LifecycleState};
pub use node::NodeBinding;
pub use possession::PossessionAdapter;
pub use registry::EndpointRegistry;
