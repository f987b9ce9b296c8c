//! `rosim-middleware` – the wire boundary.
//!
//! Everything above this crate talks to ROS 2 through the opaque
//! [`Ros2Client`] trait: node creation/destruction and endpoint
//! registration (name, message/service/action type, QoS → handle).
//!
//! # Modules
//!
//! - [`client`] – the [`Ros2Client`] trait plus the opaque
//!   [`NodeHandle`]/[`EndpointHandle`] types it hands out.
//! - [`graph`] – [`SimGraph`], an in-process middleware that implements
//!   [`Ros2Client`] and broadcasts discovery-graph events, used by the
//!   simulator and by tests.
//! - [`inbox`] – [`SubscriptionInbox`]: queued delivery of subscription
//!   data so middleware-context callbacks never touch simulation state
//!   directly.

pub mod client;
pub mod graph;
pub mod inbox;

pub use client::{EndpointHandle, NodeHandle, Ros2Client};
pub use graph::SimGraph;
pub use inbox::{SubscriptionInbox, TopicMessage};
