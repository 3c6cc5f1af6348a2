// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Bus Topology
//!
//! This module provides the explicit startup registry for the bus. Channel
//! definitions are declared up front with the builder, then installed into a
//! router in one pass. This replaces implicit, annotation-driven handler discovery
//! with a registry the application constructs and owns.

use crate::channel::ChannelMode;
use crate::errors::BusError;
use crate::router::Router;
use tracing::debug;

/// Definition of a named channel with its delivery mode.
///
/// This struct implements the builder pattern to declare channels before the
/// router exists. The mode defaults to point-to-point.
#[derive(Debug, Clone)]
pub struct ChannelDefinition {
    pub(crate) name: String,
    pub(crate) mode: ChannelMode,
}

impl ChannelDefinition {
    /// Creates a new channel definition with the given name.
    ///
    /// # Parameters
    /// * `name` - The name of the channel
    ///
    /// # Returns
    /// A point-to-point channel definition
    pub fn new(name: &str) -> ChannelDefinition {
        ChannelDefinition {
            name: name.to_owned(),
            mode: ChannelMode::PointToPoint,
        }
    }

    /// Declares the channel point-to-point: exactly-one-of-N delivery.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn point_to_point(mut self) -> Self {
        self.mode = ChannelMode::PointToPoint;
        self
    }

    /// Declares the channel publish-subscribe: all-of-N fan-out delivery.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn publish_subscribe(mut self) -> Self {
        self.mode = ChannelMode::PublishSubscribe;
        self
    }
}

/// Declarative registry of the channels a bus starts with.
///
/// Collect definitions with [`BusTopology::channel`], then call
/// [`BusTopology::install`] to materialize them into a router.
#[derive(Default)]
pub struct BusTopology {
    pub(crate) channels: Vec<ChannelDefinition>,
}

impl BusTopology {
    /// Creates an empty topology.
    pub fn new() -> BusTopology {
        BusTopology { channels: vec![] }
    }

    /// Adds a channel definition to the topology.
    ///
    /// # Parameters
    /// * `def` - A channel definition
    ///
    /// # Returns
    /// Self for method chaining
    pub fn channel(mut self, def: ChannelDefinition) -> Self {
        self.channels.push(def);
        self
    }

    /// Installs the topology into a new router.
    ///
    /// # Returns
    /// A router with every declared channel registered, or
    /// `BusError::DuplicateChannel` when two definitions share a name
    pub fn install(&self) -> Result<Router, BusError> {
        let router = Router::new();

        for def in &self.channels {
            debug!(name = def.name.as_str(), mode = ?def.mode, "installing channel");
            router.create_channel(&def.name, def.mode)?;
        }

        Ok(router)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_registers_every_declared_channel() {
        let router = BusTopology::new()
            .channel(ChannelDefinition::new("orders"))
            .channel(ChannelDefinition::new("messages").publish_subscribe())
            .install()
            .unwrap();

        // both names are taken now
        assert_eq!(
            router.create_channel("orders", ChannelMode::PointToPoint),
            Err(BusError::DuplicateChannel("orders".to_owned()))
        );
        assert_eq!(
            router.create_channel("messages", ChannelMode::PublishSubscribe),
            Err(BusError::DuplicateChannel("messages".to_owned()))
        );
    }

    #[test]
    fn install_rejects_duplicate_definitions() {
        let result = BusTopology::new()
            .channel(ChannelDefinition::new("orders"))
            .channel(ChannelDefinition::new("orders").publish_subscribe())
            .install();

        assert!(matches!(result, Err(BusError::DuplicateChannel(name)) if name == "orders"));
    }

    #[test]
    fn definitions_default_to_point_to_point() {
        let def = ChannelDefinition::new("orders");
        assert_eq!(def.mode, ChannelMode::PointToPoint);

        let def = def.publish_subscribe().point_to_point();
        assert_eq!(def.mode, ChannelMode::PointToPoint);
    }
}
