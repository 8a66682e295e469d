//! Immutable per-node-type descriptor: sockets, properties, flags.

use std::collections::HashSet;

use super::errors::TreeError;
use super::flow_data::FlowDataKind;
use super::ids::{PropertyId, SocketId};
use super::property::PropertyConfig;

bitflags::bitflags! {
    /// Flags declared on a [`NodeConfig`] at registration time and copied
    /// onto each [`Node`](super::node::Node) instance at construction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeConfigFlags: u8 {
        /// The node keeps state across executions and must be `restart()`ed
        /// when a streaming session (re)starts.
        const HAS_STATE = 0b001;
        /// The node is re-tagged after every `notify_finish()` — typical
        /// for self-driving stream sources.
        const AUTO_TAG = 0b010;
        /// `ExecutionStatus::time_ms` reported by `execute()` replaces the
        /// wall-clock measurement instead of being ignored.
        const OVERRIDES_TIME_COMPUTATION = 0b100;
    }
}

/// Immutable descriptor of one input or output socket.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    pub id: SocketId,
    pub name: String,
    pub kind: FlowDataKind,
    pub description: String,
}

impl SocketConfig {
    pub fn new(id: SocketId, name: impl Into<String>, kind: FlowDataKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Immutable (per node-type instance) description of a node: its input and
/// output sockets, its properties, and its flags. Built once at
/// registration time and shared by every [`Node`](super::node::Node) of
/// that type.
#[derive(Debug)]
pub struct NodeConfig {
    inputs: Vec<SocketConfig>,
    outputs: Vec<SocketConfig>,
    properties: Vec<PropertyConfig>,
    description: String,
    module: Option<String>,
    flags: NodeConfigFlags,
}

impl NodeConfig {
    pub fn builder() -> NodeConfigBuilder {
        NodeConfigBuilder::default()
    }

    pub fn inputs(&self) -> &[SocketConfig] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[SocketConfig] {
        &self.outputs
    }

    pub fn properties(&self) -> &[PropertyConfig] {
        &self.properties
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn flags(&self) -> NodeConfigFlags {
        self.flags
    }

    pub fn has_flag(&self, flag: NodeConfigFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn input(&self, id: SocketId) -> Option<&SocketConfig> {
        self.inputs.get(id.0 as usize)
    }

    pub fn output(&self, id: SocketId) -> Option<&SocketConfig> {
        self.outputs.get(id.0 as usize)
    }

    pub fn property(&self, id: PropertyId) -> Option<&PropertyConfig> {
        if id.0 < 0 {
            return None;
        }
        self.properties.get(id.0 as usize)
    }

    pub fn property_by_name(&self, name: &str) -> Option<&PropertyConfig> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn input_by_name(&self, name: &str) -> Option<&SocketConfig> {
        self.inputs.iter().find(|s| s.name == name)
    }

    pub fn output_by_name(&self, name: &str) -> Option<&SocketConfig> {
        self.outputs.iter().find(|s| s.name == name)
    }
}

#[derive(Default)]
pub struct NodeConfigBuilder {
    inputs: Vec<(String, FlowDataKind, String)>,
    outputs: Vec<(String, FlowDataKind, String)>,
    properties: Vec<PropertyConfig>,
    description: String,
    module: Option<String>,
    flags: NodeConfigFlags,
}

impl NodeConfigBuilder {
    pub fn input(mut self, name: impl Into<String>, kind: FlowDataKind) -> Self {
        self.inputs.push((name.into(), kind, String::new()));
        self
    }

    pub fn output(mut self, name: impl Into<String>, kind: FlowDataKind) -> Self {
        self.outputs.push((name.into(), kind, String::new()));
        self
    }

    pub fn property(mut self, mut config: PropertyConfig) -> Self {
        config.id = PropertyId(self.properties.len() as i8);
        self.properties.push(config);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn flags(mut self, flags: NodeConfigFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn build(self) -> Result<NodeConfig, TreeError> {
        let mut seen = HashSet::new();
        let inputs: Vec<SocketConfig> = self
            .inputs
            .into_iter()
            .enumerate()
            .map(|(i, (name, kind, description))| {
                if !seen.insert(name.clone()) {
                    return Err(TreeError::BadConfig {
                        reason: format!("duplicate input socket name '{name}'"),
                    });
                }
                Ok(SocketConfig {
                    id: SocketId(i as u8),
                    name,
                    kind,
                    description,
                })
            })
            .collect::<Result<_, _>>()?;

        seen.clear();
        let outputs: Vec<SocketConfig> = self
            .outputs
            .into_iter()
            .enumerate()
            .map(|(i, (name, kind, description))| {
                if !seen.insert(name.clone()) {
                    return Err(TreeError::BadConfig {
                        reason: format!("duplicate output socket name '{name}'"),
                    });
                }
                Ok(SocketConfig {
                    id: SocketId(i as u8),
                    name,
                    kind,
                    description,
                })
            })
            .collect::<Result<_, _>>()?;

        seen.clear();
        for prop in &self.properties {
            if !seen.insert(prop.name.clone()) {
                return Err(TreeError::BadConfig {
                    reason: format!("duplicate property name '{}'", prop.name),
                });
            }
        }

        Ok(NodeConfig {
            inputs,
            outputs,
            properties: self.properties,
            description: self.description,
            module: self.module,
            flags: self.flags,
        })
    }
}
