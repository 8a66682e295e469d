//! The `Node` instance: a `NodeType` plus its bookkeeping.

use super::flow_data::FlowData;
use super::ids::{NodeTypeId, SocketId};
use super::node_config::NodeConfigFlags;
use super::node_type::NodeType;
use super::property::NodeProperty;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// Scheduled to run on the next `prepare_list`.
        const TAGGED = 0b00001;
        /// Copied from `NodeConfigFlags::HAS_STATE` at construction.
        const STATE_NODE = 0b00010;
        /// Copied from `NodeConfigFlags::AUTO_TAG` at construction.
        const AUTO_TAG = 0b00100;
        /// Set when not every required input is connected.
        const NOT_FULLY_CONNECTED = 0b01000;
        /// Copied from `NodeConfigFlags::OVERRIDES_TIME_COMPUTATION`.
        const OVERRIDES_TIME_COMP = 0b10000;
        /// User-toggled; disabled nodes are never executable.
        const DISABLED = 0b100000;
    }
}

/// One instance in the tree: a boxed `NodeType` plus the bookkeeping the
/// tree needs without downcasting into it (name, output slots, timing,
/// flags). A default-constructed `Node` is the sentinel value occupying a
/// free (deallocated) slot.
pub struct Node {
    pub node_type_id: NodeTypeId,
    pub name: String,
    pub node_type: Option<Box<dyn NodeType>>,
    pub outputs: Vec<FlowData>,
    /// Current value of each of this node's properties, indexed by
    /// `PropertyId`, seeded from the config's declared defaults at
    /// construction. This is the tree's own storage and the
    /// authoritative source `NodeTree::node_property_value` reads back —
    /// it round-trips for every registered type whether or not that
    /// type's `NodeType` impl also mirrors the value into its own fields
    /// for fast access during `execute` (see `node_type.rs`).
    pub properties: Vec<NodeProperty>,
    pub flags: NodeFlags,
    pub last_time_ms: f64,
    pub last_message: String,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            node_type_id: NodeTypeId::INVALID,
            name: String::new(),
            node_type: None,
            outputs: Vec::new(),
            properties: Vec::new(),
            flags: NodeFlags::empty(),
            last_time_ms: 0.0,
            last_message: String::new(),
        }
    }
}

impl Node {
    pub fn new(node_type_id: NodeTypeId, name: String, node_type: Box<dyn NodeType>) -> Self {
        let config_flags = node_type.config().flags();
        let num_outputs = node_type.config().outputs().len();
        let properties = node_type
            .config()
            .properties()
            .iter()
            .map(|p| p.default_value.clone())
            .collect();
        let mut flags = NodeFlags::TAGGED;
        if config_flags.contains(NodeConfigFlags::HAS_STATE) {
            flags |= NodeFlags::STATE_NODE;
        }
        if config_flags.contains(NodeConfigFlags::AUTO_TAG) {
            flags |= NodeFlags::AUTO_TAG;
        }
        if config_flags.contains(NodeConfigFlags::OVERRIDES_TIME_COMPUTATION) {
            flags |= NodeFlags::OVERRIDES_TIME_COMP;
        }
        Self {
            node_type_id,
            name,
            node_type: Some(node_type),
            outputs: (0..num_outputs).map(|_| FlowData::Invalid).collect(),
            properties,
            flags,
            last_time_ms: 0.0,
            last_message: String::new(),
        }
    }

    /// Whether this slot currently holds a live node.
    pub fn is_valid(&self) -> bool {
        self.node_type.is_some()
    }

    pub fn is_tagged(&self) -> bool {
        self.flags.contains(NodeFlags::TAGGED)
    }

    pub fn tag(&mut self) {
        self.flags.insert(NodeFlags::TAGGED);
    }

    pub fn untag(&mut self) {
        self.flags.remove(NodeFlags::TAGGED);
    }

    pub fn is_disabled(&self) -> bool {
        self.flags.contains(NodeFlags::DISABLED)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.flags.set(NodeFlags::DISABLED, !enabled);
    }

    pub fn is_state_node(&self) -> bool {
        self.flags.contains(NodeFlags::STATE_NODE)
    }

    pub fn has_auto_tag(&self) -> bool {
        self.flags.contains(NodeFlags::AUTO_TAG)
    }

    pub fn overrides_time_computation(&self) -> bool {
        self.flags.contains(NodeFlags::OVERRIDES_TIME_COMP)
    }

    pub fn set_not_fully_connected(&mut self, value: bool) {
        self.flags.set(NodeFlags::NOT_FULLY_CONNECTED, value);
    }

    pub fn is_not_fully_connected(&self) -> bool {
        self.flags.contains(NodeFlags::NOT_FULLY_CONNECTED)
    }

    pub fn config(&self) -> Option<&super::node_config::NodeConfig> {
        self.node_type.as_ref().map(|nt| nt.config())
    }

    pub fn validate_socket(&self, socket: SocketId, is_output: bool) -> bool {
        match &self.node_type {
            None => false,
            Some(nt) => {
                let config = nt.config();
                if is_output {
                    config.output(socket).is_some()
                } else {
                    config.input(socket).is_some()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_graph::flow_data::FlowDataKind;
    use crate::node_graph::node_config::NodeConfig;
    use crate::node_graph::node_type::{ExecutionStatus, SocketReader, SocketWriter};

    struct StubNode {
        config: NodeConfig,
    }

    impl NodeType for StubNode {
        fn execute(&mut self, _reader: &SocketReader, _writer: &mut SocketWriter) -> ExecutionStatus {
            ExecutionStatus::ok()
        }

        fn config(&self) -> &NodeConfig {
            &self.config
        }
    }

    fn stub_node(flags: NodeConfigFlags) -> Node {
        let config = NodeConfig::builder()
            .output("out", FlowDataKind::Image)
            .flags(flags)
            .build()
            .unwrap();
        Node::new(NodeTypeId(1), "n".into(), Box::new(StubNode { config }))
    }

    #[test]
    fn new_node_is_tagged_by_default() {
        let node = stub_node(NodeConfigFlags::empty());
        assert!(node.is_tagged());
        assert!(node.is_valid());
    }

    #[test]
    fn config_flags_copy_onto_node_flags() {
        let node = stub_node(NodeConfigFlags::HAS_STATE | NodeConfigFlags::AUTO_TAG);
        assert!(node.is_state_node());
        assert!(node.has_auto_tag());
        assert!(!node.overrides_time_computation());
    }

    #[test]
    fn default_node_is_invalid_sentinel() {
        let node = Node::default();
        assert!(!node.is_valid());
    }

    #[test]
    fn output_slots_sized_to_config() {
        let node = stub_node(NodeConfigFlags::empty());
        assert_eq!(node.outputs.len(), 1);
    }

    #[test]
    fn disabling_sets_flag() {
        let mut node = stub_node(NodeConfigFlags::empty());
        assert!(!node.is_disabled());
        node.set_enabled(false);
        assert!(node.is_disabled());
        node.set_enabled(true);
        assert!(!node.is_disabled());
    }
}
