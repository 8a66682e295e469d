//! The graph itself: slot-allocated nodes, sorted links, name index,
//! tag/dirty bookkeeping (C7). See `scheduler.rs` for `prepare_list` and
//! `executor.rs` for `execute`/the step executor — both are additional
//! `impl NodeTree` blocks over the storage defined here.

use std::collections::HashMap;

use super::errors::{LinkResult, TreeError};
use super::flow_data::FlowData;
use super::ids::{NodeId, NodeTypeId, PropertyId, SocketAddress, SocketId};
use super::node::Node;
use super::property::NodeProperty;
use super::registry::NodeSystem;

/// `{fromNode, fromSocket, toNode, toSocket}`. Strict total order:
/// lexicographic on the four fields. Immutable once inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeLink {
    pub from_node: NodeId,
    pub from_socket: SocketId,
    pub to_node: NodeId,
    pub to_socket: SocketId,
}

static EMPTY_FLOW_DATA: FlowData = FlowData::Invalid;

/// The graph: a dense `Vec<Node>` indexed by `NodeId`, a LIFO free-list of
/// recycled ids, the sorted link vector, a name index, and the scheduler's
/// cached execute-list with its dirty bit.
pub struct NodeTree {
    pub(super) nodes: Vec<Node>,
    pub(super) recycled_ids: Vec<u16>,
    pub(super) links: Vec<NodeLink>,
    pub(super) name_to_id: HashMap<String, NodeId>,
    pub(super) execute_list: Vec<NodeId>,
    pub(super) execute_list_dirty: bool,
    node_system: NodeSystem,
}

impl NodeTree {
    pub fn new(node_system: NodeSystem) -> Self {
        Self {
            nodes: Vec::new(),
            recycled_ids: Vec::new(),
            links: Vec::new(),
            name_to_id: HashMap::new(),
            execute_list: Vec::new(),
            execute_list_dirty: true,
            node_system,
        }
    }

    pub fn node_system(&self) -> &NodeSystem {
        &self.node_system
    }

    // -- id allocation (§4.2.1) -------------------------------------

    fn allocate_node_id(&mut self) -> NodeId {
        if let Some(id) = self.recycled_ids.pop() {
            NodeId(id)
        } else {
            self.nodes.push(Node::default());
            NodeId((self.nodes.len() - 1) as u16)
        }
    }

    fn deallocate_node_id(&mut self, id: NodeId) {
        if let Some(name) = self.node_name(id) {
            self.name_to_id.remove(&name);
        }
        self.nodes[id.0 as usize] = Node::default();
        self.recycled_ids.push(id.0);
    }

    // -- basic queries ------------------------------------------------

    pub fn is_valid_node(&self, id: NodeId) -> bool {
        id.is_valid()
            && (id.0 as usize) < self.nodes.len()
            && self.nodes[id.0 as usize].is_valid()
    }

    fn validate_node(&self, id: NodeId) -> Result<(), TreeError> {
        if self.is_valid_node(id) {
            Ok(())
        } else {
            Err(TreeError::BadNode(id))
        }
    }

    pub fn node_name(&self, id: NodeId) -> Option<String> {
        if self.is_valid_node(id) {
            Some(self.nodes[id.0 as usize].name.clone())
        } else {
            None
        }
    }

    pub fn node_type_id(&self, id: NodeId) -> Option<NodeTypeId> {
        if self.is_valid_node(id) {
            Some(self.nodes[id.0 as usize].node_type_id)
        } else {
            None
        }
    }

    pub fn node_type_name(&self, id: NodeId) -> Option<String> {
        self.node_type_id(id)
            .and_then(|tid| self.node_system.node_type_name(tid))
    }

    pub fn resolve_node(&self, name: &str) -> Option<NodeId> {
        self.name_to_id.get(name).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        if self.is_valid_node(id) {
            Some(&self.nodes[id.0 as usize])
        } else {
            None
        }
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.is_valid_node(id) {
            Some(&mut self.nodes[id.0 as usize])
        } else {
            None
        }
    }

    pub fn set_node_name(&mut self, id: NodeId, name: String) -> Result<(), TreeError> {
        self.validate_node(id)?;
        if name.contains('/') {
            return Err(TreeError::InvalidName(name));
        }
        if self.name_to_id.contains_key(&name) {
            return Err(TreeError::DuplicateName(name));
        }
        let old_name = self.nodes[id.0 as usize].name.clone();
        self.name_to_id.remove(&old_name);
        self.name_to_id.insert(name.clone(), id);
        self.nodes[id.0 as usize].name = name;
        Ok(())
    }

    // -- link-range queries (§4.2.2) -----------------------------------

    /// Half-open index range `[begin, end)` of links whose `from_node`
    /// equals `from`, located by linear probe over the sorted vector.
    pub(super) fn out_links_range(&self, from: NodeId) -> (usize, usize) {
        let begin = self
            .links
            .partition_point(|l| l.from_node < from);
        let end = self
            .links
            .partition_point(|l| l.from_node <= from);
        (begin, end)
    }

    pub(super) fn out_links(&self, from: NodeId) -> &[NodeLink] {
        let (begin, end) = self.out_links_range(from);
        &self.links[begin..end]
    }

    /// First index at or after `start` whose link originates at
    /// `(from, socket)`, or `links().len()` if none remains (§4.2.2).
    pub fn first_output_link(&self, from: NodeId, socket: SocketId, start: usize) -> usize {
        let (_, end) = self.out_links_range(from);
        for i in start..end {
            if self.links[i].from_node == from && self.links[i].from_socket == socket {
                return i;
            }
        }
        self.links.len()
    }

    // -- node CRUD (§4.2/§3.8) ------------------------------------------

    pub fn create_node(&mut self, type_id: NodeTypeId, name: &str) -> Result<NodeId, TreeError> {
        if name.contains('/') {
            return Err(TreeError::InvalidName(name.to_string()));
        }
        if self.name_to_id.contains_key(name) {
            return Err(TreeError::DuplicateName(name.to_string()));
        }
        let mut node_type = self
            .node_system
            .create(type_id)
            .ok_or(TreeError::UnknownNodeType(type_id))?;

        if let Some(module_name) = node_type.config().module().map(str::to_string) {
            let module = self
                .node_system
                .module(&module_name)
                .ok_or_else(|| TreeError::BadConfig {
                    reason: format!("module '{module_name}' not registered"),
                })?;
            if !module.ensure_initialized() {
                return Err(TreeError::BadConfig {
                    reason: format!("module '{module_name}' failed to initialize"),
                });
            }
            if !node_type.init(&module) {
                return Err(TreeError::BadConfig {
                    reason: format!("node init with module '{module_name}' failed"),
                });
            }
        }

        let id = self.allocate_node_id();
        self.nodes[id.0 as usize] = Node::new(type_id, name.to_string(), node_type);
        self.name_to_id.insert(name.to_string(), id);
        self.execute_list_dirty = true;
        Ok(id)
    }

    pub fn remove_node(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.validate_node(id)?;

        // Tag the downstream ends of every link originating at this node
        // BEFORE erasing links, per §3.8.
        let (begin, end) = self.out_links_range(id);
        let downstream: Vec<NodeId> = self.links[begin..end].iter().map(|l| l.to_node).collect();
        for target in downstream {
            if let Some(node) = self.node_mut(target) {
                node.tag();
            }
        }

        self.links
            .retain(|l| l.from_node != id && l.to_node != id);
        self.deallocate_node_id(id);
        self.execute_list_dirty = true;
        Ok(())
    }

    pub fn generate_node_name(&self, type_id: NodeTypeId) -> String {
        let base = self
            .node_system
            .node_type_name(type_id)
            .unwrap_or_else(|| "Node".to_string());
        let base = base.rsplit('/').next().unwrap_or(&base).to_string();
        if !self.name_to_id.contains_key(&base) {
            return base;
        }
        let mut counter = 1u32;
        loop {
            let candidate = format!("{base} [{counter}]");
            if !self.name_to_id.contains_key(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    pub fn duplicate_node(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        self.validate_node(id)?;
        let type_id = self.nodes[id.0 as usize].node_type_id;
        let name = self.generate_node_name(type_id);
        let new_id = self.create_node(type_id, &name)?;

        // Copy property values from the source; links are deliberately
        // NOT copied (documented open question (b), §9).
        let num_props = self.nodes[id.0 as usize]
            .config()
            .map(|c| c.properties().len())
            .unwrap_or(0);
        for i in 0..num_props {
            let prop_id = PropertyId(i as i8);
            if let Some(value) = self.property_value(id, prop_id) {
                let _ = self.node_set_property(new_id, prop_id, value);
            }
        }
        Ok(new_id)
    }

    /// Reads a property's current value from the tree's own generic
    /// per-node storage (`Node::properties`), not from the node type —
    /// this is what makes every registered type round-trip through
    /// `duplicate_node`/the serializer regardless of whether its
    /// `NodeType` impl also tracks the value itself.
    fn property_value(&self, id: NodeId, prop_id: PropertyId) -> Option<NodeProperty> {
        if prop_id.0 < 0 {
            return None;
        }
        self.node(id)?.properties.get(prop_id.0 as usize).cloned()
    }

    /// Public form of [`Self::property_value`], used by the serializer to
    /// read back a node's current properties for `serialize` (§4.5).
    pub fn node_property_value(&self, id: NodeId, prop_id: PropertyId) -> Option<NodeProperty> {
        self.property_value(id, prop_id)
    }

    // -- properties -----------------------------------------------------

    pub fn node_set_property(
        &mut self,
        id: NodeId,
        prop_id: PropertyId,
        value: NodeProperty,
    ) -> Result<bool, TreeError> {
        self.validate_node(id)?;
        let accepted = {
            let node = &self.nodes[id.0 as usize];
            let config = node.config().ok_or(TreeError::BadNode(id))?;
            let prop_config = config
                .property(prop_id)
                .ok_or(TreeError::BadProperty(prop_id))?;
            prop_config.validate(&value)
        };
        if accepted {
            let node = &mut self.nodes[id.0 as usize];
            if prop_id.0 >= 0 {
                if let Some(slot) = node.properties.get_mut(prop_id.0 as usize) {
                    *slot = value.clone();
                }
            }
            // Also mirrored into the node type itself: stateful types
            // (e.g. `ConstantSource`) keep their own typed field for
            // `execute` to read without going through `NodeProperty`.
            if let Some(node_type) = node.node_type.as_mut() {
                node_type.set_property_value(prop_id, value.clone());
            }
            node.config()
                .and_then(|c| c.property(prop_id))
                .unwrap()
                .notify(&value);
            node.tag();
        }
        Ok(accepted)
    }

    // -- tagging / enable ------------------------------------------------

    pub fn tag_node(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.node_mut(id).ok_or(TreeError::BadNode(id))?.tag();
        self.execute_list_dirty = true;
        Ok(())
    }

    pub fn untag_node(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.node_mut(id).ok_or(TreeError::BadNode(id))?.untag();
        self.execute_list_dirty = true;
        Ok(())
    }

    pub fn set_node_enabled(&mut self, id: NodeId, enabled: bool) -> Result<(), TreeError> {
        self.node_mut(id)
            .ok_or(TreeError::BadNode(id))?
            .set_enabled(enabled);
        self.execute_list_dirty = true;
        Ok(())
    }

    pub fn is_node_executable(&self, id: NodeId) -> bool {
        match self.node(id) {
            Some(node) => !node.is_disabled() && self.all_required_inputs_connected(id),
            None => false,
        }
    }

    pub fn is_tree_stateless(&self) -> bool {
        self.nodes.iter().all(|n| !n.is_valid() || !n.is_state_node())
    }

    pub fn tagged_but_not_executed(&self, id: NodeId) -> bool {
        match self.node(id) {
            Some(node) if node.is_tagged() => !self.execute_list.contains(&id),
            _ => false,
        }
    }

    // -- connectivity -----------------------------------------------------

    pub fn connected_from(&self, input: SocketAddress) -> Option<SocketAddress> {
        self.links
            .iter()
            .find(|l| l.to_node == input.node && l.to_socket == input.socket)
            .map(|l| SocketAddress::new(l.from_node, l.from_socket, true))
    }

    pub fn is_input_socket_connected(&self, node: NodeId, socket: SocketId) -> bool {
        self.links
            .iter()
            .any(|l| l.to_node == node && l.to_socket == socket)
    }

    pub fn is_output_socket_connected(&self, node: NodeId, socket: SocketId) -> bool {
        self.out_links(node)
            .iter()
            .any(|l| l.from_socket == socket)
    }

    pub fn all_required_inputs_connected(&self, id: NodeId) -> bool {
        let node = match self.node(id) {
            Some(n) => n,
            None => return false,
        };
        let config = match node.config() {
            Some(c) => c,
            None => return false,
        };
        (0..config.inputs().len())
            .all(|i| self.is_input_socket_connected(id, SocketId(i as u8)))
    }

    /// Returns the process-wide empty `FlowData` rather than raising when
    /// not every required input is connected, per §4.2: "this lets
    /// downstream nodes see 'nothing to read' rather than an error."
    pub fn output_socket(&self, node: NodeId, socket: SocketId) -> Result<&FlowData, TreeError> {
        self.validate_node(node)?;
        if !self.all_required_inputs_connected(node) {
            return Ok(&EMPTY_FLOW_DATA);
        }
        self.nodes[node.0 as usize]
            .outputs
            .get(socket.0 as usize)
            .ok_or(TreeError::BadSocket { node, socket })
    }

    pub fn input_socket(&self, node: NodeId, socket: SocketId) -> Result<&FlowData, TreeError> {
        self.validate_node(node)?;
        match self.connected_from(SocketAddress::new(node, socket, false)) {
            Some(addr) => self.output_socket(addr.node, addr.socket),
            None => Ok(&EMPTY_FLOW_DATA),
        }
    }

    // -- linking ----------------------------------------------------------

    fn validate_link(&self, from: SocketAddress, to: SocketAddress) -> (SocketAddress, SocketAddress, bool) {
        // Swap so `from` always ends up the output address, per §4.2.
        let (from, to) = if !from.is_output { (to, from) } else { (from, to) };
        let valid = from.is_output
            && !to.is_output
            && self
                .node(from.node)
                .is_some_and(|n| n.validate_socket(from.socket, true))
            && self
                .node(to.node)
                .is_some_and(|n| n.validate_socket(to.socket, false));
        (from, to, valid)
    }

    pub fn link_nodes(&mut self, from: SocketAddress, to: SocketAddress) -> LinkResult {
        if !from.is_valid() || !to.is_valid() {
            return LinkResult::InvalidAddress;
        }
        let (from, to, valid) = self.validate_link(from, to);
        if !valid {
            return LinkResult::InvalidAddress;
        }
        if self.is_input_socket_connected(to.node, to.socket) {
            return LinkResult::TwoOutputsOnInput;
        }

        let link = NodeLink {
            from_node: from.node,
            from_socket: from.socket,
            to_node: to.node,
            to_socket: to.socket,
        };
        let insert_at = self.links.partition_point(|l| *l < link);
        self.links.insert(insert_at, link);

        if self.check_cycle(to.node) {
            self.links.remove(insert_at);
            return LinkResult::CycleDetected;
        }

        self.nodes[to.node.0 as usize].tag();
        self.execute_list_dirty = true;
        LinkResult::Ok
    }

    pub fn unlink_nodes(&mut self, from: SocketAddress, to: SocketAddress) -> bool {
        let link = NodeLink {
            from_node: from.node,
            from_socket: from.socket,
            to_node: to.node,
            to_socket: to.socket,
        };
        let pos = self.links.partition_point(|l| *l < link);
        if pos < self.links.len() && self.links[pos] == link {
            self.links.remove(pos);
            if let Some(node) = self.node_mut(to.node) {
                node.tag();
            }
            self.execute_list_dirty = true;
            true
        } else {
            false
        }
    }

    pub fn links(&self) -> &[NodeLink] {
        &self.links
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_valid())
            .map(|(i, _)| NodeId(i as u16))
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.recycled_ids.clear();
        self.links.clear();
        self.name_to_id.clear();
        self.execute_list.clear();
        self.execute_list_dirty = true;
    }

    // Exposed for `scheduler.rs`'s cycle-detection path (used both at
    // `link_nodes` time and inside `prepare_list_impl`).
    pub(super) fn check_cycle(&self, start: NodeId) -> bool {
        super::scheduler::depth_first_search_cycle_check(self, start)
    }
}
