//! The topological scheduler (§4.3): iterative tri-color DFS producing the
//! execute-list, plus the cycle-detection DFS reused by `link_nodes`.

use super::ids::NodeId;
use super::tree::NodeTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// One frame of the explicit DFS stack: the node being visited and the
/// `[cursor, end)` range into its sorted outgoing-link slice still to walk.
struct Frame {
    node: NodeId,
    cursor: usize,
    end: usize,
}

/// Iterative DFS from `start`. If `record` is `Some(list)`, every node that
/// goes Black during this call is appended to `list`. Returns `false` if a
/// Gray node is revisited (a cycle), in which case `colors` may have been
/// partially mutated — callers doing speculative cycle checks must not
/// reuse `colors` afterwards for anything but discarding.
fn depth_first_search(
    tree: &NodeTree,
    start: NodeId,
    colors: &mut [Color],
    record: Option<&mut Vec<NodeId>>,
) -> bool {
    let mut record = record;
    if colors[start.0 as usize] != Color::White {
        return true;
    }
    let mut stack = Vec::new();
    colors[start.0 as usize] = Color::Gray;
    let out = tree.out_links(start);
    stack.push(Frame {
        node: start,
        cursor: 0,
        end: out.len(),
    });

    while let Some(frame) = stack.last_mut() {
        if frame.cursor >= frame.end {
            let node = frame.node;
            colors[node.0 as usize] = Color::Black;
            if let Some(list) = record.as_deref_mut() {
                list.push(node);
            }
            stack.pop();
            continue;
        }

        let link = tree.out_links(frame.node)[frame.cursor];
        frame.cursor += 1;
        let target = link.to_node;

        match colors[target.0 as usize] {
            Color::White => {
                colors[target.0 as usize] = Color::Gray;
                let out = tree.out_links(target);
                stack.push(Frame {
                    node: target,
                    cursor: 0,
                    end: out.len(),
                });
            }
            Color::Gray => return false,
            Color::Black => {}
        }
    }

    true
}

/// Cycle check used both by `link_nodes` (speculative, discarded on any
/// outcome) and internally: DFS from `start` without recording; `true`
/// means a cycle was found.
pub(super) fn depth_first_search_cycle_check(tree: &NodeTree, start: NodeId) -> bool {
    let mut colors = vec![Color::White; tree.node_slot_count()];
    !depth_first_search(tree, start, &mut colors, None)
}

/// `prepare_list_impl` (§4.3): blacken the unexecutable closure, then DFS
/// from every tagged White node collecting into the execute-list, then
/// reverse it so producers precede consumers.
fn prepare_list_impl(tree: &NodeTree) -> Vec<NodeId> {
    let mut colors = vec![Color::White; tree.node_slot_count()];

    // Step 2: blacken every node that is not executable, and everything
    // reachable from it, without recording.
    for id in tree.node_ids() {
        if colors[id.0 as usize] == Color::White && !tree.is_node_executable(id) {
            depth_first_search(tree, id, &mut colors, None);
        }
    }

    // Step 3: DFS from every remaining tagged White node, recording.
    let mut execute_list = Vec::new();
    for id in tree.node_ids() {
        if colors[id.0 as usize] == Color::White && tree.node(id).is_some_and(|n| n.is_tagged()) {
            depth_first_search(tree, id, &mut colors, Some(&mut execute_list));
        }
    }

    execute_list.reverse();
    execute_list
}

impl NodeTree {
    fn node_slot_count(&self) -> usize {
        self.nodes.len()
    }

    /// If dirty, recompute and cache the execute-list, clearing the dirty
    /// bit; either way, return a copy of the cached list.
    pub fn prepare_list(&mut self) -> Vec<NodeId> {
        if self.execute_list_dirty {
            self.execute_list = prepare_list_impl(self);
            self.execute_list_dirty = false;
        }
        self.execute_list.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_graph::flow_data::FlowDataKind;
    use crate::node_graph::ids::{NodeTypeId, SocketAddress, SocketId};
    use crate::node_graph::node_config::NodeConfig;
    use crate::node_graph::node_type::{ExecutionStatus, NodeType, SocketReader, SocketWriter};
    use crate::node_graph::registry::{NodeFactory, NodeSystem};

    struct PassthroughNode {
        config: NodeConfig,
    }

    impl NodeType for PassthroughNode {
        fn execute(&mut self, _reader: &SocketReader, _writer: &mut SocketWriter) -> ExecutionStatus {
            ExecutionStatus::ok()
        }
        fn config(&self) -> &NodeConfig {
            &self.config
        }
    }

    struct PassthroughFactory;
    impl NodeFactory for PassthroughFactory {
        fn create(&self) -> Box<dyn NodeType> {
            Box::new(PassthroughNode {
                config: Self::config(),
            })
        }
        fn definition(&self) -> NodeConfig {
            Self::config()
        }
    }
    impl PassthroughFactory {
        fn config() -> NodeConfig {
            NodeConfig::builder()
                .input("in", FlowDataKind::Image)
                .output("out", FlowDataKind::Image)
                .build()
                .unwrap()
        }
    }

    fn new_tree() -> (NodeTree, NodeTypeId) {
        let system = NodeSystem::new();
        let type_id = system.register_node_type("Test/Passthrough", Box::new(PassthroughFactory));
        (NodeTree::new(system), type_id)
    }

    #[test]
    fn linear_chain_produces_producer_before_consumer_order() {
        let (mut tree, type_id) = new_tree();
        let a = tree.create_node(type_id, "A").unwrap();
        let b = tree.create_node(type_id, "B").unwrap();
        let c = tree.create_node(type_id, "C").unwrap();
        tree.link_nodes(
            SocketAddress::new(a, SocketId(0), true),
            SocketAddress::new(b, SocketId(0), false),
        );
        tree.link_nodes(
            SocketAddress::new(b, SocketId(0), true),
            SocketAddress::new(c, SocketId(0), false),
        );
        let list = tree.prepare_list();
        let pos = |id: NodeId| list.iter().position(|&x| x == id).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(b) < pos(c));
    }

    #[test]
    fn disabled_node_excluded_from_execute_list() {
        let (mut tree, type_id) = new_tree();
        let a = tree.create_node(type_id, "A").unwrap();
        tree.set_node_enabled(a, false).unwrap();
        let list = tree.prepare_list();
        assert!(!list.contains(&a));
    }

    #[test]
    fn node_missing_required_input_excluded() {
        let (mut tree, type_id) = new_tree();
        // A is unconnected and has a required input ("in"), so it's
        // excluded even though tagged.
        let a = tree.create_node(type_id, "A").unwrap();
        let list = tree.prepare_list();
        assert!(!list.contains(&a));
    }

    #[test]
    fn downstream_of_unexecutable_node_is_also_excluded() {
        let (mut tree, type_id) = new_tree();
        let a = tree.create_node(type_id, "A").unwrap();
        let b = tree.create_node(type_id, "B").unwrap();
        tree.link_nodes(
            SocketAddress::new(a, SocketId(0), true),
            SocketAddress::new(b, SocketId(0), false),
        );
        // a has an unconnected required input, so a is unexecutable and b
        // (which depends on it) must also be excluded.
        let list = tree.prepare_list();
        assert!(!list.contains(&a));
        assert!(!list.contains(&b));
    }

    #[test]
    fn disabling_every_node_in_a_chain_yields_empty_list() {
        let (mut tree, type_id) = new_tree();
        let a = tree.create_node(type_id, "A").unwrap();
        let b = tree.create_node(type_id, "B").unwrap();
        tree.link_nodes(
            SocketAddress::new(a, SocketId(0), true),
            SocketAddress::new(b, SocketId(0), false),
        );
        tree.set_node_enabled(a, false).unwrap();
        tree.set_node_enabled(b, false).unwrap();
        assert!(tree.prepare_list().is_empty());
    }

    #[test]
    fn prepare_list_clears_dirty_bit() {
        let (mut tree, type_id) = new_tree();
        tree.create_node(type_id, "A").unwrap();
        assert!(tree.execute_list_dirty);
        tree.prepare_list();
        assert!(!tree.execute_list_dirty);
    }
}
