//! Batch and step execution (§4.4): both drive the same per-node logic
//! over the list `prepare_list` produces. The batch form runs it to
//! completion; the step form exposes one node at a time so a caller can
//! interleave UI work between them.

use std::cell::RefCell;
use std::time::Instant;

use super::errors::{ExecutionError, TreeError};
use super::flow_data::{FlowData, FlowDataKind};
use super::ids::{NodeId, SocketId};
use super::node_type::{SocketReader, SocketWriter, Status, Tracer};
use super::tree::NodeTree;

/// Message attached to the `ExecutionError` raised when a `HasState`
/// node's `restart()` returns `false` during an `execute(with_init: true)`.
pub const NODE_RESTART_FAILED_MESSAGE: &str = "Error during node state restart";

/// Runs one node from `tree`'s execute-list: binds its reader/writer,
/// calls `restart()` first if this is an initializing run of a state
/// node, measures (or takes the self-reported) wall-clock time, and
/// dispatches on the returned `Status`.
///
/// The node's own `outputs` and `node_type` are moved out of the tree for
/// the duration of the call — this sidesteps holding a mutable borrow on
/// the node being executed at the same time as the immutable borrows on
/// every upstream node its inputs read from, which the borrow checker
/// can't otherwise see are disjoint.
fn run_one_node(tree: &mut NodeTree, id: NodeId, with_init: bool) -> Result<(), ExecutionError> {
    let node_name = tree.node_name(id).unwrap_or_default();
    let node_type_name = tree.node_type_name(id).unwrap_or_default();

    let (input_kinds, output_kinds, is_state_node, overrides_time) = {
        let node = tree.node(id).ok_or_else(|| {
            ExecutionError::from_tree_error(&TreeError::BadNode(id), &node_name, &node_type_name)
        })?;
        let config = node.config().ok_or_else(|| {
            ExecutionError::new(&node_name, &node_type_name, "node has no type bound")
        })?;
        (
            config.inputs().iter().map(|s| s.kind).collect::<Vec<_>>(),
            config.outputs().iter().map(|s| s.kind).collect::<Vec<_>>(),
            node.is_state_node(),
            node.overrides_time_computation(),
        )
    };

    let mut node_type = tree
        .node_mut(id)
        .and_then(|n| n.node_type.take())
        .ok_or_else(|| ExecutionError::new(&node_name, &node_type_name, "node has no type bound"))?;

    if with_init && is_state_node && !node_type.restart() {
        if let Some(node) = tree.node_mut(id) {
            node.node_type = Some(node_type);
        }
        return Err(ExecutionError::new(
            &node_name,
            &node_type_name,
            NODE_RESTART_FAILED_MESSAGE,
        ));
    }

    let mut local_outputs = match tree.node_mut(id) {
        Some(node) => std::mem::take(&mut node.outputs),
        None => {
            if let Some(node) = tree.node_mut(id) {
                node.node_type = Some(node_type);
            }
            return Err(ExecutionError::new(&node_name, &node_type_name, "node vanished mid-execution"));
        }
    };

    let inputs: Result<Vec<&FlowData>, TreeError> = (0..input_kinds.len())
        .map(|i| tree.input_socket(id, SocketId(i as u8)))
        .collect();
    let inputs = match inputs {
        Ok(inputs) => inputs,
        Err(err) => {
            if let Some(node) = tree.node_mut(id) {
                node.node_type = Some(node_type);
                node.outputs = local_outputs;
            }
            return Err(ExecutionError::from_tree_error(&err, &node_name, &node_type_name));
        }
    };

    let tracer = RefCell::new(Tracer::default());
    let reader = SocketReader::with_declared_kinds(id, inputs, &input_kinds, &tracer);
    let mut writer = SocketWriter::with_declared_kinds(id, &mut local_outputs, &output_kinds, &tracer);

    let start = Instant::now();
    let status = node_type.execute(&reader, &mut writer);
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    let last_tree_error = tracer.borrow().last_error.clone();
    drop(reader);
    drop(writer);

    let time_ms = if overrides_time { status.time_ms } else { elapsed_ms };

    let node = tree
        .node_mut(id)
        .expect("node slot still occupied: execute never removes the node it runs");
    node.node_type = Some(node_type);
    node.outputs = local_outputs;
    node.last_time_ms = time_ms;
    node.last_message = status.message.clone();
    node.untag();

    match status.status {
        Status::Ok => Ok(()),
        Status::Tag => {
            node.tag();
            Ok(())
        }
        Status::Error => {
            node.tag();
            // A `TreeError` raised by `reader.read`/`writer.write` and
            // folded into `status.message` via `.into()` is recovered
            // here from the tracer and re-translated structurally
            // (§7, §8.13) rather than re-wrapping the flattened string.
            let err = match last_tree_error {
                Some(tree_err) => ExecutionError::from_tree_error(&tree_err, &node_name, &node_type_name),
                None => ExecutionError::new(&node_name, &node_type_name, status.message),
            };
            Err(err)
        }
    }
}

impl NodeTree {
    /// Batch execution (§4.4.1): recompute the execute-list if dirty, run
    /// every node in order, stop at the first `ExecutionError`. Whether
    /// the run completes or aborts early, `execute_list_dirty` ends up
    /// `true` — the next `prepare_list` always recomputes from scratch
    /// rather than trusting the cache to reflect whatever retagging just
    /// happened (documented open question, §9).
    pub fn execute(&mut self, with_init: bool) -> Result<(), ExecutionError> {
        let list = self.prepare_list();
        for id in list {
            if let Err(err) = run_one_node(self, id, with_init) {
                self.execute_list_dirty = true;
                return Err(err);
            }
        }
        self.execute_list_dirty = true;
        Ok(())
    }

    /// Called when a streaming session stops: `finish()` on every live
    /// node, then re-tag every `AutoTag` node so the next `execute` picks
    /// them back up.
    pub fn notify_finish(&mut self) {
        let ids: Vec<NodeId> = self.node_ids().collect();
        for id in &ids {
            if let Some(node) = self.node_mut(*id) {
                if let Some(node_type) = node.node_type.as_mut() {
                    node_type.finish();
                }
            }
        }
        for id in &ids {
            if let Some(node) = self.node_mut(*id) {
                if node.has_auto_tag() {
                    node.tag();
                }
            }
        }
        self.execute_list_dirty = true;
    }

    /// Step execution (§4.4.2): the execute-list is fixed once, at
    /// construction, by recomputing `prepare_list` — `do_work` then walks
    /// it one node per call without re-querying the tree's dirty bit.
    pub fn create_node_executor(&mut self, with_init: bool) -> StepExecutor<'_> {
        let list = self.prepare_list();
        StepExecutor {
            tree: self,
            with_init,
            list,
            cursor: 0,
        }
    }
}

/// Drives one node of a fixed execute-list per `do_work` call. Dropping
/// it — whether the list ran to completion or was abandoned partway —
/// marks the tree's execute-list dirty (§4.4.2), matching `execute`'s own
/// unconditional dirtying.
pub struct StepExecutor<'a> {
    tree: &'a mut NodeTree,
    with_init: bool,
    list: Vec<NodeId>,
    cursor: usize,
}

impl<'a> StepExecutor<'a> {
    /// The node `do_work` will run next, or `None` if the list is spent.
    pub fn current_node(&self) -> Option<NodeId> {
        self.list.get(self.cursor).copied()
    }

    pub fn has_work(&self) -> bool {
        self.cursor < self.list.len()
    }

    /// Runs `current_node()` and advances the cursor. `with_init` only
    /// applies to the first call — later ones pass `false`, matching
    /// `restart()`'s "once per streaming session" contract.
    pub fn do_work(&mut self) -> Result<(), ExecutionError> {
        let Some(id) = self.current_node() else {
            return Ok(());
        };
        let with_init = self.with_init && self.cursor == 0;
        let result = run_one_node(self.tree, id, with_init);
        self.cursor += 1;
        result
    }
}

impl<'a> Drop for StepExecutor<'a> {
    fn drop(&mut self) {
        self.tree.execute_list_dirty = true;
    }
}
