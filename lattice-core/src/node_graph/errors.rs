//! Error taxonomy for the graph engine, grounded on the layered
//! `thiserror` enums in [`crate::errors`].

use thiserror::Error;

use super::ids::{NodeId, NodeTypeId, PropertyId, SocketId};

/// Errors raised by [`NodeTree`](super::tree::NodeTree) operations that are
/// local to the tree (as opposed to [`LinkResult`], which is a first-class
/// return value for linking rather than an error).
#[derive(Debug, Error, PartialEq, Clone)]
pub enum TreeError {
    #[error("socket {socket} out of range on node {node}")]
    BadSocket { node: NodeId, socket: SocketId },

    #[error("node {0} does not refer to a live node")]
    BadNode(NodeId),

    #[error("invalid node config: {reason}")]
    BadConfig { reason: String },

    #[error("read/write with incompatible flow data kinds on node {node}, socket {socket} (output={is_output})")]
    BadConnection {
        node: NodeId,
        socket: SocketId,
        is_output: bool,
    },

    #[error("node type {0} is not registered")]
    UnknownNodeType(NodeTypeId),

    #[error("node name '{0}' already exists")]
    DuplicateName(String),

    #[error("node name '{0}' contains the forbidden '/' character")]
    InvalidName(String),

    #[error("property {0} does not refer to a known property")]
    BadProperty(PropertyId),
}

/// Returned by `link_nodes`/cycle-detection paths: not an error, a
/// first-class decision the caller branches on (mirrors
/// `original_source`'s `ELinkNodesResult`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkResult {
    Ok,
    InvalidAddress,
    TwoOutputsOnInput,
    CycleDetected,
}

impl LinkResult {
    pub fn is_ok(self) -> bool {
        matches!(self, LinkResult::Ok)
    }
}

/// Raised when a node signals `Error`, a restart fails, or an underlying
/// `TreeError` escapes `execute` and is translated at the executor
/// boundary per §7: "the executor treats any of {BadSocket, BadNode,
/// BadConfig, BadConnection, arbitrary unknown escape} as fatal for the
/// current node and converts them uniformly to ExecutionError".
#[derive(Debug, Error, Clone)]
#[error("node '{node_name}' (type '{node_type_name}'): {message}")]
pub struct ExecutionError {
    pub node_name: String,
    pub node_type_name: String,
    pub message: String,
}

impl ExecutionError {
    pub fn new(
        node_name: impl Into<String>,
        node_type_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            node_name: node_name.into(),
            node_type_name: node_type_name.into(),
            message: message.into(),
        }
    }

    /// Translate a `TreeError` escaping a node's `execute` into the
    /// uniform executor-boundary representation, per §7's translation
    /// rule: a `BadConnection` on a write (acquire-for-write) becomes
    /// `BadConfig`-flavored wording; anything else keeps its message.
    pub fn from_tree_error(
        err: &TreeError,
        node_name: impl Into<String>,
        node_type_name: impl Into<String>,
    ) -> Self {
        let message = match err {
            TreeError::BadConnection {
                is_output: true, ..
            } => format!("wrong socket connection (write): {err}"),
            TreeError::BadConnection { .. } => format!("wrong socket connection: {err}"),
            other => other.to_string(),
        };
        Self::new(node_name, node_type_name, message)
    }
}

/// Fatal failures during document (de)serialization, per §7.
#[derive(Debug, Error, Clone)]
pub enum SerializerError {
    #[error("malformed document: {reason}")]
    Malformed { reason: String },

    #[error("node creation failed for class '{class}' name '{name}': {reason}")]
    NodeCreationFailed {
        class: String,
        name: String,
        reason: String,
    },

    #[error("link endpoint refers to an unmapped node id {0}")]
    UnmappedNodeId(i64),

    #[error("link rejected while deserializing: {0:?}")]
    LinkRejected(LinkResult),

    #[error(transparent)]
    Io(#[from] std::sync::Arc<std::io::Error>),

    #[error(transparent)]
    Json(#[from] std::sync::Arc<serde_json::Error>),
}

/// Top-level error composing every cluster, mirroring the shape of
/// `crate::errors::ChimeraError`.
#[derive(Debug, Error, Clone)]
pub enum LatticeGraphError {
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("serializer error: {0}")]
    Serializer(#[from] SerializerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_connection_on_write_translates_with_write_wording() {
        let tree_err = TreeError::BadConnection {
            node: NodeId(1),
            socket: SocketId(0),
            is_output: true,
        };
        let exec_err = ExecutionError::from_tree_error(&tree_err, "Sink", "SinkType");
        assert!(exec_err.message.contains("write"));
        assert_eq!(exec_err.node_name, "Sink");
    }

    #[test]
    fn bad_connection_on_read_translates_without_write_wording() {
        let tree_err = TreeError::BadConnection {
            node: NodeId(1),
            socket: SocketId(0),
            is_output: false,
        };
        let exec_err = ExecutionError::from_tree_error(&tree_err, "Sink", "SinkType");
        assert!(!exec_err.message.contains("(write)"));
    }

    #[test]
    fn link_result_ok_only_for_ok_variant() {
        assert!(LinkResult::Ok.is_ok());
        assert!(!LinkResult::CycleDetected.is_ok());
    }
}
