//! The external-facing contract a concrete node type implements, and the
//! reader/writer/tracer plumbing the engine threads through `execute`.

use super::errors::TreeError;
use super::flow_data::{FlowData, FlowDataKind};
use super::ids::{NodeId, SocketId};
use super::node_config::NodeConfig;
use super::registry::ModuleHandle;
use std::sync::Arc;

/// Outcome of one `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
    Tag,
}

/// `{ status, time_ms, message }` returned by `execute`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionStatus {
    pub status: Status,
    pub time_ms: f64,
    pub message: String,
}

impl ExecutionStatus {
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            time_ms: 0.0,
            message: String::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            time_ms: 0.0,
            message: message.into(),
        }
    }

    pub fn tag() -> Self {
        Self {
            status: Status::Tag,
            time_ms: 0.0,
            message: String::new(),
        }
    }

    pub fn with_time_ms(mut self, time_ms: f64) -> Self {
        self.time_ms = time_ms;
        self
    }
}

/// Lets a node author propagate a `reader.read`/`writer.acquire` failure
/// with `return err.into()` instead of hand-formatting an error status.
/// The plain-string message here is a fallback only: the reader/writer
/// that raised `err` already recorded it on the shared `Tracer`, and the
/// executor prefers that structured copy over this one when translating
/// a `Status::Error` into an `ExecutionError` (§7, §8.13).
impl From<TreeError> for ExecutionStatus {
    fn from(err: TreeError) -> Self {
        ExecutionStatus::error(err.to_string())
    }
}

/// Records the `(socket, is_output)` of the last read/write, and the last
/// `TreeError` a read or write raised, so the executor can recover the
/// structured failure behind a node's `Status::Error` and route it
/// through `ExecutionError::from_tree_error` (§7, §8.13) instead of
/// re-wrapping whatever string `execute` happened to report.
#[derive(Debug, Clone, Default)]
pub struct Tracer {
    pub node: Option<NodeId>,
    pub socket: Option<SocketId>,
    pub is_output: Option<bool>,
    pub last_error: Option<TreeError>,
}

impl Tracer {
    pub fn record(&mut self, node: NodeId, socket: SocketId, is_output: bool) {
        self.node = Some(node);
        self.socket = Some(socket);
        self.is_output = Some(is_output);
    }

    pub fn record_error(&mut self, err: TreeError) {
        self.last_error = Some(err);
    }
}

/// Bound to one node's inputs for the duration of one `execute` call.
/// `declared_kinds` carries each input socket's declared `FlowDataKind`, in
/// socket-id order, so `read` can type-check the fetched value against it.
pub struct SocketReader<'a> {
    node: NodeId,
    num_inputs: usize,
    inputs: Vec<&'a FlowData>,
    declared_kinds: &'a [FlowDataKind],
    tracer: &'a std::cell::RefCell<Tracer>,
}

impl<'a> SocketReader<'a> {
    pub fn new(
        node: NodeId,
        num_inputs: usize,
        inputs: Vec<&'a FlowData>,
        tracer: &'a std::cell::RefCell<Tracer>,
    ) -> Self {
        Self {
            node,
            num_inputs,
            inputs,
            declared_kinds: &[],
            tracer,
        }
    }

    /// Like [`Self::new`], but also type-checks every read against the
    /// socket's declared kind (§3.2's convertibility rules).
    pub fn with_declared_kinds(
        node: NodeId,
        inputs: Vec<&'a FlowData>,
        declared_kinds: &'a [FlowDataKind],
        tracer: &'a std::cell::RefCell<Tracer>,
    ) -> Self {
        Self {
            node,
            num_inputs: inputs.len(),
            inputs,
            declared_kinds,
            tracer,
        }
    }

    /// Out-of-range raises `BadSocket` (§4.1 point 1). The tracer is
    /// updated before the value is returned (point 2). An unconnected
    /// input's process-wide empty `FlowData` (kind `Invalid`) is exempt
    /// from the kind check: it signals "nothing to read", not a type
    /// error (§4.2). Any other kind mismatch against the socket's
    /// declared kind raises `BadConnection` (§3.2).
    pub fn read(&self, socket_id: SocketId) -> Result<&'a FlowData, TreeError> {
        if socket_id.0 as usize >= self.num_inputs {
            let err = TreeError::BadSocket {
                node: self.node,
                socket: socket_id,
            };
            self.tracer.borrow_mut().record_error(err.clone());
            return Err(err);
        }
        self.tracer.borrow_mut().record(self.node, socket_id, false);
        let value = self.inputs[socket_id.0 as usize];
        if let Some(declared) = self.declared_kinds.get(socket_id.0 as usize) {
            if value.kind() != FlowDataKind::Invalid && !value.is_convertible(*declared) {
                let err = TreeError::BadConnection {
                    node: self.node,
                    socket: socket_id,
                    is_output: false,
                };
                self.tracer.borrow_mut().record_error(err.clone());
                return Err(err);
            }
        }
        Ok(value)
    }
}

/// Bound to one node's outputs for the duration of one `execute` call.
pub struct SocketWriter<'a> {
    node: NodeId,
    outputs: &'a mut [FlowData],
    declared_kinds: &'a [FlowDataKind],
    tracer: &'a std::cell::RefCell<Tracer>,
}

impl<'a> SocketWriter<'a> {
    pub fn new(
        node: NodeId,
        outputs: &'a mut [FlowData],
        tracer: &'a std::cell::RefCell<Tracer>,
    ) -> Self {
        Self {
            node,
            outputs,
            declared_kinds: &[],
            tracer,
        }
    }

    pub fn with_declared_kinds(
        node: NodeId,
        outputs: &'a mut [FlowData],
        declared_kinds: &'a [FlowDataKind],
        tracer: &'a std::cell::RefCell<Tracer>,
    ) -> Self {
        Self {
            node,
            outputs,
            declared_kinds,
            tracer,
        }
    }

    /// Raw mutable access to the slot (§4.1 point 3: "the caller mutates
    /// the underlying slot in place"). Out-of-range raises `BadSocket`.
    pub fn acquire(&mut self, socket_id: SocketId) -> Result<&mut FlowData, TreeError> {
        if socket_id.0 as usize >= self.outputs.len() {
            let err = TreeError::BadSocket {
                node: self.node,
                socket: socket_id,
            };
            self.tracer.borrow_mut().record_error(err.clone());
            return Err(err);
        }
        self.tracer.borrow_mut().record(self.node, socket_id, true);
        Ok(&mut self.outputs[socket_id.0 as usize])
    }

    /// Convenience over `acquire` that also checks the written value's
    /// kind against the socket's declared kind before storing it. A
    /// mismatch here is a `NodeType` authoring bug rather than a wiring
    /// problem (§7's `BadConfig`), but is raised as the same
    /// `BadConnection{is_output: true}` the executor folds into
    /// `ExecutionError` with write-specific wording.
    pub fn write(&mut self, socket_id: SocketId, value: FlowData) -> Result<(), TreeError> {
        if let Some(declared) = self.declared_kinds.get(socket_id.0 as usize) {
            if value.kind() != FlowDataKind::Invalid && !value.is_convertible(*declared) {
                let err = TreeError::BadConnection {
                    node: self.node,
                    socket: socket_id,
                    is_output: true,
                };
                self.tracer.borrow_mut().record_error(err.clone());
                return Err(err);
            }
        }
        *self.acquire(socket_id)? = value;
        Ok(())
    }
}

/// The trait every concrete node type implements. Concrete implementations
/// live either in-engine (see `lattice-stdnodes`) or in a loaded plugin.
pub trait NodeType: Send + Sync {
    fn execute(&mut self, reader: &SocketReader, writer: &mut SocketWriter) -> ExecutionStatus;

    /// Called once per streaming session start for `HasState` nodes.
    /// Default: success.
    fn restart(&mut self) -> bool {
        true
    }

    /// Called when streaming stops; default: no-op.
    fn finish(&mut self) {}

    /// Called once at node creation if the config's module tag is
    /// non-empty. Default: no module required, so this is never called
    /// unless the config names one.
    fn init(&mut self, _module: &Arc<dyn ModuleHandle>) -> bool {
        false
    }

    fn config(&self) -> &NodeConfig;

    /// Current value of the given property. The engine only calls this
    /// with an id already validated against `config()`. Default
    /// implementation answers with the config's declared default, which
    /// is correct for node types that never override a property after
    /// construction; stateful node types that let `execute` mutate a
    /// property's effective value should override this.
    fn property_value(&self, id: super::ids::PropertyId) -> Option<super::property::NodeProperty> {
        self.config().property(id).map(|p| p.default_value.clone())
    }

    /// Stores an already-validated property value. Default
    /// implementation is a no-op; node types with mutable properties
    /// override this to actually store the value their `execute` reads.
    fn set_property_value(
        &mut self,
        _id: super::ids::PropertyId,
        _value: super::property::NodeProperty,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_graph::flow_data::FlowData;
    use std::cell::RefCell;

    #[test]
    fn reader_rejects_out_of_range_socket() {
        let empty = FlowData::Invalid;
        let tracer = RefCell::new(Tracer::default());
        let reader = SocketReader::new(NodeId(0), 1, vec![&empty], &tracer);
        assert!(reader.read(SocketId(0)).is_ok());
        assert!(matches!(
            reader.read(SocketId(5)),
            Err(TreeError::BadSocket { .. })
        ));
    }

    #[test]
    fn reader_updates_tracer_on_read() {
        let empty = FlowData::Invalid;
        let tracer = RefCell::new(Tracer::default());
        let reader = SocketReader::new(NodeId(2), 1, vec![&empty], &tracer);
        reader.read(SocketId(0)).unwrap();
        let t = tracer.borrow();
        assert_eq!(t.node, Some(NodeId(2)));
        assert_eq!(t.is_output, Some(false));
    }

    #[test]
    fn writer_updates_tracer_on_write() {
        let mut outputs = vec![FlowData::Invalid];
        let tracer = RefCell::new(Tracer::default());
        let mut writer = SocketWriter::new(NodeId(3), &mut outputs, &tracer);
        writer.acquire(SocketId(0)).unwrap();
        let t = tracer.borrow();
        assert_eq!(t.is_output, Some(true));
    }

    #[test]
    fn writer_rejects_out_of_range_socket() {
        let mut outputs = vec![FlowData::Invalid];
        let tracer = RefCell::new(Tracer::default());
        let mut writer = SocketWriter::new(NodeId(0), &mut outputs, &tracer);
        assert!(matches!(
            writer.acquire(SocketId(1)),
            Err(TreeError::BadSocket { .. })
        ));
    }

    #[test]
    fn reader_exempts_the_unconnected_empty_sentinel_from_kind_checks() {
        let empty = FlowData::Invalid;
        let tracer = RefCell::new(Tracer::default());
        let kinds = [crate::node_graph::flow_data::FlowDataKind::Array];
        let reader = SocketReader::with_declared_kinds(NodeId(0), vec![&empty], &kinds, &tracer);
        assert!(reader.read(SocketId(0)).is_ok());
    }

    #[test]
    fn reader_rejects_unconvertible_kind_mismatch() {
        use crate::node_graph::flow_data::FlowDataKind;
        let value = FlowData::Array(vec![1.0]);
        let tracer = RefCell::new(Tracer::default());
        let kinds = [FlowDataKind::Keypoints];
        let reader = SocketReader::with_declared_kinds(NodeId(1), vec![&value], &kinds, &tracer);
        assert!(matches!(
            reader.read(SocketId(0)),
            Err(TreeError::BadConnection { is_output: false, .. })
        ));
    }

    #[test]
    fn writer_write_rejects_mismatched_kind() {
        use crate::node_graph::flow_data::FlowDataKind;
        let mut outputs = vec![FlowData::Invalid];
        let tracer = RefCell::new(Tracer::default());
        let kinds = [FlowDataKind::Keypoints];
        let mut writer = SocketWriter::with_declared_kinds(NodeId(2), &mut outputs, &kinds, &tracer);
        let result = writer.write(SocketId(0), FlowData::Array(vec![1.0]));
        assert!(matches!(
            result,
            Err(TreeError::BadConnection { is_output: true, .. })
        ));
    }

    #[test]
    fn tree_error_converts_into_error_status() {
        let status: ExecutionStatus = TreeError::BadNode(NodeId(9)).into();
        assert_eq!(status.status, Status::Error);
        assert!(status.message.contains("9"));
    }
}
