//! The computation graph engine (§1–§9): typed sockets, the node
//! type/config contract, the graph itself, the topological scheduler, the
//! executor, the resolver, and the JSON serializer.

pub mod errors;
pub mod executor;
pub mod flow_data;
pub mod ids;
pub mod node;
pub mod node_config;
pub mod node_type;
pub mod property;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod serializer;
pub mod tree;

pub use errors::{ExecutionError, LatticeGraphError, LinkResult, SerializerError, TreeError};
pub use executor::{StepExecutor, NODE_RESTART_FAILED_MESSAGE};
pub use flow_data::{DeviceImageBuffer, FlowData, FlowDataKind, ImageBuffer, Keypoint, Match};
pub use ids::{NodeId, NodeTypeId, PropertyId, SocketAddress, SocketId};
pub use node::{Node, NodeFlags};
pub use node_config::{NodeConfig, NodeConfigBuilder, NodeConfigFlags, SocketConfig};
pub use node_type::{ExecutionStatus, NodeType, SocketReader, SocketWriter, Status, Tracer};
pub use property::{
    validators, Matrix3x3, NodeProperty, PropertyConfig, PropertyKind, PropertyObserver,
    PropertyValidator, UiHint, MATRIX3X3_IDENTITY, MATRIX3X3_ZERO,
};
pub use registry::{ModuleHandle, NodeFactory, NodeSystem};
pub use resolver::{resolve_uri, ResolvedUri};
pub use serializer::{deserialize, serialize, Serializer};
pub use tree::{NodeLink, NodeTree};
