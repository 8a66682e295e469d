//! Lattice core library
//!
//! A computation graph engine for an interactive, node-based data
//! processing application: typed sockets, a graph of linked node
//! instances, a topological scheduler, batch/step executors, and a JSON
//! serializer. Concrete node behaviors, the GUI, and plugin discovery on
//! disk are external collaborators; this crate only defines the
//! interfaces they consume.

pub mod node_graph;

pub use node_graph::{LatticeGraphError, NodeSystem, NodeTree};
