//! Type registry, module registry, and plugin loader (C5/C11/C12).
//!
//! Generalizes `chimera-core::node_graph::registry::NodeRegistryImpl`'s
//! `Arc<RwLock<HashMap<_, _>>>` factory map to also carry a `NodeTypeId`
//! index, a module registry, and ownership of loaded plugin libraries.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::ids::NodeTypeId;
use super::node_config::NodeConfig;
use super::node_type::NodeType;

/// Creates instances of one registered node type.
pub trait NodeFactory: Send + Sync {
    fn create(&self) -> Box<dyn NodeType>;
    fn definition(&self) -> NodeConfig;
}

/// A shared external collaborator (e.g. a GPU context) that a node type may
/// require before it can initialize (C11).
pub trait ModuleHandle: Send + Sync {
    fn initialize(&self) -> bool;
    fn ensure_initialized(&self) -> bool;
    fn name(&self) -> &str;
}

struct RegisteredType {
    qualified_name: String,
    factory: Box<dyn NodeFactory>,
}

/// Type registry keyed by stable numeric `NodeTypeId`; module registry;
/// plugin loader; node factory (C5).
///
/// Cheaply `Clone`-able: internal state lives behind `Arc<RwLock<_>>`, the
/// same pattern `NodeRegistryImpl` uses.
pub struct NodeSystem {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    types: HashMap<NodeTypeId, RegisteredType>,
    names: HashMap<String, NodeTypeId>,
    next_id: u16,
    modules: HashMap<String, Arc<dyn ModuleHandle>>,
    // Kept alive for the process lifetime: dropping a `Library` while
    // factories it produced are still reachable is undefined behavior.
    loaded_plugins: Vec<libloading::Library>,
}

impl Default for NodeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for NodeSystem {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl NodeSystem {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                next_id: 1, // 0 is InvalidNodeTypeID
                ..Default::default()
            })),
        }
    }

    /// Registers a node type under `"<Category>/<Name>"`, returning the
    /// freshly allocated `NodeTypeId`. Matches the plugin ABI's
    /// `register_node_type(name, factory)` call shape (§6).
    pub fn register_node_type(
        &self,
        qualified_name: impl Into<String>,
        factory: Box<dyn NodeFactory>,
    ) -> NodeTypeId {
        let qualified_name = qualified_name.into();
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let id = NodeTypeId(inner.next_id);
        inner.next_id += 1;
        inner.names.insert(qualified_name.clone(), id);
        inner.types.insert(
            id,
            RegisteredType {
                qualified_name,
                factory,
            },
        );
        id
    }

    pub fn node_type_id(&self, qualified_name: &str) -> Option<NodeTypeId> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .names
            .get(qualified_name)
            .copied()
    }

    pub fn node_type_name(&self, id: NodeTypeId) -> Option<String> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .types
            .get(&id)
            .map(|t| t.qualified_name.clone())
    }

    pub fn create(&self, id: NodeTypeId) -> Option<Box<dyn NodeType>> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .types
            .get(&id)
            .map(|t| t.factory.create())
    }

    pub fn definition(&self, id: NodeTypeId) -> Option<NodeConfig> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .types
            .get(&id)
            .map(|t| t.factory.definition())
    }

    pub fn available_types(&self) -> Vec<(NodeTypeId, String)> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .types
            .iter()
            .map(|(id, t)| (*id, t.qualified_name.clone()))
            .collect()
    }

    pub fn register_module(&self, module: Arc<dyn ModuleHandle>) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.modules.insert(module.name().to_string(), module);
    }

    pub fn module(&self, name: &str) -> Option<Arc<dyn ModuleHandle>> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .modules
            .get(name)
            .cloned()
    }

    /// Loads a plugin shared object and calls its `register` entry point
    /// against this system, per the Plugin ABI of §6. Returns the number
    /// of node types registered by the plugin.
    ///
    /// # Safety
    /// The caller is responsible for the plugin being a well-formed
    /// library exporting `register` with the documented signature;
    /// loading an untrusted or malformed library is undefined behavior,
    /// same as any FFI boundary.
    pub unsafe fn load_plugin(
        &self,
        path: impl AsRef<std::ffi::OsStr>,
    ) -> Result<usize, libloading::Error> {
        let library = libloading::Library::new(path)?;
        let register: libloading::Symbol<unsafe extern "C" fn(*const NodeSystem) -> usize> =
            library.get(b"register")?;
        let count = register(self as *const NodeSystem);
        self.inner
            .write()
            .expect("registry lock poisoned")
            .loaded_plugins
            .push(library);
        Ok(count)
    }
}
