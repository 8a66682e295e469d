//! Bidirectional JSON representation of the graph (§4.5, C10).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::SerializerError;
use super::flow_data::FlowDataKind;
use super::ids::{NodeId, PropertyId, SocketAddress, SocketId};
use super::property::{Matrix3x3, NodeProperty, PropertyKind};
use super::tree::NodeTree;

#[derive(Serialize, Deserialize)]
struct SocketDoc {
    id: u8,
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Serialize, Deserialize)]
struct PropertyDoc {
    id: i8,
    name: String,
    #[serde(rename = "type")]
    kind: String,
    value: Value,
}

#[derive(Serialize, Deserialize)]
struct NodeDoc {
    id: i64,
    class: String,
    name: String,
    #[serde(default)]
    inputs: Vec<SocketDoc>,
    #[serde(default)]
    outputs: Vec<SocketDoc>,
    #[serde(default)]
    properties: Vec<PropertyDoc>,
}

#[derive(Serialize, Deserialize)]
struct LinkDoc {
    #[serde(rename = "fromNode")]
    from_node: i64,
    #[serde(rename = "fromSocket")]
    from_socket: u8,
    #[serde(rename = "toNode")]
    to_node: i64,
    #[serde(rename = "toSocket")]
    to_socket: u8,
}

#[derive(Serialize, Deserialize)]
struct GraphDoc {
    nodes: Vec<NodeDoc>,
    links: Vec<LinkDoc>,
}

/// Relativizes a filepath against `root` for on-disk storage; absolutizes
/// it back on load. Holds the non-fatal warnings accumulated by the last
/// `deserialize` call (§4.5: "unknown or rejected property values are
/// non-fatal and appended to a warnings list on the serializer").
pub struct Serializer {
    root_dir: PathBuf,
    warnings: Vec<String>,
}

impl Serializer {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            warnings: Vec::new(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// If `self`'s root is empty, sets it to the absolute parent directory
    /// of `source_path`, per §4.5: "If the root is empty at deserialize,
    /// it is set to the absolute parent directory of the input file."
    /// Called by a loader before `deserialize` once the document's path on
    /// disk is known; a no-op if the root was already set explicitly.
    pub fn resolve_root_from_source(&mut self, source_path: &Path) {
        if self.root_dir.as_os_str().is_empty() {
            let parent = source_path.parent().unwrap_or_else(|| Path::new("."));
            self.root_dir = parent
                .canonicalize()
                .unwrap_or_else(|_| parent.to_path_buf());
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn serialize(&self, tree: &NodeTree) -> Result<String, SerializerError> {
        let mut nodes = Vec::new();
        for id in tree.node_ids() {
            nodes.push(self.serialize_node(tree, id)?);
        }
        let links = tree
            .links()
            .iter()
            .map(|l| LinkDoc {
                from_node: l.from_node.0 as i64,
                from_socket: l.from_socket.0,
                to_node: l.to_node.0 as i64,
                to_socket: l.to_socket.0,
            })
            .collect();
        let doc = GraphDoc { nodes, links };
        serde_json::to_string_pretty(&doc).map_err(|e| SerializerError::Json(Arc::new(e)))
    }

    fn serialize_node(&self, tree: &NodeTree, id: NodeId) -> Result<NodeDoc, SerializerError> {
        let class = tree.node_type_name(id).unwrap_or_default();
        let name = tree.node_name(id).unwrap_or_default();
        let config = tree
            .node(id)
            .and_then(|n| n.config())
            .ok_or_else(|| SerializerError::Malformed {
                reason: format!("node {id} has no config at serialize time"),
            })?;

        let inputs = config
            .inputs()
            .iter()
            .map(|s| SocketDoc {
                id: s.id.0,
                name: s.name.clone(),
                kind: s.kind.as_str().to_string(),
            })
            .collect();
        let outputs = config
            .outputs()
            .iter()
            .map(|s| SocketDoc {
                id: s.id.0,
                name: s.name.clone(),
                kind: s.kind.as_str().to_string(),
            })
            .collect();

        let mut properties = Vec::new();
        for prop_config in config.properties() {
            let value = tree
                .node_property_value(id, prop_config.id)
                .unwrap_or_else(|| prop_config.default_value.clone());
            properties.push(PropertyDoc {
                id: prop_config.id.0,
                name: prop_config.name.clone(),
                kind: prop_config.kind.as_str().to_string(),
                value: property_to_json(&value, &self.root_dir),
            });
        }

        Ok(NodeDoc {
            id: id.0 as i64,
            class,
            name,
            inputs,
            outputs,
            properties,
        })
    }

    /// Deserializes `json` into `tree`, which is expected to be freshly
    /// constructed (its existing content is not touched on success).
    /// Resets `tree` to empty on any fatal error (§4.5/§7). Non-fatal
    /// property rejections are recorded in `self.warnings()` and do not
    /// abort the load.
    pub fn deserialize(&mut self, tree: &mut NodeTree, json: &str) -> Result<(), SerializerError> {
        self.warnings.clear();
        let doc: GraphDoc =
            serde_json::from_str(json).map_err(|e| SerializerError::Json(Arc::new(e)))?;

        let mut id_map: HashMap<i64, NodeId> = HashMap::new();
        for node_doc in &doc.nodes {
            let type_id = match tree.node_system().node_type_id(&node_doc.class) {
                Some(id) => id,
                None => {
                    tree.clear();
                    return Err(SerializerError::NodeCreationFailed {
                        class: node_doc.class.clone(),
                        name: node_doc.name.clone(),
                        reason: "node type is not registered".to_string(),
                    });
                }
            };
            let node_id = match tree.create_node(type_id, &node_doc.name) {
                Ok(id) => id,
                Err(err) => {
                    tree.clear();
                    return Err(SerializerError::NodeCreationFailed {
                        class: node_doc.class.clone(),
                        name: node_doc.name.clone(),
                        reason: err.to_string(),
                    });
                }
            };
            id_map.insert(node_doc.id, node_id);

            for prop_doc in &node_doc.properties {
                self.apply_property(tree, node_id, &node_doc.name, prop_doc);
            }
        }

        for link_doc in &doc.links {
            let from_node = match id_map.get(&link_doc.from_node) {
                Some(id) => *id,
                None => {
                    tree.clear();
                    return Err(SerializerError::UnmappedNodeId(link_doc.from_node));
                }
            };
            let to_node = match id_map.get(&link_doc.to_node) {
                Some(id) => *id,
                None => {
                    tree.clear();
                    return Err(SerializerError::UnmappedNodeId(link_doc.to_node));
                }
            };
            let result = tree.link_nodes(
                SocketAddress::new(from_node, SocketId(link_doc.from_socket), true),
                SocketAddress::new(to_node, SocketId(link_doc.to_socket), false),
            );
            if !result.is_ok() {
                tree.clear();
                return Err(SerializerError::LinkRejected(result));
            }
        }

        Ok(())
    }

    fn apply_property(&mut self, tree: &mut NodeTree, node_id: NodeId, node_name: &str, prop_doc: &PropertyDoc) {
        let property = match tree
            .node(node_id)
            .and_then(|n| n.config())
            .and_then(|c| c.property_by_name(&prop_doc.name))
        {
            Some(p) => p,
            None => {
                self.warnings.push(format!(
                    "node '{node_name}': unknown property '{}'",
                    prop_doc.name
                ));
                return;
            }
        };
        let prop_id: PropertyId = property.id;
        let kind = property.kind;
        let value = match json_to_property(kind, &prop_doc.value, &self.root_dir) {
            Some(v) => v,
            None => {
                self.warnings.push(format!(
                    "node '{node_name}': property '{}' has a malformed value",
                    prop_doc.name
                ));
                return;
            }
        };
        match tree.node_set_property(node_id, prop_id, value) {
            Ok(true) => {}
            Ok(false) => self.warnings.push(format!(
                "node '{node_name}': property '{}' rejected the loaded value",
                prop_doc.name
            )),
            Err(err) => self.warnings.push(format!(
                "node '{node_name}': property '{}': {err}",
                prop_doc.name
            )),
        }
    }
}

fn relativize(path: &str, root: &Path) -> String {
    match Path::new(path).strip_prefix(root) {
        Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
        Err(_) => path.to_string(),
    }
}

fn absolutize(path: &str, root: &Path) -> String {
    let p = Path::new(path);
    if p.is_absolute() {
        path.to_string()
    } else {
        root.join(p).to_string_lossy().into_owned()
    }
}

fn property_to_json(value: &NodeProperty, root: &Path) -> Value {
    match value {
        NodeProperty::Boolean(b) => Value::from(*b),
        NodeProperty::Integer(i) => Value::from(*i),
        NodeProperty::Double(d) => Value::from(*d),
        NodeProperty::Enum(e) => Value::from(*e),
        NodeProperty::Matrix3x3(m) => Value::from(m.to_vec()),
        NodeProperty::Filepath(p) => Value::from(relativize(p, root)),
        NodeProperty::String(s) => Value::from(s.clone()),
    }
}

fn json_to_property(kind: PropertyKind, value: &Value, root: &Path) -> Option<NodeProperty> {
    match kind {
        PropertyKind::Boolean => value.as_bool().map(NodeProperty::Boolean),
        PropertyKind::Integer => value.as_i64().map(|v| NodeProperty::Integer(v as i32)),
        PropertyKind::Double => value.as_f64().map(NodeProperty::Double),
        PropertyKind::Enum => value.as_i64().map(|v| NodeProperty::Enum(v as i32)),
        PropertyKind::Matrix3x3 => {
            let arr = value.as_array()?;
            if arr.len() != 9 {
                return None;
            }
            let mut m: Matrix3x3 = [0.0; 9];
            for (slot, entry) in m.iter_mut().zip(arr) {
                *slot = entry.as_f64()?;
            }
            Some(NodeProperty::Matrix3x3(m))
        }
        PropertyKind::Filepath => value
            .as_str()
            .map(|s| NodeProperty::Filepath(absolutize(s, root))),
        PropertyKind::String => value.as_str().map(|s| NodeProperty::String(s.to_string())),
    }
}

/// Convenience wrapper over `Serializer::serialize` for one-shot use.
pub fn serialize(tree: &NodeTree, root_dir: impl Into<PathBuf>) -> Result<String, SerializerError> {
    Serializer::new(root_dir).serialize(tree)
}

/// Convenience wrapper over `Serializer::deserialize` for one-shot use;
/// discards the warnings list, so prefer `Serializer` directly when
/// warnings matter.
pub fn deserialize(
    tree: &mut NodeTree,
    json: &str,
    root_dir: impl Into<PathBuf>,
) -> Result<Vec<String>, SerializerError> {
    let mut serializer = Serializer::new(root_dir);
    serializer.deserialize(tree, json)?;
    Ok(serializer.warnings().to_vec())
}
