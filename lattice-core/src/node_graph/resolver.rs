//! URI-style addressing (§6, C9): `i://`, `o://`, `p://` prefixes mapping
//! human names to node/socket/property ids. `/` is forbidden in node names
//! (§3.7 invariant 5), so a single split on the remaining path suffices.

use super::errors::TreeError;
use super::ids::{NodeId, PropertyId, SocketAddress};
use super::tree::NodeTree;

/// The three URI shapes a resolved address can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedUri {
    Input(SocketAddress),
    Output(SocketAddress),
    Property { node: NodeId, property: PropertyId },
}

/// Resolves `i://<node>/<socket>`, `o://<node>/<socket>`, or
/// `p://<node>/<property>` against `tree`. Any malformed or unresolvable
/// URI is reported as `BadConfig` — there's no dedicated resolver error
/// kind in the taxonomy (§7), and a bad address is a configuration
/// mistake, not a runtime one.
pub fn resolve_uri(tree: &NodeTree, uri: &str) -> Result<ResolvedUri, TreeError> {
    let (scheme, rest) = uri.split_once("://").ok_or_else(|| TreeError::BadConfig {
        reason: format!("malformed URI '{uri}': missing scheme"),
    })?;
    let (node_name, leaf) = rest.split_once('/').ok_or_else(|| TreeError::BadConfig {
        reason: format!("malformed URI '{uri}': missing '/' before the leaf name"),
    })?;
    let node_id = tree.resolve_node(node_name).ok_or_else(|| TreeError::BadConfig {
        reason: format!("URI '{uri}' refers to unknown node '{node_name}'"),
    })?;
    let config = tree
        .node(node_id)
        .and_then(|n| n.config())
        .ok_or(TreeError::BadNode(node_id))?;

    match scheme {
        "i" => {
            let socket = config.input_by_name(leaf).ok_or_else(|| TreeError::BadConfig {
                reason: format!("node '{node_name}' has no input socket '{leaf}'"),
            })?;
            Ok(ResolvedUri::Input(SocketAddress::new(
                node_id, socket.id, false,
            )))
        }
        "o" => {
            let socket = config.output_by_name(leaf).ok_or_else(|| TreeError::BadConfig {
                reason: format!("node '{node_name}' has no output socket '{leaf}'"),
            })?;
            Ok(ResolvedUri::Output(SocketAddress::new(
                node_id, socket.id, true,
            )))
        }
        "p" => {
            let property = config.property_by_name(leaf).ok_or_else(|| TreeError::BadConfig {
                reason: format!("node '{node_name}' has no property '{leaf}'"),
            })?;
            Ok(ResolvedUri::Property {
                node: node_id,
                property: property.id,
            })
        }
        other => Err(TreeError::BadConfig {
            reason: format!("unknown URI scheme '{other}' in '{uri}'"),
        }),
    }
}
