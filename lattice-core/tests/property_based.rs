//! Generated-input property tests for the invariants spec.md §8 states
//! over finite, small structures (chain length, link order, property
//! values) — complementing `node_graph_integration.rs`'s hand-picked S1-S6
//! scenarios the way `chimera-core/tests/property_based.rs` complements
//! its own scenario tests with `proptest!` blocks.

use proptest::prelude::*;

use lattice_core::node_graph::{FlowData, FlowDataKind, ImageBuffer, NodeSystem, SocketAddress, SocketId};
use lattice_core::NodeTree;

proptest! {
    /// §8 invariant 5: for any linear chain of passthrough nodes built in
    /// a randomly shuffled creation order, `prepare_list` always returns
    /// the chain in producer-before-consumer order.
    #[test]
    fn linear_chain_prepare_list_is_topologically_ordered(len in 2usize..8) {
        let system = NodeSystem::new();
        let [_constant, passthrough, ..] = lattice_stdnodes::register_all(&system);
        let mut tree = NodeTree::new(system);

        let ids: Vec<_> = (0..len)
            .map(|i| tree.create_node(passthrough, &format!("N{i}")).unwrap())
            .collect();
        for pair in ids.windows(2) {
            let result = tree.link_nodes(
                SocketAddress::new(pair[0], SocketId(0), true),
                SocketAddress::new(pair[1], SocketId(0), false),
            );
            prop_assert!(result.is_ok());
        }

        let list = tree.prepare_list();
        prop_assert_eq!(list.len(), len);
        let position = |id| list.iter().position(|x| *x == id).unwrap();
        for pair in ids.windows(2) {
            prop_assert!(position(pair[0]) < position(pair[1]));
        }
    }

    /// §8 invariant 1: after an arbitrary sequence of link/unlink
    /// operations over a fixed pool of nodes, the link vector stays
    /// strictly ascending with no duplicate `(toNode, toSocket)` pair.
    #[test]
    fn link_vector_stays_sorted_and_input_unique(
        ops in prop::collection::vec((0usize..5, 0usize..5, any::<bool>()), 0..40)
    ) {
        let system = NodeSystem::new();
        let [_constant, passthrough, ..] = lattice_stdnodes::register_all(&system);
        let mut tree = NodeTree::new(system);
        let ids: Vec<_> = (0..5)
            .map(|i| tree.create_node(passthrough, &format!("N{i}")).unwrap())
            .collect();

        for (from_idx, to_idx, should_link) in ops {
            if from_idx == to_idx {
                continue;
            }
            let from = SocketAddress::new(ids[from_idx], SocketId(0), true);
            let to = SocketAddress::new(ids[to_idx], SocketId(0), false);
            if should_link {
                let _ = tree.link_nodes(from, to);
            } else {
                let _ = tree.unlink_nodes(from, to);
            }
        }

        let links = tree.links();
        prop_assert!(links.windows(2).all(|w| w[0] < w[1]));
        let mut targets: Vec<_> = links.iter().map(|l| (l.to_node, l.to_socket)).collect();
        let before = targets.len();
        targets.dedup();
        prop_assert_eq!(targets.len(), before);
    }

    /// §3.2: `is_convertible` is symmetric for the Image<->ImageMono and
    /// Image<->ImageRgb pairs across any channel count, and Image never
    /// converts to Keypoints/Matches/Array regardless of channel count.
    #[test]
    fn image_convertibility_is_symmetric_and_bounded(channels in 1u8..=4) {
        let buf = FlowData::Image(ImageBuffer::new(2, 2, channels));
        let mono_ok = buf.is_convertible(FlowDataKind::ImageMono);
        let rgb_ok = buf.is_convertible(FlowDataKind::ImageRgb);
        prop_assert_eq!(mono_ok, channels == 1);
        prop_assert_eq!(rgb_ok, channels == 3);
        prop_assert!(!buf.is_convertible(FlowDataKind::Keypoints));
        prop_assert!(!buf.is_convertible(FlowDataKind::Matches));
        prop_assert!(!buf.is_convertible(FlowDataKind::Array));
    }

    /// §8 invariant 6: `duplicate_node` always produces a name distinct
    /// from every existing name and never creates a link, for any starting
    /// population size.
    #[test]
    fn duplicate_node_name_is_always_fresh_and_unlinked(count in 1usize..6) {
        let system = NodeSystem::new();
        let [_constant, passthrough, ..] = lattice_stdnodes::register_all(&system);
        let mut tree = NodeTree::new(system);
        let first = tree.create_node(passthrough, "Base").unwrap();
        for i in 0..count {
            let dup = tree.duplicate_node(first).unwrap();
            let existing: Vec<String> = tree
                .node_ids()
                .filter(|id| *id != dup)
                .filter_map(|id| tree.node_name(id))
                .collect();
            let dup_name = tree.node_name(dup).unwrap();
            prop_assert!(!existing.contains(&dup_name), "duplicate #{i} collided with {dup_name}");
            prop_assert!(!tree.is_input_socket_connected(dup, SocketId(0)));
            prop_assert!(!tree.is_output_socket_connected(dup, SocketId(0)));
        }
    }
}
