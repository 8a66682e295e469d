use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use lattice_core::node_graph::{
    ExecutionStatus, FlowDataKind, NodeConfig, NodeFactory, NodeSystem, NodeType, SocketAddress,
    SocketId, SocketReader, SocketWriter,
};
use lattice_core::NodeTree;

struct ChainNode {
    config: NodeConfig,
}

impl NodeType for ChainNode {
    fn execute(&mut self, _reader: &SocketReader, _writer: &mut SocketWriter) -> ExecutionStatus {
        ExecutionStatus::ok()
    }

    fn config(&self) -> &NodeConfig {
        &self.config
    }
}

struct ChainNodeFactory;

impl NodeFactory for ChainNodeFactory {
    fn create(&self) -> Box<dyn NodeType> {
        Box::new(ChainNode {
            config: Self::config(),
        })
    }

    fn definition(&self) -> NodeConfig {
        Self::config()
    }
}

impl ChainNodeFactory {
    fn config() -> NodeConfig {
        NodeConfig::builder()
            .input("in", FlowDataKind::Array)
            .output("out", FlowDataKind::Array)
            .build()
            .unwrap()
    }
}

/// Builds a linear chain of `len` nodes (`n0 -> n1 -> ... -> n{len-1}`),
/// all tagged, mirroring the shape `prepare_list`'s DFS has to walk.
fn build_chain(len: usize) -> NodeTree {
    let system = NodeSystem::new();
    let type_id = system.register_node_type("Bench/Chain", Box::new(ChainNodeFactory));
    let mut tree = NodeTree::new(system);

    let mut prev = tree.create_node(type_id, "n0").unwrap();
    for i in 1..len {
        let next = tree.create_node(type_id, &format!("n{i}")).unwrap();
        tree.link_nodes(
            SocketAddress::new(prev, SocketId(0), true),
            SocketAddress::new(next, SocketId(0), false),
        );
        prev = next;
    }
    tree
}

fn benchmark_prepare_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepare_list_linear_chain");
    for len in [8usize, 64, 512, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            let mut tree = build_chain(len);
            b.iter(|| {
                for id in tree.node_ids().collect::<Vec<_>>() {
                    tree.tag_node(id).ok();
                }
                black_box(tree.prepare_list())
            })
        });
    }
    group.finish();
}

fn benchmark_execute(c: &mut Criterion) {
    c.bench_function("execute_linear_chain_512", |b| {
        let mut tree = build_chain(512);
        b.iter(|| {
            for id in tree.node_ids().collect::<Vec<_>>() {
                tree.tag_node(id).ok();
            }
            tree.execute(false).unwrap();
        })
    });
}

criterion_group!(benches, benchmark_prepare_list, benchmark_execute);
criterion_main!(benches);
