//! Fixture node types used to exercise the Lattice graph engine end to end.
//!
//! These are deliberately NOT the "concrete node implementations" `spec.md`
//! places out of scope (Canny/SIFT/MOG/etc.) — they carry no image/vision
//! semantics. They exist solely so `lattice-cli` and the integration tests
//! have something real to wire together and run.

use lattice_core::node_graph::{
    validators, ExecutionStatus, FlowData, FlowDataKind, NodeConfig, NodeConfigFlags, NodeFactory,
    NodeProperty, NodeSystem, NodeType, NodeTypeId, PropertyConfig, PropertyId, SocketId,
    SocketReader, SocketWriter,
};

/// Emits a constant, user-configurable scalar on every run. Has no inputs,
/// so it is always executable once tagged.
pub struct ConstantSource {
    config: NodeConfig,
    value: f64,
}

impl ConstantSource {
    fn build_config() -> NodeConfig {
        NodeConfig::builder()
            .output("out", FlowDataKind::Array)
            .description("Emits a constant scalar value")
            .property(PropertyConfig::new(
                PropertyId(0),
                "value",
                NodeProperty::Double(0.0),
            ))
            .build()
            .expect("ConstantSource config is well-formed")
    }
}

impl NodeType for ConstantSource {
    fn execute(&mut self, _reader: &SocketReader, writer: &mut SocketWriter) -> ExecutionStatus {
        match writer.write(SocketId(0), FlowData::Array(vec![self.value])) {
            Ok(()) => ExecutionStatus::ok(),
            Err(e) => e.into(),
        }
    }

    fn config(&self) -> &NodeConfig {
        &self.config
    }

    fn property_value(&self, id: PropertyId) -> Option<NodeProperty> {
        match id.0 {
            0 => Some(NodeProperty::Double(self.value)),
            _ => None,
        }
    }

    fn set_property_value(&mut self, id: PropertyId, value: NodeProperty) {
        if id.0 == 0 {
            if let Some(v) = value.as_f64() {
                self.value = v;
            }
        }
    }
}

pub struct ConstantSourceFactory;

impl NodeFactory for ConstantSourceFactory {
    fn create(&self) -> Box<dyn NodeType> {
        Box::new(ConstantSource {
            config: ConstantSource::build_config(),
            value: 0.0,
        })
    }

    fn definition(&self) -> NodeConfig {
        ConstantSource::build_config()
    }
}

/// Copies its one input straight to its one output, unchanged. Stands in
/// for a single-input/single-output filter (the spec's S1 "Gauss" stage)
/// without carrying any image-processing semantics.
pub struct Passthrough {
    config: NodeConfig,
}

impl Passthrough {
    fn build_config() -> NodeConfig {
        NodeConfig::builder()
            .input("in", FlowDataKind::Array)
            .output("out", FlowDataKind::Array)
            .description("Copies its input to its output unchanged")
            .build()
            .expect("Passthrough config is well-formed")
    }
}

impl NodeType for Passthrough {
    fn execute(&mut self, reader: &SocketReader, writer: &mut SocketWriter) -> ExecutionStatus {
        let result = (|| -> Result<(), lattice_core::node_graph::TreeError> {
            let value = reader.read(SocketId(0))?.clone();
            writer.write(SocketId(0), value)?;
            Ok(())
        })();
        match result {
            Ok(()) => ExecutionStatus::ok(),
            Err(e) => e.into(),
        }
    }

    fn config(&self) -> &NodeConfig {
        &self.config
    }
}

pub struct PassthroughFactory;

impl NodeFactory for PassthroughFactory {
    fn create(&self) -> Box<dyn NodeType> {
        Box::new(Passthrough {
            config: Passthrough::build_config(),
        })
    }

    fn definition(&self) -> NodeConfig {
        Passthrough::build_config()
    }
}

/// Elementwise sum of two `Array` inputs. Arrays of mismatched length are
/// summed over their shared prefix; the longer input's tail is appended
/// unchanged.
pub struct Adder {
    config: NodeConfig,
}

impl Adder {
    fn build_config() -> NodeConfig {
        NodeConfig::builder()
            .input("a", FlowDataKind::Array)
            .input("b", FlowDataKind::Array)
            .output("sum", FlowDataKind::Array)
            .description("Elementwise sum of two arrays")
            .build()
            .expect("Adder config is well-formed")
    }
}

impl NodeType for Adder {
    fn execute(&mut self, reader: &SocketReader, writer: &mut SocketWriter) -> ExecutionStatus {
        let result = (|| -> Result<(), lattice_core::node_graph::TreeError> {
            let a = as_array(reader.read(SocketId(0))?);
            let b = as_array(reader.read(SocketId(1))?);
            let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
            let mut sum: Vec<f64> = longer.to_vec();
            for (i, v) in shorter.iter().enumerate() {
                sum[i] += v;
            }
            writer.write(SocketId(0), FlowData::Array(sum))?;
            Ok(())
        })();
        match result {
            Ok(()) => ExecutionStatus::ok(),
            Err(e) => e.into(),
        }
    }

    fn config(&self) -> &NodeConfig {
        &self.config
    }
}

fn as_array(data: &FlowData) -> &[f64] {
    match data {
        FlowData::Array(values) => values,
        _ => &[],
    }
}

pub struct AdderFactory;

impl NodeFactory for AdderFactory {
    fn create(&self) -> Box<dyn NodeType> {
        Box::new(Adder {
            config: Adder::build_config(),
        })
    }

    fn definition(&self) -> NodeConfig {
        Adder::build_config()
    }
}

/// Prints its input to stdout and has no outputs. A sink's required input
/// being unconnected is what the scheduler prunes on (§4.3); once
/// connected, every run prints the upstream value.
pub struct SinkToStdout {
    config: NodeConfig,
    last_message: String,
}

impl SinkToStdout {
    fn build_config() -> NodeConfig {
        NodeConfig::builder()
            .input("in", FlowDataKind::Array)
            .description("Prints its input to stdout")
            .build()
            .expect("SinkToStdout config is well-formed")
    }
}

impl NodeType for SinkToStdout {
    fn execute(&mut self, reader: &SocketReader, _writer: &mut SocketWriter) -> ExecutionStatus {
        match reader.read(SocketId(0)) {
            Ok(value) => {
                self.last_message = format!("{value:?}");
                println!("{}", self.last_message);
                ExecutionStatus::ok()
            }
            Err(e) => e.into(),
        }
    }

    fn config(&self) -> &NodeConfig {
        &self.config
    }
}

pub struct SinkToStdoutFactory;

impl NodeFactory for SinkToStdoutFactory {
    fn create(&self) -> Box<dyn NodeType> {
        Box::new(SinkToStdout {
            config: SinkToStdout::build_config(),
            last_message: String::new(),
        })
    }

    fn definition(&self) -> NodeConfig {
        SinkToStdout::build_config()
    }
}

/// A property-bearing filter fixture, standing in for a Canny-style node
/// whose "Threshold" property must reject negative values (spec scenario
/// S5). Behaves like [`Passthrough`] otherwise.
pub struct ThresholdFilter {
    config: NodeConfig,
    threshold: f64,
}

impl ThresholdFilter {
    fn build_config() -> NodeConfig {
        NodeConfig::builder()
            .input("in", FlowDataKind::Array)
            .output("out", FlowDataKind::Array)
            .description("Passes through values at or above its threshold")
            .property(
                PropertyConfig::new(PropertyId(0), "threshold", NodeProperty::Double(0.0))
                    .with_validator(validators::at_least(0.0)),
            )
            .build()
            .expect("ThresholdFilter config is well-formed")
    }
}

impl NodeType for ThresholdFilter {
    fn execute(&mut self, reader: &SocketReader, writer: &mut SocketWriter) -> ExecutionStatus {
        let result = (|| -> Result<(), lattice_core::node_graph::TreeError> {
            let values = as_array(reader.read(SocketId(0))?);
            let kept: Vec<f64> = values.iter().copied().filter(|v| *v >= self.threshold).collect();
            writer.write(SocketId(0), FlowData::Array(kept))?;
            Ok(())
        })();
        match result {
            Ok(()) => ExecutionStatus::ok(),
            Err(e) => e.into(),
        }
    }

    fn config(&self) -> &NodeConfig {
        &self.config
    }

    fn property_value(&self, id: PropertyId) -> Option<NodeProperty> {
        match id.0 {
            0 => Some(NodeProperty::Double(self.threshold)),
            _ => None,
        }
    }

    fn set_property_value(&mut self, id: PropertyId, value: NodeProperty) {
        if id.0 == 0 {
            if let Some(v) = value.as_f64() {
                self.threshold = v;
            }
        }
    }
}

pub struct ThresholdFilterFactory;

impl NodeFactory for ThresholdFilterFactory {
    fn create(&self) -> Box<dyn NodeType> {
        Box::new(ThresholdFilter {
            config: ThresholdFilter::build_config(),
            threshold: 0.0,
        })
    }

    fn definition(&self) -> NodeConfig {
        ThresholdFilter::build_config()
    }
}

/// A self-driving, stateful stream source, standing in for the spec's
/// "VideoSrc" scenario (S4) without any decoding semantics. Declares
/// `HasState` (its frame counter must survive across `execute` calls and
/// is reset on `restart()`) and `AutoTag` (it re-tags itself after every
/// `notify_finish()` so a step executor can drive it indefinitely without
/// external tagging, the way a streaming source re-arms itself for the
/// next frame).
pub struct VideoSource {
    config: NodeConfig,
    frame: u64,
}

impl VideoSource {
    fn build_config() -> NodeConfig {
        NodeConfig::builder()
            .output("frame", FlowDataKind::Array)
            .description("Emits an incrementing frame counter on every run")
            .flags(NodeConfigFlags::HAS_STATE | NodeConfigFlags::AUTO_TAG)
            .build()
            .expect("VideoSource config is well-formed")
    }
}

impl NodeType for VideoSource {
    fn execute(&mut self, _reader: &SocketReader, writer: &mut SocketWriter) -> ExecutionStatus {
        let frame = self.frame;
        self.frame += 1;
        match writer.write(SocketId(0), FlowData::Array(vec![frame as f64])) {
            Ok(()) => ExecutionStatus::ok(),
            Err(e) => e.into(),
        }
    }

    fn restart(&mut self) -> bool {
        self.frame = 0;
        true
    }

    fn config(&self) -> &NodeConfig {
        &self.config
    }
}

pub struct VideoSourceFactory;

impl NodeFactory for VideoSourceFactory {
    fn create(&self) -> Box<dyn NodeType> {
        Box::new(VideoSource {
            config: VideoSource::build_config(),
            frame: 0,
        })
    }

    fn definition(&self) -> NodeConfig {
        VideoSource::build_config()
    }
}

/// Registers every fixture type against `system` under the `"Std/*"`
/// category, returning each type's freshly allocated id in registration
/// order: `[ConstantSource, Passthrough, Adder, SinkToStdout,
/// ThresholdFilter, VideoSource]`.
pub fn register_all(system: &NodeSystem) -> [NodeTypeId; 6] {
    [
        system.register_node_type("Std/ConstantSource", Box::new(ConstantSourceFactory)),
        system.register_node_type("Std/Passthrough", Box::new(PassthroughFactory)),
        system.register_node_type("Std/Adder", Box::new(AdderFactory)),
        system.register_node_type("Std/SinkToStdout", Box::new(SinkToStdoutFactory)),
        system.register_node_type("Std/ThresholdFilter", Box::new(ThresholdFilterFactory)),
        system.register_node_type("Std/VideoSource", Box::new(VideoSourceFactory)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::node_graph::SocketAddress;
    use lattice_core::NodeTree;

    fn new_tree() -> (NodeTree, [NodeTypeId; 6]) {
        let system = NodeSystem::new();
        let ids = register_all(&system);
        (NodeTree::new(system), ids)
    }

    #[test]
    fn constant_source_emits_its_property_value() {
        let (mut tree, [constant, ..]) = new_tree();
        let a = tree.create_node(constant, "A").unwrap();
        tree.node_set_property(a, PropertyId(0), NodeProperty::Double(3.5))
            .unwrap();
        tree.execute(false).unwrap();
        assert_eq!(
            *tree.output_socket(a, SocketId(0)).unwrap(),
            FlowData::Array(vec![3.5])
        );
    }

    #[test]
    fn adder_sums_two_constant_sources() {
        let (mut tree, [constant, _passthrough, adder, ..]) = new_tree();
        let a = tree.create_node(constant, "A").unwrap();
        let b = tree.create_node(constant, "B").unwrap();
        let sum = tree.create_node(adder, "Sum").unwrap();
        tree.node_set_property(a, PropertyId(0), NodeProperty::Double(2.0))
            .unwrap();
        tree.node_set_property(b, PropertyId(0), NodeProperty::Double(5.0))
            .unwrap();
        tree.link_nodes(
            SocketAddress::new(a, SocketId(0), true),
            SocketAddress::new(sum, SocketId(0), false),
        );
        tree.link_nodes(
            SocketAddress::new(b, SocketId(0), true),
            SocketAddress::new(sum, SocketId(1), false),
        );

        tree.execute(false).unwrap();

        assert_eq!(
            *tree.output_socket(sum, SocketId(0)).unwrap(),
            FlowData::Array(vec![7.0])
        );
    }

    #[test]
    fn threshold_filter_rejects_negative_property_write() {
        let (mut tree, [.., threshold, _video]) = new_tree();
        let a = tree.create_node(threshold, "A").unwrap();
        let accepted = tree
            .node_set_property(a, PropertyId(0), NodeProperty::Double(-1.0))
            .unwrap();
        assert!(!accepted);
    }

    #[test]
    fn threshold_filter_drops_values_below_threshold() {
        let (mut tree, [constant, _passthrough, _adder, _sink, threshold, ..]) = new_tree();
        let src = tree.create_node(constant, "Src").unwrap();
        let filt = tree.create_node(threshold, "Filt").unwrap();
        tree.node_set_property(src, PropertyId(0), NodeProperty::Double(1.0))
            .unwrap();
        tree.node_set_property(filt, PropertyId(0), NodeProperty::Double(5.0))
            .unwrap();
        tree.link_nodes(
            SocketAddress::new(src, SocketId(0), true),
            SocketAddress::new(filt, SocketId(0), false),
        );

        tree.execute(false).unwrap();

        assert_eq!(
            *tree.output_socket(filt, SocketId(0)).unwrap(),
            FlowData::Array(vec![])
        );
    }

    #[test]
    fn video_source_counts_frames_and_restarts_and_re_tags() {
        let (mut tree, [.., video]) = new_tree();
        let src = tree.create_node(video, "Src").unwrap();

        tree.execute(true).unwrap();
        assert_eq!(
            *tree.output_socket(src, SocketId(0)).unwrap(),
            FlowData::Array(vec![0.0])
        );
        assert!(
            !tree.node(src).unwrap().is_tagged(),
            "a plain Ok status untags like any other node; notify_finish is what re-tags AutoTag nodes"
        );
        tree.tag_node(src).unwrap();

        tree.execute(false).unwrap();
        assert_eq!(
            *tree.output_socket(src, SocketId(0)).unwrap(),
            FlowData::Array(vec![1.0])
        );

        tree.untag_node(src).unwrap();
        tree.notify_finish();
        assert!(tree.node(src).unwrap().is_tagged());

        tree.execute(true).unwrap();
        assert_eq!(
            *tree.output_socket(src, SocketId(0)).unwrap(),
            FlowData::Array(vec![0.0]),
            "with_init = true restarts HasState nodes, resetting the frame counter"
        );
    }
}
