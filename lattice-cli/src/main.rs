mod config;
mod logging;
mod stats;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};

use lattice_core::node_graph::{NodeId, NodeSystem, Serializer};
use lattice_core::NodeTree;

use config::CliConfig;
use logging::{GraphLoadedEvent, LogEvent, NodeExecutedEvent, RunSummaryEvent, StructuredLogger};
use stats::ExecutionStats;

#[derive(Parser, Debug)]
#[command(author, version, about = "Command-line driver for the Lattice node graph engine", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (`[logging]`/`[plugins]` tables, include-merged).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a graph document, execute it, and report per-node timings.
    Run {
        graph: PathBuf,

        /// Root directory filepath properties are relativized/absolutized against.
        #[arg(long)]
        root: Option<PathBuf>,

        /// Drive the step executor this many frames instead of one batch run.
        #[arg(long)]
        steps: Option<usize>,

        /// Additional plugin library to load (repeatable).
        #[arg(long = "plugin")]
        plugins: Vec<PathBuf>,
    },

    /// Load a graph document and report serializer warnings without executing it.
    Validate {
        graph: PathBuf,

        #[arg(long)]
        root: Option<PathBuf>,

        #[arg(long = "plugin")]
        plugins: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CliConfig::from_file(path)
            .wrap_err_with(|| format!("failed to load config from {}", path.display()))?,
        None => CliConfig::default(),
    };

    let mut logger = StructuredLogger::new(config.logging.clone())?;

    match cli.command {
        Command::Run { graph, root, steps, plugins } => {
            run(&mut logger, &config, &graph, root, steps, &plugins)
        }
        Command::Validate { graph, root, plugins } => {
            validate(&mut logger, &config, &graph, root, &plugins)
        }
    }
}

/// Builds a fresh `NodeSystem` with the built-in fixtures plus every
/// configured and command-line plugin loaded, in that order (§4.7, C12).
fn build_system(
    config: &CliConfig,
    extra_plugins: &[PathBuf],
    logger: &mut StructuredLogger,
) -> Result<NodeSystem> {
    let system = NodeSystem::new();
    lattice_stdnodes::register_all(&system);

    let mut plugin_paths: Vec<PathBuf> = config.plugins.paths.iter().map(PathBuf::from).collect();
    plugin_paths.extend(extra_plugins.iter().cloned());

    for path in &plugin_paths {
        // Safety: the caller attests the configured path is a well-formed
        // plugin library per the ABI of §6; see `NodeSystem::load_plugin`.
        let count = unsafe { system.load_plugin(path) }
            .map_err(|e| eyre!("failed to load plugin {}: {e}", path.display()))?;
        logger.log(LogEvent::Info {
            message: format!(
                "loaded plugin {} ({count} node type(s) registered)",
                path.display()
            ),
        })?;
    }

    Ok(system)
}

fn load_graph(system: NodeSystem, root: &Path, graph_path: &Path) -> Result<(NodeTree, Vec<String>)> {
    let json = std::fs::read_to_string(graph_path)
        .wrap_err_with(|| format!("failed to read graph document {}", graph_path.display()))?;
    let mut tree = NodeTree::new(system);
    let mut serializer = Serializer::new(root);
    serializer.resolve_root_from_source(graph_path);
    serializer
        .deserialize(&mut tree, &json)
        .map_err(|e| eyre!("failed to load graph {}: {e}", graph_path.display()))?;
    Ok((tree, serializer.warnings().to_vec()))
}

fn log_graph_loaded(
    logger: &mut StructuredLogger,
    graph_path: &Path,
    tree: &NodeTree,
    warnings: &[String],
) -> Result<()> {
    logger.log(LogEvent::GraphLoaded(GraphLoadedEvent {
        timestamp: chrono::Utc::now(),
        graph_path: graph_path.display().to_string(),
        node_count: tree.node_ids().count(),
        link_count: tree.links().len(),
        warning_count: warnings.len(),
    }))?;
    for warning in warnings {
        logger.log(LogEvent::Warn { message: warning.clone() })?;
    }
    Ok(())
}

/// Logs one `NodeExecuted` event per node in `order`, reading back each
/// node's `last_time_ms`/tag state after a run completes, and records its
/// timing into `stats`.
fn log_node_results(
    tree: &NodeTree,
    order: &[NodeId],
    logger: &mut StructuredLogger,
    stats: &mut ExecutionStats,
) -> Result<()> {
    for &id in order {
        let Some(node) = tree.node(id) else { continue };
        let status = if node.is_tagged() { "tag" } else { "ok" };
        logger.log(LogEvent::NodeExecuted(NodeExecutedEvent {
            timestamp: chrono::Utc::now(),
            node_name: tree.node_name(id).unwrap_or_default(),
            node_type_name: tree.node_type_name(id).unwrap_or_default(),
            time_ms: node.last_time_ms,
            status: status.to_string(),
        }))?;
        stats.record(node.last_time_ms);
    }
    Ok(())
}

fn run(
    logger: &mut StructuredLogger,
    config: &CliConfig,
    graph_path: &Path,
    root: Option<PathBuf>,
    steps: Option<usize>,
    plugins: &[PathBuf],
) -> Result<()> {
    let root = root.unwrap_or_else(|| config.root.clone());
    let system = build_system(config, plugins, logger)?;
    let (mut tree, warnings) = load_graph(system, &root, graph_path)?;
    log_graph_loaded(logger, graph_path, &tree, &warnings)?;

    let mut stats = ExecutionStats::new();

    match steps {
        None => {
            let order = tree.prepare_list();
            if let Err(err) = tree.execute(true) {
                logger.log(LogEvent::Error {
                    message: err.to_string(),
                    details: Some(format!("node '{}' ({})", err.node_name, err.node_type_name)),
                })?;
                return Err(eyre!(err));
            }
            log_node_results(&tree, &order, logger, &mut stats)?;
        }
        Some(frame_count) => {
            for frame in 0..frame_count {
                let order = tree.prepare_list();
                let step_result = {
                    let mut executor = tree.create_node_executor(frame == 0);
                    let mut result = Ok(());
                    while executor.has_work() {
                        if let Err(err) = executor.do_work() {
                            result = Err(err);
                            break;
                        }
                    }
                    result
                };
                if let Err(err) = step_result {
                    logger.log(LogEvent::Error {
                        message: err.to_string(),
                        details: Some(format!("node '{}' ({})", err.node_name, err.node_type_name)),
                    })?;
                    return Err(eyre!(err));
                }
                log_node_results(&tree, &order, logger, &mut stats)?;
                tree.notify_finish();
            }
        }
    }

    logger.log(LogEvent::RunSummary(RunSummaryEvent {
        timestamp: chrono::Utc::now(),
        duration_secs: logger.elapsed(),
        nodes_run: stats.nodes_run(),
        node_time_ms: stats.summary(),
    }))?;

    Ok(())
}

fn validate(
    logger: &mut StructuredLogger,
    config: &CliConfig,
    graph_path: &Path,
    root: Option<PathBuf>,
    plugins: &[PathBuf],
) -> Result<()> {
    let root = root.unwrap_or_else(|| config.root.clone());
    let system = build_system(config, plugins, logger)?;
    let (tree, warnings) = load_graph(system, &root, graph_path)?;
    log_graph_loaded(logger, graph_path, &tree, &warnings)?;

    if warnings.is_empty() {
        logger.log(LogEvent::Info {
            message: format!("graph {} is valid with no warnings", graph_path.display()),
        })?;
    }

    Ok(())
}
