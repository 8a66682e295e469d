//! Structured logging of graph loads, per-node execution, and run summaries.

use crate::config::{LogFormat, LogTarget, LoggingConfig};
use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};

/// Structured log event types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    /// A graph document finished loading.
    GraphLoaded(GraphLoadedEvent),

    /// One node ran to completion (or was tagged/errored).
    NodeExecuted(NodeExecutedEvent),

    /// Final per-node timing summary for a `run` invocation.
    RunSummary(RunSummaryEvent),

    /// General info message.
    Info { message: String },

    /// Warning message (e.g. a serializer warning).
    Warn { message: String },

    /// Error message, emitted before a `TreeError`/`ExecutionError` is
    /// translated and propagated as a `Result`.
    Error { message: String, details: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphLoadedEvent {
    pub timestamp: DateTime<Utc>,
    pub graph_path: String,
    pub node_count: usize,
    pub link_count: usize,
    pub warning_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutedEvent {
    pub timestamp: DateTime<Utc>,
    pub node_name: String,
    pub node_type_name: String,
    pub time_ms: f64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummaryEvent {
    pub timestamp: DateTime<Utc>,
    pub duration_secs: f64,
    pub nodes_run: usize,
    pub node_time_ms: StatSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatSummary {
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
    pub samples: usize,
}

/// Logger that writes one JSON/logfmt/pretty line per event through a
/// `BufWriter`, the way this codebase's house style favors a typed event
/// enum over a `log`/`tracing` facade.
pub struct StructuredLogger {
    config: LoggingConfig,
    writer: Box<dyn Write + Send>,
    start_time: DateTime<Utc>,
}

impl StructuredLogger {
    pub fn new(config: LoggingConfig) -> Result<Self> {
        let writer: Box<dyn Write + Send> = match &config.target {
            LogTarget::Stdout => Box::new(io::stdout()),
            LogTarget::Stderr => Box::new(io::stderr()),
            LogTarget::File => {
                let path = config
                    .path
                    .as_ref()
                    .ok_or_else(|| color_eyre::eyre::eyre!("a file path is required for file logging"))?;
                Box::new(BufWriter::new(File::create(path)?))
            }
        };

        Ok(Self {
            config,
            writer,
            start_time: Utc::now(),
        })
    }

    pub fn log(&mut self, event: LogEvent) -> Result<()> {
        let output = match self.config.format {
            LogFormat::Json => self.format_json(&event)?,
            LogFormat::Logfmt => self.format_logfmt(&event),
            LogFormat::Pretty => self.format_pretty(&event),
        };

        writeln!(self.writer, "{output}")?;
        self.writer.flush()?;
        Ok(())
    }

    fn format_json(&self, event: &LogEvent) -> Result<String> {
        Ok(serde_json::to_string(event)?)
    }

    fn format_logfmt(&self, event: &LogEvent) -> String {
        let ts = Utc::now().to_rfc3339();
        match event {
            LogEvent::GraphLoaded(g) => format!(
                "ts=\"{ts}\" type=graph_loaded path=\"{}\" nodes={} links={} warnings={}",
                g.graph_path, g.node_count, g.link_count, g.warning_count
            ),
            LogEvent::NodeExecuted(n) => format!(
                "ts=\"{ts}\" type=node_executed node=\"{}\" node_type=\"{}\" time_ms={:.3} status={}",
                n.node_name, n.node_type_name, n.time_ms, n.status
            ),
            LogEvent::RunSummary(s) => format!(
                "ts=\"{ts}\" type=run_summary duration_secs={:.3} nodes_run={} time_ms_mean={:.3} time_ms_max={:.3}",
                s.duration_secs, s.nodes_run, s.node_time_ms.mean, s.node_time_ms.max
            ),
            LogEvent::Info { message } => format!("ts=\"{ts}\" level=info msg=\"{message}\""),
            LogEvent::Warn { message } => format!("ts=\"{ts}\" level=warn msg=\"{message}\""),
            LogEvent::Error { message, details } => match details {
                Some(d) => format!("ts=\"{ts}\" level=error msg=\"{message}\" details=\"{d}\""),
                None => format!("ts=\"{ts}\" level=error msg=\"{message}\""),
            },
        }
    }

    fn format_pretty(&self, event: &LogEvent) -> String {
        let ts = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
        match event {
            LogEvent::GraphLoaded(g) => format!(
                "[{ts}] LOADED {} | {} node(s), {} link(s), {} warning(s)",
                g.graph_path, g.node_count, g.link_count, g.warning_count
            ),
            LogEvent::NodeExecuted(n) => format!(
                "[{ts}] NODE {} ({}): {:.3}ms [{}]",
                n.node_name, n.node_type_name, n.time_ms, n.status
            ),
            LogEvent::RunSummary(s) => format!(
                "[{ts}] SUMMARY ({:.3}s): {} node(s) run | time_ms: μ={:.3} σ={:.3} [{:.3},{:.3}]",
                s.duration_secs,
                s.nodes_run,
                s.node_time_ms.mean,
                s.node_time_ms.stddev,
                s.node_time_ms.min,
                s.node_time_ms.max
            ),
            LogEvent::Info { message } => format!("[{ts}] INFO: {message}"),
            LogEvent::Warn { message } => format!("[{ts}] WARN: {message}"),
            LogEvent::Error { message, details } => match details {
                Some(d) => format!("[{ts}] ERROR: {message} | {d}"),
                None => format!("[{ts}] ERROR: {message}"),
            },
        }
    }

    pub fn elapsed(&self) -> f64 {
        (Utc::now() - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}
