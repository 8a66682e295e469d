//! CLI-specific configuration structures for TOML-based configuration.

use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

/// Deep merge JSON values - override takes precedence over base.
/// For objects, recursively merge; for arrays and primitives, override replaces base.
fn merge_json_values(base: &mut JsonValue, override_val: JsonValue) {
    match (base, override_val) {
        (JsonValue::Object(base_map), JsonValue::Object(override_map)) => {
            for (key, value) in override_map {
                if let Some(base_value) = base_map.get_mut(&key) {
                    merge_json_values(base_value, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (base_val, override_val) => {
            *base_val = override_val;
        }
    }
}

/// Custom deserializer accepting either a single string or an array of
/// strings for `include`.
fn deserialize_include_optional<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }

    let opt: Option<StringOrVec> = Option::deserialize(deserializer)?;
    match opt {
        None => Ok(Vec::new()),
        Some(StringOrVec::String(s)) => Ok(vec![s]),
        Some(StringOrVec::Vec(v)) => Ok(v),
    }
}

/// Empty by default: an unset root defers to the serializer's own
/// fallback (§4.5), which anchors it to the graph document's own
/// directory once the document's path is known.
fn default_root() -> PathBuf {
    PathBuf::new()
}

/// Complete CLI configuration bundle (§6.2): a root directory for the
/// serializer's filepath relativization, a plugin search list, and the
/// structured logger's output target/format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Path(s) to other config file(s) to include, merged depth-first
    /// relative to this config's own directory. Accepts a single string
    /// or an array.
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_include_optional")]
    pub include: Vec<String>,

    /// Root directory graph documents' filepath properties are
    /// relativized/absolutized against.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    #[serde(default)]
    pub plugins: PluginsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            root: default_root(),
            plugins: PluginsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Plugin search list (§4.7, C12): dynamic libraries loaded into the
/// `NodeSystem` before a graph document is deserialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginsConfig {
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Logging output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_target")]
    pub target: LogTarget,

    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_log_target() -> LogTarget {
    LogTarget::Stdout
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            target: default_log_target(),
            path: None,
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Logfmt,
    Pretty,
}

impl CliConfig {
    /// Loads configuration from a TOML file, merging `include` directives
    /// depth-first (earlier includes are overridden by later ones, and the
    /// file itself has the highest priority) the way the JSON merge of
    /// `merge_json_values` layers config files.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;

        let config_toml: toml::Value =
            toml::from_str(&content).wrap_err("failed to parse TOML configuration")?;
        let mut config_json =
            serde_json::to_value(&config_toml).wrap_err("failed to convert TOML to JSON")?;

        let includes = match config_json.get("include") {
            Some(JsonValue::String(s)) => vec![s.clone()],
            Some(JsonValue::Array(arr)) => {
                arr.iter().filter_map(|v| v.as_str().map(String::from)).collect()
            }
            _ => Vec::new(),
        };
        if let JsonValue::Object(ref mut map) = config_json {
            map.remove("include");
        }

        let mut base_json =
            serde_json::to_value(Self::default()).wrap_err("failed to create default config")?;

        for include_path in &includes {
            let include_full_path = if Path::new(include_path).is_absolute() {
                PathBuf::from(include_path)
            } else {
                path.parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(include_path)
            };
            let included = Self::from_file(&include_full_path).wrap_err_with(|| {
                format!("failed to load included config: {}", include_full_path.display())
            })?;
            let included_json =
                serde_json::to_value(included).wrap_err("failed to convert included config to JSON")?;
            merge_json_values(&mut base_json, included_json);
        }

        merge_json_values(&mut base_json, config_json);

        let config: CliConfig =
            serde_json::from_value(base_json).wrap_err("failed to parse final configuration")?;
        Ok(config)
    }
}
