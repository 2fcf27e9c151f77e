//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::dsl::parser::FieldAlias;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Target clusters: id -> one node or an ordered node list.
    pub clusters: BTreeMap<String, ClusterEntry>,

    /// User-defined field aliases, merged over the built-in table.
    #[serde(default)]
    pub custom_fields: BTreeMap<String, CustomFieldSpec>,

    /// Directory containing seed files.
    #[serde(default = "default_seed_path")]
    pub seed_path: String,

    /// Filename suffix filter for seed files (empty matches all).
    #[serde(default)]
    pub seed_suffix: String,

    /// How plans are rendered by default.
    #[serde(default)]
    pub display_mode: DisplayMode,
}

/// A cluster is either a single node or an ordered list of nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClusterEntry {
    Single(NodeConfig),
    Multi(Vec<NodeConfig>),
}

impl ClusterEntry {
    /// The cluster's nodes in declaration order.
    pub fn nodes(&self) -> &[NodeConfig] {
        match self {
            ClusterEntry::Single(node) => std::slice::from_ref(node),
            ClusterEntry::Multi(nodes) => nodes,
        }
    }
}

/// A string or a list of strings. Used for `host` and `path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// All values in declaration order.
    pub fn values(&self) -> Vec<String> {
        match self {
            OneOrMany::One(v) => vec![v.clone()],
            OneOrMany::Many(vs) => vs.clone(),
        }
    }

    /// The first value, if any.
    pub fn first(&self) -> Option<&str> {
        match self {
            OneOrMany::One(v) => Some(v),
            OneOrMany::Many(vs) => vs.first().map(|s| s.as_str()),
        }
    }
}

/// Role of a node within a cluster. Schema changes only go to write nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    #[default]
    Write,
    Read,
}

/// One database endpoint.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    /// Database name.
    pub name: String,

    /// Host, or an ordered host list (first reachable wins; the engine uses
    /// the first entry).
    pub host: OneOrMany,

    /// Port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub pass: String,

    /// write or read (default: write).
    #[serde(default, rename = "type")]
    pub role: NodeRole,

    /// Table prefix for `~`-declared tables and seed rewriting.
    #[serde(default)]
    pub pref: Option<String>,

    /// Declaration directory or directories.
    #[serde(default)]
    pub path: Option<OneOrMany>,

    /// Tenant identifiers this node serves; matched by `--tenant`.
    #[serde(default)]
    pub tenant_keys: Option<Vec<String>>,

    /// Maximum pool size for this endpoint.
    #[serde(default)]
    pub pool_max: Option<usize>,

    /// SSL mode: disable (default), require, verify-ca, verify-full.
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
}

impl NodeConfig {
    /// The host the engine connects to.
    pub fn primary_host(&self) -> &str {
        self.host.first().unwrap_or("localhost")
    }

    /// Declaration directories for this node, deduplicated, in order.
    /// Falls back to `./schema` when unset.
    pub fn schema_paths(&self) -> Vec<String> {
        let mut paths = match &self.path {
            Some(p) => p.values(),
            None => vec![default_schema_path()],
        };
        let mut seen = std::collections::BTreeSet::new();
        paths.retain(|p| seen.insert(p.clone()));
        paths
    }

    /// `user@host:port/name`, used in log and error context.
    pub fn endpoint(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.user,
            self.primary_host(),
            self.port,
            self.name
        )
    }
}

impl fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("pass", &"[REDACTED]")
            .field("role", &self.role)
            .field("pref", &self.pref)
            .field("path", &self.path)
            .field("tenant_keys", &self.tenant_keys)
            .field("pool_max", &self.pool_max)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// User-defined field alias: resolved type plus optional key/default/extra.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomFieldSpec {
    /// Resolved type, e.g. `VARCHAR(64)`.
    pub r#type: String,

    /// Key role: `primary` or `unique`.
    #[serde(default)]
    pub key: Option<String>,

    /// Default inherited when the field declares none.
    #[serde(default)]
    pub default: Option<String>,

    /// Trailing fragment appended upper-cased.
    #[serde(default)]
    pub extra: Option<String>,
}

/// How a plan is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Grouped per table with human labels.
    #[default]
    Grouped,
    /// Raw SQL, one statement per line.
    Sql,
}

impl std::str::FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "grouped" => Ok(DisplayMode::Grouped),
            "sql" => Ok(DisplayMode::Sql),
            other => Err(format!("unknown display mode '{}'", other)),
        }
    }
}

/// One concrete migration/seed target: a write node within a cluster.
#[derive(Debug, Clone)]
pub struct Target {
    /// Cluster id the node belongs to.
    pub cluster_id: String,

    /// The node itself.
    pub node: NodeConfig,
}

impl Config {
    /// Materialize the filtered list of write targets.
    ///
    /// `name` matches the cluster id or the node's database name; `tenant`
    /// matches membership in the node's `tenantKeys`.
    pub fn write_targets(&self, name: Option<&str>, tenant: Option<&str>) -> Vec<Target> {
        let mut targets = Vec::new();
        for (cluster_id, entry) in &self.clusters {
            for node in entry.nodes() {
                if node.role != NodeRole::Write {
                    continue;
                }
                if let Some(wanted) = name {
                    if cluster_id != wanted && node.name != wanted {
                        continue;
                    }
                }
                if let Some(wanted) = tenant {
                    let serves = node
                        .tenant_keys
                        .as_ref()
                        .map(|keys| keys.iter().any(|k| k == wanted))
                        .unwrap_or(false);
                    if !serves {
                        continue;
                    }
                }
                targets.push(Target {
                    cluster_id: cluster_id.clone(),
                    node: node.clone(),
                });
            }
        }
        targets
    }

    /// Field aliases: built-ins shadowed by `customFields`.
    ///
    /// Only the custom entries are returned; the parser falls back to its
    /// built-in table for names not present here.
    pub fn field_aliases(&self) -> std::collections::HashMap<String, FieldAlias> {
        self.custom_fields
            .iter()
            .map(|(name, spec)| {
                (
                    name.clone(),
                    FieldAlias {
                        type_spec: spec.r#type.clone(),
                        key: spec.key.clone(),
                        default: spec.default.clone(),
                        extra: spec.extra.clone(),
                    },
                )
            })
            .collect()
    }
}

fn default_pg_port() -> u16 {
    5432
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_seed_path() -> String {
    "./seed".to_string()
}

fn default_schema_path() -> String {
    "./schema".to_string()
}
