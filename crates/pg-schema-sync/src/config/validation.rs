//! Configuration validation.

use super::{Config, NodeRole};
use crate::error::{Result, SyncError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.clusters.is_empty() {
        return Err(SyncError::Config("clusters must not be empty".into()));
    }

    for (cluster_id, entry) in &config.clusters {
        let nodes = entry.nodes();
        if nodes.is_empty() {
            return Err(SyncError::Config(format!(
                "cluster {} has no nodes",
                cluster_id
            )));
        }

        if !nodes.iter().any(|n| n.role == NodeRole::Write) {
            return Err(SyncError::Config(format!(
                "cluster {} has no write node",
                cluster_id
            )));
        }

        for node in nodes {
            if node.name.is_empty() {
                return Err(SyncError::Config(format!(
                    "cluster {}: node name is required",
                    cluster_id
                )));
            }
            if node.primary_host().is_empty() {
                return Err(SyncError::Config(format!(
                    "cluster {}: host is required for {}",
                    cluster_id, node.name
                )));
            }
            if node.user.is_empty() {
                return Err(SyncError::Config(format!(
                    "cluster {}: user is required for {}",
                    cluster_id, node.name
                )));
            }
            if node.port == 0 {
                return Err(SyncError::Config(format!(
                    "cluster {}: port must be non-zero for {}",
                    cluster_id, node.name
                )));
            }
            if let Some(0) = node.pool_max {
                return Err(SyncError::Config(format!(
                    "cluster {}: poolMax must be at least 1 for {}",
                    cluster_id, node.name
                )));
            }
        }
    }

    for (alias, spec) in &config.custom_fields {
        if spec.r#type.trim().is_empty() {
            return Err(SyncError::Config(format!(
                "customFields.{}: type is required",
                alias
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClusterEntry, NodeConfig, OneOrMany};

    fn node(name: &str) -> NodeConfig {
        NodeConfig {
            name: name.to_string(),
            host: OneOrMany::One("localhost".to_string()),
            port: 5432,
            user: "postgres".to_string(),
            pass: "password".to_string(),
            role: NodeRole::Write,
            pref: None,
            path: None,
            tenant_keys: None,
            pool_max: None,
            ssl_mode: "disable".to_string(),
        }
    }

    fn valid_config() -> Config {
        let mut clusters = std::collections::BTreeMap::new();
        clusters.insert("app".to_string(), ClusterEntry::Single(node("app_db")));
        Config {
            clusters,
            custom_fields: Default::default(),
            seed_path: "./seed".to_string(),
            seed_suffix: String::new(),
            display_mode: Default::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_empty_clusters_rejected() {
        let mut config = valid_config();
        config.clusters.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_user_rejected() {
        let mut config = valid_config();
        let mut n = node("app_db");
        n.user = String::new();
        config
            .clusters
            .insert("app".to_string(), ClusterEntry::Single(n));
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_read_only_cluster_rejected() {
        let mut config = valid_config();
        let mut n = node("app_db");
        n.role = NodeRole::Read;
        config
            .clusters
            .insert("app".to_string(), ClusterEntry::Single(n));
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_pool_max_rejected() {
        let mut config = valid_config();
        let mut n = node("app_db");
        n.pool_max = Some(0);
        config
            .clusters
            .insert("app".to_string(), ClusterEntry::Single(n));
        assert!(validate(&config).is_err());
    }
}
