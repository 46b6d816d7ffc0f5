//! Configuration for the Vigil scanners.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use vigil_core::Subnet;
use vigil_store::GraphConfig;

/// Scan targets and scanner settings.
///
/// Loaded from the `[scan]` section of `vigil.toml` or `VIGIL__SCAN__`
/// environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Backup-storage roots to crawl, in order.
    #[serde(default)]
    pub directories_to_scan: Vec<String>,

    /// CIDR subnets to discover, in order.
    #[serde(default)]
    pub subnets_to_scan: Vec<String>,

    /// Path to the nmap binary (default: "nmap").
    #[serde(default = "default_nmap_path")]
    pub nmap_path: String,

    /// Per-host deep probe bound passed to nmap as `--host-timeout`.
    #[serde(default = "default_host_timeout")]
    pub host_timeout_secs: u64,
}

/// Validated scan targets derived from a [`ScanConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanTargets {
    pub directories: Vec<PathBuf>,
    pub subnets: Vec<Subnet>,
}

impl ScanConfig {
    /// Trim entries, drop blanks, and drop subnets that are not valid CIDR.
    pub fn targets(&self) -> ScanTargets {
        let directories = self
            .directories_to_scan
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .collect();

        let subnets = self
            .subnets_to_scan
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .filter_map(|s| match s.parse::<Subnet>() {
                Ok(subnet) => Some(subnet),
                Err(e) => {
                    tracing::warn!(subnet = %s, error = %e, "Ignoring invalid subnet");
                    None
                }
            })
            .collect();

        ScanTargets {
            directories,
            subnets,
        }
    }
}

fn default_nmap_path() -> String {
    "nmap".to_string()
}

fn default_host_timeout() -> u64 {
    300
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            directories_to_scan: Vec::new(),
            subnets_to_scan: Vec::new(),
            nmap_path: default_nmap_path(),
            host_timeout_secs: default_host_timeout(),
        }
    }
}

fn build_source(file_prefix: &str) -> Result<config::Config, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("VIGIL")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("scan.directories_to_scan")
                .with_list_parse_key("scan.subnets_to_scan")
                .try_parsing(true),
        )
        .build()
}

/// Load the `[scan]` section. Any failure degrades to empty target lists.
pub fn load_scan_config(file_prefix: &str) -> ScanConfig {
    let loaded = build_source(file_prefix).and_then(|cfg| cfg.get::<ScanConfig>("scan"));

    match loaded {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load scan config, using empty targets");
            ScanConfig::default()
        }
    }
}

/// Load Neo4j connection settings from the `[neo4j]` section.
pub fn load_graph_config(file_prefix: &str) -> GraphConfig {
    match build_source(file_prefix) {
        Ok(c) => {
            let defaults = GraphConfig::default();
            GraphConfig {
                uri: c.get_string("neo4j.uri").unwrap_or(defaults.uri),
                user: c.get_string("neo4j.user").unwrap_or(defaults.user),
                password: c.get_string("neo4j.password").unwrap_or(defaults.password),
                ..defaults
            }
        }
        Err(_) => GraphConfig::default(),
    }
}

/// The settings a run would use, as shown by `vigil config`.
///
/// The Neo4j password is left out.
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub scan: ScanConfig,
    pub targets: ScanTargets,
    pub neo4j_uri: String,
    pub neo4j_user: String,
}

/// Resolve both config sections the same way a scan run does.
pub fn effective_config(file_prefix: &str) -> EffectiveConfig {
    let scan = load_scan_config(file_prefix);
    let targets = scan.targets();
    let graph = load_graph_config(file_prefix);

    EffectiveConfig {
        scan,
        targets,
        neo4j_uri: graph.uri,
        neo4j_user: graph.user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScanConfig::default();
        assert_eq!(config.nmap_path, "nmap");
        assert_eq!(config.host_timeout_secs, 300);
        assert_eq!(config.targets(), ScanTargets::default());
    }

    #[test]
    fn test_targets_drop_blank_and_invalid_entries() {
        let config = ScanConfig {
            directories_to_scan: vec![" /srv/backups ".into(), "".into(), "   ".into()],
            subnets_to_scan: vec!["10.0.1.0/24".into(), "bogus".into(), " ".into()],
            ..Default::default()
        };

        let targets = config.targets();
        assert_eq!(targets.directories, vec![PathBuf::from("/srv/backups")]);
        assert_eq!(targets.subnets.len(), 1);
        assert_eq!(targets.subnets[0].to_string(), "10.0.1.0/24");
    }

    #[test]
    fn test_load_scan_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.toml");
        std::fs::write(
            &path,
            r#"
[scan]
directories_to_scan = ["/srv/backups", "/mnt/nas"]
subnets_to_scan = ["192.168.1.0/24"]
host_timeout_secs = 60

[neo4j]
uri = "bolt://backup-graph:7687"
"#,
        )
        .unwrap();

        let prefix = dir.path().join("vigil");
        let prefix = prefix.to_str().unwrap();

        let config = load_scan_config(prefix);
        assert_eq!(config.directories_to_scan, vec!["/srv/backups", "/mnt/nas"]);
        assert_eq!(config.subnets_to_scan, vec!["192.168.1.0/24"]);
        assert_eq!(config.host_timeout_secs, 60);
        assert_eq!(config.nmap_path, "nmap");

        let graph = load_graph_config(prefix);
        assert_eq!(graph.uri, "bolt://backup-graph:7687");
        assert_eq!(graph.user, "neo4j");
    }

    #[test]
    fn test_missing_config_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent");
        let config = load_scan_config(prefix.to_str().unwrap());
        assert!(config.directories_to_scan.is_empty());
        assert!(config.subnets_to_scan.is_empty());
    }

    #[test]
    fn test_malformed_config_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("broken.toml"),
            "[scan]\ndirectories_to_scan = 42\n",
        )
        .unwrap();
        let prefix = dir.path().join("broken");
        let config = load_scan_config(prefix.to_str().unwrap());
        assert!(config.directories_to_scan.is_empty());
    }

    #[test]
    fn test_effective_config_shows_normalized_targets() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("vigil.toml"),
            r#"
[scan]
directories_to_scan = ["/srv/backups", "  "]
subnets_to_scan = ["10.0.1.0/24", "10.0.300.0/24"]

[neo4j]
user = "catalog"
password = "s3cret"
"#,
        )
        .unwrap();
        let prefix = dir.path().join("vigil");

        let effective = effective_config(prefix.to_str().unwrap());
        assert_eq!(effective.scan.subnets_to_scan.len(), 2);
        assert_eq!(effective.targets.directories, vec![PathBuf::from("/srv/backups")]);
        assert_eq!(effective.targets.subnets.len(), 1);
        assert_eq!(effective.neo4j_user, "catalog");

        let json = serde_json::to_value(&effective).unwrap();
        assert_eq!(json["targets"]["subnets"][0], "10.0.1.0/24");
        assert_eq!(json["scan"]["host_timeout_secs"], 300);
        assert!(!json.to_string().contains("s3cret"));
    }
}
