use anyhow::Result;
use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Memory,
    File,
    Redis,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CoordinatorConfig {
    pub host: String,
    pub port: u16,
    pub root_node: String,
    pub shell_path: String,
    pub tree_store_type: StorageType,
    pub tree_file_path: String,
    pub tree_redis_urls: Option<String>,
    pub watch_interval_ms: u64,
    pub publish_timeout_secs: u64,
    /// 0 keeps failed requests pending forever.
    pub max_publish_attempts: u32,
}

impl CoordinatorConfig {
    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms.max(1))
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    pub fn redis_urls(&self) -> Vec<String> {
        match &self.tree_redis_urls {
            Some(urls) if !urls.trim().is_empty() => urls
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            _ => vec![format!("redis://{}:{}", self.host, self.port)],
        }
    }
}

/// Values taken from the command line; they win over every other source.
#[derive(Debug, Default, Clone)]
pub struct CliArgs {
    pub config_path: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub root_node: Option<String>,
    pub shell_path: Option<String>,
}

impl CliArgs {
    /// Accepts `--config`, `--host`, `--port`, `--root` and `--shell-path`, or
    /// the positional form `<host> <port> <root>`. The script directory
    /// defaults to the directory holding the binary.
    pub fn parse_from(args: &[String]) -> Self {
        let flag = |name: &str| {
            args.windows(2)
                .find(|w| w[0] == name)
                .map(|w| w[1].clone())
        };

        let mut positional = Vec::new();
        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            if arg.starts_with("--") {
                iter.next();
            } else {
                positional.push(arg.clone());
            }
        }

        let binary_dir = args
            .first()
            .and_then(|bin| Path::new(bin).parent())
            .map(|dir| dir.to_string_lossy().to_string())
            .map(|dir| if dir.is_empty() { ".".to_string() } else { dir });

        Self {
            config_path: flag("--config"),
            host: flag("--host").or_else(|| positional.first().cloned()),
            port: flag("--port").or_else(|| positional.get(1).cloned()),
            root_node: flag("--root").or_else(|| positional.get(2).cloned()),
            shell_path: flag("--shell-path").or(binary_dir),
        }
    }
}

pub fn load_coordinator_config(cli: &CliArgs) -> Result<CoordinatorConfig> {
    dotenv::dotenv().ok();

    let mut builder = default_builder()?.add_source(File::with_name("config/coordinator").required(false));
    if let Some(path) = &cli.config_path {
        builder = builder.add_source(File::with_name(path).required(true));
    }
    builder = builder.add_source(
        Environment::with_prefix("PUB")
            .ignore_empty(true)
            .try_parsing(true),
    );

    let config = apply_cli(builder, cli)?;
    log::debug!("Loaded coordinator config: {:?}", config);
    Ok(config)
}

fn default_builder() -> Result<ConfigBuilder<DefaultState>> {
    Ok(Config::builder()
        .set_default("host", "127.0.0.1")?
        .set_default("port", 2181)?
        .set_default("root_node", "/test")?
        .set_default("shell_path", ".")?
        .set_default("tree_store_type", "memory")?
        .set_default("tree_file_path", "./data/tree")?
        .set_default("watch_interval_ms", 500)?
        .set_default("publish_timeout_secs", 300)?
        .set_default("max_publish_attempts", 0)?)
}

fn apply_cli(builder: ConfigBuilder<DefaultState>, cli: &CliArgs) -> Result<CoordinatorConfig> {
    Ok(builder
        .set_override_option("host", cli.host.clone())?
        .set_override_option("port", cli.port.clone())?
        .set_override_option("root_node", cli.root_node.clone())?
        .set_override_option("shell_path", cli.shell_path.clone())?
        .build()?
        .try_deserialize::<CoordinatorConfig>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn positional_arguments() {
        let cli = CliArgs::parse_from(&args(&["/opt/pub/coordinator", "10.0.0.2", "2182", "/games"]));
        assert_eq!(cli.host.as_deref(), Some("10.0.0.2"));
        assert_eq!(cli.port.as_deref(), Some("2182"));
        assert_eq!(cli.root_node.as_deref(), Some("/games"));
        assert_eq!(cli.shell_path.as_deref(), Some("/opt/pub"));
        assert!(cli.config_path.is_none());
    }

    #[test]
    fn flags_override_binary_dir() {
        let cli = CliArgs::parse_from(&args(&["coordinator", "--config", "cfg.toml", "--shell-path", "/srv/scripts"]));
        assert_eq!(cli.config_path.as_deref(), Some("cfg.toml"));
        assert_eq!(cli.shell_path.as_deref(), Some("/srv/scripts"));
        assert!(cli.host.is_none());
    }

    #[test]
    fn cli_values_win() {
        let cli = CliArgs {
            host: Some("zk.internal".to_string()),
            port: Some("6379".to_string()),
            root_node: Some("/prod".to_string()),
            ..Default::default()
        };
        let config = apply_cli(default_builder().unwrap(), &cli).unwrap();
        assert_eq!(config.host, "zk.internal");
        assert_eq!(config.port, 6379);
        assert_eq!(config.root_node, "/prod");
        assert_eq!(config.redis_urls(), vec!["redis://zk.internal:6379".to_string()]);
        assert_eq!(config.tree_store_type, StorageType::Memory);
        assert_eq!(config.watch_interval_ms, 500);
    }

    #[test]
    fn cli_overrides_a_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coordinator.toml");
        std::fs::write(&path, "host = \"file.host\"\nport = 2200\nmax_publish_attempts = 3\n").unwrap();
        let builder = default_builder()
            .unwrap()
            .add_source(File::from(path.as_path()).required(true));
        let cli = CliArgs {
            port: Some("2300".to_string()),
            ..Default::default()
        };

        let config = apply_cli(builder, &cli).unwrap();
        assert_eq!(config.host, "file.host");
        assert_eq!(config.port, 2300);
        assert_eq!(config.max_publish_attempts, 3);
    }
}
