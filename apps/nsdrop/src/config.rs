//! Configuration management.
//!
//! Settings come from an optional TOML file (`--config`), then command
//! line flags override individual fields:
//!
//! ```toml
//! root = "/mnt/games"
//! folders = "Downloads,Games/switch"
//! ip = "192.168.1.95"
//! port = 8000
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use nsdrop_announce::{ANNOUNCE_PORT, AnnounceConfig};
use nsdrop_file_server::ServerConfig;
use nsdrop_manifest::{ScanConfig, parse_scan_roots};
use serde::{Deserialize, Serialize};

/// Command line flags.
#[derive(Debug, Default, Parser)]
#[command(name = "nsdrop", version, about = "Serve console packages and announce them to the installer")]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to start scanning from.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Comma-separated folders (relative to root) to scan.
    #[arg(long)]
    pub folders: Option<String>,

    /// Host IP the console should download from.
    #[arg(long)]
    pub ip: Option<String>,

    /// Host port the console should download from.
    #[arg(long)]
    pub port: Option<u16>,

    /// Address to bind the HTTP server to (default 0.0.0.0:<port>).
    #[arg(long)]
    pub listen: Option<SocketAddr>,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base root that folders and download paths are relative to.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Comma-separated scan folders, in announce order.
    #[serde(default = "default_folders")]
    pub folders: String,

    /// Host IP written into announced URLs.
    #[serde(default = "default_ip")]
    pub ip: String,

    /// Host port written into announced URLs and bound by default.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<SocketAddr>,

    /// Console port for the package list push.
    #[serde(default = "default_announce_port")]
    pub announce_port: u16,

    /// Upper bound for the acknowledgement wait, in seconds.
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_folders() -> String {
    "Downloads,Games/switch".into()
}

fn default_ip() -> String {
    local_ipv4()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "127.0.0.1".into())
}

fn default_port() -> u16 {
    8000
}

fn default_announce_port() -> u16 {
    ANNOUNCE_PORT
}

fn default_ack_timeout_secs() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            folders: default_folders(),
            ip: default_ip(),
            port: default_port(),
            listen: None,
            announce_port: default_announce_port(),
            ack_timeout_secs: default_ack_timeout_secs(),
        }
    }
}

impl Config {
    /// Loads the config file (if any) and applies command line overrides.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                toml::from_str(&content)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Config::default(),
        };

        config.apply(cli);
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, cli: &Cli) {
        if let Some(root) = &cli.root {
            self.root = root.clone();
        }
        if let Some(folders) = &cli.folders {
            self.folders = folders.clone();
        }
        if let Some(ip) = &cli.ip {
            self.ip = ip.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(listen) = cli.listen {
            self.listen = Some(listen);
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if parse_scan_roots(&self.folders).is_empty() {
            anyhow::bail!("no scan folders configured");
        }
        if self.ip.trim().is_empty() {
            anyhow::bail!("host ip is empty");
        }
        Ok(())
    }

    /// `ip:port` as written into announced URLs.
    pub fn host_address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], self.port)))
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig::new(
            self.root.clone(),
            parse_scan_roots(&self.folders),
            self.host_address(),
        )
    }

    pub fn announce_config(&self) -> AnnounceConfig {
        AnnounceConfig {
            port: self.announce_port,
            ack_timeout: Duration::from_secs(self.ack_timeout_secs),
            ..AnnounceConfig::default()
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            listen: self.listen_addr(),
            scan: Arc::new(self.scan_config()),
            announce: self.announce_config(),
        }
    }
}

/// First LAN IPv4 address, skipping loopback and link-local.
fn local_ipv4() -> Option<IpAddr> {
    let interfaces = if_addrs::get_if_addrs().ok()?;
    interfaces
        .into_iter()
        .filter(|iface| !iface.is_loopback())
        .find_map(|iface| match iface.ip() {
            IpAddr::V4(ipv4) if !ipv4.is_loopback() && !ipv4.is_link_local() => {
                Some(IpAddr::V4(ipv4))
            }
            _ => None,
        })
}
