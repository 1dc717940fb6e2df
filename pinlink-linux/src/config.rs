//! Load config from file and environment.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use pinlink_core::CoreConfig;
use serde::Deserialize;

/// Host configuration. File: ~/.config/pinlink/config.toml or /etc/pinlink/config.toml.
/// Env overrides: PINLINK_BOARD_ID, PINLINK_PORT, PINLINK_BROADCAST, PINLINK_LOG.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Name this board announces (default: hostname).
    #[serde(default = "default_board_id")]
    pub board_id: String,
    /// UDP port shared by every board on the LAN (default 45680).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Broadcast address for discovery and broadcast kinds.
    #[serde(default = "default_broadcast")]
    pub broadcast: Ipv4Addr,
    /// Tracing filter used when RUST_LOG is unset.
    #[serde(default = "default_log")]
    pub log: String,
    /// How often the engine is updated, in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default)]
    pub core: CoreConfig,
}

fn default_board_id() -> String {
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "pinlink-linux".to_string())
}
fn default_port() -> u16 {
    45680
}
fn default_broadcast() -> Ipv4Addr {
    Ipv4Addr::BROADCAST
}
fn default_log() -> String {
    "info".to_string()
}
fn default_tick_ms() -> u64 {
    20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            board_id: default_board_id(),
            port: default_port(),
            broadcast: default_broadcast(),
            log: default_log(),
            tick_ms: default_tick_ms(),
            core: CoreConfig::default(),
        }
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> anyhow::Result<Config> {
    let mut c = match config_paths().into_iter().find(|p| p.exists()) {
        Some(path) => load_file(&path)?,
        None => Config::default(),
    };
    apply_env(&mut c, |key| std::env::var(key).ok());
    c.core = c.core.clamped();
    Ok(c)
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/pinlink/config.toml"));
    }
    out.push(PathBuf::from("/etc/pinlink/config.toml"));
    out
}

fn load_file(path: &Path) -> anyhow::Result<Config> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse(&s).with_context(|| format!("parsing {}", path.display()))
}

fn parse(s: &str) -> anyhow::Result<Config> {
    Ok(toml::from_str::<Config>(s)?)
}

/// Unparseable values are ignored and the earlier layer wins.
fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(s) = var("PINLINK_BOARD_ID").filter(|s| !s.is_empty()) {
        c.board_id = s;
    }
    if let Some(p) = var("PINLINK_PORT").and_then(|s| s.parse::<u16>().ok()) {
        c.port = p;
    }
    if let Some(ip) = var("PINLINK_BROADCAST").and_then(|s| s.parse::<Ipv4Addr>().ok()) {
        c.broadcast = ip;
    }
    if let Some(s) = var("PINLINK_LOG") {
        c.log = s;
    }
}
