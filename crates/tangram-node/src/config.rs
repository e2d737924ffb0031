//! Configuration for `tangram-node`.
//!
//! Two separate documents: a small node-local TOML file (listen/gateway
//! addresses, bootstrap peer, optional fixed RPC port) and a `GameConfig`
//! JSON document read once at startup, loaded with the usual
//! `load_or_default`/`#[serde(default = ...)]` pattern.

use std::path::Path;

use serde::{Deserialize, Serialize};

use tangram_protocol::WireGameConfig;
use tangram_state::GameConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSection {
    /// Address the RPC/QUIC endpoint binds to.
    #[serde(default = "default_rpc_addr")]
    pub rpc_addr: String,
    /// Address the websocket gateway binds to, serving exactly one UI
    /// session.
    #[serde(default = "default_gateway_addr")]
    pub gateway_addr: String,
    /// Remote peer to `Connect` to at startup. Absent means `NewGame`:
    /// this peer starts its own session.
    #[serde(default)]
    pub bootstrap_addr: Option<String>,
    /// Display name advertised in this peer's `Peer` record.
    #[serde(default = "default_name")]
    pub name: String,
    /// Path to the `GameConfig` JSON document, read once at startup.
    #[serde(default = "default_game_config_path")]
    pub game_config: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            rpc_addr: default_rpc_addr(),
            gateway_addr: default_gateway_addr(),
            bootstrap_addr: None,
            name: default_name(),
            game_config: default_game_config_path(),
        }
    }
}

fn default_rpc_addr() -> String {
    "0.0.0.0:9470".into()
}
fn default_gateway_addr() -> String {
    "127.0.0.1:9471".into()
}
fn default_name() -> String {
    "player".into()
}
fn default_game_config_path() -> String {
    "~/.tangram/game.json".into()
}

impl NodeConfig {
    /// Load config from file, or fall back to defaults if missing.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: NodeConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node: NodeSection::default(),
        }
    }
}

/// Loads the `GameConfig` JSON document from `path`, read once at
/// startup, schema matching [`GameConfig`].
pub fn load_game_config(path: &Path) -> anyhow::Result<GameConfig> {
    let content = std::fs::read_to_string(path)?;
    let wire: WireGameConfig = serde_json::from_str(&content)?;
    Ok(wire.into())
}
