// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon runtime settings from `{.thrum}/config.json`.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// How the WebSocket transport picks its port: `"auto"` or a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortStrategy {
    /// First free port starting at [`DaemonConfig::WS_PORT_BASE`].
    #[default]
    Auto,
    Fixed(u16),
}

impl Serialize for PortStrategy {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PortStrategy::Auto => serializer.serialize_str("auto"),
            PortStrategy::Fixed(port) => serializer.serialize_u16(*port),
        }
    }
}

impl<'de> Deserialize<'de> for PortStrategy {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Port(u16),
            Name(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Port(port) => Ok(PortStrategy::Fixed(port)),
            Raw::Name(name) if name == "auto" => Ok(PortStrategy::Auto),
            Raw::Name(name) => Err(serde::de::Error::custom(format!(
                "ws_port must be \"auto\" or a port number, got {name:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// WebSocket port: `"auto"` or a fixed number.
    pub ws_port: PortStrategy,
    /// Idle cutoff for `agent.cleanup` when the caller passes none.
    pub cleanup_idle_secs: u64,
    /// Name of the configured sync peer, when a remote sync backend
    /// exists. `sync.force` requires it.
    pub sync_peer: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { ws_port: PortStrategy::Auto, cleanup_idle_secs: 3600, sync_peer: None }
    }
}

impl DaemonConfig {
    /// Port scan origin for the `auto` strategy.
    pub const WS_PORT_BASE: u16 = 9999;

    /// Load from `config.json`, falling back to defaults when the file
    /// is absent. A present-but-unreadable file is an error: silently
    /// ignoring a broken config hides misconfiguration.
    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn sync_configured(&self) -> bool {
        self.sync_peer.is_some()
    }
}
