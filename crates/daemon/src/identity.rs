// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent identity files: `{.thrum}/identities/{name}.json`.
//!
//! A Unix-socket connection is trusted from process; its identity comes
//! from the `THRUM_NAME` hint or, when exactly one identity file exists,
//! from that file. More than one candidate without a hint is ambiguous
//! and stays anonymous rather than guessing.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("identity file {0} is malformed: {1}")]
    Malformed(PathBuf, serde_json::Error),

    #[error("multiple identities and no THRUM_NAME hint: {0:?}")]
    Ambiguous(Vec<String>),

    #[error("no identity named {0:?}")]
    Unknown(String),
}

/// One registered identity on this checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub role: String,
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// Identity file store rooted at `identities/`.
pub struct IdentityStore {
    dir: PathBuf,
}

impl IdentityStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn save(&self, identity: &Identity) -> Result<(), IdentityError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&identity.name);
        let json = serde_json::to_string_pretty(identity)
            .map_err(|e| IdentityError::Malformed(path.clone(), e))?;
        std::fs::write(&path, json)?;
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<Identity, IdentityError> {
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(IdentityError::Unknown(name.to_string()));
        }
        let raw = std::fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(|e| IdentityError::Malformed(path, e))
    }

    pub fn remove(&self, name: &str) -> Result<(), IdentityError> {
        let path = self.path_for(name);
        if path.is_file() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Names of all identity files, sorted.
    pub fn list(&self) -> Result<Vec<String>, IdentityError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Select the connection identity: the hint wins, a single identity
    /// is unambiguous, several without a hint is an error listing them.
    pub fn select(&self, hint: Option<&str>) -> Result<Option<Identity>, IdentityError> {
        if let Some(name) = hint {
            return self.load(name).map(Some);
        }
        let names = self.list()?;
        match names.as_slice() {
            [] => Ok(None),
            [only] => self.load(only).map(Some),
            many => Err(IdentityError::Ambiguous(many.to_vec())),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
