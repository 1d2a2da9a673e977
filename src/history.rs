//! Append-mostly JSON stores shared with external QA tooling.
//!
//! All of these files can be touched by multiple tools concurrently,
//! so every update is a read-modify-write under an async lock.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::ScoutError;
use crate::results::ScrapeJob;

/// Ceiling on RL history entries; overflow keeps the most recent half.
pub const RL_HISTORY_MAX: usize = 1000;

/// One reinforcement-learning history entry, appended per capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RlState {
    pub url: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub reliability_score: u8,
    pub contamination_reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_hash: Option<String>,
}

/// Sliding-window JSON history of capture outcomes.
pub struct RlHistory {
    path: PathBuf,
    max_entries: usize,
    lock: Mutex<()>,
}

impl RlHistory {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_entries: RL_HISTORY_MAX,
            lock: Mutex::new(()),
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Append an entry, evicting the oldest half when the ceiling is
    /// crossed so the file cannot grow without bound.
    pub async fn append(&self, entry: RlState) -> Result<(), ScoutError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_unlocked()?;
        entries.push(entry);
        if entries.len() > self.max_entries {
            let keep_from = entries.len() - self.max_entries / 2;
            entries.drain(..keep_from);
            ::log::info!(
                "RL history exceeded {} entries; kept most recent {}",
                self.max_entries,
                entries.len()
            );
        }
        self.write_unlocked(&entries)
    }

    pub async fn entries(&self) -> Result<Vec<RlState>, ScoutError> {
        let _guard = self.lock.lock().await;
        self.read_unlocked()
    }

    fn read_unlocked(&self) -> Result<Vec<RlState>, ScoutError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_unlocked(&self, entries: &[RlState]) -> Result<(), ScoutError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

/// A `url[#hash] -> string` JSON map shared with external QA tooling
/// (tag and reason stores).
pub struct JsonMapStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonMapStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), ScoutError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_unlocked()?;
        map.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&map)?)?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, ScoutError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_unlocked()?.remove(key))
    }

    fn read_unlocked(
        &self,
    ) -> Result<std::collections::BTreeMap<String, String>, ScoutError> {
        if !self.path.exists() {
            return Ok(Default::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Default::default());
        }
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Reads and writes the rescan list: a JSON array of canonical route
/// paths flagged for re-crawling.
pub struct RescanList {
    path: PathBuf,
}

impl RescanList {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn write(&self, routes: &[String]) -> Result<(), ScoutError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(routes)?)?;
        Ok(())
    }

    pub fn routes(&self) -> Result<Vec<String>, ScoutError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Turn listed routes into depth-1 jobs against a base origin.
    pub fn jobs(&self, base: &url::Url) -> Result<Vec<ScrapeJob>, ScoutError> {
        let routes = self.routes()?;
        Ok(routes
            .iter()
            .filter_map(|route| base.join(route).ok())
            .map(|u| ScrapeJob {
                url: u.to_string(),
                depth: 1,
                source_url: None,
            })
            .collect())
    }
}
