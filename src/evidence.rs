//! Persisted evidence layout.
//!
//! Per captured page: a PNG artifact and a sibling JSON metadata
//! record, organized under `<root>/<domain>/<route-dir>/`. Filenames
//! encode the route, an optional variant suffix (for filter/toggle
//! states), and a timestamp.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::ScoutError;
use crate::score::Reliability;

/// Metadata stored next to each screenshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub hash: String,
    pub reliability_score: u8,
    pub contamination_reasons: Vec<String>,
}

/// Paths produced for one capture.
#[derive(Debug, Clone)]
pub struct CapturePaths {
    pub image: PathBuf,
    pub metadata: PathBuf,
}

/// Writes capture evidence into the domain/route directory layout.
pub struct EvidenceStore {
    root: PathBuf,
}

impl EvidenceStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// SHA-256 hex digest of capture bytes or modal text.
    pub fn content_hash(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    /// Persist one capture: the PNG plus its sibling metadata record.
    pub fn save(
        &self,
        url: &Url,
        canonical_route: &str,
        variant: Option<&str>,
        png: &[u8],
        reliability: &Reliability,
    ) -> Result<(CapturePaths, CaptureRecord), ScoutError> {
        let domain = url.host_str().unwrap_or("unknown-host");
        let dir = self.root.join(domain).join(route_dir(canonical_route));
        std::fs::create_dir_all(&dir)?;

        let timestamp = Utc::now();
        let stem = match variant {
            Some(variant) => format!(
                "{}-{}-{}",
                route_stem(canonical_route),
                variant,
                timestamp.format("%Y%m%dT%H%M%S%3f")
            ),
            None => format!(
                "{}-{}",
                route_stem(canonical_route),
                timestamp.format("%Y%m%dT%H%M%S%3f")
            ),
        };

        let image = dir.join(format!("{stem}.png"));
        let metadata = dir.join(format!("{stem}.json"));

        let record = CaptureRecord {
            url: url.to_string(),
            timestamp,
            hash: Self::content_hash(png),
            reliability_score: reliability.score,
            contamination_reasons: reliability.reason_names(),
        };

        std::fs::write(&image, png)?;
        std::fs::write(&metadata, serde_json::to_string_pretty(&record)?)?;
        ::log::debug!("Saved capture evidence: {}", image.display());

        Ok((CapturePaths { image, metadata }, record))
    }

    /// All metadata records currently on disk, for resume seeding and
    /// rescan-list generation.
    pub fn records(&self) -> Result<Vec<CaptureRecord>, ScoutError> {
        let mut records = Vec::new();
        if !self.root.exists() {
            return Ok(records);
        }
        collect_records(&self.root, &mut records)?;
        Ok(records)
    }
}

fn collect_records(dir: &Path, out: &mut Vec<CaptureRecord>) -> Result<(), ScoutError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_records(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            let contents = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<CaptureRecord>(&contents) {
                Ok(record) => out.push(record),
                Err(e) => ::log::warn!("Skipping unreadable metadata {}: {}", path.display(), e),
            }
        }
    }
    Ok(())
}

/// Directory name for a canonical route.
fn route_dir(canonical_route: &str) -> String {
    let sanitized = sanitize(canonical_route);
    if sanitized.is_empty() {
        "root".to_string()
    } else {
        sanitized
    }
}

/// Filename stem for a canonical route.
fn route_stem(canonical_route: &str) -> String {
    let sanitized = sanitize(canonical_route);
    if sanitized.is_empty() {
        "index".to_string()
    } else {
        sanitized
    }
}

/// Replace characters that are invalid in filenames and bound length.
fn sanitize(route: &str) -> String {
    let mut name = route
        .trim_matches('/')
        .replace(['/', ':', '?', '&', '=', '#', '%'], "_");
    if name.len() > 100 {
        name.truncate(100);
    }
    name
}
