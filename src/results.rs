use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unit of crawl work: a URL to explore at a given depth.
///
/// Created by the frontier when a link is discovered, consumed exactly
/// once by a worker, immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    /// URL to visit
    pub url: String,

    /// Crawl depth (0 for the seed URL)
    pub depth: usize,

    /// URL of the page the link was discovered on, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl ScrapeJob {
    pub fn seed(url: &str) -> Self {
        Self {
            url: url.to_string(),
            depth: 0,
            source_url: None,
        }
    }
}

/// Kinds of UI actions the command layer can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Click,
    Fill,
    Select,
    Check,
}

/// Append-only record of one attempted command.
///
/// The ordered list of these records is the audit trail of how a
/// captured state was reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub selector: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Page URL at the time the command was issued
    pub url: String,
    pub timestamp: DateTime<Utc>,
    /// Network request URLs correlated with this action
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requests: Vec<String>,
}

/// A link found during exploration, with the breadcrumb of action
/// labels that led to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredLink {
    pub url: String,
    pub path: Vec<String>,
}

/// An overlay captured when an interaction opened a modal instead of
/// navigating. Deduplicated by a hash of the rendered modal text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalDiscovery {
    pub trigger_text: String,
    pub modal_title: String,
    pub elements: Vec<String>,
    pub links: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
    pub content_hash: String,
}

/// Final product of one exploration pass over one URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub url: String,
    pub page_title: String,
    pub elements: Vec<String>,
    pub links: Vec<DiscoveredLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
    pub modal_discoveries: Vec<ModalDiscovery>,
    pub action_chain: Vec<ActionRecord>,
    pub reliability_score: u8,
    pub contamination_reasons: Vec<String>,
    pub newly_discovered_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-job mutable dedup sets.
///
/// Owned exclusively by one pipeline invocation; discarded when the
/// job finishes. Prevents re-triggering the same control twice within
/// one exploration pass.
#[derive(Debug, Default)]
pub struct VisitedSets {
    pub expanded_menus: HashSet<String>,
    pub sidebar_items: HashSet<String>,
    pub global_actions: HashSet<String>,
    pub clicked_rows: HashSet<String>,
    pub switched_tabs: HashSet<String>,
    pub toggled_filters: HashSet<String>,
    pub modal_hashes: HashSet<String>,
}
