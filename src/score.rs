//! Reliability scoring for captured page states.
//!
//! A capture starts perfect and loses a fixed weight for every
//! contamination signal detected. The scorer is a pure function of
//! observable page state, which keeps it independently testable.

use serde::{Deserialize, Serialize};

/// Named contamination signals, each with a fixed penalty weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Contamination {
    ExplicitErrorUi,
    LoadingState,
    BrokenImages,
    BlankPage,
}

impl Contamination {
    pub fn weight(&self) -> u8 {
        match self {
            Contamination::ExplicitErrorUi => 40,
            Contamination::LoadingState => 25,
            Contamination::BrokenImages => 20,
            Contamination::BlankPage => 30,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Contamination::ExplicitErrorUi => "explicit-error-ui",
            Contamination::LoadingState => "loading-state",
            Contamination::BrokenImages => "broken-images",
            Contamination::BlankPage => "blank-page",
        }
    }
}

/// Body text fragments that indicate an explicit error state.
const ERROR_TEXT_MARKERS: &[&str] = &[
    "something went wrong",
    "an error occurred",
    "internal server error",
    "access denied",
    "page not found",
    "unexpected error",
];

/// Broken images tolerated before the signal fires.
const BROKEN_IMAGE_THRESHOLD: u32 = 2;

/// Body text shorter than this is treated as a blank page.
const BLANK_TEXT_THRESHOLD: usize = 40;

/// Snapshot of the page signals the scorer consumes.
#[derive(Debug, Clone, Default)]
pub struct PageObservation {
    pub body_text: String,
    /// An error toast/banner selector matched a visible element
    pub error_ui_visible: bool,
    /// A spinner/skeleton selector matched a visible element
    pub loading_visible: bool,
    pub broken_image_count: u32,
}

/// Scoring outcome: 0-100 plus the ordered list of detected reasons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reliability {
    pub score: u8,
    pub reasons: Vec<Contamination>,
}

impl Reliability {
    /// Reason names as stored in metadata records.
    pub fn reason_names(&self) -> Vec<String> {
        self.reasons.iter().map(|r| r.name().to_string()).collect()
    }

    /// Whether the capture clears the golden-path threshold.
    pub fn is_stable(&self, threshold: u8) -> bool {
        self.score >= threshold
    }
}

/// Score one observed page state.
///
/// The score is monotonically reduced by each detected signal and
/// clamped to zero.
pub fn score(observation: &PageObservation) -> Reliability {
    let mut reasons = Vec::new();
    let lower = observation.body_text.to_lowercase();

    if observation.error_ui_visible || ERROR_TEXT_MARKERS.iter().any(|m| lower.contains(m)) {
        reasons.push(Contamination::ExplicitErrorUi);
    }
    if observation.loading_visible {
        reasons.push(Contamination::LoadingState);
    }
    if observation.broken_image_count >= BROKEN_IMAGE_THRESHOLD {
        reasons.push(Contamination::BrokenImages);
    }
    if observation.body_text.trim().len() < BLANK_TEXT_THRESHOLD {
        reasons.push(Contamination::BlankPage);
    }

    let penalty: u32 = reasons.iter().map(|r| r.weight() as u32).sum();
    let score = 100u32.saturating_sub(penalty) as u8;

    Reliability { score, reasons }
}
