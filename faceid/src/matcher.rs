use serde::Serialize;

use crate::embedding::similarity;
use crate::registry::Snapshot;

/// Identity id reported when no enrolled identity clears the threshold.
pub const UNKNOWN_ID: &str = "unknown";

/// Display name reported alongside [`UNKNOWN_ID`].
pub const UNKNOWN_NAME: &str = "Unknown";

/// The highest-scoring identity for a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Position in [`Snapshot::identities`].
    pub index: usize,
    /// Cosine similarity of the best sample.
    pub score: f32,
}

/// Outcome of matching one embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Matched identity id, or [`UNKNOWN_ID`].
    pub identity_id: String,
    /// Matched display name, or [`UNKNOWN_NAME`].
    pub display_name: String,
    /// Best similarity found, reported even when below the threshold.
    pub confidence: f32,
    /// True if `confidence` reached the threshold.
    pub matched: bool,
}

impl MatchResult {
    pub fn unknown(confidence: f32) -> Self {
        Self {
            identity_id: UNKNOWN_ID.to_string(),
            display_name: UNKNOWN_NAME.to_string(),
            confidence,
            matched: false,
        }
    }
}

/// Scores a query against a snapshot and finds the best identity.
///
/// [`LinearMatcher`] scans every sample. An approximate index can implement
/// this trait without changing callers.
pub trait Matcher: Send + Sync {
    /// Returns the best identity, or `None` if the snapshot holds no samples.
    fn best(&self, query: &[f32], snapshot: &Snapshot) -> Option<Candidate>;

    /// Finds the best identity and applies `threshold`.
    fn match_query(&self, query: &[f32], snapshot: &Snapshot, threshold: f32) -> MatchResult {
        let Some(best) = self.best(query, snapshot) else {
            return MatchResult::unknown(0.0);
        };
        match snapshot.identities().get(best.index) {
            Some(identity) if best.score >= threshold => MatchResult {
                identity_id: identity.id.clone(),
                display_name: identity.display_name.clone(),
                confidence: best.score,
                matched: true,
            },
            _ => MatchResult::unknown(best.score),
        }
    }
}

/// Brute-force cosine matcher: linear in the total number of samples.
///
/// Identities are visited in id order and a candidate only replaces the
/// current best on a strictly higher score, so equal scores resolve to the
/// smallest id. NaN scores are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearMatcher;

impl Matcher for LinearMatcher {
    fn best(&self, query: &[f32], snapshot: &Snapshot) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        for (index, identity) in snapshot.identities().iter().enumerate() {
            for sample in &identity.samples {
                let score = similarity(query, sample);
                if score.is_nan() {
                    continue;
                }
                if best.is_none_or(|b| score > b.score) {
                    best = Some(Candidate { index, score });
                }
            }
        }
        best
    }
}
