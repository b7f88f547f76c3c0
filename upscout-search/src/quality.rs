//! Upgrade decisions for a matched candidate.

use tracing::debug;
use upscout_core::MovieRecord;

use crate::client::magnet_uri;
use crate::types::{CandidateRecord, MatchResult, QualityTier, Upgrade};

/// Separator between labels in the serialized quality list.
pub const QUALITY_SEPARATOR: &str = "|";

/// Picks the smallest worthwhile upgrade over the library copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityEvaluator;

impl QualityEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Next quality step above the library copy that can actually be fetched.
    ///
    /// The lowest better tier wins. When none of its releases carries a hash
    /// the next better tier with one is used instead.
    pub fn evaluate(&self, movie: &MovieRecord, matched: &MatchResult) -> Upgrade {
        let Some(candidate) = matched.candidate() else {
            return Upgrade::none();
        };

        let current = QualityTier::from_height(movie.current_max_height);
        let mut better: Vec<(QualityTier, &str)> = candidate
            .available_qualities
            .iter()
            .filter_map(|label| QualityTier::from_label(label).map(|tier| (tier, label.as_str())))
            .filter(|(tier, _)| *tier > current)
            .collect();
        better.sort();

        for (tier, label) in better {
            let Some(torrent) = candidate.preferred_torrent(label) else {
                debug!("{} has {} listed without a usable release", candidate.title, label);
                continue;
            };
            debug!(
                "Upgrade for '{}': {:?} -> {} ({:?})",
                movie.title, current, label, tier
            );
            return Upgrade {
                next_quality: Some(label.to_string()),
                magnet: Some(magnet_uri(&candidate.title, torrent)),
            };
        }

        Upgrade::none()
    }
}

/// Quality labels offered by a candidate, lowest tier first.
pub fn serialize_qualities(candidate: &CandidateRecord) -> String {
    candidate.qualities_by_tier().join(QUALITY_SEPARATOR)
}
