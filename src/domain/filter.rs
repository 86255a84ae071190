use serde::{Deserialize, Serialize};

use super::place::NormalizedRecord;

/// Minimum quality a record needs before it is kept. Zero thresholds are
/// disabled, so absent ratings never reject a record on their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub min_rating: f64,
    pub min_reviews: u64,
    pub require_website: bool,
    pub require_phone: bool,
}

impl QualityThresholds {
    pub fn passes(&self, record: &NormalizedRecord) -> bool {
        let rating = record.rating.filter(|r| r.is_finite()).unwrap_or(0.0);
        let reviews = record.review_count.unwrap_or(0);

        rating >= self.min_rating
            && reviews >= self.min_reviews
            && (!self.require_website || record.has_website())
            && (!self.require_phone || record.has_phone())
    }
}
