//! Risk scoring: sensor snapshot → flood probability and contributing factors.

use crate::core::model::Classifier;
use crate::sensor::source::gaussian;
use crate::sensor::types::SensorSnapshot;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of contributing factors reported per assessment.
pub const MAX_CONTRIBUTING_FACTORS: usize = 3;

/// Result of scoring one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Outburst probability in [0, 1]
    pub probability: f64,
    /// Up to three sensor names, most important first
    pub contributing_factors: Vec<String>,
}

/// Scoring errors. Any of these skips the tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreError {
    /// The snapshot lacks features the classifier was trained on.
    FeatureMismatch { missing: Vec<String> },
    /// A required feature holds NaN or infinity.
    InvalidValue { feature: String },
}

impl std::fmt::Display for ScoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreError::FeatureMismatch { missing } => {
                write!(f, "Feature mismatch: missing {}", missing.join(", "))
            }
            ScoreError::InvalidValue { feature } => {
                write!(f, "Invalid value for feature {feature}")
            }
        }
    }
}

impl std::error::Error for ScoreError {}

/// Clamp a (possibly perturbed) probability into [0, 1]. NaN maps to 0.
pub fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// Add `N(0, sigma)` noise to a probability and clamp the result.
pub fn perturb<R: Rng>(probability: f64, sigma: f64, rng: &mut R) -> f64 {
    clamp_probability(probability + gaussian(rng, sigma))
}

/// Wraps a classifier. The importance ranking is computed once, at
/// construction, since it does not depend on the input.
pub struct RiskScorer {
    classifier: Box<dyn Classifier>,
    ranking: Vec<String>,
}

impl RiskScorer {
    pub fn new(classifier: Box<dyn Classifier>) -> Self {
        let ranking = rank_factors(classifier.as_ref());
        Self {
            classifier,
            ranking,
        }
    }

    /// Score a snapshot.
    pub fn score(&self, snapshot: &SensorSnapshot) -> Result<RiskAssessment, ScoreError> {
        let features = self.align(snapshot)?;
        let probability = clamp_probability(self.classifier.predict_proba(&features));

        Ok(RiskAssessment {
            probability,
            contributing_factors: self.ranking.clone(),
        })
    }

    /// The cached top factors.
    pub fn contributing_factors(&self) -> &[String] {
        &self.ranking
    }

    fn align(&self, snapshot: &SensorSnapshot) -> Result<Vec<f64>, ScoreError> {
        let names = self.classifier.feature_names();
        let missing: Vec<String> = names
            .iter()
            .filter(|name| snapshot.get(name).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ScoreError::FeatureMismatch { missing });
        }

        names
            .iter()
            .map(|name| match snapshot.get(name) {
                Some(value) if value.is_finite() => Ok(value),
                _ => Err(ScoreError::InvalidValue {
                    feature: name.clone(),
                }),
            })
            .collect()
    }
}

/// Top features by importance, descending. Ties keep training order;
/// features with zero importance are never reported.
fn rank_factors(classifier: &dyn Classifier) -> Vec<String> {
    let mut importances: Vec<(String, f64)> = classifier
        .feature_importances()
        .into_iter()
        .filter(|(_, score)| *score > 0.0)
        .collect();

    // Stable sort keeps the original order among equal scores.
    importances.sort_by(|a, b| b.1.total_cmp(&a.1));
    importances
        .into_iter()
        .take(MAX_CONTRIBUTING_FACTORS)
        .map(|(name, _)| name)
        .collect()
}
