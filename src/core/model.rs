//! Classifier port and the bundled logistic flood-risk model.
//!
//! The evaluation loop only depends on the [`Classifier`] trait. The shipped
//! implementation is a logistic regression over standardized sensor values,
//! loaded from JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Default model shipped with the agent.
const BUNDLED_MODEL: &str = include_str!("../../models/glof_logistic.json");

/// Opaque scoring function trained offline.
pub trait Classifier: Send + Sync {
    /// Feature names in the order the model was trained on.
    fn feature_names(&self) -> &[String];

    /// Probability of the positive class (an outburst) for features aligned
    /// with [`Classifier::feature_names`].
    fn predict_proba(&self, features: &[f64]) -> f64;

    /// Global importance score per feature.
    fn feature_importances(&self) -> Vec<(String, f64)>;
}

/// Model loading errors.
#[derive(Debug)]
pub enum ModelError {
    IoError(String),
    ParseError(String),
    Invalid(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::IoError(e) => write!(f, "Model IO error: {e}"),
            ModelError::ParseError(e) => write!(f, "Model parse error: {e}"),
            ModelError::Invalid(e) => write!(f, "Invalid model: {e}"),
        }
    }
}

impl std::error::Error for ModelError {}

/// One input column of the logistic model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFeature {
    pub name: String,
    pub weight: f64,
    /// Training mean used for standardization
    #[serde(default)]
    pub mean: f64,
    /// Training standard deviation used for standardization
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Importance score; defaults to the absolute weight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
}

fn default_scale() -> f64 {
    1.0
}

/// Logistic regression: `p = sigmoid(bias + Σ weight * (x - mean) / scale)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub name: String,
    pub bias: f64,
    pub features: Vec<ModelFeature>,
    #[serde(skip)]
    names: Vec<String>,
}

impl LogisticModel {
    /// Parse and validate a model from JSON.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let mut model: LogisticModel =
            serde_json::from_str(json).map_err(|e| ModelError::ParseError(e.to_string()))?;
        model.validate()?;
        model.names = model.features.iter().map(|f| f.name.clone()).collect();
        Ok(model)
    }

    /// Load a model file from disk.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ModelError::IoError(format!("{}: {e}", path.display())))?;
        Self::from_json(&content)
    }

    /// The model bundled with the agent.
    pub fn bundled() -> Result<Self, ModelError> {
        Self::from_json(BUNDLED_MODEL)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.features.is_empty() {
            return Err(ModelError::Invalid("model has no features".to_string()));
        }
        if !self.bias.is_finite() {
            return Err(ModelError::Invalid("bias is not finite".to_string()));
        }

        let mut seen = HashSet::new();
        for feature in &self.features {
            if !seen.insert(feature.name.as_str()) {
                return Err(ModelError::Invalid(format!(
                    "duplicate feature '{}'",
                    feature.name
                )));
            }
            if !feature.weight.is_finite() || !feature.mean.is_finite() {
                return Err(ModelError::Invalid(format!(
                    "feature '{}' has non-finite parameters",
                    feature.name
                )));
            }
            if !(feature.scale.is_finite() && feature.scale > 0.0) {
                return Err(ModelError::Invalid(format!(
                    "feature '{}' needs a positive scale",
                    feature.name
                )));
            }
            if let Some(importance) = feature.importance {
                if !(importance.is_finite() && importance >= 0.0) {
                    return Err(ModelError::Invalid(format!(
                        "feature '{}' has a negative importance",
                        feature.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Classifier for LogisticModel {
    fn feature_names(&self) -> &[String] {
        &self.names
    }

    fn predict_proba(&self, features: &[f64]) -> f64 {
        let z = self
            .features
            .iter()
            .zip(features)
            .fold(self.bias, |acc, (f, x)| acc + f.weight * (x - f.mean) / f.scale);
        1.0 / (1.0 + (-z).exp())
    }

    fn feature_importances(&self) -> Vec<(String, f64)> {
        self.features
            .iter()
            .map(|f| (f.name.clone(), f.importance.unwrap_or(f.weight.abs())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TINY: &str = r#"{
        "name": "tiny",
        "bias": 0.0,
        "features": [
            {"name": "Water_Level_m", "weight": 2.0, "mean": 10.0, "scale": 5.0},
            {"name": "Rainfall_mm", "weight": -1.0, "importance": 0.5}
        ]
    }"#;

    #[test]
    fn test_bundled_model_loads() {
        let model = LogisticModel::bundled().expect("bundled model is valid");
        assert_eq!(model.feature_names().len(), 17);
        assert_eq!(model.feature_names()[1], "Water_Level_m");
    }

    #[test]
    fn test_predict_at_mean_is_sigmoid_of_bias() {
        let model = LogisticModel::from_json(TINY).unwrap();
        let p = model.predict_proba(&[10.0, 0.0]);
        assert!((p - 0.5).abs() < 1e-12);

        let high = model.predict_proba(&[20.0, 0.0]);
        assert!(high > 0.95);
    }

    #[test]
    fn test_importance_defaults_to_abs_weight() {
        let model = LogisticModel::from_json(TINY).unwrap();
        let importances = model.feature_importances();
        assert_eq!(importances[0], ("Water_Level_m".to_string(), 2.0));
        assert_eq!(importances[1], ("Rainfall_mm".to_string(), 0.5));
    }

    #[test]
    fn test_rejects_bad_models() {
        assert!(matches!(
            LogisticModel::from_json(r#"{"name": "x", "bias": 0.0, "features": []}"#),
            Err(ModelError::Invalid(_))
        ));
        assert!(matches!(
            LogisticModel::from_json(
                r#"{"name": "x", "bias": 0.0, "features": [
                    {"name": "a", "weight": 1.0}, {"name": "a", "weight": 2.0}]}"#
            ),
            Err(ModelError::Invalid(_))
        ));
        assert!(matches!(
            LogisticModel::from_json(
                r#"{"name": "x", "bias": 0.0, "features": [{"name": "a", "weight": 1.0, "scale": 0.0}]}"#
            ),
            Err(ModelError::Invalid(_))
        ));
        assert!(matches!(
            LogisticModel::from_json("not json"),
            Err(ModelError::ParseError(_))
        ));
    }
}
