use std::fmt;

use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::RandomForestRegressor;
use smartcore::linalg::basic::matrix::DenseMatrix;
use thiserror::Error;

use super::features::FeatureVector;

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("model expects {expected} features but received {actual}")]
    InputLength { expected: usize, actual: usize },

    #[error("model evaluation failed: {0}")]
    Evaluation(String),

    #[error("model returned a non-finite price")]
    NonFinite,
}

/// Interface for trained price regressors.
pub trait PricePredictor: Send + Sync {
    /// Predicted unit price for one assembled lot.
    fn predict(&self, features: &FeatureVector) -> Result<f64, PredictionError>;

    /// Width of the feature vector the model was trained on.
    fn expected_input_len(&self) -> usize;

    fn name(&self) -> &str;
}

fn check_input(expected: usize, features: &FeatureVector) -> Result<(), PredictionError> {
    if features.len() == expected {
        Ok(())
    } else {
        Err(PredictionError::InputLength {
            expected,
            actual: features.len(),
        })
    }
}

/// Ordinary least squares model: one coefficient per feature plus intercept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPriceModel {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LinearPriceModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }
}

impl PricePredictor for LinearPriceModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64, PredictionError> {
        check_input(self.coefficients.len(), features)?;
        let price = self
            .coefficients
            .iter()
            .zip(features.as_slice())
            .fold(self.intercept, |acc, (weight, value)| acc + weight * value);

        if price.is_finite() {
            Ok(price)
        } else {
            Err(PredictionError::NonFinite)
        }
    }

    fn expected_input_len(&self) -> usize {
        self.coefficients.len()
    }

    fn name(&self) -> &str {
        "linear regression"
    }
}

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Random forest regressor trained with smartcore.
///
/// smartcore does not expose the training width, so it travels alongside the
/// serialized forest.
#[derive(Serialize, Deserialize)]
pub struct ForestPriceModel {
    input_len: usize,
    forest: Forest,
}

impl ForestPriceModel {
    pub fn new(input_len: usize, forest: Forest) -> Self {
        Self { input_len, forest }
    }
}

impl fmt::Debug for ForestPriceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForestPriceModel")
            .field("input_len", &self.input_len)
            .finish_non_exhaustive()
    }
}

impl PricePredictor for ForestPriceModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64, PredictionError> {
        check_input(self.input_len, features)?;
        let input = DenseMatrix::from_2d_vec(&vec![features.as_slice().to_vec()])
            .map_err(|err| PredictionError::Evaluation(format!("matrix creation failed: {err}")))?;

        let predictions = self
            .forest
            .predict(&input)
            .map_err(|err| PredictionError::Evaluation(err.to_string()))?;

        match predictions.first() {
            Some(price) if price.is_finite() => Ok(*price),
            Some(_) => Err(PredictionError::NonFinite),
            None => Err(PredictionError::Evaluation(
                "no prediction returned".to_string(),
            )),
        }
    }

    fn expected_input_len(&self) -> usize {
        self.input_len
    }

    fn name(&self) -> &str {
        "random forest"
    }
}

/// On-disk model artifact, tagged by model family.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Linear(LinearPriceModel),
    RandomForest(ForestPriceModel),
}

impl ModelArtifact {
    pub fn into_predictor(self) -> Box<dyn PricePredictor> {
        match self {
            ModelArtifact::Linear(model) => Box::new(model),
            ModelArtifact::RandomForest(model) => Box::new(model),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::domain::LotRecord;
    use crate::pricing::features::FeatureAssembler;
    use crate::pricing::vocabulary::CategoryVocabulary;
    use smartcore::ensemble::random_forest_regressor::RandomForestRegressorParameters;
    use std::sync::Arc;

    fn assembler() -> FeatureAssembler {
        let vocabulary = CategoryVocabulary::new(["ABC", "DEF"], ["BOP", "BP1", "PF1"])
            .expect("vocabulary builds");
        FeatureAssembler::new(Arc::new(vocabulary))
    }

    fn features(assembler: &FeatureAssembler, mark: &str, grade: &str) -> FeatureVector {
        assembler
            .assemble(&LotRecord::new("05/06/2023", mark, grade, "20", "10"))
            .expect("features assemble")
    }

    #[test]
    fn linear_model_applies_weights_in_order() {
        let model = LinearPriceModel::new(
            vec![0.5, 0.25, 0.0, 1.0, 2.0, 100.0, 60.0, 10.0, 30.0, 50.0],
            80.0,
        );
        let assembler = assembler();
        let price = model
            .predict(&features(&assembler, "ABC", "BP1"))
            .expect("prediction");
        assert_eq!(price, 254.0);
    }

    #[test]
    fn linear_model_rejects_wrong_width() {
        let model = LinearPriceModel::new(vec![1.0; 4], 0.0);
        let err = model
            .predict(&features(&assembler(), "ABC", "BP1"))
            .expect_err("width mismatch");
        assert!(matches!(
            err,
            PredictionError::InputLength {
                expected: 4,
                actual: 10
            }
        ));
    }

    #[test]
    fn artifact_is_tagged_by_kind() {
        let json = r#"{"kind":"linear","coefficients":[1.0,2.0],"intercept":3.5}"#;
        let artifact: ModelArtifact = serde_json::from_str(json).expect("artifact parses");
        let predictor = artifact.into_predictor();
        assert_eq!(predictor.expected_input_len(), 2);
        assert_eq!(predictor.name(), "linear regression");
    }

    #[test]
    fn forest_model_predicts_from_serialized_artifact() {
        let assembler = assembler();
        let rows: Vec<Vec<f64>> = [
            ("ABC", "BOP"),
            ("ABC", "BP1"),
            ("ABC", "PF1"),
            ("DEF", "BOP"),
            ("DEF", "BP1"),
            ("DEF", "PF1"),
        ]
        .iter()
        .map(|(mark, grade)| features(&assembler, mark, grade).into_inner())
        .collect();
        let targets = vec![800.0, 900.0, 1000.0, 600.0, 700.0, 750.0];

        let x = DenseMatrix::from_2d_vec(&rows).expect("training matrix");
        let forest = RandomForestRegressor::fit(&x, &targets, RandomForestRegressorParameters::default())
            .expect("forest trains");
        let artifact = ModelArtifact::RandomForest(ForestPriceModel::new(10, forest));

        let json = serde_json::to_string(&artifact).expect("artifact serializes");
        let predictor = serde_json::from_str::<ModelArtifact>(&json)
            .expect("artifact parses")
            .into_predictor();

        let lot = features(&assembler, "ABC", "BP1");
        let first = predictor.predict(&lot).expect("prediction");
        let second = predictor.predict(&lot).expect("prediction");
        assert_eq!(first, second);
        assert!((600.0..=1000.0).contains(&first));
        assert_eq!(predictor.expected_input_len(), 10);
    }
}
