//! Loading of the matched vocabulary/model pair.
//!
//! Both artifacts come out of the same training run and are referenced from a
//! single manifest carrying their checksums and the feature width they agree
//! on. Any disagreement is fatal: the service must not start with a
//! vocabulary that was not trained alongside its model.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use super::features::{FeatureLayout, NUMERIC_FEATURES};
use super::model::{ModelArtifact, PricePredictor};
use super::vocabulary::{CategoryVocabulary, VocabularyError};

#[derive(Debug, Error)]
pub enum ModelConfigurationError {
    #[error("failed to read {artifact} at {path}: {source}")]
    Io {
        artifact: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid bundle manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{artifact} checksum mismatch: manifest lists {expected}, file hashes to {actual}")]
    ChecksumMismatch {
        artifact: &'static str,
        expected: String,
        actual: String,
    },

    #[error("invalid vocabulary artifact: {0}")]
    Vocabulary(#[from] VocabularyError),

    #[error("invalid model artifact: {0}")]
    Model(#[source] serde_json::Error),

    #[error(
        "feature width mismatch: manifest declares {declared}, vocabulary yields {assembled}, model expects {model}"
    )]
    FeatureCountMismatch {
        declared: usize,
        assembled: usize,
        model: usize,
    },
}

/// Reference to one artifact file relative to the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: PathBuf,
    pub sha256: String,
}

/// Manifest pairing a vocabulary with the model trained on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub version: String,
    pub trained_on: NaiveDate,
    pub feature_count: usize,
    pub vocabulary: ArtifactRef,
    pub model: ArtifactRef,
}

/// Descriptive metadata carried by a loaded bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleInfo {
    pub version: String,
    pub trained_on: NaiveDate,
    pub feature_count: usize,
}

/// Vocabulary and predictor loaded together and checked for agreement.
pub struct ModelBundle {
    info: BundleInfo,
    vocabulary: Arc<CategoryVocabulary>,
    predictor: Arc<dyn PricePredictor>,
}

impl std::fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBundle")
            .field("info", &self.info)
            .field("model", &self.predictor.name())
            .finish_non_exhaustive()
    }
}

impl ModelBundle {
    /// Read a manifest and both artifacts it references.
    pub fn load<P: AsRef<Path>>(manifest_path: P) -> Result<Self, ModelConfigurationError> {
        let manifest_path = manifest_path.as_ref();
        let raw = read_artifact("bundle manifest", manifest_path)?;
        let manifest: BundleManifest =
            serde_json::from_slice(&raw).map_err(|source| ModelConfigurationError::Manifest {
                path: manifest_path.to_path_buf(),
                source,
            })?;

        let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
        let vocabulary_bytes = read_verified("vocabulary", base, &manifest.vocabulary)?;
        let model_bytes = read_verified("model", base, &manifest.model)?;

        let bundle = Self::from_artifacts(
            BundleInfo {
                version: manifest.version,
                trained_on: manifest.trained_on,
                feature_count: manifest.feature_count,
            },
            &vocabulary_bytes,
            &model_bytes,
        )?;

        info!(
            version = %bundle.info.version,
            trained_on = %bundle.info.trained_on,
            features = bundle.info.feature_count,
            model = bundle.predictor.name(),
            "model bundle loaded"
        );
        Ok(bundle)
    }

    /// Build from in-memory artifact contents (CSV vocabulary, JSON model).
    pub fn from_artifacts(
        info: BundleInfo,
        vocabulary_csv: &[u8],
        model_json: &[u8],
    ) -> Result<Self, ModelConfigurationError> {
        let vocabulary = CategoryVocabulary::from_reader(vocabulary_csv)?;
        let model: ModelArtifact =
            serde_json::from_slice(model_json).map_err(ModelConfigurationError::Model)?;
        Self::from_parts(info, vocabulary, Arc::from(model.into_predictor()))
    }

    pub fn from_parts(
        info: BundleInfo,
        vocabulary: CategoryVocabulary,
        predictor: Arc<dyn PricePredictor>,
    ) -> Result<Self, ModelConfigurationError> {
        let assembled = FeatureLayout::for_vocabulary(&vocabulary).len();
        debug_assert_eq!(assembled, NUMERIC_FEATURES.len() + vocabulary.one_hot_width());
        let model = predictor.expected_input_len();
        if info.feature_count != assembled || model != assembled {
            return Err(ModelConfigurationError::FeatureCountMismatch {
                declared: info.feature_count,
                assembled,
                model,
            });
        }

        Ok(Self {
            info,
            vocabulary: Arc::new(vocabulary),
            predictor,
        })
    }

    pub fn info(&self) -> &BundleInfo {
        &self.info
    }

    pub fn vocabulary(&self) -> &Arc<CategoryVocabulary> {
        &self.vocabulary
    }

    pub fn predictor(&self) -> &Arc<dyn PricePredictor> {
        &self.predictor
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn read_artifact(artifact: &'static str, path: &Path) -> Result<Vec<u8>, ModelConfigurationError> {
    std::fs::read(path).map_err(|source| ModelConfigurationError::Io {
        artifact,
        path: path.to_path_buf(),
        source,
    })
}

fn read_verified(
    artifact: &'static str,
    base: &Path,
    reference: &ArtifactRef,
) -> Result<Vec<u8>, ModelConfigurationError> {
    let bytes = read_artifact(artifact, &base.join(&reference.path))?;
    let actual = sha256_hex(&bytes);
    if !actual.eq_ignore_ascii_case(reference.sha256.trim()) {
        return Err(ModelConfigurationError::ChecksumMismatch {
            artifact,
            expected: reference.sha256.clone(),
            actual,
        });
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::model::LinearPriceModel;

    const VOCABULARY: &str = "field,value\nselling_mark,ABC\nselling_mark,DEF\ngrade,BOP\ngrade,BP1\ngrade,PF1\n";

    fn info(feature_count: usize) -> BundleInfo {
        BundleInfo {
            version: "test".to_string(),
            trained_on: NaiveDate::from_ymd_opt(2023, 6, 1).expect("valid date"),
            feature_count,
        }
    }

    #[test]
    fn sha256_matches_known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn matched_artifacts_load() {
        let model = r#"{"kind":"linear","coefficients":[0,0,0,0,0,1,2,3,4,5],"intercept":10}"#;
        let bundle = ModelBundle::from_artifacts(info(10), VOCABULARY.as_bytes(), model.as_bytes())
            .expect("bundle loads");
        assert_eq!(bundle.info().feature_count, 10);
        assert_eq!(bundle.predictor().expected_input_len(), 10);
    }

    #[test]
    fn model_width_must_match_vocabulary() {
        let vocabulary = CategoryVocabulary::from_reader(VOCABULARY.as_bytes()).expect("vocabulary");
        let predictor: Arc<dyn PricePredictor> = Arc::new(LinearPriceModel::new(vec![1.0; 11], 0.0));
        let err = ModelBundle::from_parts(info(10), vocabulary, predictor).expect_err("mismatch");
        assert!(matches!(
            err,
            ModelConfigurationError::FeatureCountMismatch {
                declared: 10,
                assembled: 10,
                model: 11
            }
        ));
    }

    #[test]
    fn declared_width_must_match_vocabulary() {
        let model = r#"{"kind":"linear","coefficients":[0,0,0,0,0,1,2,3,4,5],"intercept":10}"#;
        let err = ModelBundle::from_artifacts(info(12), VOCABULARY.as_bytes(), model.as_bytes())
            .expect_err("declared width differs");
        assert!(matches!(
            err,
            ModelConfigurationError::FeatureCountMismatch { declared: 12, .. }
        ));
    }

    #[test]
    fn malformed_model_artifact_is_rejected() {
        let err = ModelBundle::from_artifacts(info(10), VOCABULARY.as_bytes(), b"{\"kind\":\"svm\"}")
            .expect_err("unknown model kind");
        assert!(matches!(err, ModelConfigurationError::Model(_)));
    }
}
