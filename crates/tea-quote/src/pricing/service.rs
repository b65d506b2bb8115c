use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::bundle::{BundleInfo, ModelBundle};
use super::domain::{CategoricalField, LotRecord};
use super::features::{validate, FeatureAssembler, FeatureLayout, ValidationError};
use super::model::{PredictionError, PricePredictor};
use super::quote::{quote, PriceQuote};
use super::vocabulary::{CategoryVocabulary, UnknownCategory};

/// Steps a quote request moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Validated,
    Encoded,
    Predicted,
    QuoteComputed,
    Returned,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineStage::Received => "received",
            PipelineStage::Validated => "validated",
            PipelineStage::Encoded => "encoded",
            PipelineStage::Predicted => "predicted",
            PipelineStage::QuoteComputed => "quote_computed",
            PipelineStage::Returned => "returned",
        };
        f.write_str(label)
    }
}

/// Machine-readable error classes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    UnknownCategory,
    ModelConfigurationError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::UnknownCategory => "unknown_category",
            ErrorKind::ModelConfigurationError => "model_configuration_error",
        }
    }

    /// True when the caller, not the deployment, caused the failure.
    pub fn is_client_error(self) -> bool {
        !matches!(self, ErrorKind::ModelConfigurationError)
    }
}

/// Terminal failure of a single quote request.
#[derive(Debug, Error)]
pub enum PricingError {
    #[error("invalid lot: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategory),

    #[error("price model failed: {0}")]
    Prediction(#[from] PredictionError),
}

impl PricingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PricingError::Validation(_) => ErrorKind::ValidationError,
            PricingError::UnknownCategory(_) => ErrorKind::UnknownCategory,
            PricingError::Prediction(_) => ErrorKind::ModelConfigurationError,
        }
    }

    /// Last stage the request reached before failing.
    pub fn stage(&self) -> PipelineStage {
        match self {
            PricingError::Validation(_) => PipelineStage::Received,
            PricingError::UnknownCategory(_) => PipelineStage::Validated,
            PricingError::Prediction(_) => PipelineStage::Encoded,
        }
    }

    pub fn unknown_category(&self) -> Option<(CategoricalField, &str)> {
        match self {
            PricingError::UnknownCategory(err) => Some((err.field, err.value.as_str())),
            _ => None,
        }
    }
}

/// Orchestrates validation, encoding, prediction, and quoting for one lot.
///
/// Holds only read-only state; clone the surrounding `Arc` to share it across
/// request handlers.
pub struct PredictionService {
    info: BundleInfo,
    assembler: FeatureAssembler,
    predictor: Arc<dyn PricePredictor>,
}

impl PredictionService {
    pub fn new(bundle: ModelBundle) -> Self {
        let assembler = FeatureAssembler::new(bundle.vocabulary().clone());
        Self {
            info: bundle.info().clone(),
            assembler,
            predictor: bundle.predictor().clone(),
        }
    }

    pub fn info(&self) -> &BundleInfo {
        &self.info
    }

    pub fn layout(&self) -> &FeatureLayout {
        self.assembler.layout()
    }

    pub fn vocabulary(&self) -> &CategoryVocabulary {
        self.assembler.vocabulary()
    }

    pub fn model_name(&self) -> &str {
        self.predictor.name()
    }

    /// Run the full pipeline for one lot.
    pub fn quote(&self, record: &LotRecord) -> Result<PriceQuote, PricingError> {
        let result = self.run(record);
        if let Err(err) = &result {
            warn!(
                kind = err.kind().as_str(),
                stage = %err.stage(),
                error = %err,
                "lot quote failed"
            );
        }
        result
    }

    fn run(&self, record: &LotRecord) -> Result<PriceQuote, PricingError> {
        debug!(stage = %PipelineStage::Received, "quoting lot");

        let lot = validate(record)?;
        debug!(
            stage = %PipelineStage::Validated,
            invoice_no = lot.invoice_no.as_deref().unwrap_or("-"),
            lot_no = lot.lot_no.as_deref().unwrap_or("-")
        );

        let features = self.assembler.encode(&lot)?;
        debug!(stage = %PipelineStage::Encoded, width = features.len());

        let unit_price = self.predictor.predict(&features)?;
        debug!(stage = %PipelineStage::Predicted, unit_price);

        let quote = quote(unit_price, lot.bag_weight, lot.no_of_bags);
        if !quote.predicted_amount.is_finite() {
            return Err(PredictionError::NonFinite.into());
        }
        debug!(
            stage = %PipelineStage::QuoteComputed,
            price = quote.predicted_unit_price,
            amount = quote.predicted_amount
        );

        debug!(stage = %PipelineStage::Returned);
        Ok(quote)
    }
}
