//! Feature encoding and price inference for auction lots.
//!
//! A raw [`LotRecord`] is validated, expanded into the fixed-order feature
//! vector the trained regressor expects, scored, and turned into a
//! [`PriceQuote`]. The vocabulary and model are loaded once as a
//! [`ModelBundle`] and shared read-only by every request.

pub mod bundle;
pub mod domain;
pub mod features;
pub mod model;
pub mod quote;
pub mod router;
pub mod service;
pub mod vocabulary;

pub use bundle::{
    sha256_hex, ArtifactRef, BundleInfo, BundleManifest, ModelBundle, ModelConfigurationError,
};
pub use domain::{CategoricalField, FieldValue, LotDate, LotRecord, ValidatedLot};
pub use features::{
    validate, AssemblyError, FeatureAssembler, FeatureLayout, FeatureVector, ValidationError,
    MAX_BAG_WEIGHT, NUMERIC_FEATURES,
};
pub use model::{
    ForestPriceModel, LinearPriceModel, ModelArtifact, PredictionError, PricePredictor,
};
pub use quote::{quote, round_cents, PriceQuote};
pub use router::{pricing_error_response, quote_router, ModelInfoResponse, QuoteResponse};
pub use service::{ErrorKind, PipelineStage, PredictionService, PricingError};
pub use vocabulary::{CategoryVocabulary, UnknownCategory, VocabularyError};
