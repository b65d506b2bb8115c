use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;

use super::domain::{CategoricalField, LotRecord};
use super::quote::PriceQuote;
use super::service::{ErrorKind, PredictionService, PricingError};

/// Body returned for a successful quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuoteResponse {
    pub price: f64,
    pub amount: f64,
}

impl From<PriceQuote> for QuoteResponse {
    fn from(quote: PriceQuote) -> Self {
        Self {
            price: quote.predicted_unit_price,
            amount: quote.predicted_amount,
        }
    }
}

/// Description of the loaded bundle for operators.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfoResponse {
    pub version: String,
    pub trained_on: NaiveDate,
    pub model: String,
    pub feature_count: usize,
    pub features: Vec<String>,
    pub vocabulary: BTreeMap<CategoricalField, Vec<String>>,
}

impl ModelInfoResponse {
    pub fn from_service(service: &PredictionService) -> Self {
        let info = service.info();
        let vocabulary = CategoricalField::ORDERED
            .iter()
            .map(|field| (*field, service.vocabulary().values(*field).to_vec()))
            .collect();

        Self {
            version: info.version.clone(),
            trained_on: info.trained_on,
            model: service.model_name().to_string(),
            feature_count: info.feature_count,
            features: service.layout().names().to_vec(),
            vocabulary,
        }
    }
}

/// Router exposing lot quoting and model metadata.
pub fn quote_router(service: Arc<PredictionService>) -> Router {
    Router::new()
        .route("/predict", post(predict_handler))
        .route("/api/v1/model", get(model_info_handler))
        .with_state(service)
}

pub(crate) async fn predict_handler(
    State(service): State<Arc<PredictionService>>,
    payload: Result<Json<LotRecord>, JsonRejection>,
) -> Response {
    let Json(record) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            let body = json!({
                "kind": ErrorKind::ValidationError,
                "error": rejection.body_text(),
            });
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    match service.quote(&record) {
        Ok(quote) => (StatusCode::OK, Json(QuoteResponse::from(quote))).into_response(),
        Err(err) => pricing_error_response(&err),
    }
}

pub(crate) async fn model_info_handler(
    State(service): State<Arc<PredictionService>>,
) -> Json<ModelInfoResponse> {
    Json(ModelInfoResponse::from_service(&service))
}

/// Map a pricing failure onto its status code and error payload.
pub fn pricing_error_response(err: &PricingError) -> Response {
    let kind = err.kind();
    let status = match kind {
        ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
        ErrorKind::UnknownCategory => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::ModelConfigurationError => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = match err.unknown_category() {
        Some((field, value)) => json!({
            "kind": kind,
            "error": err.to_string(),
            "field": field,
            "value": value,
        }),
        None => json!({
            "kind": kind,
            "error": err.to_string(),
        }),
    };

    (status, Json(body)).into_response()
}
