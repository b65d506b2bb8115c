use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use super::domain::{CategoricalField, FieldValue, LotDate, LotRecord, ValidatedLot};
use super::vocabulary::{CategoryVocabulary, UnknownCategory};

/// Numeric columns in the order the regressor was trained on.
/// Reordering this list silently corrupts every prediction.
pub const NUMERIC_FEATURES: [&str; 5] = ["day", "month", "year", "bag_weight", "no_of_bags"];

/// Upper bound on a single bag's weight. Keeps the nett quantity and the
/// model's weighted sum far from `f64` overflow.
pub const MAX_BAG_WEIGHT: f64 = 100_000.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("date '{value}' must be DD/MM/YYYY with integer components")]
    MalformedDate { value: String },

    #[error("bag_weight '{value}' must be a positive number no greater than 100000")]
    InvalidBagWeight { value: String },

    #[error("no_of_bags '{value}' must be a positive whole number")]
    InvalidBagCount { value: String },

    #[error("{field} must not be empty")]
    EmptyCategory { field: CategoricalField },
}

/// Assembled model input. Only [`FeatureAssembler`] builds these, so the
/// length always matches the layout of the vocabulary it was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

/// Column layout derived from a vocabulary: numeric block, then one one-hot
/// block per categorical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureLayout {
    names: Vec<String>,
}

impl FeatureLayout {
    pub fn for_vocabulary(vocabulary: &CategoryVocabulary) -> Self {
        let mut names: Vec<String> =
            NUMERIC_FEATURES.iter().map(|name| name.to_string()).collect();
        for field in CategoricalField::ORDERED {
            names.extend(
                vocabulary
                    .values(field)
                    .iter()
                    .map(|value| format!("{}={}", field.key(), value)),
            );
        }
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategory),
}

/// Turns raw lot records into model-ready feature vectors.
#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    vocabulary: Arc<CategoryVocabulary>,
    layout: FeatureLayout,
}

impl FeatureAssembler {
    pub fn new(vocabulary: Arc<CategoryVocabulary>) -> Self {
        let layout = FeatureLayout::for_vocabulary(&vocabulary);
        Self { vocabulary, layout }
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    pub fn vocabulary(&self) -> &CategoryVocabulary {
        &self.vocabulary
    }

    /// Validate and encode in one step.
    pub fn assemble(&self, record: &LotRecord) -> Result<FeatureVector, AssemblyError> {
        let lot = validate(record)?;
        Ok(self.encode(&lot)?)
    }

    /// Encode an already validated lot.
    pub fn encode(&self, lot: &ValidatedLot) -> Result<FeatureVector, UnknownCategory> {
        let mut features = Vec::with_capacity(self.layout.len());
        features.extend_from_slice(&[
            f64::from(lot.date.day),
            f64::from(lot.date.month),
            f64::from(lot.date.year),
            lot.bag_weight,
            f64::from(lot.no_of_bags),
        ]);
        self.vocabulary
            .encode_into(CategoricalField::SellingMark, &lot.selling_mark, &mut features)?;
        self.vocabulary
            .encode_into(CategoricalField::Grade, &lot.grade, &mut features)?;

        debug_assert_eq!(features.len(), self.layout.len());
        Ok(FeatureVector(features))
    }
}

/// Check a raw record and convert it into typed fields.
pub fn validate(record: &LotRecord) -> Result<ValidatedLot, ValidationError> {
    let date = parse_date(&required(&record.date, "date")?)?;
    let selling_mark = categorical(&record.selling_mark, CategoricalField::SellingMark)?;
    let grade = categorical(&record.grade, CategoricalField::Grade)?;
    let bag_weight = parse_bag_weight(&required(&record.bag_weight, "bag_weight")?)?;
    let no_of_bags = parse_bag_count(&required(&record.no_of_bags, "no_of_bags")?)?;

    Ok(ValidatedLot {
        date,
        selling_mark,
        grade,
        invoice_no: record.invoice_no.as_ref().map(FieldValue::as_text),
        lot_no: record.lot_no.as_ref().map(FieldValue::as_text),
        bag_weight,
        no_of_bags,
    })
}

fn required(value: &Option<FieldValue>, field: &'static str) -> Result<String, ValidationError> {
    value
        .as_ref()
        .map(FieldValue::as_text)
        .ok_or(ValidationError::MissingField { field })
}

fn categorical(
    value: &Option<FieldValue>,
    field: CategoricalField,
) -> Result<String, ValidationError> {
    let text = required(value, field.key())?;
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyCategory { field });
    }
    Ok(text)
}

fn parse_date(raw: &str) -> Result<LotDate, ValidationError> {
    let malformed = || ValidationError::MalformedDate {
        value: raw.to_string(),
    };

    let parts: Vec<&str> = raw.split('/').collect();
    let [day, month, year] = parts.as_slice() else {
        return Err(malformed());
    };

    let component = |part: &str| part.trim().parse::<i32>().map_err(|_| malformed());
    Ok(LotDate {
        day: component(*day)?,
        month: component(*month)?,
        year: component(*year)?,
    })
}

fn parse_bag_weight(raw: &str) -> Result<f64, ValidationError> {
    match raw.trim().parse::<f64>() {
        Ok(weight) if weight > 0.0 && weight <= MAX_BAG_WEIGHT => Ok(weight),
        _ => Err(ValidationError::InvalidBagWeight {
            value: raw.to_string(),
        }),
    }
}

fn parse_bag_count(raw: &str) -> Result<u32, ValidationError> {
    match raw.trim().parse::<u32>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(ValidationError::InvalidBagCount {
            value: raw.to_string(),
        }),
    }
}
