use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar accepted from loosely-typed payloads where callers send either a
/// JSON number or its textual form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Textual form used for parsing; numbers render without a trailing `.0`.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Number(value) => value.to_string(),
            FieldValue::Text(value) => value.clone(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

/// Raw auction lot description as received from a caller.
///
/// Every field is optional at this stage so that a missing value surfaces as a
/// validation failure with a field name rather than a transport rejection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LotRecord {
    pub date: Option<FieldValue>,
    pub selling_mark: Option<FieldValue>,
    pub grade: Option<FieldValue>,
    pub invoice_no: Option<FieldValue>,
    pub lot_no: Option<FieldValue>,
    pub bag_weight: Option<FieldValue>,
    pub no_of_bags: Option<FieldValue>,
}

impl LotRecord {
    pub fn new(
        date: impl Into<FieldValue>,
        selling_mark: impl Into<FieldValue>,
        grade: impl Into<FieldValue>,
        bag_weight: impl Into<FieldValue>,
        no_of_bags: impl Into<FieldValue>,
    ) -> Self {
        Self {
            date: Some(date.into()),
            selling_mark: Some(selling_mark.into()),
            grade: Some(grade.into()),
            invoice_no: None,
            lot_no: None,
            bag_weight: Some(bag_weight.into()),
            no_of_bags: Some(no_of_bags.into()),
        }
    }

    pub fn with_identifiers(
        mut self,
        invoice_no: impl Into<FieldValue>,
        lot_no: impl Into<FieldValue>,
    ) -> Self {
        self.invoice_no = Some(invoice_no.into());
        self.lot_no = Some(lot_no.into());
        self
    }
}

/// Auction date split into the integer components the model was trained on.
/// No calendar check is applied; month 13 is carried through as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LotDate {
    pub day: i32,
    pub month: i32,
    pub year: i32,
}

/// Lot whose numeric and categorical fields have been parsed and checked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedLot {
    pub date: LotDate,
    pub selling_mark: String,
    pub grade: String,
    pub invoice_no: Option<String>,
    pub lot_no: Option<String>,
    pub bag_weight: f64,
    pub no_of_bags: u32,
}

/// Categorical inputs in the order their one-hot blocks are concatenated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalField {
    SellingMark,
    Grade,
}

impl CategoricalField {
    pub const ORDERED: [CategoricalField; 2] =
        [CategoricalField::SellingMark, CategoricalField::Grade];

    pub fn key(self) -> &'static str {
        match self {
            CategoricalField::SellingMark => "selling_mark",
            CategoricalField::Grade => "grade",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "selling_mark" => Some(CategoricalField::SellingMark),
            "grade" => Some(CategoricalField::Grade),
            _ => None,
        }
    }
}

impl fmt::Display for CategoricalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_and_strings_deserialize_into_the_same_record() {
        let payload = r#"{
            "date": "05/06/2023",
            "selling_mark": "ABC",
            "grade": "BP1",
            "invoice_no": 1042,
            "lot_no": "17",
            "bag_weight": 20.5,
            "no_of_bags": "10"
        }"#;

        let record: LotRecord = serde_json::from_str(payload).expect("record parses");
        assert_eq!(record.bag_weight, Some(FieldValue::Number(20.5)));
        assert_eq!(record.no_of_bags, Some(FieldValue::Text("10".to_string())));
        assert_eq!(record.invoice_no.map(|v| v.as_text()), Some("1042".to_string()));
    }

    #[test]
    fn missing_fields_default_to_none() {
        let record: LotRecord = serde_json::from_str(r#"{"grade":"BP1"}"#).expect("record parses");
        assert!(record.date.is_none());
        assert!(record.selling_mark.is_none());
        assert_eq!(record.grade, Some(FieldValue::from("BP1")));
    }

    #[test]
    fn categorical_keys_round_trip() {
        for field in CategoricalField::ORDERED {
            assert_eq!(CategoricalField::from_key(field.key()), Some(field));
        }
        assert_eq!(CategoricalField::from_key("Grade"), None);
    }
}
