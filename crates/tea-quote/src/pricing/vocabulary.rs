use std::collections::HashMap;
use std::io::Read;

use serde::Deserialize;
use thiserror::Error;

use super::domain::CategoricalField;

#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("invalid vocabulary CSV data: {0}")]
    Csv(#[from] csv::Error),

    #[error("vocabulary row {row} names unknown field '{field}'")]
    UnknownField { row: usize, field: String },

    #[error("vocabulary row {row} has a blank value for {field}")]
    BlankValue { row: usize, field: CategoricalField },

    #[error("vocabulary lists '{value}' more than once for {field}")]
    Duplicate { field: CategoricalField, value: String },

    #[error("vocabulary has no values for {field}")]
    Empty { field: CategoricalField },
}

/// Returned when a categorical value was never seen at training time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} '{value}' is not part of the trained vocabulary")]
pub struct UnknownCategory {
    pub field: CategoricalField,
    pub value: String,
}

/// Ordered values for one categorical field plus a position index.
#[derive(Debug, Clone, Default)]
struct FieldVocabulary {
    values: Vec<String>,
    positions: HashMap<String, usize>,
}

impl FieldVocabulary {
    fn push(&mut self, field: CategoricalField, value: String) -> Result<(), VocabularyError> {
        if self.positions.contains_key(&value) {
            return Err(VocabularyError::Duplicate { field, value });
        }
        self.positions.insert(value.clone(), self.values.len());
        self.values.push(value);
        Ok(())
    }
}

/// Known categorical values per field, in training-time one-hot order.
///
/// Built once when the model bundle is loaded and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct CategoryVocabulary {
    selling_marks: FieldVocabulary,
    grades: FieldVocabulary,
}

#[derive(Debug, Deserialize)]
struct VocabularyRow {
    field: String,
    value: String,
}

impl CategoryVocabulary {
    pub fn new<S, G>(selling_marks: S, grades: G) -> Result<Self, VocabularyError>
    where
        S: IntoIterator,
        S::Item: Into<String>,
        G: IntoIterator,
        G::Item: Into<String>,
    {
        let mut vocabulary = Self {
            selling_marks: FieldVocabulary::default(),
            grades: FieldVocabulary::default(),
        };
        for (row, value) in selling_marks.into_iter().enumerate() {
            vocabulary.insert(row + 1, CategoricalField::SellingMark, value.into())?;
        }
        for (row, value) in grades.into_iter().enumerate() {
            vocabulary.insert(row + 1, CategoricalField::Grade, value.into())?;
        }
        vocabulary.ensure_populated()?;
        Ok(vocabulary)
    }

    /// Parse a `field,value` CSV export. Row order within a field is the
    /// one-hot column order. Values are kept byte for byte, since requests
    /// are matched verbatim.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, VocabularyError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_reader(reader);
        let mut vocabulary = Self {
            selling_marks: FieldVocabulary::default(),
            grades: FieldVocabulary::default(),
        };

        for (index, record) in csv_reader.deserialize::<VocabularyRow>().enumerate() {
            let row = record?;
            let line = index + 1;
            let field = CategoricalField::from_key(row.field.trim()).ok_or_else(|| {
                VocabularyError::UnknownField {
                    row: line,
                    field: row.field.clone(),
                }
            })?;
            vocabulary.insert(line, field, row.value)?;
        }

        vocabulary.ensure_populated()?;
        Ok(vocabulary)
    }

    fn insert(
        &mut self,
        row: usize,
        field: CategoricalField,
        value: String,
    ) -> Result<(), VocabularyError> {
        if value.trim().is_empty() {
            return Err(VocabularyError::BlankValue { row, field });
        }
        self.field_mut(field).push(field, value)
    }

    fn ensure_populated(&self) -> Result<(), VocabularyError> {
        for field in CategoricalField::ORDERED {
            if self.values(field).is_empty() {
                return Err(VocabularyError::Empty { field });
            }
        }
        Ok(())
    }

    fn field(&self, field: CategoricalField) -> &FieldVocabulary {
        match field {
            CategoricalField::SellingMark => &self.selling_marks,
            CategoricalField::Grade => &self.grades,
        }
    }

    fn field_mut(&mut self, field: CategoricalField) -> &mut FieldVocabulary {
        match field {
            CategoricalField::SellingMark => &mut self.selling_marks,
            CategoricalField::Grade => &mut self.grades,
        }
    }

    pub fn values(&self, field: CategoricalField) -> &[String] {
        &self.field(field).values
    }

    pub fn len(&self, field: CategoricalField) -> usize {
        self.field(field).values.len()
    }

    /// Total one-hot slots across every categorical field.
    pub fn one_hot_width(&self) -> usize {
        CategoricalField::ORDERED
            .iter()
            .map(|field| self.len(*field))
            .sum()
    }

    pub fn position(&self, field: CategoricalField, value: &str) -> Option<usize> {
        self.field(field).positions.get(value).copied()
    }

    /// One-hot block for `value` within `field`.
    pub fn encode(&self, field: CategoricalField, value: &str) -> Result<Vec<f64>, UnknownCategory> {
        let mut block = Vec::with_capacity(self.len(field));
        self.encode_into(field, value, &mut block)?;
        Ok(block)
    }

    /// Append the one-hot block for `value` to `out`. Nothing is written when
    /// the value is unknown.
    pub fn encode_into(
        &self,
        field: CategoricalField,
        value: &str,
        out: &mut Vec<f64>,
    ) -> Result<(), UnknownCategory> {
        let position = self
            .position(field, value)
            .ok_or_else(|| UnknownCategory {
                field,
                value: value.to_string(),
            })?;

        let start = out.len();
        out.resize(start + self.len(field), 0.0);
        out[start + position] = 1.0;
        Ok(())
    }
}
