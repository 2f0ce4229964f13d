use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::field::{FieldType, ReportField};
use crate::error::{ReportError, ReportResult};

/// Inclusive numeric bounds; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

impl NumberRange {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn is_ordered(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => min <= max,
            _ => true,
        }
    }
}

/// Inclusive date bounds, serialized as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn is_ordered(&self) -> bool {
        match (self.from, self.to) {
            (Some(from), Some(to)) => from <= to,
            _ => true,
        }
    }
}

/// Current input for one filterable field. The legal variants depend on the
/// owning field's type, see [`FilterValue::conforms_to`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Text(String),
    Choices(Vec<String>),
    Id(i64),
    Number(NumberRange),
    Date(DateRange),
}

impl FilterValue {
    /// Null, empty text, an empty choice list and ranges with no bound set
    /// all mean "no filter".
    pub fn is_active(&self) -> bool {
        match self {
            FilterValue::Null => false,
            FilterValue::Text(s) => !s.is_empty(),
            FilterValue::Choices(v) => !v.is_empty(),
            FilterValue::Number(r) => !r.is_empty(),
            FilterValue::Date(r) => !r.is_empty(),
            FilterValue::Bool(_) | FilterValue::Id(_) => true,
        }
    }

    pub fn conforms_to(&self, field_type: FieldType) -> bool {
        match (field_type, self) {
            (FieldType::Computed, _) => false,
            (_, FilterValue::Null) => true,
            (FieldType::Boolean, FilterValue::Bool(_)) => true,
            (FieldType::Choice, FilterValue::Text(_) | FilterValue::Choices(_)) => true,
            (FieldType::Relation, FilterValue::Id(_)) => true,
            (FieldType::Number, FilterValue::Number(_)) => true,
            (FieldType::Date, FilterValue::Date(_)) => true,
            (FieldType::String, FilterValue::Text(_)) => true,
            _ => false,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            FilterValue::Null => "null",
            FilterValue::Bool(_) => "boolean",
            FilterValue::Text(_) => "string",
            FilterValue::Choices(_) => "string list",
            FilterValue::Id(_) => "record id",
            FilterValue::Number(_) => "number range",
            FilterValue::Date(_) => "date range",
        }
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        FilterValue::Bool(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Text(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Text(v)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(v: Vec<String>) -> Self {
        FilterValue::Choices(v)
    }
}

impl From<NumberRange> for FilterValue {
    fn from(v: NumberRange) -> Self {
        FilterValue::Number(v)
    }
}

impl From<DateRange> for FilterValue {
    fn from(v: DateRange) -> Self {
        FilterValue::Date(v)
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FilterValue::Null)
    }
}

/// The live mapping of field key to filter input for one builder session.
///
/// Only active values are stored: writing an inactive value removes the key,
/// so the serialized snapshot never carries empty filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FilterSet {
    values: BTreeMap<String, FilterValue>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the value stored for `field`. Composite values (number/date
    /// ranges) are not merged here; callers merge sub-parts first.
    pub fn update(&mut self, field: &ReportField, value: FilterValue) -> ReportResult<()> {
        if !value.conforms_to(field.field_type) {
            return Err(ReportError::Validation(format!(
                "{} filter '{}' does not accept a {} value",
                field.field_type,
                field.key,
                value.kind()
            )));
        }

        if field.field_type == FieldType::Choice && !field.choices().is_empty() {
            let unknown = match &value {
                FilterValue::Text(s) if !s.is_empty() => {
                    (!field.choices().contains(s)).then(|| s.clone())
                }
                FilterValue::Choices(v) => v.iter().find(|s| !field.choices().contains(s)).cloned(),
                _ => None,
            };
            if let Some(choice) = unknown {
                return Err(ReportError::Validation(format!(
                    "'{}' is not a valid choice for '{}'",
                    choice, field.key
                )));
            }
        }

        if value.is_active() {
            self.values.insert(field.key.clone(), value);
        } else {
            self.values.remove(&field.key);
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.values.get(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn active_count(&self) -> usize {
        self.values.values().filter(|v| v.is_active()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// First range whose lower bound exceeds its upper bound.
    pub fn inverted_range(&self) -> Option<&str> {
        self.values.iter().find_map(|(key, value)| {
            let ordered = match value {
                FilterValue::Number(r) => r.is_ordered(),
                FilterValue::Date(r) => r.is_ordered(),
                _ => true,
            };
            (!ordered).then_some(key.as_str())
        })
    }
}
