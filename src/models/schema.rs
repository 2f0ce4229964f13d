use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::field::{FieldType, ReportField};
use super::report_type::ReportType;
use crate::error::{ReportError, ReportResult};

/// Description of one reportable data source. Fetched per report type and
/// never mutated client-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_schema_fields"))]
pub struct ReportSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_type: Option<ReportType>,
    pub title: String,
    /// Full field catalogue. Older backends omit it.
    #[serde(default)]
    pub fields: Vec<ReportField>,
    pub filterable_fields: Vec<ReportField>,
    pub selectable_fields: Vec<ReportField>,
    pub groupable_fields: Vec<ReportField>,
    #[validate(length(min = 1, message = "default_columns must not be empty"))]
    pub default_columns: Vec<String>,
}

impl ReportSchema {
    /// Reject schemas the builder cannot work with.
    pub fn ensure_well_formed(&self) -> ReportResult<()> {
        self.validate()
            .map_err(|e| ReportError::MalformedSchema(e.to_string()))
    }

    pub fn filterable(&self, key: &str) -> Option<&ReportField> {
        self.filterable_fields.iter().find(|f| f.key == key)
    }

    pub fn selectable(&self, key: &str) -> Option<&ReportField> {
        self.selectable_fields.iter().find(|f| f.key == key)
    }

    pub fn groupable(&self, key: &str) -> Option<&ReportField> {
        self.groupable_fields.iter().find(|f| f.key == key)
    }

    pub fn selectable_keys(&self) -> Vec<String> {
        self.selectable_fields.iter().map(|f| f.key.clone()).collect()
    }

    pub fn is_default_column(&self, key: &str) -> bool {
        self.default_columns.iter().any(|c| c == key)
    }

    /// Label for a key from any of the field lists, falling back to the key.
    pub fn label_for<'a>(&'a self, key: &'a str) -> &'a str {
        self.fields
            .iter()
            .chain(&self.selectable_fields)
            .chain(&self.filterable_fields)
            .chain(&self.groupable_fields)
            .find(|f| f.key == key)
            .map(|f| f.label.as_str())
            .unwrap_or(key)
    }
}

fn schema_error(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Owned(message));
    err
}

fn ensure_unique_keys(list: &str, fields: &[ReportField]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for field in fields {
        if !seen.insert(field.key.as_str()) {
            return Err(schema_error(
                "duplicate_key",
                format!("duplicate key '{}' in {}", field.key, list),
            ));
        }
    }
    Ok(())
}

fn validate_schema_fields(schema: &ReportSchema) -> Result<(), ValidationError> {
    ensure_unique_keys("fields", &schema.fields)?;
    ensure_unique_keys("filterable_fields", &schema.filterable_fields)?;
    ensure_unique_keys("selectable_fields", &schema.selectable_fields)?;
    ensure_unique_keys("groupable_fields", &schema.groupable_fields)?;

    if let Some(col) = schema
        .default_columns
        .iter()
        .find(|c| schema.selectable(c).is_none())
    {
        return Err(schema_error(
            "unknown_default_column",
            format!("default column '{}' is not a selectable field", col),
        ));
    }

    for field in &schema.filterable_fields {
        if field.field_type == FieldType::Computed {
            return Err(schema_error(
                "computed_filter",
                format!("computed field '{}' cannot be filterable", field.key),
            ));
        }
        if field.field_type == FieldType::Choice && field.choices.is_none() {
            return Err(schema_error(
                "missing_choices",
                format!("choice field '{}' has no choices", field.key),
            ));
        }
    }

    Ok(())
}

/// Entry of the schema list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSchemaSummary {
    pub report_type: ReportType,
    pub title: String,
    pub field_count: u32,
    pub groupable_count: u32,
}
