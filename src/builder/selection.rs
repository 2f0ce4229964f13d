use crate::error::{ReportError, ReportResult};
use crate::models::ReportSchema;

/// Value a group-by picker sends for "no grouping".
pub const NO_GROUPING: &str = "none";

/// Ordered selected-column keys.
///
/// Empty only while no schema is loaded; once initialized from a schema it
/// never drops below one column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSelection {
    columns: Vec<String>,
}

impl ColumnSelection {
    pub fn from_defaults(schema: &ReportSchema) -> Self {
        Self {
            columns: schema.default_columns.clone(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn is_selected(&self, key: &str) -> bool {
        self.columns.iter().any(|c| c == key)
    }

    /// Add `key` at the end, or remove it. Removing the last column is an
    /// error. Returns whether the column is selected afterwards.
    pub fn toggle(&mut self, schema: &ReportSchema, key: &str) -> ReportResult<bool> {
        if schema.selectable(key).is_none() {
            return Err(ReportError::Validation(format!(
                "'{}' is not a selectable column",
                key
            )));
        }

        if let Some(pos) = self.columns.iter().position(|c| c == key) {
            if self.columns.len() == 1 {
                return Err(ReportError::Validation(
                    "at least one column is required".to_string(),
                ));
            }
            self.columns.remove(pos);
            Ok(false)
        } else {
            self.columns.push(key.to_string());
            Ok(true)
        }
    }

    /// Every selectable column, in schema order.
    pub fn select_all(&mut self, schema: &ReportSchema) {
        self.columns = schema.selectable_keys();
    }

    pub fn select_default(&mut self, schema: &ReportSchema) {
        self.columns = schema.default_columns.clone();
    }

    /// Keep only the first selectable column.
    pub fn clear(&mut self, schema: &ReportSchema) {
        self.columns = schema
            .selectable_fields
            .first()
            .map(|f| vec![f.key.clone()])
            .unwrap_or_default();
    }

    /// Forget the selection while a new schema loads.
    pub fn reset(&mut self) {
        self.columns.clear();
    }
}

/// Resolve a group-by choice against the schema. `None`, blank and
/// [`NO_GROUPING`] all clear the grouping.
pub fn resolve_group_by(schema: &ReportSchema, choice: Option<&str>) -> ReportResult<Option<String>> {
    match choice.map(str::trim) {
        None | Some("") | Some(NO_GROUPING) => Ok(None),
        Some(key) => match schema.groupable(key) {
            Some(field) => Ok(Some(field.key.clone())),
            None => Err(ReportError::Validation(format!(
                "'{}' is not a groupable field",
                key
            ))),
        },
    }
}
