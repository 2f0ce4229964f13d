use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic type of a report field. Decides which filter control is rendered
/// and which `FilterValue` shape is legal for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Boolean,
    Choice,
    Relation,
    Number,
    Date,
    String,
    Computed,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Choice => "choice",
            FieldType::Relation => "relation",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::String => "string",
            FieldType::Computed => "computed",
        }
    }

    /// Computed fields are derived server-side and can only be shown as columns.
    pub fn is_filterable(self) -> bool {
        !matches!(self, FieldType::Computed)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportField {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filterable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groupable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_model: Option<String>,
}

impl ReportField {
    pub fn new(key: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            field_type,
            choices: None,
            filterable: None,
            selectable: None,
            groupable: None,
            relation_model: None,
        }
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn choices(&self) -> &[String] {
        self.choices.as_deref().unwrap_or_default()
    }

    pub fn is_computed(&self) -> bool {
        self.field_type == FieldType::Computed
    }
}
