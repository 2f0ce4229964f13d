use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportColumn {
    pub key: String,
    pub label: String,
}

/// A resolved preview or full result. Columns are data-driven: each row is a
/// JSON object keyed by column key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDataResponse {
    pub total: u64,
    #[serde(default)]
    pub showing: Option<u64>,
    #[serde(default)]
    pub is_aggregated: bool,
    #[serde(default)]
    pub group_by: Option<String>,
    #[serde(default)]
    pub group_label: Option<String>,
    #[serde(default)]
    pub preview: bool,
    pub columns: Vec<ReportColumn>,
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
}

impl ReportDataResponse {
    /// Cap rows at `limit`. `showing` never exceeds the rows actually kept.
    pub fn truncate_to(&mut self, limit: usize) {
        self.data.truncate(limit);
        let kept = self.data.len() as u64;
        self.showing = Some(self.showing.map_or(kept, |s| s.min(kept)));
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.label.as_str()).collect()
    }

    /// Rows rendered as display strings in column order. Missing and null
    /// cells render as empty strings.
    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.data
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|col| display_cell(row.get(&col.key)))
                    .collect()
            })
            .collect()
    }

    /// e.g. "Showing 10 of 245"; `None` when the whole result is shown.
    pub fn summary(&self) -> Option<String> {
        self.showing
            .filter(|&showing| showing < self.total)
            .map(|showing| format!("Showing {} of {}", showing, self.total))
    }
}

fn display_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// One choice for a relation-typed filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationOption {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationOptionsResponse {
    pub options: Vec<RelationOption>,
}

/// A generated report ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}
