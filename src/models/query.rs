use serde::{Deserialize, Serialize};
use validator::Validate;

use super::filter::FilterSet;
use super::report_type::ReportType;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pdf,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Json => "json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Json => "application/json",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Auto,
    Portrait,
    Landscape,
}

/// Everything the resolver needs to produce a result set.
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
pub struct QuerySpecification {
    pub report_type: ReportType,
    pub filters: FilterSet,
    #[validate(length(min = 1, message = "at least one column is required"))]
    pub columns: Vec<String>,
    pub group_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<i64>,
}

/// A finalized specification plus output options.
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
pub struct ExportRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub spec: QuerySpecification,
    #[validate(length(max = 255, message = "title is too long"))]
    pub title: String,
    pub format: OutputFormat,
    pub orientation: Orientation,
}

impl ExportRequest {
    /// Fallback download name when the server does not name the artifact.
    pub fn default_filename(&self) -> String {
        format!("{}_report.{}", self.spec.report_type, self.format.extension())
    }
}
