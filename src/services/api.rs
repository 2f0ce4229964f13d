use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::{
    ExportArtifact, ExportRequest, QuerySpecification, RelationOption, ReportDataResponse,
    ReportSchema, ReportSchemaSummary, ReportType,
};

/// The reports backend as seen by the builder.
///
/// [`crate::services::http::HttpReportApi`] talks to the real API; tests plug
/// in in-memory implementations.
#[async_trait]
pub trait ReportApi: Send + Sync {
    /// Available report types with basic counts.
    async fn list_schemas(&self) -> Result<Vec<ReportSchemaSummary>, ApiError>;

    async fn get_schema(&self, report_type: ReportType) -> Result<ReportSchema, ApiError>;

    /// Choices for a relation-typed field, optionally scoped to an institution.
    async fn get_relation_options(
        &self,
        report_type: ReportType,
        field_key: &str,
        institution_id: Option<i64>,
    ) -> Result<Vec<RelationOption>, ApiError>;

    /// First rows of the result. Idempotent; the row cap is the implementation's.
    async fn preview(&self, spec: &QuerySpecification) -> Result<ReportDataResponse, ApiError>;

    /// Full result as JSON.
    async fn generate_data(
        &self,
        spec: &QuerySpecification,
    ) -> Result<ReportDataResponse, ApiError>;

    /// Generate a downloadable artifact in the requested format.
    async fn export(&self, request: &ExportRequest) -> Result<ExportArtifact, ApiError>;
}
