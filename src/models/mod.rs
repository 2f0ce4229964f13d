pub mod data;
pub mod field;
pub mod filter;
pub mod query;
pub mod report_type;
pub mod schema;

pub use data::{ExportArtifact, RelationOption, RelationOptionsResponse, ReportColumn, ReportDataResponse};
pub use field::{FieldType, ReportField};
pub use filter::{DateRange, FilterSet, FilterValue, NumberRange};
pub use query::{ExportRequest, Orientation, OutputFormat, QuerySpecification};
pub use report_type::ReportType;
pub use schema::{ReportSchema, ReportSchemaSummary};
