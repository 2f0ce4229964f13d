pub mod builder;
pub mod config;
pub mod error;
pub mod models;
pub mod response;
pub mod services;
pub mod utils;

pub use builder::{BuilderState, ControlInput, FilterControl, ReportBuilder};
pub use config::ApiConfig;
pub use error::{ApiError, ReportError, ReportResult};
pub use models::{
    ExportArtifact, ExportRequest, FieldType, FilterSet, FilterValue, Orientation, OutputFormat,
    QuerySpecification, ReportDataResponse, ReportField, ReportSchema, ReportType,
};
pub use services::{HttpReportApi, ReportApi};
