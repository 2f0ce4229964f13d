pub mod api;
pub mod http;
pub mod relation_options;

pub use api::ReportApi;
pub use http::HttpReportApi;
pub use relation_options::{OptionsStatus, RelationOptionsCache};
