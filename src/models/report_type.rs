use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReportError;

/// Category of reportable entity. Each one has a schema on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Staff,
    Students,
    Graduates,
}

impl ReportType {
    pub const ALL: [ReportType; 3] = [ReportType::Staff, ReportType::Students, ReportType::Graduates];

    /// Path segment / wire value.
    pub fn as_str(self) -> &'static str {
        match self {
            ReportType::Staff => "staff",
            ReportType::Students => "students",
            ReportType::Graduates => "graduates",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReportType::Staff => "Staff",
            ReportType::Students => "Students",
            ReportType::Graduates => "Graduates",
        }
    }

    /// Heading shown on the builder dialog, e.g. "Generate Staff Report".
    pub fn heading(self) -> String {
        format!("Generate {} Report", self.label())
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "staff" => Ok(ReportType::Staff),
            "students" => Ok(ReportType::Students),
            "graduates" => Ok(ReportType::Graduates),
            other => Err(ReportError::Validation(format!(
                "report_type must be one of: staff, students, graduates (got '{}')",
                other
            ))),
        }
    }
}
