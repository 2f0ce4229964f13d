use std::fmt;

/// Lifecycle of a builder dialog.
///
/// ```text
/// Closed -> LoadingSchema -> Ready | SchemaError
/// SchemaError -> LoadingSchema             (retry)
/// Ready -> PreviewLoading -> Ready         (preview or error attached)
/// Ready -> Exporting -> Closed | Ready     (success | failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    Closed,
    LoadingSchema,
    SchemaError,
    Ready,
    PreviewLoading,
    Exporting,
}

impl BuilderState {
    pub fn as_str(self) -> &'static str {
        match self {
            BuilderState::Closed => "closed",
            BuilderState::LoadingSchema => "loading schema",
            BuilderState::SchemaError => "showing a schema error",
            BuilderState::Ready => "ready",
            BuilderState::PreviewLoading => "loading a preview",
            BuilderState::Exporting => "exporting",
        }
    }

    pub fn is_open(self) -> bool {
        self != BuilderState::Closed
    }

    /// Whether a schema is loaded and the configuration can be edited.
    pub fn has_schema(self) -> bool {
        matches!(
            self,
            BuilderState::Ready | BuilderState::PreviewLoading | BuilderState::Exporting
        )
    }
}

impl fmt::Display for BuilderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
