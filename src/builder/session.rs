use std::fmt;
use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use super::controls::{self, ControlInput, RenderedFilter};
use super::selection::{resolve_group_by, ColumnSelection};
use super::state::BuilderState;
use crate::error::{ReportError, ReportResult};
use crate::models::{
    ExportArtifact, ExportRequest, FieldType, FilterSet, FilterValue, Orientation, OutputFormat,
    QuerySpecification, RelationOption, ReportDataResponse, ReportSchema, ReportType,
};
use crate::services::api::ReportApi;
use crate::services::relation_options::{OptionsStatus, RelationOptionsCache};

pub type GeneratedCallback = Box<dyn FnMut(&ExportArtifact) + Send>;

/// One report builder dialog: the schema it was opened with and everything
/// the user has configured since.
///
/// All session data (filters, columns, group-by, preview, relation options)
/// lives here and is discarded when the dialog closes or the report type
/// changes.
pub struct ReportBuilder {
    api: Arc<dyn ReportApi>,
    session_id: Uuid,
    report_type: ReportType,
    institution_id: Option<i64>,
    state: BuilderState,
    schema: Option<Arc<ReportSchema>>,
    schema_error: Option<String>,
    title: String,
    filters: FilterSet,
    columns: ColumnSelection,
    group_by: Option<String>,
    format: OutputFormat,
    orientation: Orientation,
    preview: Option<ReportDataResponse>,
    last_error: Option<String>,
    relation_options: RelationOptionsCache,
    on_generated: Option<GeneratedCallback>,
}

impl fmt::Debug for ReportBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportBuilder")
            .field("session_id", &self.session_id)
            .field("report_type", &self.report_type)
            .field("institution_id", &self.institution_id)
            .field("state", &self.state)
            .field("columns", &self.columns)
            .field("group_by", &self.group_by)
            .field("filters", &self.filters)
            .finish_non_exhaustive()
    }
}

impl ReportBuilder {
    pub fn new(api: Arc<dyn ReportApi>, report_type: ReportType) -> Self {
        let relation_options = RelationOptionsCache::new(Arc::clone(&api), report_type);
        Self {
            api,
            session_id: Uuid::new_v4(),
            report_type,
            institution_id: None,
            state: BuilderState::Closed,
            schema: None,
            schema_error: None,
            title: String::new(),
            filters: FilterSet::new(),
            columns: ColumnSelection::default(),
            group_by: None,
            format: OutputFormat::default(),
            orientation: Orientation::default(),
            preview: None,
            last_error: None,
            relation_options,
            on_generated: None,
        }
    }

    pub fn with_institution(mut self, institution_id: Option<i64>) -> Self {
        self.institution_id = institution_id;
        self
    }

    /// Called with the artifact after a successful export, just before the
    /// builder closes.
    pub fn on_generated<F>(&mut self, callback: F)
    where
        F: FnMut(&ExportArtifact) + Send + 'static,
    {
        self.on_generated = Some(Box::new(callback));
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    pub fn report_type(&self) -> ReportType {
        self.report_type
    }

    pub fn institution_id(&self) -> Option<i64> {
        self.institution_id
    }

    pub fn schema(&self) -> Option<&ReportSchema> {
        self.schema.as_deref()
    }

    pub fn schema_error(&self) -> Option<&str> {
        self.schema_error.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn active_filter_count(&self) -> usize {
        self.filters.active_count()
    }

    pub fn columns(&self) -> &[String] {
        self.columns.columns()
    }

    pub fn group_by(&self) -> Option<&str> {
        self.group_by.as_deref()
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn preview(&self) -> Option<&ReportDataResponse> {
        self.preview.as_ref()
    }

    /// Inline error from the last preview/export/edit, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    // ---- lifecycle ----

    /// Open the dialog. Loads the schema unless one is already cached for
    /// the current report type.
    pub async fn open(&mut self) -> ReportResult<()> {
        if self.state == BuilderState::LoadingSchema && self.schema.is_none() {
            // report type switched while open; nothing is in flight yet
            return self.load_schema().await;
        }
        if self.state.is_open() {
            return Ok(());
        }

        tracing::debug!(session = %self.session_id, "Opening {} report builder", self.report_type);
        match self.schema.clone() {
            Some(schema) => {
                self.apply_schema(&schema);
                self.state = BuilderState::Ready;
                Ok(())
            }
            None => {
                self.state = BuilderState::LoadingSchema;
                self.load_schema().await
            }
        }
    }

    /// Fetch the schema for the current report type. Valid while loading or
    /// after a failed load (explicit retry); never retries on its own.
    pub async fn load_schema(&mut self) -> ReportResult<()> {
        if !matches!(
            self.state,
            BuilderState::LoadingSchema | BuilderState::SchemaError
        ) {
            return Err(self.invalid_state("load the schema"));
        }

        self.state = BuilderState::LoadingSchema;
        self.schema_error = None;

        let result = match self.api.get_schema(self.report_type).await {
            Ok(schema) => schema.ensure_well_formed().map(|_| schema),
            Err(e) => Err(ReportError::SchemaLoad(e)),
        };

        match result {
            Ok(schema) => {
                tracing::info!(
                    session = %self.session_id,
                    "Loaded {} schema: {} filterable, {} selectable, {} groupable fields",
                    self.report_type,
                    schema.filterable_fields.len(),
                    schema.selectable_fields.len(),
                    schema.groupable_fields.len()
                );
                let schema = Arc::new(schema);
                self.apply_schema(&schema);
                self.schema = Some(schema);
                self.state = BuilderState::Ready;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(session = %self.session_id, "Schema load failed: {}", e);
                self.schema_error = Some("Failed to load report schema".to_string());
                self.state = BuilderState::SchemaError;
                Err(e)
            }
        }
    }

    /// Retry after a schema error.
    pub async fn retry_schema(&mut self) -> ReportResult<()> {
        if self.state != BuilderState::SchemaError {
            return Err(self.invalid_state("retry the schema"));
        }
        self.load_schema().await
    }

    /// Switch report type. Everything configured so far is discarded; an open
    /// builder goes back to `LoadingSchema` and the caller follows up with
    /// [`ReportBuilder::open`] or [`ReportBuilder::load_schema`].
    pub fn set_report_type(&mut self, report_type: ReportType) {
        if report_type == self.report_type {
            return;
        }

        tracing::debug!(
            session = %self.session_id,
            "Report type changed {} -> {}",
            self.report_type,
            report_type
        );
        self.report_type = report_type;
        self.schema = None;
        self.schema_error = None;
        self.clear_session();
        self.relation_options.reset(report_type);

        if self.state.is_open() {
            self.state = BuilderState::LoadingSchema;
        }
    }

    /// Change the institution scope. Relation options are cached per scope.
    pub fn set_institution(&mut self, institution_id: Option<i64>) {
        self.institution_id = institution_id;
    }

    /// Close the dialog and drop the session data. The schema stays cached.
    pub fn close(&mut self) {
        if self.state == BuilderState::Closed {
            return;
        }
        tracing::debug!(session = %self.session_id, "Closing report builder");
        self.clear_session();
        self.relation_options.reset(self.report_type);
        self.state = BuilderState::Closed;
    }

    fn clear_session(&mut self) {
        self.title.clear();
        self.filters.clear();
        self.columns.reset();
        self.group_by = None;
        self.format = OutputFormat::default();
        self.orientation = Orientation::default();
        self.preview = None;
        self.last_error = None;
    }

    fn apply_schema(&mut self, schema: &ReportSchema) {
        self.columns = ColumnSelection::from_defaults(schema);
        self.title = schema.title.clone();
    }

    fn invalid_state(&self, operation: &'static str) -> ReportError {
        ReportError::InvalidState {
            state: self.state,
            operation,
        }
    }

    fn require_schema(&self, operation: &'static str) -> ReportResult<Arc<ReportSchema>> {
        match (&self.schema, self.state.has_schema()) {
            (Some(schema), true) => Ok(Arc::clone(schema)),
            _ => Err(self.invalid_state(operation)),
        }
    }

    /// Record an error for inline display and hand it back.
    fn surface(&mut self, err: ReportError) -> ReportError {
        self.last_error = Some(err.to_string());
        err
    }

    // ---- configuration ----

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_format(&mut self, format: OutputFormat) {
        self.format = format;
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    /// Replace the filter for `field_key`. Null or empty values clear it.
    pub fn update_filter(&mut self, field_key: &str, value: FilterValue) -> ReportResult<()> {
        let schema = self.require_schema("edit filters")?;
        let field = schema.filterable(field_key).ok_or_else(|| {
            ReportError::Validation(format!("'{}' is not a filterable field", field_key))
        })?;
        self.filters.update(field, value)
    }

    /// Apply a raw control edit, merging range sub-parts with the stored value.
    pub fn apply_input(&mut self, field_key: &str, input: ControlInput) -> ReportResult<()> {
        let schema = self.require_schema("edit filters")?;
        let field = schema.filterable(field_key).ok_or_else(|| {
            ReportError::Validation(format!("'{}' is not a filterable field", field_key))
        })?;
        let value = controls::apply_input(field, self.filters.get(field_key), input)?;
        self.filters.update(field, value)
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    pub fn toggle_column(&mut self, key: &str) -> ReportResult<bool> {
        let schema = self.require_schema("select columns")?;
        self.columns.toggle(&schema, key)
    }

    pub fn select_all_columns(&mut self) -> ReportResult<()> {
        let schema = self.require_schema("select columns")?;
        self.columns.select_all(&schema);
        Ok(())
    }

    pub fn select_default_columns(&mut self) -> ReportResult<()> {
        let schema = self.require_schema("select columns")?;
        self.columns.select_default(&schema);
        Ok(())
    }

    pub fn clear_columns(&mut self) -> ReportResult<()> {
        let schema = self.require_schema("select columns")?;
        self.columns.clear(&schema);
        Ok(())
    }

    /// Pick a group-by field; `None` or `"none"` clears it. Columns are left
    /// untouched either way.
    pub fn set_group_by(&mut self, key: Option<&str>) -> ReportResult<()> {
        let schema = self.require_schema("set group-by")?;
        self.group_by = resolve_group_by(&schema, key)?;
        Ok(())
    }

    // ---- filter rendering ----

    pub fn render_filters(&self) -> ReportResult<Vec<RenderedFilter<'_>>> {
        let schema = self
            .schema
            .as_deref()
            .filter(|_| self.state.has_schema())
            .ok_or_else(|| self.invalid_state("render filters"))?;
        Ok(controls::render_filters(
            &schema.filterable_fields,
            &self.filters,
            |key| self.relation_options.status(key, self.institution_id),
        ))
    }

    pub fn relation_status(&self, field_key: &str) -> OptionsStatus {
        self.relation_options.status(field_key, self.institution_id)
    }

    /// The relation control for `field_key` was opened: load its options on
    /// first use. Concurrent calls for the same field share one request; a
    /// failed load is retried by opening again.
    pub async fn open_relation(&self, field_key: &str) -> ReportResult<Arc<[RelationOption]>> {
        let schema = self.require_schema("load relation options")?;
        match schema.filterable(field_key) {
            Some(field) if field.field_type == FieldType::Relation => {}
            _ => {
                return Err(ReportError::Validation(format!(
                    "'{}' is not a relation filter",
                    field_key
                )))
            }
        }
        self.relation_options
            .load(field_key, self.institution_id)
            .await
    }

    // ---- query assembly ----

    /// Assemble the query from the current configuration. Pure: validates
    /// locally and never touches the network.
    pub fn build_specification(&self) -> ReportResult<QuerySpecification> {
        let schema = self.require_schema("build a query")?;

        let spec = QuerySpecification {
            report_type: self.report_type,
            filters: self.filters.clone(),
            columns: self.columns.columns().to_vec(),
            group_by: self.group_by.clone(),
            institution_id: self.institution_id,
        };

        spec.validate()
            .map_err(|e| ReportError::Validation(e.to_string()))?;

        if let Some(col) = spec.columns.iter().find(|c| schema.selectable(c).is_none()) {
            return Err(ReportError::Validation(format!(
                "'{}' is not a selectable column",
                col
            )));
        }
        if let Some(key) = &spec.group_by {
            if schema.groupable(key).is_none() {
                return Err(ReportError::Validation(format!(
                    "'{}' is not a groupable field",
                    key
                )));
            }
        }
        if let Some(key) = spec.filters.inverted_range() {
            return Err(ReportError::Validation(format!(
                "filter '{}' has its lower bound above its upper bound",
                key
            )));
        }

        Ok(spec)
    }

    /// The specification plus title and output options. A blank title falls
    /// back to the schema's.
    pub fn build_export_request(&self) -> ReportResult<ExportRequest> {
        let spec = self.build_specification()?;
        let schema = self.require_schema("build a query")?;

        let title = match self.title.trim() {
            "" => schema.title.clone(),
            t => t.to_string(),
        };

        let request = ExportRequest {
            spec,
            title,
            format: self.format,
            orientation: self.orientation,
        };
        request
            .validate()
            .map_err(|e| ReportError::Validation(e.to_string()))?;
        Ok(request)
    }

    // ---- preview / export ----

    /// Fetch a bounded preview. On failure the previous preview is kept and
    /// the error is recorded inline.
    pub async fn request_preview(&mut self) -> ReportResult<&ReportDataResponse> {
        if self.state != BuilderState::Ready {
            return Err(self.invalid_state("preview"));
        }
        let spec = match self.build_specification() {
            Ok(spec) => spec,
            Err(e) => return Err(self.surface(e)),
        };

        self.state = BuilderState::PreviewLoading;
        self.last_error = None;
        let result = self.api.preview(&spec).await;
        self.state = BuilderState::Ready;

        match result {
            Ok(data) => {
                tracing::debug!(
                    session = %self.session_id,
                    "Preview: {} rows of {}",
                    data.data.len(),
                    data.total
                );
                Ok(&*self.preview.insert(data))
            }
            Err(e) => {
                tracing::warn!(session = %self.session_id, "Preview failed: {}", e);
                Err(self.surface(ReportError::Preview(e)))
            }
        }
    }

    /// Generate the artifact. On success the completion callback runs and the
    /// builder closes; on failure it stays open with the configuration intact.
    pub async fn request_export(&mut self) -> ReportResult<ExportArtifact> {
        if self.state != BuilderState::Ready {
            return Err(self.invalid_state("export"));
        }
        let request = match self.build_export_request() {
            Ok(request) => request,
            Err(e) => return Err(self.surface(e)),
        };

        self.state = BuilderState::Exporting;
        self.last_error = None;
        let result = self.api.export(&request).await;

        match result {
            Ok(artifact) => {
                tracing::info!(
                    session = %self.session_id,
                    "Exported {} report as {}",
                    self.report_type,
                    artifact.filename
                );
                if let Some(callback) = self.on_generated.as_mut() {
                    callback(&artifact);
                }
                self.state = BuilderState::Ready;
                self.close();
                Ok(artifact)
            }
            Err(e) => {
                tracing::warn!(session = %self.session_id, "Export failed: {}", e);
                self.state = BuilderState::Ready;
                Err(self.surface(ReportError::Export(e)))
            }
        }
    }
}
