#![allow(dead_code)]

use axum::{
    extract::{Extension, Path, Query},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use report_builder::{ApiConfig, HttpReportApi};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex, Once,
};
use std::time::Duration;

static INIT: Once = Once::new();

fn init_env() {
    INIT.call_once(|| {
        dotenv::dotenv().ok();
        report_builder::utils::init_tracing("report_builder=debug");
    });
}

pub const TEST_TOKEN: &str = "integration-test-token";

/// In-memory reports backend. Flags switch individual endpoints into failure
/// mode; counters and captured bodies let tests assert on traffic.
#[derive(Default)]
pub struct MockBackend {
    pub fail_schema: AtomicBool,
    pub fail_preview: AtomicBool,
    pub fail_export: AtomicBool,
    pub fail_options: AtomicBool,
    pub schema_calls: AtomicUsize,
    pub options_calls: AtomicUsize,
    pub preview_calls: AtomicUsize,
    pub export_calls: AtomicUsize,
    pub last_body: Mutex<Option<Value>>,
    pub last_auth: Mutex<Option<String>>,
    pub last_institution: Mutex<Option<i64>>,
}

impl MockBackend {
    pub fn last_body(&self) -> Value {
        self.last_body.lock().unwrap().clone().unwrap_or(Value::Null)
    }

    fn record(&self, headers: &HeaderMap, body: Option<Value>) {
        *self.last_auth.lock().unwrap() = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(body) = body {
            *self.last_body.lock().unwrap() = Some(body);
        }
    }
}

pub struct TestApp {
    pub addr: String,
    pub backend: Arc<MockBackend>,
}

impl TestApp {
    pub fn config(&self) -> ApiConfig {
        ApiConfig::new(format!("{}/api", self.addr)).with_token(TEST_TOKEN)
    }

    pub fn api(&self) -> Arc<HttpReportApi> {
        Arc::new(HttpReportApi::new(self.config()).unwrap())
    }
}

pub async fn spawn_app() -> TestApp {
    init_env();

    let backend = Arc::new(MockBackend::default());

    let reports = Router::new()
        .route("/schemas/", get(list_schemas))
        .route("/schema/{report_type}/", get(get_schema))
        .route("/options/{report_type}/{field}/", get(get_options))
        .route("/dynamic/preview/", post(preview))
        .route("/dynamic/generate/", post(generate));

    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .nest("/api/v1/reports", reports)
        .layer(Extension(backend.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        addr: format!("http://{}", addr),
        backend,
    }
}

pub fn staff_schema() -> Value {
    json!({
        "report_type": "staff",
        "title": "Staff Report",
        "fields": [],
        "filterable_fields": [
            {"key": "is_active", "label": "Active", "type": "boolean"},
            {"key": "position", "label": "Position", "type": "choice",
             "choices": ["Teacher", "Principal", "Counselor"]},
            {"key": "department", "label": "Department", "type": "relation",
             "relation_model": "Department"},
            {"key": "years_of_service", "label": "Years of Service", "type": "number"},
            {"key": "hire_date", "label": "Hire Date", "type": "date"},
            {"key": "email", "label": "Email", "type": "string"}
        ],
        "selectable_fields": [
            {"key": "employee_id", "label": "Employee ID", "type": "string"},
            {"key": "full_name", "label": "Full Name", "type": "computed"},
            {"key": "position", "label": "Position", "type": "choice",
             "choices": ["Teacher", "Principal", "Counselor"]},
            {"key": "department", "label": "Department", "type": "relation"}
        ],
        "groupable_fields": [
            {"key": "position", "label": "Position", "type": "choice",
             "choices": ["Teacher", "Principal", "Counselor"]},
            {"key": "department", "label": "Department", "type": "relation"}
        ],
        "default_columns": ["full_name", "position"]
    })
}

pub fn students_schema() -> Value {
    json!({
        "report_type": "students",
        "title": "Students Report",
        "filterable_fields": [
            {"key": "grade", "label": "Grade", "type": "choice",
             "choices": ["Grade 7", "Grade 8"]}
        ],
        "selectable_fields": [
            {"key": "student_id", "label": "Student ID", "type": "string"},
            {"key": "name", "label": "Name", "type": "string"}
        ],
        "groupable_fields": [],
        "default_columns": ["student_id", "name"]
    })
}

async fn list_schemas(
    Extension(backend): Extension<Arc<MockBackend>>,
    headers: HeaderMap,
) -> Json<Value> {
    backend.record(&headers, None);
    Json(json!([
        {"report_type": "staff", "title": "Staff Report", "field_count": 10, "groupable_count": 2},
        {"report_type": "students", "title": "Students Report", "field_count": 8, "groupable_count": 0}
    ]))
}

async fn get_schema(
    Extension(backend): Extension<Arc<MockBackend>>,
    Path(report_type): Path<String>,
    headers: HeaderMap,
) -> Response {
    backend.record(&headers, None);
    backend.schema_calls.fetch_add(1, Ordering::SeqCst);

    if backend.fail_schema.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Schema registry unavailable"})),
        )
            .into_response();
    }

    match report_type.as_str() {
        "staff" => Json(staff_schema()).into_response(),
        "students" => Json(students_schema()).into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
    }
}

#[derive(Deserialize)]
struct OptionsQuery {
    institution_id: Option<i64>,
}

async fn get_options(
    Extension(backend): Extension<Arc<MockBackend>>,
    Path((_report_type, field)): Path<(String, String)>,
    Query(query): Query<OptionsQuery>,
    headers: HeaderMap,
) -> Response {
    backend.record(&headers, None);
    backend.options_calls.fetch_add(1, Ordering::SeqCst);
    *backend.last_institution.lock().unwrap() = query.institution_id;

    // long enough for concurrent opens to overlap
    tokio::time::sleep(Duration::from_millis(50)).await;

    if backend.fail_options.load(Ordering::SeqCst) {
        return (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": "Directory service timeout"})),
        )
            .into_response();
    }

    let scope = query.institution_id.unwrap_or(0);
    Json(json!({
        "options": [
            {"id": scope * 100 + 1, "name": format!("{} A", field)},
            {"id": scope * 100 + 2, "name": format!("{} B", field)}
        ]
    }))
    .into_response()
}

fn rows(columns: &[Value], count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            let mut row = serde_json::Map::new();
            for col in columns {
                if let Some(key) = col.as_str() {
                    row.insert(key.to_string(), json!(format!("{}-{}", key, i)));
                }
            }
            Value::Object(row)
        })
        .collect()
}

fn data_response(body: &Value, returned: usize, preview: bool) -> Value {
    let columns = body["columns"].as_array().cloned().unwrap_or_default();
    let headers: Vec<Value> = columns
        .iter()
        .filter_map(Value::as_str)
        .map(|c| json!({"key": c, "label": c.replace('_', " ")}))
        .collect();
    let showing = preview.then_some(returned);
    json!({
        "total": 245,
        "showing": showing,
        "is_aggregated": false,
        "group_by": body["group_by"].clone(),
        "preview": preview,
        "columns": headers,
        "data": rows(&columns, returned)
    })
}

async fn preview(
    Extension(backend): Extension<Arc<MockBackend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    backend.record(&headers, Some(body.clone()));
    backend.preview_calls.fetch_add(1, Ordering::SeqCst);

    if backend.fail_preview.load(Ordering::SeqCst) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"columns": ["Unknown column 'salary'."]})),
        )
            .into_response();
    }

    // ignores the requested limit; the client caps rows itself
    Json(data_response(&body, 15, true)).into_response()
}

async fn generate(
    Extension(backend): Extension<Arc<MockBackend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    backend.record(&headers, Some(body.clone()));
    backend.export_calls.fetch_add(1, Ordering::SeqCst);

    if backend.fail_export.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "PDF generation failed"})),
        )
            .into_response();
    }

    match body["format"].as_str() {
        Some("pdf") => {
            let filename = format!(
                "{}_report_20261016.pdf",
                body["report_type"].as_str().unwrap_or("report")
            );
            (
                [
                    (header::CONTENT_TYPE, "application/pdf".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", filename),
                    ),
                ],
                b"%PDF-1.4 mock".to_vec(),
            )
                .into_response()
        }
        _ => Json(data_response(&body, 3, false)).into_response(),
    }
}
