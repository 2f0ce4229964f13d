use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder, Response, Url};
use serde::{de::DeserializeOwned, Serialize};

use super::api::ReportApi;
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::models::{
    ExportArtifact, ExportRequest, QuerySpecification, RelationOption, RelationOptionsResponse,
    ReportDataResponse, ReportSchema, ReportSchemaSummary, ReportType,
};
use crate::response::error_message;
use crate::utils::extract_filename;

const REPORTS_BASE: &str = "/v1/reports";

#[derive(Serialize)]
struct PreviewBody<'a> {
    #[serde(flatten)]
    spec: &'a QuerySpecification,
    format: &'static str,
    limit: usize,
}

#[derive(Serialize)]
struct GenerateDataBody<'a> {
    #[serde(flatten)]
    spec: &'a QuerySpecification,
    format: &'static str,
}

/// [`ReportApi`] over the JSON HTTP API.
#[derive(Clone)]
pub struct HttpReportApi {
    client: Client,
    config: ApiConfig,
}

impl HttpReportApi {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.config.base_url, REPORTS_BASE, path)
    }

    /// Reports URL from raw path segments, each percent-encoded, with the
    /// trailing slash the API expects.
    fn segment_url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.url("/"))
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", self.config.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.config.base_url.clone()))?
            .pop_if_empty()
            .extend(segments)
            .push("");
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let resp = self.authorize(request).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let code = status.as_u16();
        let body = resp.bytes().await.unwrap_or_default();
        let message = error_message(code, &body);
        tracing::warn!(status = code, "reports API error: {}", message);
        Err(ApiError::Status {
            status: code,
            message,
        })
    }

    async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let resp = self.send(self.client.get(self.url(path))).await?;
        Self::read_json(resp).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let resp = self
            .send(self.client.post(self.url(path)).json(body))
            .await?;
        Self::read_json(resp).await
    }
}

#[async_trait]
impl ReportApi for HttpReportApi {
    async fn list_schemas(&self) -> Result<Vec<ReportSchemaSummary>, ApiError> {
        self.get_json("/schemas/").await
    }

    async fn get_schema(&self, report_type: ReportType) -> Result<ReportSchema, ApiError> {
        tracing::debug!("Fetching schema for {}", report_type);
        self.get_json(&format!("/schema/{}/", report_type)).await
    }

    async fn get_relation_options(
        &self,
        report_type: ReportType,
        field_key: &str,
        institution_id: Option<i64>,
    ) -> Result<Vec<RelationOption>, ApiError> {
        let url = self.segment_url(&["options", report_type.as_str(), field_key])?;
        let mut request = self.client.get(url);
        // no scope and scope 0 both mean "all institutions"
        if let Some(id) = institution_id.filter(|id| *id != 0) {
            request = request.query(&[("institution_id", id)]);
        }

        let resp = self.send(request).await?;
        let body: RelationOptionsResponse = Self::read_json(resp).await?;
        tracing::debug!(
            "Loaded {} options for {}.{}",
            body.options.len(),
            report_type,
            field_key
        );
        Ok(body.options)
    }

    async fn preview(&self, spec: &QuerySpecification) -> Result<ReportDataResponse, ApiError> {
        let limit = self.config.preview_limit;
        let body = PreviewBody {
            spec,
            format: "preview",
            limit,
        };
        let mut data: ReportDataResponse = self.post_json("/dynamic/preview/", &body).await?;
        data.truncate_to(limit);
        Ok(data)
    }

    async fn generate_data(
        &self,
        spec: &QuerySpecification,
    ) -> Result<ReportDataResponse, ApiError> {
        let body = GenerateDataBody {
            spec,
            format: "json",
        };
        self.post_json("/dynamic/generate/", &body).await
    }

    async fn export(&self, request: &ExportRequest) -> Result<ExportArtifact, ApiError> {
        let resp = self
            .send(self.client.post(self.url("/dynamic/generate/")).json(request))
            .await?;

        let filename =
            extract_filename(resp.headers()).unwrap_or_else(|| request.default_filename());
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| request.format.content_type().to_string());
        let bytes = resp.bytes().await?.to_vec();

        tracing::info!(
            "Generated {} ({} bytes, {})",
            filename,
            bytes.len(),
            content_type
        );

        Ok(ExportArtifact {
            filename,
            content_type,
            bytes,
        })
    }
}
