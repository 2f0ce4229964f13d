//! Lazy, memoized option lists for relation-typed filters.
//!
//! Options are fetched the first time a control is opened and cached for the
//! rest of the session. Concurrent opens of the same field share one
//! in-flight request. A failed fetch is remembered only as a status; the next
//! open retries it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use futures_util::future::{BoxFuture, FutureExt, Shared};

use super::api::ReportApi;
use crate::error::{ApiError, ReportError, ReportResult};
use crate::models::{RelationOption, ReportType};

type FetchResult = Result<Arc<[RelationOption]>, Arc<ApiError>>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Cache key: field key plus the institution scope the options were fetched for.
type SlotKey = (String, Option<i64>);

#[derive(Clone)]
enum Slot {
    Pending { id: u64, fetch: SharedFetch },
    Ready(Arc<[RelationOption]>),
    Failed(String),
}

/// What a relation control should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionsStatus {
    NotLoaded,
    Loading,
    Loaded(Arc<[RelationOption]>),
    Failed(String),
}

pub struct RelationOptionsCache {
    api: Arc<dyn ReportApi>,
    report_type: ReportType,
    slots: DashMap<SlotKey, Slot>,
    next_id: AtomicU64,
}

impl RelationOptionsCache {
    pub fn new(api: Arc<dyn ReportApi>, report_type: ReportType) -> Self {
        Self {
            api,
            report_type,
            slots: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn report_type(&self) -> ReportType {
        self.report_type
    }

    /// Drop every cached list and switch to another report type.
    pub fn reset(&mut self, report_type: ReportType) {
        self.slots.clear();
        self.report_type = report_type;
    }

    pub fn status(&self, field_key: &str, institution_id: Option<i64>) -> OptionsStatus {
        match self
            .slots
            .get(&(field_key.to_string(), institution_id))
            .map(|slot| slot.value().clone())
        {
            None => OptionsStatus::NotLoaded,
            Some(Slot::Pending { .. }) => OptionsStatus::Loading,
            Some(Slot::Ready(options)) => OptionsStatus::Loaded(options),
            Some(Slot::Failed(message)) => OptionsStatus::Failed(message),
        }
    }

    /// Options for `field_key`, fetching them on first use.
    pub async fn load(
        &self,
        field_key: &str,
        institution_id: Option<i64>,
    ) -> ReportResult<Arc<[RelationOption]>> {
        let key = (field_key.to_string(), institution_id);

        let (id, fetch) = match self.slots.entry(key.clone()) {
            Entry::Occupied(mut entry) => match entry.get().clone() {
                Slot::Ready(options) => return Ok(options),
                Slot::Pending { id, fetch } => (id, fetch),
                Slot::Failed(_) => {
                    let (id, fetch) = self.start(field_key, institution_id);
                    entry.insert(Slot::Pending {
                        id,
                        fetch: fetch.clone(),
                    });
                    (id, fetch)
                }
            },
            Entry::Vacant(entry) => {
                let (id, fetch) = self.start(field_key, institution_id);
                entry.insert(Slot::Pending {
                    id,
                    fetch: fetch.clone(),
                });
                (id, fetch)
            }
        };

        match fetch.await {
            Ok(options) => {
                self.settle(&key, id, Slot::Ready(Arc::clone(&options)));
                Ok(options)
            }
            Err(source) => {
                tracing::warn!("Failed to load options for {}: {}", field_key, source);
                self.settle(&key, id, Slot::Failed(source.to_string()));
                Err(ReportError::RelationOptions {
                    field_key: field_key.to_string(),
                    source,
                })
            }
        }
    }

    fn start(&self, field_key: &str, institution_id: Option<i64>) -> (u64, SharedFetch) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let api = Arc::clone(&self.api);
        let report_type = self.report_type;
        let field_key = field_key.to_string();

        tracing::debug!(
            "Fetching relation options for {}.{} (institution {:?})",
            report_type,
            field_key,
            institution_id
        );

        let fetch = async move {
            api.get_relation_options(report_type, &field_key, institution_id)
                .await
                .map(Arc::<[RelationOption]>::from)
                .map_err(Arc::new)
        }
        .boxed()
        .shared();

        (id, fetch)
    }

    /// Record the outcome, unless the slot was replaced meanwhile (reset or a
    /// newer retry).
    fn settle(&self, key: &SlotKey, id: u64, outcome: Slot) {
        if let Some(mut slot) = self.slots.get_mut(key) {
            if matches!(&*slot, Slot::Pending { id: pending, .. } if *pending == id) {
                *slot = outcome;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ExportArtifact, ExportRequest, QuerySpecification, ReportDataResponse, ReportSchema,
        ReportSchemaSummary,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    #[derive(Default)]
    struct OptionsOnlyApi {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    fn unused() -> ApiError {
        ApiError::Status {
            status: 501,
            message: "not used in this test".to_string(),
        }
    }

    #[async_trait]
    impl ReportApi for OptionsOnlyApi {
        async fn list_schemas(&self) -> Result<Vec<ReportSchemaSummary>, ApiError> {
            Err(unused())
        }

        async fn get_schema(&self, _: ReportType) -> Result<ReportSchema, ApiError> {
            Err(unused())
        }

        async fn get_relation_options(
            &self,
            _report_type: ReportType,
            field_key: &str,
            institution_id: Option<i64>,
        ) -> Result<Vec<RelationOption>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(ApiError::Status {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(vec![RelationOption {
                id: institution_id.unwrap_or(1),
                name: format!("{} option", field_key),
            }])
        }

        async fn preview(&self, _: &QuerySpecification) -> Result<ReportDataResponse, ApiError> {
            Err(unused())
        }

        async fn generate_data(
            &self,
            _: &QuerySpecification,
        ) -> Result<ReportDataResponse, ApiError> {
            Err(unused())
        }

        async fn export(&self, _: &ExportRequest) -> Result<ExportArtifact, ApiError> {
            Err(unused())
        }
    }

    fn cache(api: &Arc<OptionsOnlyApi>) -> RelationOptionsCache {
        RelationOptionsCache::new(api.clone(), ReportType::Staff)
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_request() {
        let api = Arc::new(OptionsOnlyApi::default());
        let cache = cache(&api);

        let (a, b) = tokio::join!(cache.load("department", None), cache.load("department", None));

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn loaded_options_are_not_refetched() {
        let api = Arc::new(OptionsOnlyApi::default());
        let cache = cache(&api);

        assert_eq!(cache.status("department", None), OptionsStatus::NotLoaded);
        cache.load("department", None).await.unwrap();
        cache.load("department", None).await.unwrap();

        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            cache.status("department", None),
            OptionsStatus::Loaded(options) if options.len() == 1
        ));
    }

    #[tokio::test]
    async fn failure_is_retried_on_next_load() {
        let api = Arc::new(OptionsOnlyApi::default());
        api.fail.store(true, Ordering::SeqCst);
        let cache = cache(&api);

        let err = cache.load("department", None).await.unwrap_err();
        assert!(matches!(err, ReportError::RelationOptions { ref field_key, .. } if field_key == "department"));
        assert!(matches!(cache.status("department", None), OptionsStatus::Failed(_)));

        api.fail.store(false, Ordering::SeqCst);
        cache.load("department", None).await.unwrap();
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn institution_scope_is_part_of_the_key() {
        let api = Arc::new(OptionsOnlyApi::default());
        let cache = cache(&api);

        let a = cache.load("department", Some(1)).await.unwrap();
        let b = cache.load("department", Some(2)).await.unwrap();

        assert_eq!(a[0].id, 1);
        assert_eq!(b[0].id, 2);
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reset_forgets_cached_lists() {
        let api = Arc::new(OptionsOnlyApi::default());
        let mut cache = cache(&api);

        cache.load("department", None).await.unwrap();
        cache.reset(ReportType::Students);
        assert_eq!(cache.status("department", None), OptionsStatus::NotLoaded);
        assert_eq!(cache.report_type(), ReportType::Students);
    }
}
