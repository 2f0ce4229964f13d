mod common;

use report_builder::services::OptionsStatus;
use report_builder::{ControlInput, FilterControl, FilterValue, ReportBuilder, ReportError, ReportType};
use std::sync::atomic::Ordering;

async fn open_staff(app: &common::TestApp, institution_id: Option<i64>) -> ReportBuilder {
    let mut builder =
        ReportBuilder::new(app.api(), ReportType::Staff).with_institution(institution_id);
    builder.open().await.unwrap();
    builder
}

#[tokio::test]
async fn concurrent_opens_issue_one_request() {
    let app = common::spawn_app().await;
    let builder = open_staff(&app, Some(1)).await;

    let (a, b, c) = tokio::join!(
        builder.open_relation("department"),
        builder.open_relation("department"),
        builder.open_relation("department"),
    );

    let a = a.unwrap();
    assert_eq!(a.len(), 2);
    assert_eq!(a, b.unwrap());
    assert_eq!(a, c.unwrap());
    assert_eq!(app.backend.options_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn loaded_options_are_cached_for_the_session() {
    let app = common::spawn_app().await;
    let builder = open_staff(&app, None).await;

    assert_eq!(builder.relation_status("department"), OptionsStatus::NotLoaded);
    builder.open_relation("department").await.unwrap();
    builder.open_relation("department").await.unwrap();
    assert_eq!(app.backend.options_calls.load(Ordering::SeqCst), 1);

    let rendered = builder.render_filters().unwrap();
    let department = rendered
        .iter()
        .find(|f| f.field.key == "department")
        .unwrap();
    assert!(matches!(
        department.control,
        FilterControl::Relation { status: OptionsStatus::Loaded(ref options), selected: None }
            if options[0].name == "department A"
    ));
}

#[tokio::test]
async fn failed_load_is_retried_on_next_open() {
    let app = common::spawn_app().await;
    app.backend.fail_options.store(true, Ordering::SeqCst);
    let builder = open_staff(&app, None).await;

    let err = builder.open_relation("department").await.unwrap_err();
    assert!(matches!(err, ReportError::RelationOptions { ref field_key, .. } if field_key == "department"));
    assert!(matches!(
        builder.relation_status("department"),
        OptionsStatus::Failed(ref message) if message.contains("Directory service timeout")
    ));

    app.backend.fail_options.store(false, Ordering::SeqCst);
    let options = builder.open_relation("department").await.unwrap();
    assert_eq!(options.len(), 2);
    assert_eq!(app.backend.options_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn institution_change_fetches_scoped_options() {
    let app = common::spawn_app().await;
    let mut builder = open_staff(&app, Some(1)).await;

    let first = builder.open_relation("department").await.unwrap();
    assert_eq!(first[0].id, 101);

    builder.set_institution(Some(2));
    let second = builder.open_relation("department").await.unwrap();
    assert_eq!(second[0].id, 201);
    assert_eq!(*app.backend.last_institution.lock().unwrap(), Some(2));
    assert_eq!(app.backend.options_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn picking_a_relation_option_sets_the_filter() {
    let app = common::spawn_app().await;
    let mut builder = open_staff(&app, Some(3)).await;

    let options = builder.open_relation("department").await.unwrap();
    builder
        .apply_input("department", ControlInput::Relation(Some(options[1].id)))
        .unwrap();
    assert_eq!(builder.filters().get("department"), Some(&FilterValue::Id(302)));

    builder.request_preview().await.unwrap();
    assert_eq!(app.backend.last_body()["filters"]["department"], 302);

    builder
        .apply_input("department", ControlInput::Relation(None))
        .unwrap();
    assert!(builder.filters().get("department").is_none());
}
