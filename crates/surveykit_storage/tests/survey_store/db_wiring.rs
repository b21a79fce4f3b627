#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{TimeZone, Utc};
use surveykit_contracts::response::{ResponseId, SurveyResponse};
use surveykit_contracts::survey::{ParameterId, Survey, SurveyId, TrackingParameter};
use surveykit_contracts::UserId;
use surveykit_storage::repo::{SurveyRepo, SurveyResponseRepo};
use surveykit_storage::{Collection, FileKv, InMemoryKv, KeyValueStore, StorageError, SurveyStore};

/// Accepts reads, refuses every write.
#[derive(Default)]
struct ReadOnlyKv {
    inner: InMemoryKv,
}

impl KeyValueStore for ReadOnlyKv {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable {
            key: key.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "quota exceeded"),
        })
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        self.inner.delete(key)
    }
}

fn temp_dir(name: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(1);
    std::env::temp_dir().join(format!("surveykit-store-test-{name}-{suffix}"))
}

fn survey(id: &str) -> Survey {
    let now = Utc.with_ymd_and_hms(2024, 11, 1, 9, 30, 0).unwrap();
    let mut s = Survey::v1(
        SurveyId::new(id).unwrap(),
        "Q4 Customer Satisfaction Survey",
        "Quarterly customer feedback collection",
        UserId::new("current-user").unwrap(),
        now,
    )
    .unwrap();
    s.parameters.push(
        TrackingParameter::v1(
            ParameterId::new("param-3").unwrap(),
            "segment",
            "enterprise",
            false,
            now,
        )
        .unwrap(),
    );
    s
}

fn response(id: &str, survey_id: &str) -> SurveyResponse {
    SurveyResponse::v1(
        ResponseId::new(id).unwrap(),
        SurveyId::new(survey_id).unwrap(),
        BTreeMap::from([("segment".to_string(), "enterprise".to_string())]),
        Utc.with_ymd_and_hms(2024, 11, 2, 10, 0, 0).unwrap(),
        "127.0.0.1",
        "test-agent/1.0",
    )
    .unwrap()
}

#[test]
fn at_store_db_01_missing_collections_read_as_empty() {
    let store = SurveyStore::new(InMemoryKv::new());
    assert!(store.load_surveys().is_empty());
    assert!(store.load_responses().is_empty());
    assert!(store.try_load_surveys().unwrap().is_empty());
}

#[test]
fn at_store_db_02_malformed_json_reads_as_empty_but_try_load_reports_it() {
    let mut kv = InMemoryKv::new();
    kv.set(Collection::Surveys.key(), "{not json").unwrap();
    kv.set(Collection::Responses.key(), "[{\"id\": 7}]").unwrap();
    let store = SurveyStore::new(kv);

    assert!(store.load_surveys().is_empty());
    assert!(store.load_responses().is_empty());
    assert!(matches!(
        store.try_load_surveys(),
        Err(StorageError::Deserialize { .. })
    ));
}

#[test]
fn at_store_db_03_upsert_replaces_by_id_and_preserves_order() {
    let mut store = SurveyStore::new(InMemoryKv::new());
    store.upsert_survey_row(survey("survey-a")).unwrap();
    store.upsert_survey_row(survey("survey-b")).unwrap();

    let mut changed = survey("survey-a");
    changed.is_active = false;
    store.upsert_survey_row(changed).unwrap();

    let rows = store.load_surveys();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id.as_str(), "survey-a");
    assert!(!rows[0].is_active);
    assert!(store
        .survey_row(&SurveyId::new("survey-b").unwrap())
        .is_some());
}

#[test]
fn at_store_db_04_write_failure_is_dropped_silently() {
    let mut store = SurveyStore::new(ReadOnlyKv::default());
    store.upsert_survey_row(survey("survey-a")).unwrap();
    store.append_response_row(response("r-1", "survey-a")).unwrap();
    assert!(store.load_surveys().is_empty());
    assert!(store.load_responses().is_empty());
    assert!(matches!(
        store.try_save_surveys(&[survey("survey-a")]),
        Err(StorageError::Unavailable { .. })
    ));
}

#[test]
fn at_store_db_05_file_store_rehydrates_timestamps() {
    let dir = temp_dir("rehydrate");
    let mut store = SurveyStore::new(FileKv::new(&dir));
    let original = survey("demo-survey-1");
    store.upsert_survey_row(original.clone()).unwrap();
    store.append_response_row(response("r-1", "demo-survey-1")).unwrap();

    let reopened = SurveyStore::new(FileKv::new(&dir));
    let rows = reopened.load_surveys();
    assert_eq!(rows, vec![original]);
    let responses = reopened.responses_for_survey(&SurveyId::new("demo-survey-1").unwrap());
    assert_eq!(responses.len(), 1);
    assert_eq!(
        responses[0].timestamp,
        Utc.with_ymd_and_hms(2024, 11, 2, 10, 0, 0).unwrap()
    );
    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn at_store_db_06_two_writers_race_last_writer_wins() {
    let dir = temp_dir("race");
    let mut tab_a = SurveyStore::new(FileKv::new(&dir));
    let mut tab_b = SurveyStore::new(FileKv::new(&dir));

    let mut from_a = tab_a.load_surveys();
    let mut from_b = tab_b.load_surveys();
    from_a.push(survey("survey-a"));
    from_b.push(survey("survey-b"));
    tab_a.save_surveys(&from_a);
    tab_b.save_surveys(&from_b);

    let rows = tab_a.load_surveys();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id.as_str(), "survey-b");
    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn at_store_db_07_reads_original_camel_case_layout() {
    let mut kv = InMemoryKv::new();
    kv.set(
        Collection::Responses.key(),
        r#"[{
            "id": "0b7c0a52-1b0e-4d8e-9a43-6f2f6f0e3a11",
            "surveyId": "demo-survey-1",
            "parameters": {"campaign": "Q4_2024_CUSTOMER_SAT"},
            "timestamp": "2024-12-01T08:15:00.000Z",
            "ipAddress": "127.0.0.1",
            "userAgent": "Mozilla/5.0"
        }]"#,
    )
    .unwrap();
    let store = SurveyStore::new(kv);
    let rows = store.load_responses();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].parameters["campaign"], "Q4_2024_CUSTOMER_SAT");
}

#[test]
fn at_store_db_08_unreadable_row_does_not_erase_its_siblings() {
    let mut kv = InMemoryKv::new();
    let good = serde_json::to_value(survey("demo-survey-1")).unwrap();
    let mut blank_id = good.clone();
    blank_id["id"] = serde_json::Value::String(String::new());
    kv.set(
        Collection::Surveys.key(),
        &serde_json::to_string(&vec![good, blank_id]).unwrap(),
    )
    .unwrap();
    let mut store = SurveyStore::new(kv);

    let rows = store.load_surveys();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id.as_str(), "demo-survey-1");

    store.upsert_survey_row(survey("survey-b")).unwrap();
    let ids: Vec<String> = store
        .load_surveys()
        .iter()
        .map(|s| s.id.as_str().to_string())
        .collect();
    assert_eq!(ids, vec!["demo-survey-1", "survey-b"]);
}
