#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use chrono::Utc;

use surveykit_contracts::audit::{AuditAction, AuditEntityType, AuditLogInput};
use surveykit_contracts::UserId;
use surveykit_storage::audit::{AuditRecorder, AUDIT_LOG_RETENTION};
use surveykit_storage::repo::AuditLogRepo;
use surveykit_storage::{Collection, InMemoryKv, KeyValueStore, SurveyStore};

fn input(n: usize) -> AuditLogInput {
    AuditLogInput::v1(
        AuditAction::Encrypt,
        AuditEntityType::Parameter,
        format!("param-{n}"),
        UserId::new("current-user").unwrap(),
        format!("event {n}"),
        Some(BTreeMap::from([(
            "surveyId".to_string(),
            serde_json::Value::String("demo-survey-1".to_string()),
        )])),
    )
    .unwrap()
}

#[test]
fn at_audit_db_01_log_is_capped_and_newest_first() {
    let mut store = SurveyStore::new(InMemoryKv::new());
    let recorder = AuditRecorder::default();
    for n in 1..1005 {
        recorder.record(&mut store, input(n));
    }
    let last = recorder
        .record_at(&mut store, input(1005), Utc::now())
        .unwrap();

    let logs = store.load_audit_logs();
    assert_eq!(logs.len(), AUDIT_LOG_RETENTION);
    assert_eq!(logs[0].id, last);
    assert_eq!(logs[0].details, "event 1005");
    assert_eq!(logs[0].entity_id, "param-1005");
    assert_eq!(logs[AUDIT_LOG_RETENTION - 1].details, "event 6");
}

#[test]
fn at_audit_db_02_length_is_min_of_records_and_cap() {
    let mut store = SurveyStore::new(InMemoryKv::new());
    let recorder = AuditRecorder::default();
    for n in 1..=17 {
        recorder.record(&mut store, input(n));
        let logs = recorder.list(&store);
        assert_eq!(logs.len(), n);
        assert_eq!(logs[0].details, format!("event {n}"));
    }
}

#[test]
fn at_audit_db_03_metadata_survives_persistence() {
    let mut store = SurveyStore::new(InMemoryKv::new());
    AuditRecorder::default().record(&mut store, input(1));
    let raw = store
        .kv()
        .get(Collection::AuditLogs.key())
        .unwrap()
        .unwrap();
    assert!(raw.contains("\"entityType\":\"parameter\""));
    let logs = store.load_audit_logs();
    let meta = logs[0].metadata.as_ref().unwrap();
    assert_eq!(meta["surveyId"], "demo-survey-1");
}

#[test]
fn at_audit_db_04_malformed_log_is_replaced_by_fresh_entry() {
    let mut kv = InMemoryKv::new();
    kv.set(Collection::AuditLogs.key(), "not json at all").unwrap();
    let mut store = SurveyStore::new(kv);
    AuditRecorder::default().record(&mut store, input(1));
    let logs = store.load_audit_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, AuditAction::Encrypt);
}
