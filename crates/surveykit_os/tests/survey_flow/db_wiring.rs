#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use surveykit_contracts::audit::{AuditAction, AuditEntityType};
use surveykit_contracts::survey::SurveyId;
use surveykit_contracts::UserId;
use surveykit_engines::analytics::{AnalyticsConfig, AnalyticsEngine, AnalyticsQuery};
use surveykit_engines::audit_query::AuditLogFilter;
use surveykit_engines::param_codec::ParamCodec;
use surveykit_os::demo_seed::{seed_demo_data, DEMO_USER};
use surveykit_os::survey_manager::DEFAULT_ACTING_USER;
use surveykit_os::survey_viewer::ANONYMOUS_USER;
use surveykit_os::{RevealMode, SurveyManager, SurveyManagerConfig, SurveyViewer, SurveyViewerConfig};
use surveykit_storage::audit::AuditRecorder;
use surveykit_storage::repo::{AuditLogRepo, SurveyRepo, SurveyResponseRepo};
use surveykit_storage::{FileKv, InMemoryKv, SurveyStore};

fn temp_dir(name: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(1);
    std::env::temp_dir().join(format!("surveykit-flow-test-{name}-{suffix}"))
}

fn manager() -> SurveyManager {
    SurveyManager::new(
        SurveyManagerConfig::mvp_v1(UserId::new(DEFAULT_ACTING_USER).unwrap()),
        ParamCodec::default(),
        AuditRecorder::default(),
    )
    .unwrap()
}

fn viewer() -> SurveyViewer {
    SurveyViewer::new(
        SurveyViewerConfig::mvp_v1(UserId::new(ANONYMOUS_USER).unwrap()),
        ParamCodec::default(),
        AuditRecorder::default(),
    )
    .unwrap()
}

#[test]
fn at_flow_db_01_reveal_mode_controls_the_encoded_parameter_only() {
    let mut store = SurveyStore::new(InMemoryKv::new());
    let m = manager();
    let s = m.create_survey(&mut store, "Reveal", "").unwrap();
    let campaign = m
        .add_parameter(&mut store, &s.id, "campaign", "Q4", true)
        .unwrap();
    m.add_parameter(&mut store, &s.id, "segment", "enterprise", false)
        .unwrap();
    let s = m.find_survey(&store, &s.id).unwrap();

    let tagged = m.share_url(&s, RevealMode::Tagged);
    assert!(tagged.contains(&format!("campaign={}", campaign.value)));
    assert!(tagged.contains("segment=enterprise"));

    let decoded = m.share_url(&s, RevealMode::Decoded);
    assert!(decoded.contains("campaign=Q4"));
    assert!(decoded.contains("segment=enterprise"));
    assert!(!decoded.contains("enc_"));
}

#[test]
fn at_flow_db_02_share_open_submit_round_trip_on_disk() {
    let dir = temp_dir("round-trip");
    let m = manager();
    let v = viewer();

    let survey_id = {
        let mut store = SurveyStore::new(FileKv::new(&dir));
        let s = m.create_survey(&mut store, "Checkout NPS", "").unwrap();
        m.add_parameter(&mut store, &s.id, "campaign", "Q4_2024", true)
            .unwrap();
        s.id
    };

    let mut store = SurveyStore::new(FileKv::new(&dir));
    let survey = m.find_survey(&store, &survey_id).unwrap();
    let link = m.share_url(&survey, RevealMode::Tagged);

    let view = v.open(&mut store, &link, "integration-agent").unwrap();
    assert_eq!(view.survey.id, survey_id);
    assert_eq!(view.parameters["campaign"], "Q4_2024");

    let response = v
        .submit_response(&mut store, &view, Some("10.1.2.3"), "integration-agent")
        .unwrap();
    assert_eq!(store.responses_for_survey(&survey_id), vec![response]);

    let logs = store.load_audit_logs();
    let actions: Vec<AuditAction> = logs.iter().map(|l| l.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::Create,
            AuditAction::View,
            AuditAction::Encrypt,
            AuditAction::Create
        ]
    );
    let responses_only = AuditLogFilter::all().with_entity_type(AuditEntityType::Response);
    assert_eq!(responses_only.apply(&logs).len(), 1);

    let report = AnalyticsEngine::new(AnalyticsConfig::mvp_v1(), ParamCodec::default()).compute(
        &store.load_surveys(),
        &store.load_responses(),
        &AnalyticsQuery::default(),
        Utc::now(),
    );
    assert_eq!(report.stats.total_responses, 1);
    assert_eq!(report.stats.unique_visitors, 1);
    assert_eq!(report.parameters[0].top_values[0].value, "Q4_2024");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn at_flow_db_03_demo_seed_feeds_the_viewer() {
    let mut store = SurveyStore::new(InMemoryKv::new());
    let codec = ParamCodec::default();
    seed_demo_data(&mut store, &codec, &AuditRecorder::default()).unwrap();

    let demo = store
        .survey_row(&SurveyId::new("demo-survey-1").unwrap())
        .unwrap();
    let link = manager().share_url(&demo, RevealMode::Tagged);
    assert!(link.starts_with("https://www.surveysgalore.com/DEMO-S?"));

    // Both demo surveys share the slug DEMO-S, so only id-based links resolve.
    assert!(viewer().open(&mut store, &link, "agent").is_err());

    let view = viewer()
        .open(&mut store, "/survey/demo-survey-1?source=enc_bm90LXZhbGlk", "agent")
        .unwrap();
    assert_eq!(view.parameters["source"], "enc_bm90LXZhbGlk");

    let by_demo = AuditLogFilter::all().with_search(DEMO_USER);
    assert_eq!(by_demo.apply(&store.load_audit_logs()).len(), 7);
}
