#![forbid(unsafe_code)]

use chrono::{DateTime, Duration, Utc};
use surveykit_contracts::audit::{AuditAction, AuditEntityType, AuditLogInput};
use surveykit_contracts::survey::{ParameterId, Survey, SurveyId, TrackingParameter};
use surveykit_contracts::{ContractViolation, UserId};
use surveykit_engines::param_codec::ParamCodec;
use surveykit_storage::audit::AuditRecorder;
use surveykit_storage::repo::{AuditLogRepo, SurveyRepo};
use tracing::info;

use crate::survey_manager::{survey_metadata, DEFAULT_ACTING_USER};

pub const DEMO_USER: &str = "demo-user";

struct DemoParameter {
    id: &'static str,
    name: &'static str,
    value: &'static str,
    encrypt: bool,
    created_days_ago: i64,
}

struct DemoSurvey {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    created_days_ago: i64,
    updated_days_ago: i64,
    parameters: &'static [DemoParameter],
}

const DEMO_SURVEYS: [DemoSurvey; 2] = [
    DemoSurvey {
        id: "demo-survey-1",
        name: "Q4 Customer Satisfaction Survey",
        description: "Quarterly customer feedback collection with campaign tracking",
        created_days_ago: 7,
        updated_days_ago: 2,
        parameters: &[
            DemoParameter {
                id: "param-1",
                name: "campaign",
                value: "Q4_2024_CUSTOMER_SAT",
                encrypt: true,
                created_days_ago: 7,
            },
            DemoParameter {
                id: "param-2",
                name: "source",
                value: "email_newsletter",
                encrypt: true,
                created_days_ago: 7,
            },
            DemoParameter {
                id: "param-3",
                name: "segment",
                value: "enterprise",
                encrypt: false,
                created_days_ago: 5,
            },
        ],
    },
    DemoSurvey {
        id: "demo-survey-2",
        name: "Product Feature Feedback",
        description: "Collect feedback on new product features",
        created_days_ago: 3,
        updated_days_ago: 1,
        parameters: &[
            DemoParameter {
                id: "param-4",
                name: "user_id",
                value: "user_12345",
                encrypt: true,
                created_days_ago: 3,
            },
            DemoParameter {
                id: "param-5",
                name: "feature",
                value: "new_dashboard",
                encrypt: true,
                created_days_ago: 3,
            },
        ],
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemoSeedOutcome {
    Seeded { surveys: usize, audit_entries: usize },
    SkippedNotEmpty { existing: usize },
}

/// Populates an empty survey collection with the two demo surveys and their audit trail.
pub fn seed_demo_data<R: SurveyRepo + AuditLogRepo + ?Sized>(
    repo: &mut R,
    codec: &ParamCodec,
    recorder: &AuditRecorder,
) -> Result<DemoSeedOutcome, ContractViolation> {
    seed_demo_data_at(repo, codec, recorder, Utc::now())
}

pub fn seed_demo_data_at<R: SurveyRepo + AuditLogRepo + ?Sized>(
    repo: &mut R,
    codec: &ParamCodec,
    recorder: &AuditRecorder,
    now: DateTime<Utc>,
) -> Result<DemoSeedOutcome, ContractViolation> {
    let existing = repo.load_surveys().len();
    if existing > 0 {
        return Ok(DemoSeedOutcome::SkippedNotEmpty { existing });
    }

    let owner = UserId::new(DEFAULT_ACTING_USER)?;
    let surveys = DEMO_SURVEYS
        .iter()
        .map(|demo| demo_survey(demo, &owner, codec, now))
        .collect::<Result<Vec<_>, _>>()?;
    repo.save_surveys(&surveys);

    let seeder = UserId::new(DEMO_USER)?;
    let mut audit_entries = 0;
    for survey in &surveys {
        recorder.record(
            repo,
            AuditLogInput::v1(
                AuditAction::Create,
                AuditEntityType::Survey,
                survey.id.as_str(),
                seeder.clone(),
                format!("Demo survey created: {}", survey.name),
                None,
            )?,
        );
        audit_entries += 1;

        for p in &survey.parameters {
            let (action, kind) = if p.is_encrypted {
                (AuditAction::Encrypt, "Encrypted")
            } else {
                (AuditAction::Create, "Plain")
            };
            recorder.record(
                repo,
                AuditLogInput::v1(
                    action,
                    AuditEntityType::Parameter,
                    p.id.as_str(),
                    seeder.clone(),
                    format!("{kind} parameter added: {}", p.name),
                    Some(survey_metadata(survey)),
                )?,
            );
            audit_entries += 1;
        }
    }

    info!(surveys = surveys.len(), audit_entries, "demo data seeded");
    Ok(DemoSeedOutcome::Seeded {
        surveys: surveys.len(),
        audit_entries,
    })
}

fn demo_survey(
    demo: &DemoSurvey,
    owner: &UserId,
    codec: &ParamCodec,
    now: DateTime<Utc>,
) -> Result<Survey, ContractViolation> {
    let mut survey = Survey::v1(
        SurveyId::new(demo.id)?,
        demo.name,
        demo.description,
        owner.clone(),
        now - Duration::days(demo.created_days_ago),
    )?;
    survey.updated_at = now - Duration::days(demo.updated_days_ago);
    for p in demo.parameters {
        let value = if p.encrypt {
            codec.encode(p.value)
        } else {
            p.value.to_string()
        };
        survey.parameters.push(TrackingParameter::v1(
            ParameterId::new(p.id)?,
            p.name,
            value,
            p.encrypt,
            now - Duration::days(p.created_days_ago),
        )?);
    }
    Ok(survey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use surveykit_storage::{InMemoryKv, SurveyStore};

    #[test]
    fn at_demo_01_seeds_empty_store_once() {
        let mut store = SurveyStore::new(InMemoryKv::new());
        let codec = ParamCodec::default();
        let recorder = AuditRecorder::default();

        let first = seed_demo_data(&mut store, &codec, &recorder).unwrap();
        assert_eq!(
            first,
            DemoSeedOutcome::Seeded {
                surveys: 2,
                audit_entries: 7
            }
        );
        let second = seed_demo_data(&mut store, &codec, &recorder).unwrap();
        assert_eq!(second, DemoSeedOutcome::SkippedNotEmpty { existing: 2 });
        assert_eq!(store.load_audit_logs().len(), 7);
    }

    #[test]
    fn at_demo_02_demo_values_decode_and_audit_order_is_newest_first() {
        let mut store = SurveyStore::new(InMemoryKv::new());
        let codec = ParamCodec::default();
        seed_demo_data(&mut store, &codec, &AuditRecorder::default()).unwrap();

        let s1 = store
            .survey_row(&SurveyId::new("demo-survey-1").unwrap())
            .unwrap();
        assert_eq!(s1.name, "Q4 Customer Satisfaction Survey");
        assert_eq!(s1.encrypted_parameter_count(), 2);
        assert_eq!(codec.decode(&s1.parameters[0].value), "Q4_2024_CUSTOMER_SAT");
        assert_eq!(s1.parameters[2].value, "enterprise");
        assert!(s1.updated_at > s1.created_at);

        let logs = store.load_audit_logs();
        assert_eq!(logs[0].details, "Encrypted parameter added: feature");
        assert_eq!(logs[6].details, "Demo survey created: Q4 Customer Satisfaction Survey");
        assert!(logs.iter().all(|l| l.user_id.as_str() == DEMO_USER));
        assert!(logs
            .iter()
            .any(|l| l.details == "Plain parameter added: segment"
                && l.action == AuditAction::Create));
    }
}
