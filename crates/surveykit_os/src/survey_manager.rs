#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::Value;
use surveykit_contracts::audit::{AuditAction, AuditEntityType, AuditLogInput, AuditMetadata};
use surveykit_contracts::survey::{ParameterId, Survey, SurveyId, TrackingParameter};
use surveykit_contracts::{ContractViolation, UserId};
use surveykit_engines::param_codec::ParamCodec;
use surveykit_engines::share_link::{ShareLinkBuilder, ShareLinkConfig, ShareLinkError};
use surveykit_storage::audit::AuditRecorder;
use surveykit_storage::repo::{AuditLogRepo, SurveyRepo};
use surveykit_storage::StorageError;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_ACTING_USER: &str = "current-user";
/// Shown in place of an encoded parameter value.
pub const MASKED_VALUE: &str = "••••••••";

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("survey not found: {0}")]
    SurveyNotFound(SurveyId),
    #[error("parameter {parameter_id} not found in survey {survey_id}")]
    ParameterNotFound {
        survey_id: SurveyId,
        parameter_id: ParameterId,
    },
    #[error("contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    ShareLink(#[from] ShareLinkError),
}

/// Which value an encoded parameter contributes to a share link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevealMode {
    /// Encoded parameters keep their tagged value.
    Tagged,
    /// Every parameter contributes its plaintext.
    #[default]
    Decoded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterPreset {
    pub name: &'static str,
    pub label: &'static str,
    pub example: &'static str,
    pub encrypt: bool,
}

pub const PARAMETER_PRESETS: [ParameterPreset; 4] = [
    ParameterPreset {
        name: "source",
        label: "Source",
        example: "email, social, direct",
        encrypt: true,
    },
    ParameterPreset {
        name: "unique_id",
        label: "Unique ID",
        example: "user_12345, session_abc",
        encrypt: true,
    },
    ParameterPreset {
        name: "expiration_date",
        label: "Expiration Date",
        example: "2024-12-31, 30d",
        encrypt: false,
    },
    ParameterPreset {
        name: "campaign_id",
        label: "Campaign ID",
        example: "Q4_2024_PROMO, HOLIDAY_SALE",
        encrypt: true,
    },
];

pub fn parameter_preset(name: &str) -> Option<&'static ParameterPreset> {
    PARAMETER_PRESETS.iter().find(|p| p.name == name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyManagerConfig {
    pub acting_user: UserId,
    pub share_link: ShareLinkConfig,
}

impl SurveyManagerConfig {
    pub fn mvp_v1(acting_user: UserId) -> Self {
        Self {
            acting_user,
            share_link: ShareLinkConfig::mvp_v1(),
        }
    }
}

/// Operator-side survey workflow: surveys, their tracking parameters, and share artifacts.
///
/// Every mutation is persisted through the injected repository and followed by one audit entry
/// attributed to the configured acting user.
#[derive(Debug, Clone)]
pub struct SurveyManager {
    config: SurveyManagerConfig,
    codec: ParamCodec,
    links: ShareLinkBuilder,
    recorder: AuditRecorder,
}

impl SurveyManager {
    pub fn new(
        config: SurveyManagerConfig,
        codec: ParamCodec,
        recorder: AuditRecorder,
    ) -> Result<Self, ManagerError> {
        let links = ShareLinkBuilder::new(config.share_link.clone())?;
        Ok(Self {
            config,
            codec,
            links,
            recorder,
        })
    }

    pub fn config(&self) -> &SurveyManagerConfig {
        &self.config
    }

    pub fn codec(&self) -> &ParamCodec {
        &self.codec
    }

    pub fn links(&self) -> &ShareLinkBuilder {
        &self.links
    }

    pub fn list_surveys<R: SurveyRepo + ?Sized>(&self, repo: &R) -> Vec<Survey> {
        repo.load_surveys()
    }

    pub fn find_survey<R: SurveyRepo + ?Sized>(
        &self,
        repo: &R,
        survey_id: &SurveyId,
    ) -> Result<Survey, ManagerError> {
        repo.survey_row(survey_id)
            .ok_or_else(|| ManagerError::SurveyNotFound(survey_id.clone()))
    }

    pub fn create_survey<R: SurveyRepo + AuditLogRepo + ?Sized>(
        &self,
        repo: &mut R,
        name: &str,
        description: &str,
    ) -> Result<Survey, ManagerError> {
        let survey = Survey::v1(
            SurveyId::generate(),
            name,
            description,
            self.config.acting_user.clone(),
            Utc::now(),
        )?;
        repo.upsert_survey_row(survey.clone())?;
        info!(survey_id = %survey.id, "survey created");

        self.audit(
            repo,
            AuditAction::Create,
            AuditEntityType::Survey,
            survey.id.as_str(),
            format!("Created survey: {}", survey.name),
            None,
        );
        Ok(survey)
    }

    /// Appends a parameter; with `encrypt` the stored value is the codec-tagged form.
    pub fn add_parameter<R: SurveyRepo + AuditLogRepo + ?Sized>(
        &self,
        repo: &mut R,
        survey_id: &SurveyId,
        name: &str,
        value: &str,
        encrypt: bool,
    ) -> Result<TrackingParameter, ManagerError> {
        if value.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "tracking_parameter.value",
                reason: "must not be empty",
            }
            .into());
        }
        let mut survey = self.find_survey(repo, survey_id)?;
        let now = Utc::now();
        let stored = if encrypt {
            self.codec.encode(value)
        } else {
            value.to_string()
        };
        let parameter = TrackingParameter::v1(ParameterId::generate(), name, stored, encrypt, now)?;
        survey.parameters.push(parameter.clone());
        survey.updated_at = now.max(survey.created_at);
        repo.upsert_survey_row(survey.clone())?;

        let (action, kind) = if encrypt {
            (AuditAction::Encrypt, "encrypted")
        } else {
            (AuditAction::Create, "plain")
        };
        self.audit(
            repo,
            action,
            AuditEntityType::Parameter,
            parameter.id.as_str(),
            format!("Added {kind} parameter: {}", parameter.name),
            Some(survey_metadata(&survey)),
        );
        Ok(parameter)
    }

    pub fn delete_parameter<R: SurveyRepo + AuditLogRepo + ?Sized>(
        &self,
        repo: &mut R,
        survey_id: &SurveyId,
        parameter_id: &ParameterId,
    ) -> Result<TrackingParameter, ManagerError> {
        let mut survey = self.find_survey(repo, survey_id)?;
        let idx = survey
            .parameters
            .iter()
            .position(|p| &p.id == parameter_id)
            .ok_or_else(|| ManagerError::ParameterNotFound {
                survey_id: survey_id.clone(),
                parameter_id: parameter_id.clone(),
            })?;
        let removed = survey.parameters.remove(idx);
        survey.updated_at = Utc::now().max(survey.created_at);
        repo.upsert_survey_row(survey.clone())?;

        self.audit(
            repo,
            AuditAction::Delete,
            AuditEntityType::Parameter,
            removed.id.as_str(),
            format!("Deleted parameter: {}", removed.name),
            Some(survey_metadata(&survey)),
        );
        Ok(removed)
    }

    pub fn set_survey_active<R: SurveyRepo + AuditLogRepo + ?Sized>(
        &self,
        repo: &mut R,
        survey_id: &SurveyId,
        active: bool,
    ) -> Result<Survey, ManagerError> {
        let mut survey = self.find_survey(repo, survey_id)?;
        if survey.is_active == active {
            return Ok(survey);
        }
        survey.is_active = active;
        survey.updated_at = Utc::now().max(survey.created_at);
        repo.upsert_survey_row(survey.clone())?;

        let verb = if active { "Activated" } else { "Deactivated" };
        self.audit(
            repo,
            AuditAction::Update,
            AuditEntityType::Survey,
            survey.id.as_str(),
            format!("{verb} survey: {}", survey.name),
            None,
        );
        Ok(survey)
    }

    /// Value safe to display next to a parameter name.
    pub fn masked_value<'a>(&self, parameter: &'a TrackingParameter) -> &'a str {
        if parameter.is_encrypted {
            MASKED_VALUE
        } else {
            &parameter.value
        }
    }

    /// Query parameters for a share link. Encoded parameters contribute their tagged value
    /// only under [`RevealMode::Tagged`]; plain parameters always contribute their raw value.
    pub fn share_parameters(&self, survey: &Survey, reveal: RevealMode) -> BTreeMap<String, String> {
        survey
            .parameters
            .iter()
            .map(|p| {
                let value = match (reveal, p.is_encrypted) {
                    (RevealMode::Tagged, true) | (_, false) => p.value.clone(),
                    (RevealMode::Decoded, true) => self.codec.decode(&p.value),
                };
                (p.name.clone(), value)
            })
            .collect()
    }

    pub fn share_url(&self, survey: &Survey, reveal: RevealMode) -> String {
        self.links
            .build_url(survey.id.as_str(), self.share_parameters(survey, reveal))
    }

    pub fn embed_code(&self, survey: &Survey, reveal: RevealMode) -> String {
        self.links.build_embed(
            survey.id.as_str(),
            &survey.name,
            self.share_parameters(survey, reveal),
        )
    }

    fn audit<R: AuditLogRepo + ?Sized>(
        &self,
        repo: &mut R,
        action: AuditAction,
        entity_type: AuditEntityType,
        entity_id: &str,
        details: String,
        metadata: Option<AuditMetadata>,
    ) {
        match AuditLogInput::v1(
            action,
            entity_type,
            entity_id,
            self.config.acting_user.clone(),
            details,
            metadata,
        ) {
            Ok(input) => self.recorder.record(repo, input),
            Err(err) => warn!(error = %err, "audit input rejected"),
        }
    }
}

pub(crate) fn survey_metadata(survey: &Survey) -> AuditMetadata {
    AuditMetadata::from([
        ("surveyId".to_string(), Value::String(survey.id.to_string())),
        ("surveyName".to_string(), Value::String(survey.name.clone())),
    ])
}
