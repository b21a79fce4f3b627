#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::{Map, Value};
use surveykit_contracts::audit::{AuditAction, AuditEntityType, AuditLogInput, AuditMetadata};
use surveykit_contracts::response::{ResponseId, SurveyResponse};
use surveykit_contracts::survey::Survey;
use surveykit_contracts::{ContractViolation, UserId};
use surveykit_engines::param_codec::ParamCodec;
use surveykit_engines::share_link::{ShareLinkBuilder, ShareLinkConfig, ShareLinkError};
use surveykit_storage::audit::AuditRecorder;
use surveykit_storage::repo::{AuditLogRepo, SurveyRepo, SurveyResponseRepo};
use surveykit_storage::StorageError;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub const ANONYMOUS_USER: &str = "anonymous-user";
pub const SIMULATED_IP_ADDRESS: &str = "127.0.0.1";

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("not a survey link: {0:?}")]
    InvalidLink(String),
    #[error("survey not found: {0}")]
    SurveyNotFound(String),
    #[error("slug {slug} matches {matches} surveys")]
    AmbiguousSlug { slug: String, matches: usize },
    #[error("contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    ShareLink(#[from] ShareLinkError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyViewerConfig {
    pub respondent: UserId,
    pub default_ip_address: String,
    pub share_link: ShareLinkConfig,
}

impl SurveyViewerConfig {
    pub fn mvp_v1(respondent: UserId) -> Self {
        Self {
            respondent,
            default_ip_address: SIMULATED_IP_ADDRESS.to_string(),
            share_link: ShareLinkConfig::mvp_v1(),
        }
    }
}

/// An opened survey with its link parameters already decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyView {
    pub survey: Survey,
    pub parameters: BTreeMap<String, String>,
}

/// Respondent-side entry point: resolves a shared link, decodes its parameters, and records
/// views and submissions.
#[derive(Debug, Clone)]
pub struct SurveyViewer {
    config: SurveyViewerConfig,
    codec: ParamCodec,
    links: ShareLinkBuilder,
    recorder: AuditRecorder,
    base: Url,
}

impl SurveyViewer {
    pub fn new(
        config: SurveyViewerConfig,
        codec: ParamCodec,
        recorder: AuditRecorder,
    ) -> Result<Self, ViewerError> {
        let links = ShareLinkBuilder::new(config.share_link.clone())?;
        let base = Url::parse(&config.share_link.base_url).map_err(|_| {
            ShareLinkError::InvalidBaseUrl {
                url: config.share_link.base_url.clone(),
                reason: "not an absolute url",
            }
        })?;
        Ok(Self {
            config,
            codec,
            links,
            recorder,
            base,
        })
    }

    pub fn config(&self) -> &SurveyViewerConfig {
        &self.config
    }

    /// Finds the survey a link points at.
    ///
    /// Accepts a canonical share URL (`<base>/<SLUG>?...`), a `/survey/<id>` path or URL, or a
    /// bare survey id. The last path segment is first matched as an exact id, then as a slug.
    pub fn resolve<R: SurveyRepo + ?Sized>(
        &self,
        repo: &R,
        link: &str,
    ) -> Result<(Survey, Url), ViewerError> {
        let url = self.parse_link(link)?;
        let segment = url
            .path_segments()
            .and_then(|mut segs| segs.rfind(|s| !s.is_empty()))
            .map(str::to_string)
            .ok_or_else(|| ViewerError::InvalidLink(link.to_string()))?;

        let surveys = repo.load_surveys();
        if let Some(found) = surveys.iter().find(|s| s.id.as_str() == segment) {
            return Ok((found.clone(), url));
        }

        let slug = segment.to_uppercase();
        let mut matching: Vec<Survey> = surveys
            .into_iter()
            .filter(|s| self.links.slug_for(s.id.as_str()) == slug)
            .collect();
        match matching.len() {
            0 => Err(ViewerError::SurveyNotFound(segment)),
            1 => Ok((matching.remove(0), url)),
            matches => Err(ViewerError::AmbiguousSlug { slug, matches }),
        }
    }

    /// Resolves the link, decodes every query parameter, and records a `view` audit entry.
    pub fn open<R: SurveyRepo + AuditLogRepo + ?Sized>(
        &self,
        repo: &mut R,
        link: &str,
        user_agent: &str,
    ) -> Result<SurveyView, ViewerError> {
        let (survey, url) = self.resolve(repo, link)?;
        let parameters = self.decode_query(&url);
        debug!(survey_id = %survey.id, parameters = parameters.len(), "survey opened");

        let metadata = AuditMetadata::from([
            ("parameters".to_string(), string_map(&parameters)),
            ("userAgent".to_string(), Value::String(user_agent.to_string())),
        ]);
        self.audit(
            repo,
            AuditAction::View,
            AuditEntityType::Survey,
            survey.id.as_str(),
            format!("Survey viewed: {}", survey.name),
            metadata,
        );
        Ok(SurveyView { survey, parameters })
    }

    /// Stores a response carrying the decoded parameters of `view`.
    pub fn submit_response<R: SurveyResponseRepo + AuditLogRepo + ?Sized>(
        &self,
        repo: &mut R,
        view: &SurveyView,
        ip_address: Option<&str>,
        user_agent: &str,
    ) -> Result<SurveyResponse, ViewerError> {
        let response = SurveyResponse::v1(
            ResponseId::generate(),
            view.survey.id.clone(),
            view.parameters.clone(),
            Utc::now(),
            ip_address.unwrap_or(&self.config.default_ip_address),
            user_agent,
        )?;
        repo.append_response_row(response.clone())?;

        let metadata = AuditMetadata::from([
            (
                "surveyId".to_string(),
                Value::String(view.survey.id.to_string()),
            ),
            ("parameters".to_string(), string_map(&view.parameters)),
        ]);
        self.audit(
            repo,
            AuditAction::Create,
            AuditEntityType::Response,
            response.id.as_str(),
            format!("Survey response submitted for: {}", view.survey.name),
            metadata,
        );
        Ok(response)
    }

    fn parse_link(&self, link: &str) -> Result<Url, ViewerError> {
        let link = link.trim();
        if link.is_empty() {
            return Err(ViewerError::InvalidLink(link.to_string()));
        }
        Url::parse(link)
            .or_else(|_| self.base.join(link))
            .map_err(|_| ViewerError::InvalidLink(link.to_string()))
    }

    /// Repeated names keep their last value.
    fn decode_query(&self, url: &Url) -> BTreeMap<String, String> {
        url.query_pairs()
            .map(|(name, value)| (name.into_owned(), self.codec.decode(&value)))
            .collect()
    }

    fn audit<R: AuditLogRepo + ?Sized>(
        &self,
        repo: &mut R,
        action: AuditAction,
        entity_type: AuditEntityType,
        entity_id: &str,
        details: String,
        metadata: AuditMetadata,
    ) {
        match AuditLogInput::v1(
            action,
            entity_type,
            entity_id,
            self.config.respondent.clone(),
            details,
            Some(metadata),
        ) {
            Ok(input) => self.recorder.record(repo, input),
            Err(err) => warn!(error = %err, "audit input rejected"),
        }
    }
}

fn string_map(values: &BTreeMap<String, String>) -> Value {
    Value::Object(
        values
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<Map<String, Value>>(),
    )
}
