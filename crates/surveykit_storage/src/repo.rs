#![forbid(unsafe_code)]

use surveykit_contracts::audit::AuditLog;
use surveykit_contracts::response::SurveyResponse;
use surveykit_contracts::survey::{Survey, SurveyId};
use surveykit_contracts::Validate;
use tracing::warn;

use crate::kv::StorageError;
use crate::store::Collection;

/// Logs a failed collection read and substitutes an empty collection.
pub(crate) fn absorb_read<T>(
    collection: Collection,
    res: Result<Vec<T>, StorageError>,
) -> Vec<T> {
    res.unwrap_or_else(|err| {
        warn!(
            collection = collection.key(),
            error = %err,
            "collection read failed; using empty collection"
        );
        Vec::new()
    })
}

/// Logs and drops a failed collection write.
pub(crate) fn absorb_write(collection: Collection, res: Result<(), StorageError>) {
    if let Err(err) = res {
        warn!(collection = collection.key(), error = %err, "collection write dropped");
    }
}

/// Typed repository interface for the survey collection.
pub trait SurveyRepo {
    fn try_load_surveys(&self) -> Result<Vec<Survey>, StorageError>;
    fn try_save_surveys(&mut self, surveys: &[Survey]) -> Result<(), StorageError>;

    fn load_surveys(&self) -> Vec<Survey> {
        absorb_read(Collection::Surveys, self.try_load_surveys())
    }

    fn save_surveys(&mut self, surveys: &[Survey]) {
        absorb_write(Collection::Surveys, self.try_save_surveys(surveys));
    }

    fn survey_row(&self, survey_id: &SurveyId) -> Option<Survey> {
        self.load_surveys().into_iter().find(|s| &s.id == survey_id)
    }

    /// Replaces the survey with the same id, or appends it. Write failures are dropped.
    fn upsert_survey_row(&mut self, survey: Survey) -> Result<(), StorageError> {
        survey.validate()?;
        let mut surveys = self.load_surveys();
        match surveys.iter_mut().find(|s| s.id == survey.id) {
            Some(slot) => *slot = survey,
            None => surveys.push(survey),
        }
        self.save_surveys(&surveys);
        Ok(())
    }
}

/// Typed repository interface for the response collection.
pub trait SurveyResponseRepo {
    fn try_load_responses(&self) -> Result<Vec<SurveyResponse>, StorageError>;
    fn try_save_responses(&mut self, responses: &[SurveyResponse]) -> Result<(), StorageError>;

    fn load_responses(&self) -> Vec<SurveyResponse> {
        absorb_read(Collection::Responses, self.try_load_responses())
    }

    fn save_responses(&mut self, responses: &[SurveyResponse]) {
        absorb_write(Collection::Responses, self.try_save_responses(responses));
    }

    /// Appends in submission order. Write failures are dropped.
    fn append_response_row(&mut self, response: SurveyResponse) -> Result<(), StorageError> {
        response.validate()?;
        let mut responses = self.load_responses();
        responses.push(response);
        self.save_responses(&responses);
        Ok(())
    }

    fn responses_for_survey(&self, survey_id: &SurveyId) -> Vec<SurveyResponse> {
        self.load_responses()
            .into_iter()
            .filter(|r| &r.survey_id == survey_id)
            .collect()
    }
}

/// Typed repository interface for append-only audit persistence. Rows are kept newest-first.
pub trait AuditLogRepo {
    fn try_load_audit_logs(&self) -> Result<Vec<AuditLog>, StorageError>;
    fn try_save_audit_logs(&mut self, logs: &[AuditLog]) -> Result<(), StorageError>;

    fn load_audit_logs(&self) -> Vec<AuditLog> {
        absorb_read(Collection::AuditLogs, self.try_load_audit_logs())
    }

    fn save_audit_logs(&mut self, logs: &[AuditLog]) {
        absorb_write(Collection::AuditLogs, self.try_save_audit_logs(logs));
    }
}
