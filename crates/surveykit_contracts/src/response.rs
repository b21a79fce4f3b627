#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::string_id;
use crate::survey::SurveyId;
use crate::{ContractViolation, Validate};

string_id!(ResponseId, "response_id", 128);

/// One respondent submission. Parameter values are stored decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponse {
    pub id: ResponseId,
    pub survey_id: SurveyId,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: String,
}

impl SurveyResponse {
    pub fn v1(
        id: ResponseId,
        survey_id: SurveyId,
        parameters: BTreeMap<String, String>,
        timestamp: DateTime<Utc>,
        ip_address: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            id,
            survey_id,
            parameters,
            timestamp,
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for SurveyResponse {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        self.survey_id.validate()?;
        if self.ip_address.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "survey_response.ip_address",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}
