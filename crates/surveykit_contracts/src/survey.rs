#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::common::{string_id, UserId};
use crate::{ContractViolation, Validate};

string_id!(SurveyId, "survey_id", 128);
string_id!(ParameterId, "parameter_id", 128);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    pub id: SurveyId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: UserId,
    pub is_active: bool,
    #[serde(default)]
    pub parameters: Vec<TrackingParameter>,
}

impl Survey {
    /// New active survey with no parameters.
    pub fn v1(
        id: SurveyId,
        name: impl Into<String>,
        description: impl Into<String>,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<Self, ContractViolation> {
        let s = Self {
            id,
            name: name.into(),
            description: description.into(),
            created_at: now,
            updated_at: now,
            created_by,
            is_active: true,
            parameters: Vec::new(),
        };
        s.validate()?;
        Ok(s)
    }

    pub fn parameter(&self, id: &ParameterId) -> Option<&TrackingParameter> {
        self.parameters.iter().find(|p| &p.id == id)
    }

    pub fn has_encrypted_parameters(&self) -> bool {
        self.parameters.iter().any(|p| p.is_encrypted)
    }

    pub fn encrypted_parameter_count(&self) -> usize {
        self.parameters.iter().filter(|p| p.is_encrypted).count()
    }
}

impl Validate for Survey {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        self.created_by.validate()?;
        if self.name.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "survey.name",
                reason: "must not be empty",
            });
        }
        if self.updated_at < self.created_at {
            return Err(ContractViolation::InvalidValue {
                field: "survey.updated_at",
                reason: "must not precede created_at",
            });
        }
        let mut seen = BTreeSet::new();
        for p in &self.parameters {
            p.validate()?;
            if !seen.insert(p.id.as_str()) {
                return Err(ContractViolation::DuplicateKey {
                    field: "survey.parameters.id",
                    key: p.id.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingParameter {
    pub id: ParameterId,
    pub name: String,
    /// Plaintext, or a codec-tagged string when `is_encrypted` is set.
    #[serde(deserialize_with = "string_or_empty")]
    pub value: String,
    pub is_encrypted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackingParameter {
    pub fn v1(
        id: ParameterId,
        name: impl Into<String>,
        value: impl Into<String>,
        is_encrypted: bool,
        now: DateTime<Utc>,
    ) -> Result<Self, ContractViolation> {
        let p = Self {
            id,
            name: name.into(),
            value: value.into(),
            is_encrypted,
            created_at: now,
            updated_at: now,
        };
        p.validate()?;
        Ok(p)
    }
}

impl Validate for TrackingParameter {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        if self.name.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "tracking_parameter.name",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

// Older stored rows may carry a non-string value; those read back as empty.
fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(match raw {
        serde_json::Value::String(s) => s,
        _ => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap()
    }

    fn survey() -> Survey {
        Survey::v1(
            SurveyId::new("demo-survey-1").unwrap(),
            "Q4 Customer Satisfaction Survey",
            "Quarterly feedback",
            UserId::new("current-user").unwrap(),
            now(),
        )
        .unwrap()
    }

    #[test]
    fn at_survey_01_new_survey_is_active_and_empty() {
        let s = survey();
        assert!(s.is_active);
        assert!(s.parameters.is_empty());
        assert_eq!(s.created_at, s.updated_at);
    }

    #[test]
    fn at_survey_02_duplicate_parameter_ids_are_rejected() {
        let mut s = survey();
        let p = TrackingParameter::v1(
            ParameterId::new("param-1").unwrap(),
            "campaign",
            "Q4",
            false,
            now(),
        )
        .unwrap();
        s.parameters.push(p.clone());
        assert!(s.validate().is_ok());
        s.parameters.push(p);
        assert!(matches!(
            s.validate(),
            Err(ContractViolation::DuplicateKey { .. })
        ));
    }

    #[test]
    fn at_survey_03_json_uses_camel_case_and_rehydrates_timestamps() {
        let raw = r#"{
            "id": "demo-survey-2",
            "name": "Product Feature Feedback",
            "description": "",
            "createdAt": "2024-10-01T12:00:00.000Z",
            "updatedAt": "2024-10-02T12:00:00.000Z",
            "createdBy": "current-user",
            "isActive": true,
            "parameters": [{
                "id": "param-4",
                "name": "user_id",
                "value": 42,
                "isEncrypted": false,
                "createdAt": "2024-10-01T12:00:00.000Z",
                "updatedAt": "2024-10-01T12:00:00.000Z"
            }]
        }"#;
        let s: Survey = serde_json::from_str(raw).unwrap();
        assert_eq!(s.created_at, now());
        assert_eq!(s.parameters[0].value, "");

        let back = serde_json::to_value(&s).unwrap();
        assert!(back.get("isActive").is_some());
        assert!(back["parameters"][0].get("isEncrypted").is_some());
    }

    #[test]
    fn at_survey_04_blank_name_is_rejected() {
        let out = Survey::v1(
            SurveyId::generate(),
            "  ",
            "",
            UserId::new("current-user").unwrap(),
            now(),
        );
        assert!(out.is_err());
    }
}
