#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{string_id, UserId};
use crate::{ContractViolation, Validate};

string_id!(AuditLogId, "audit_log_id", 128);

/// Free-form structured context attached to an audit entry.
pub type AuditMetadata = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    View,
    Encrypt,
    Decrypt,
}

impl AuditAction {
    pub const ALL: [AuditAction; 6] = [
        AuditAction::Create,
        AuditAction::Update,
        AuditAction::Delete,
        AuditAction::View,
        AuditAction::Encrypt,
        AuditAction::Decrypt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::View => "view",
            AuditAction::Encrypt => "encrypt",
            AuditAction::Decrypt => "decrypt",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = ContractViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or(ContractViolation::InvalidValue {
                field: "audit_log.action",
                reason: "must be one of create, update, delete, view, encrypt, decrypt",
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditEntityType {
    Survey,
    Parameter,
    Response,
}

impl AuditEntityType {
    pub const ALL: [AuditEntityType; 3] = [
        AuditEntityType::Survey,
        AuditEntityType::Parameter,
        AuditEntityType::Response,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AuditEntityType::Survey => "survey",
            AuditEntityType::Parameter => "parameter",
            AuditEntityType::Response => "response",
        }
    }
}

impl fmt::Display for AuditEntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEntityType {
    type Err = ContractViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditEntityType::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or(ContractViolation::InvalidValue {
                field: "audit_log.entity_type",
                reason: "must be one of survey, parameter, response",
            })
    }
}

/// Caller-supplied part of an audit entry; id and timestamp are assigned on record.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditLogInput {
    pub action: AuditAction,
    pub entity_type: AuditEntityType,
    pub entity_id: String,
    pub user_id: UserId,
    pub details: String,
    pub metadata: Option<AuditMetadata>,
}

impl AuditLogInput {
    pub fn v1(
        action: AuditAction,
        entity_type: AuditEntityType,
        entity_id: impl Into<String>,
        user_id: UserId,
        details: impl Into<String>,
        metadata: Option<AuditMetadata>,
    ) -> Result<Self, ContractViolation> {
        let i = Self {
            action,
            entity_type,
            entity_id: entity_id.into(),
            user_id,
            details: details.into(),
            metadata,
        };
        i.validate()?;
        Ok(i)
    }
}

impl Validate for AuditLogInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.entity_id.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "audit_log.entity_id",
                reason: "must not be empty",
            });
        }
        self.user_id.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: AuditLogId,
    pub action: AuditAction,
    pub entity_type: AuditEntityType,
    pub entity_id: String,
    pub user_id: UserId,
    pub timestamp: DateTime<Utc>,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AuditMetadata>,
}

impl AuditLog {
    pub fn from_input_v1(
        id: AuditLogId,
        timestamp: DateTime<Utc>,
        input: AuditLogInput,
    ) -> Result<Self, ContractViolation> {
        input.validate()?;
        Ok(Self {
            id,
            action: input.action,
            entity_type: input.entity_type,
            entity_id: input.entity_id,
            user_id: input.user_id,
            timestamp,
            details: input.details,
            metadata: input.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_audit_contract_01_enums_round_trip_through_strings() {
        for a in AuditAction::ALL {
            assert_eq!(a.as_str().parse::<AuditAction>().unwrap(), a);
        }
        for e in AuditEntityType::ALL {
            assert_eq!(e.as_str().parse::<AuditEntityType>().unwrap(), e);
        }
        assert!("purge".parse::<AuditAction>().is_err());
        assert_eq!(
            serde_json::to_string(&AuditAction::Encrypt).unwrap(),
            "\"encrypt\""
        );
    }

    #[test]
    fn at_audit_contract_02_input_requires_entity_id() {
        let out = AuditLogInput::v1(
            AuditAction::View,
            AuditEntityType::Survey,
            " ",
            UserId::new("anonymous-user").unwrap(),
            "Survey viewed",
            None,
        );
        assert!(out.is_err());
    }

    #[test]
    fn at_audit_contract_03_missing_metadata_is_omitted_from_json() {
        let log = AuditLog::from_input_v1(
            AuditLogId::new("log-1").unwrap(),
            Utc::now(),
            AuditLogInput::v1(
                AuditAction::Create,
                AuditEntityType::Survey,
                "demo-survey-1",
                UserId::new("demo-user").unwrap(),
                "Demo survey created",
                None,
            )
            .unwrap(),
        )
        .unwrap();
        let v = serde_json::to_value(&log).unwrap();
        assert!(v.get("metadata").is_none());
        assert_eq!(v["entityType"], "survey");
    }
}
