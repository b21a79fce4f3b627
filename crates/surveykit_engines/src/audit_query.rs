#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use surveykit_contracts::audit::{AuditAction, AuditEntityType, AuditLog};

/// In-memory audit log filter. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditLogFilter {
    pub action: Option<AuditAction>,
    pub entity_type: Option<AuditEntityType>,
    pub search_term: Option<String>,
}

impl AuditLogFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_entity_type(mut self, entity_type: AuditEntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search_term = Some(term.into());
        self
    }

    /// Search is a case-insensitive substring match on details, entity id and user id.
    pub fn matches(&self, log: &AuditLog) -> bool {
        if self.action.is_some_and(|a| a != log.action) {
            return false;
        }
        if self.entity_type.is_some_and(|e| e != log.entity_type) {
            return false;
        }
        match self.search_term.as_deref() {
            None | Some("") => true,
            Some(term) => {
                let needle = term.to_lowercase();
                [
                    log.details.as_str(),
                    log.entity_id.as_str(),
                    log.user_id.as_str(),
                ]
                .iter()
                .any(|hay| hay.to_lowercase().contains(&needle))
            }
        }
    }

    /// Matching entries in their stored (newest-first) order.
    pub fn apply<'a>(&self, logs: &'a [AuditLog]) -> Vec<&'a AuditLog> {
        logs.iter().filter(|l| self.matches(l)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditSummary {
    pub total: usize,
    pub encrypt_events: usize,
    pub unique_users: usize,
    pub last_24h: usize,
}

impl AuditSummary {
    pub fn compute(logs: &[AuditLog], now: DateTime<Utc>) -> Self {
        let cutoff = now - Duration::hours(24);
        Self {
            total: logs.len(),
            encrypt_events: logs
                .iter()
                .filter(|l| l.action == AuditAction::Encrypt)
                .count(),
            unique_users: logs
                .iter()
                .map(|l| l.user_id.as_str())
                .collect::<BTreeSet<_>>()
                .len(),
            last_24h: logs.iter().filter(|l| l.timestamp > cutoff).count(),
        }
    }
}
