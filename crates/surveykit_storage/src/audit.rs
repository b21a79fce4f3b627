#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use surveykit_contracts::audit::{AuditLog, AuditLogId, AuditLogInput};
use tracing::{debug, warn};

use crate::repo::AuditLogRepo;

/// Number of audit entries kept; older entries are dropped first.
pub const AUDIT_LOG_RETENTION: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditRecorderConfig {
    pub max_entries: usize,
}

impl AuditRecorderConfig {
    pub fn mvp_v1() -> Self {
        Self {
            max_entries: AUDIT_LOG_RETENTION,
        }
    }
}

/// Append-only writer into the audit collection.
///
/// Recording never fails from the caller's point of view: a rejected entry or a failed write is
/// traced and dropped so that auditing cannot block the survey workflow.
#[derive(Debug, Clone)]
pub struct AuditRecorder {
    config: AuditRecorderConfig,
}

impl Default for AuditRecorder {
    fn default() -> Self {
        Self::new(AuditRecorderConfig::mvp_v1())
    }
}

impl AuditRecorder {
    pub fn new(config: AuditRecorderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> AuditRecorderConfig {
        self.config
    }

    pub fn record<R: AuditLogRepo + ?Sized>(&self, repo: &mut R, input: AuditLogInput) {
        let _ = self.record_at(repo, input, Utc::now());
    }

    /// Id of the stored entry, or `None` when the entry was rejected or its write dropped.
    pub fn record_at<R: AuditLogRepo + ?Sized>(
        &self,
        repo: &mut R,
        input: AuditLogInput,
        now: DateTime<Utc>,
    ) -> Option<AuditLogId> {
        let entry = match AuditLog::from_input_v1(AuditLogId::generate(), now, input) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "audit entry rejected");
                return None;
            }
        };
        debug!(
            action = %entry.action,
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            "audit entry recorded"
        );

        let id = entry.id.clone();
        let mut logs = repo.load_audit_logs();
        logs.insert(0, entry);
        logs.truncate(self.config.max_entries);
        match repo.try_save_audit_logs(&logs) {
            Ok(()) => Some(id),
            Err(err) => {
                warn!(error = %err, "audit entry dropped");
                None
            }
        }
    }

    /// Stored entries, newest first.
    pub fn list<R: AuditLogRepo + ?Sized>(&self, repo: &R) -> Vec<AuditLog> {
        repo.load_audit_logs()
    }
}
