#![forbid(unsafe_code)]

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use surveykit_contracts::audit::AuditLog;
use surveykit_contracts::response::SurveyResponse;
use surveykit_contracts::survey::Survey;

use crate::kv::{KeyValueStore, StorageError};
use crate::repo::{AuditLogRepo, SurveyRepo, SurveyResponseRepo};
use tracing::warn;

/// Named JSON collections kept in the key-value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Surveys,
    Responses,
    AuditLogs,
}

impl Collection {
    pub fn key(self) -> &'static str {
        match self {
            Collection::Surveys => "surveys",
            Collection::Responses => "survey_responses",
            Collection::AuditLogs => "audit_logs",
        }
    }
}

/// Survey, response and audit collections over an injected key-value store.
///
/// Reads and writes always move a whole collection. Two stores sharing one backing location
/// race last-writer-wins.
#[derive(Debug, Clone, Default)]
pub struct SurveyStore<K> {
    kv: K,
}

impl<K: KeyValueStore> SurveyStore<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    pub fn kv_mut(&mut self) -> &mut K {
        &mut self.kv
    }

    pub fn into_inner(self) -> K {
        self.kv
    }

    pub fn clear(&mut self, collection: Collection) -> Result<(), StorageError> {
        self.kv.delete(collection.key())
    }

    fn read_collection<T: DeserializeOwned>(
        &self,
        collection: Collection,
    ) -> Result<Vec<T>, StorageError> {
        let key = collection.key();
        let Some(raw) = self.kv.get(key)? else {
            return Ok(Vec::new());
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<Value> =
            serde_json::from_str(&raw).map_err(|source| StorageError::Deserialize {
                key: key.to_string(),
                source,
            })?;
        // One unreadable row must not cost its siblings: the next save rewrites the collection.
        Ok(rows
            .into_iter()
            .enumerate()
            .filter_map(|(index, row)| match serde_json::from_value(row) {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    warn!(collection = key, index, error = %err, "skipping unreadable row");
                    None
                }
            })
            .collect())
    }

    fn write_collection<T: Serialize>(
        &mut self,
        collection: Collection,
        rows: &[T],
    ) -> Result<(), StorageError> {
        let key = collection.key();
        let raw = serde_json::to_string(rows).map_err(|source| StorageError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.kv.set(key, &raw)
    }
}

impl<K: KeyValueStore> SurveyRepo for SurveyStore<K> {
    fn try_load_surveys(&self) -> Result<Vec<Survey>, StorageError> {
        self.read_collection(Collection::Surveys)
    }

    fn try_save_surveys(&mut self, surveys: &[Survey]) -> Result<(), StorageError> {
        self.write_collection(Collection::Surveys, surveys)
    }
}

impl<K: KeyValueStore> SurveyResponseRepo for SurveyStore<K> {
    fn try_load_responses(&self) -> Result<Vec<SurveyResponse>, StorageError> {
        self.read_collection(Collection::Responses)
    }

    fn try_save_responses(&mut self, responses: &[SurveyResponse]) -> Result<(), StorageError> {
        self.write_collection(Collection::Responses, responses)
    }
}

impl<K: KeyValueStore> AuditLogRepo for SurveyStore<K> {
    fn try_load_audit_logs(&self) -> Result<Vec<AuditLog>, StorageError> {
        self.read_collection(Collection::AuditLogs)
    }

    fn try_save_audit_logs(&mut self, logs: &[AuditLog]) -> Result<(), StorageError> {
        self.write_collection(Collection::AuditLogs, logs)
    }
}
