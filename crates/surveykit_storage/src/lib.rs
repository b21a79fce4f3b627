#![forbid(unsafe_code)]

pub mod audit;
pub mod kv;
pub mod repo;
pub mod store;

pub use kv::{FileKv, InMemoryKv, KeyValueStore, StorageError};
pub use store::{Collection, SurveyStore};
