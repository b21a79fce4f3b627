#![forbid(unsafe_code)]

pub mod analytics;
pub mod audit_query;
pub mod param_codec;
pub mod share_link;
