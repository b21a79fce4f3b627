#![forbid(unsafe_code)]

pub mod audit;
pub mod common;
pub mod response;
pub mod survey;

pub use common::{ContractViolation, UserId, Validate};
