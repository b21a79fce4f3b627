#![forbid(unsafe_code)]

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
    DuplicateKey {
        field: &'static str,
        key: String,
    },
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { field, reason } => write!(f, "{field}: {reason}"),
            Self::DuplicateKey { field, key } => write!(f, "{field}: duplicate key {key}"),
        }
    }
}

impl std::error::Error for ContractViolation {}

pub trait Validate {
    fn validate(&self) -> Result<(), ContractViolation>;
}

pub(crate) fn validate_id(
    field: &'static str,
    raw: &str,
    max_len: usize,
) -> Result<(), ContractViolation> {
    if raw.trim().is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be empty",
        });
    }
    if raw.len() > max_len {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "exceeds maximum length",
        });
    }
    if raw.chars().any(char::is_control) {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not contain control characters",
        });
    }
    Ok(())
}

/// Declares a validated string identifier.
///
/// Deserialization goes through `TryFrom<String>` so stored ids are checked the same way as ids
/// built in code.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $field:literal, $max:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Result<Self, $crate::ContractViolation> {
                let v = Self(id.into());
                $crate::Validate::validate(&v)?;
                Ok(v)
            }

            /// Fresh random identifier (UUID v4, hyphenated).
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl $crate::Validate for $name {
            fn validate(&self) -> Result<(), $crate::ContractViolation> {
                $crate::common::validate_id($field, &self.0, $max)
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::ContractViolation;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

pub(crate) use string_id;

string_id!(
    /// Acting user recorded on surveys and audit entries ("current-user", "anonymous-user", ...).
    UserId,
    "user_id",
    128
);
