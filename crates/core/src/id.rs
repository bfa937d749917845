//! Strongly-typed transaction identifier.

use core::str::FromStr;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DomainError;

/// Identifier of a transaction, as issued by the server.
///
/// Servers hand out either integer row ids or opaque strings; both are
/// accepted. String ids keep the server's exact text, so `"0005"` still
/// addresses `/api/transactions/0005`.
///
/// Two ids are equal when they name the same path segment: `5` and `"5"`
/// are the same id, `5` and `"05"` are not.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TransactionId {
    Numeric(i64),
    Opaque(String),
}

impl TransactionId {
    /// Path segment used in `/api/transactions/:id`.
    pub fn as_path_segment(&self) -> String {
        self.to_string()
    }

    /// Server-supplied text id, kept verbatim.
    fn opaque(raw: String) -> Result<Self, DomainError> {
        if raw.trim().is_empty() {
            return Err(DomainError::invalid_id("TransactionId: empty"));
        }
        if raw.contains('/') {
            return Err(DomainError::invalid_id(format!(
                "TransactionId: '{raw}' contains a path separator"
            )));
        }
        Ok(Self::Opaque(raw))
    }
}

impl PartialEq for TransactionId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => a == b,
            _ => self.as_path_segment() == other.as_path_segment(),
        }
    }
}

impl Eq for TransactionId {}

impl core::hash::Hash for TransactionId {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.as_path_segment().hash(state);
    }
}

impl core::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Numeric(n) => core::fmt::Display::fmt(n, f),
            Self::Opaque(s) => f.write_str(s),
        }
    }
}

impl From<i64> for TransactionId {
    fn from(value: i64) -> Self {
        Self::Numeric(value)
    }
}

impl FromStr for TransactionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_id("TransactionId: empty"));
        }
        if trimmed.contains('/') {
            return Err(DomainError::invalid_id(format!(
                "TransactionId: '{trimmed}' contains a path separator"
            )));
        }
        // Only the canonical spelling of an integer becomes `Numeric`.
        Ok(match trimmed.parse::<i64>() {
            Ok(n) if n.to_string() == trimmed => Self::Numeric(n),
            _ => Self::Opaque(trimmed.to_string()),
        })
    }
}


impl<'de> Deserialize<'de> for TransactionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Ok(Self::Numeric(n)),
            Raw::Text(s) => Self::opaque(s).map_err(serde::de::Error::custom),
        }
    }
}
