//! Transaction records as owned by the server, plus the client-side draft.

use core::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::TransactionId;

/// Direction of money flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Expense,
    Income,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Expense => "expense",
            TransactionKind::Income => "income",
        }
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expense" => Ok(TransactionKind::Expense),
            "income" => Ok(TransactionKind::Income),
            other => Err(DomainError::UnknownKind(other.to_string())),
        }
    }
}

/// A transaction the server has accepted.
///
/// The client never constructs these itself; they only arrive through a
/// ledger fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub category: String,
    pub amount: Decimal,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub date: DateTime<Utc>,
}

impl Transaction {
    /// Amount rendered with exactly two decimal places (`12.5` → `12.50`).
    pub fn display_amount(&self) -> String {
        format_amount(self.amount)
    }

    /// Amount with its sign applied (expenses negative).
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionKind::Expense => -self.amount,
            TransactionKind::Income => self.amount,
        }
    }
}

/// Format a decimal amount with exactly two fractional digits.
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp(2);
    rounded.rescale(2);
    rounded.to_string()
}

/// Fields submitted when creating (`POST /api/transactions`) or replacing
/// (`PUT /api/transactions/:id`) a transaction.
///
/// The id is assigned by the server. Without a date the server stamps the
/// current time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionDraft {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub category: String,
    pub amount: Decimal,
    pub note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl TransactionDraft {
    /// Build a validated draft.
    ///
    /// The category is trimmed and must not be blank; the amount must not be
    /// negative. The note is sent verbatim (an empty note is allowed).
    pub fn new(
        kind: TransactionKind,
        category: impl Into<String>,
        amount: Decimal,
        note: impl Into<String>,
    ) -> DomainResult<Self> {
        let draft = Self {
            kind,
            category: category.into().trim().to_string(),
            amount,
            note: note.into(),
            date: None,
        };
        draft.validate()?;
        Ok(draft)
    }

    /// Parse the amount from user text (e.g. `"12.50"`) and build a draft.
    pub fn parse(
        kind: TransactionKind,
        category: impl Into<String>,
        amount: &str,
        note: impl Into<String>,
    ) -> DomainResult<Self> {
        let amount = Decimal::from_str(amount.trim())
            .map_err(|e| DomainError::validation(format!("amount '{amount}': {e}")))?;
        Self::new(kind, category, amount, note)
    }

    /// Pin the transaction to `date` instead of the server's clock.
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.category.trim().is_empty() {
            return Err(DomainError::validation("category must not be empty"));
        }
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(DomainError::validation("amount must not be negative"));
        }
        Ok(())
    }
}

/// Lenient timestamp parsing for server-supplied dates.
///
/// Accepts RFC 3339, RFC 2822 (`Mon, 01 Jan 2024 10:00:00 GMT`), naive ISO
/// date-times, bare dates, and integer unix seconds. Naive values are UTC.
pub mod timestamp {
    use super::*;
    use serde::Deserializer;

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Some(naive.and_utc());
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Seconds(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {secs}"))),
            Raw::Text(text) => parse(&text)
                .ok_or_else(|| serde::de::Error::custom(format!("unrecognized date: {text}"))),
        }
    }
}
