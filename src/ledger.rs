//! Running-total ledger per rider/commissioner/boss triple
use chrono::Utc;

use crate::error::DispatchError;
use crate::money::{Amount, Split};
use crate::request::TimeStamp;
use crate::utils;

/// One ledger row exists per distinct party triple, get-or-create.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct LedgerKey {
    #[n(0)]
    pub rider: String,
    #[n(1)]
    pub commissioner: Option<String>,
    #[n(2)]
    pub boss: String,
}

impl LedgerKey {
    pub fn new(rider: &str, commissioner: Option<&str>, boss: &str) -> Self {
        Self {
            rider: rider.to_string(),
            commissioner: commissioner.map(str::to_string),
            boss: boss.to_string(),
        }
    }

    /// Storage key suffix. Party ids are bech32 and never contain `|`.
    pub fn storage_suffix(&self) -> String {
        format!(
            "{}|{}|{}",
            self.rider,
            self.commissioner.as_deref().unwrap_or("-"),
            self.boss
        )
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Ledger {
    #[n(0)]
    pub key: LedgerKey,
    #[n(1)]
    pub rider_total: Amount,
    #[n(2)]
    pub commissioner_total: Amount,
    #[n(3)]
    pub boss_total: Amount,
    #[n(4)]
    pub created_at: TimeStamp<Utc>,
    #[n(5)]
    pub updated_at: TimeStamp<Utc>,
}

impl Ledger {
    pub fn new(key: LedgerKey) -> Self {
        let now = TimeStamp::new();
        Self {
            key,
            rider_total: Amount::ZERO,
            commissioner_total: Amount::ZERO,
            boss_total: Amount::ZERO,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn apply(&mut self, split: &Split) {
        self.rider_total += split.rider;
        self.commissioner_total += split.commissioner;
        self.boss_total += split.boss;
        self.updated_at = TimeStamp::new();
    }
}

/// Immutable record of one settlement event. Never updated or deleted; ids
/// are time-ordered so a prefix scan reads history chronologically.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub ledger: LedgerKey,
    #[n(2)]
    pub request_id: Option<String>,
    #[n(3)]
    pub rider_amount: Amount,
    #[n(4)]
    pub commissioner_amount: Amount,
    #[n(5)]
    pub boss_amount: Amount,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
}

impl LedgerEntry {
    pub fn new(
        ledger: LedgerKey,
        request_id: Option<&str>,
        split: &Split,
    ) -> Result<Self, DispatchError> {
        let id = utils::new_uuid_to_bech32("hist")
            .map_err(|e| DispatchError::Internal(e.to_string()))?;

        Ok(Self {
            id,
            ledger,
            request_id: request_id.map(str::to_string),
            rider_amount: split.rider,
            commissioner_amount: split.commissioner,
            boss_amount: split.boss,
            created_at: TimeStamp::new(),
        })
    }
}

/// A ledger row together with its settlement history.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerView {
    pub ledger: Ledger,
    pub history: Vec<LedgerEntry>,
}
