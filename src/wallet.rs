//! Per-party spendable balances, separate from the ledger's bookkeeping
use chrono::Utc;

use crate::error::DispatchError;
use crate::money::Amount;
use crate::request::TimeStamp;
use crate::utils;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletRole {
    #[n(0)]
    Rider,
    #[n(1)]
    Commissioner,
    #[n(2)]
    Boss,
}

impl WalletRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rider => "rider",
            Self::Commissioner => "commissioner",
            Self::Boss => "boss",
        }
    }
}

/// One wallet per (role, owner). The boss wallet is a singleton addressed by
/// role alone, so its owner is None.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Wallet {
    #[n(0)]
    pub role: WalletRole,
    #[n(1)]
    pub owner: Option<String>,
    #[n(2)]
    pub balance: Amount,
    #[n(3)]
    pub created_at: TimeStamp<Utc>,
    #[n(4)]
    pub updated_at: TimeStamp<Utc>,
}

impl Wallet {
    pub fn new(role: WalletRole, owner: Option<String>) -> Self {
        let now = TimeStamp::new();
        Self {
            role,
            owner,
            balance: Amount::ZERO,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Increase the balance. The caller persists the matching audit row.
    pub fn credit(&mut self, amount: Amount) {
        self.balance += amount;
        self.updated_at = TimeStamp::new();
    }

    /// Decrease the balance. Withdrawals are driven by collaborators, not by
    /// settlement, but share the audit trail.
    pub fn debit(&mut self, amount: Amount) {
        self.balance = self.balance - amount;
        self.updated_at = TimeStamp::new();
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletTxKind {
    #[n(0)]
    Credit,
    #[n(1)]
    Debit,
}

/// Immutable audit row written alongside every balance mutation.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct WalletTransaction {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub role: WalletRole,
    #[n(2)]
    pub owner: Option<String>,
    #[n(3)]
    pub kind: WalletTxKind,
    #[n(4)]
    pub amount: Amount,
    #[n(5)]
    pub note: String,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
}

impl WalletTransaction {
    pub fn new(
        role: WalletRole,
        owner: Option<&str>,
        kind: WalletTxKind,
        amount: Amount,
        note: &str,
    ) -> Result<Self, DispatchError> {
        let id =
            utils::new_uuid_to_bech32("wtx").map_err(|e| DispatchError::Internal(e.to_string()))?;

        Ok(Self {
            id,
            role,
            owner: owner.map(str::to_string),
            kind,
            amount,
            note: note.to_string(),
            created_at: TimeStamp::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_encoding() {
        let mut original = Wallet::new(WalletRole::Rider, Some("user_r".into()));
        original.credit(Amount::new(900_00, 2));

        let encoding = minicbor::to_vec(&original).unwrap();
        let decode: Wallet = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn credit_and_debit_move_the_balance() {
        let mut wallet = Wallet::new(WalletRole::Boss, None);

        wallet.credit(Amount::new(70_00, 2));
        wallet.credit(Amount::new(100_00, 2));
        assert_eq!(wallet.balance, Amount::new(170_00, 2));

        wallet.debit(Amount::new(50_00, 2));
        assert_eq!(wallet.balance, Amount::new(120_00, 2));
    }
}
