//! sled-backed repository. One keyspace, prefix-typed keys, CBOR values.
use std::sync::Arc;

use sled::Db;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};

use crate::assignment::Assignment;
use crate::error::DispatchError;
use crate::ledger::{Ledger, LedgerEntry, LedgerKey};
use crate::request::Request;
use crate::rider::Rider;
use crate::wallet::{Wallet, WalletRole, WalletTransaction};

pub(crate) mod keys {
    use crate::ledger::LedgerKey;
    use crate::wallet::WalletRole;

    pub const REQUEST_PREFIX: &str = "request/";

    pub fn request(id: &str) -> Vec<u8> {
        [REQUEST_PREFIX, id].concat().into_bytes()
    }

    pub fn rider(id: &str) -> Vec<u8> {
        ["rider/", id].concat().into_bytes()
    }

    pub fn assignment(id: &str) -> Vec<u8> {
        ["assignment/", id].concat().into_bytes()
    }

    // Presence of this marker is the "one open assignment per rider"
    // constraint; the value is the open assignment's id.
    pub fn open_assignment(rider_id: &str) -> Vec<u8> {
        ["open/", rider_id].concat().into_bytes()
    }

    pub fn request_assignments(request_id: &str) -> Vec<u8> {
        ["request_asg/", request_id].concat().into_bytes()
    }

    pub fn ledger(key: &LedgerKey) -> Vec<u8> {
        ["ledger/", &key.storage_suffix()].concat().into_bytes()
    }

    pub fn ledger_entry(key: &LedgerKey, entry_id: &str) -> Vec<u8> {
        ["ledger_hist/", &key.storage_suffix(), "/", entry_id]
            .concat()
            .into_bytes()
    }

    pub fn ledger_entry_prefix(key: &LedgerKey) -> Vec<u8> {
        ["ledger_hist/", &key.storage_suffix(), "/"]
            .concat()
            .into_bytes()
    }

    fn wallet_suffix(role: WalletRole, owner: Option<&str>) -> String {
        match owner {
            Some(owner) => format!("{}/{}", role.as_str(), owner),
            None => role.as_str().to_string(),
        }
    }

    pub fn wallet(role: WalletRole, owner: Option<&str>) -> Vec<u8> {
        ["wallet/", &wallet_suffix(role, owner)]
            .concat()
            .into_bytes()
    }

    pub fn wallet_tx(role: WalletRole, owner: Option<&str>, tx_id: &str) -> Vec<u8> {
        ["wallet_tx/", &wallet_suffix(role, owner), "/", tx_id]
            .concat()
            .into_bytes()
    }

    pub fn wallet_tx_prefix(role: WalletRole, owner: Option<&str>) -> Vec<u8> {
        ["wallet_tx/", &wallet_suffix(role, owner), "/"]
            .concat()
            .into_bytes()
    }
}

pub(crate) fn encode_value<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, DispatchError> {
    minicbor::to_vec(value).map_err(|e| DispatchError::Internal(e.to_string()))
}

pub(crate) fn decode_value<T: for<'b> minicbor::Decode<'b, ()>>(
    bytes: &[u8],
) -> Result<T, DispatchError> {
    minicbor::decode(bytes).map_err(|e| DispatchError::Internal(e.to_string()))
}

/// Abort the surrounding transaction with a typed error.
pub(crate) fn abort<T>(err: DispatchError) -> ConflictableTransactionResult<T, DispatchError> {
    Err(ConflictableTransactionError::Abort(err))
}

pub(crate) fn tx_abort_err(err: DispatchError) -> ConflictableTransactionError<DispatchError> {
    ConflictableTransactionError::Abort(err)
}

pub(crate) fn tx_get<T: for<'b> minicbor::Decode<'b, ()>>(
    tx: &TransactionalTree,
    key: &[u8],
) -> ConflictableTransactionResult<Option<T>, DispatchError> {
    match tx.get(key)? {
        Some(bytes) => decode_value(&bytes).map(Some).map_err(tx_abort_err),
        None => Ok(None),
    }
}

pub(crate) fn tx_put<T: minicbor::Encode<()>>(
    tx: &TransactionalTree,
    key: Vec<u8>,
    value: &T,
) -> ConflictableTransactionResult<(), DispatchError> {
    let bytes = encode_value(value).map_err(tx_abort_err)?;
    tx.insert(key, bytes)?;
    Ok(())
}

/// Typed access to the keyspace. Every query callers need is an explicit
/// method here rather than an ad-hoc scan.
pub struct Store {
    db: Arc<Db>,
}

impl Store {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Run a closure atomically against the keyspace. sled retries the
    /// closure on conflict, so it must stay free of outside effects.
    pub fn transaction<A, F>(&self, f: F) -> Result<A, DispatchError>
    where
        F: Fn(&TransactionalTree) -> ConflictableTransactionResult<A, DispatchError>,
    {
        self.db.transaction(f).map_err(DispatchError::from)
    }

    fn get<T: for<'b> minicbor::Decode<'b, ()>>(
        &self,
        key: Vec<u8>,
    ) -> Result<Option<T>, DispatchError> {
        match self.db.get(key)? {
            Some(bytes) => decode_value(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn put<T: minicbor::Encode<()>>(&self, key: Vec<u8>, value: &T) -> Result<(), DispatchError> {
        let bytes = encode_value(value)?;
        self.db.insert(key, bytes)?;
        Ok(())
    }

    pub fn get_request(&self, id: &str) -> Result<Option<Request>, DispatchError> {
        self.get(keys::request(id))
    }

    pub fn put_request(&self, request: &Request) -> Result<(), DispatchError> {
        self.put(keys::request(&request.id), request)
    }

    /// Soft-deleted requests are excluded unless asked for.
    pub fn list_requests(&self, include_deleted: bool) -> Result<Vec<Request>, DispatchError> {
        let mut out = Vec::new();
        for item in self.db.scan_prefix(keys::REQUEST_PREFIX.as_bytes()) {
            let (_, bytes) = item?;
            let request: Request = decode_value(&bytes)?;
            if include_deleted || !request.deleted {
                out.push(request);
            }
        }
        Ok(out)
    }

    pub fn get_rider(&self, id: &str) -> Result<Option<Rider>, DispatchError> {
        self.get(keys::rider(id))
    }

    pub fn put_rider(&self, rider: &Rider) -> Result<(), DispatchError> {
        self.put(keys::rider(&rider.id), rider)
    }

    pub fn get_assignment(&self, id: &str) -> Result<Option<Assignment>, DispatchError> {
        self.get(keys::assignment(id))
    }

    /// The open assignment blocking a rider, if any. Reads the marker key, so
    /// this is a point lookup rather than a scan.
    pub fn find_open_assignment_for_rider(
        &self,
        rider_id: &str,
    ) -> Result<Option<Assignment>, DispatchError> {
        let Some(marker) = self.db.get(keys::open_assignment(rider_id))? else {
            return Ok(None);
        };
        let assignment_id = String::from_utf8(marker.to_vec())
            .map_err(|_| DispatchError::Internal("open-assignment marker is not utf8".into()))?;

        self.get_assignment(&assignment_id)
    }

    pub fn assignments_for_request(
        &self,
        request_id: &str,
    ) -> Result<Vec<Assignment>, DispatchError> {
        let ids: Vec<String> = self
            .get(keys::request_assignments(request_id))?
            .unwrap_or_default();

        let mut out = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(assignment) = self.get_assignment(id)? {
                out.push(assignment);
            }
        }
        Ok(out)
    }

    pub fn get_ledger(&self, key: &LedgerKey) -> Result<Option<Ledger>, DispatchError> {
        self.get(keys::ledger(key))
    }

    pub fn ledger_history(&self, key: &LedgerKey) -> Result<Vec<LedgerEntry>, DispatchError> {
        let mut out = Vec::new();
        for item in self.db.scan_prefix(keys::ledger_entry_prefix(key)) {
            let (_, bytes) = item?;
            out.push(decode_value(&bytes)?);
        }
        Ok(out)
    }

    pub fn get_wallet(
        &self,
        role: WalletRole,
        owner: Option<&str>,
    ) -> Result<Option<Wallet>, DispatchError> {
        self.get(keys::wallet(role, owner))
    }

    pub fn wallet_history(
        &self,
        role: WalletRole,
        owner: Option<&str>,
    ) -> Result<Vec<WalletTransaction>, DispatchError> {
        let mut out = Vec::new();
        for item in self.db.scan_prefix(keys::wallet_tx_prefix(role, owner)) {
            let (_, bytes) = item?;
            out.push(decode_value(&bytes)?);
        }
        Ok(out)
    }
}
