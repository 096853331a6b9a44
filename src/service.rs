//! Service layer API for the assignment and settlement workflow
use std::sync::Arc;

use sled::transaction::{ConflictableTransactionResult, TransactionalTree};
use tracing::{error, info};

use crate::assignment::{Assignment, AssignmentStatus};
use crate::error::DispatchError;
use crate::ledger::{Ledger, LedgerEntry, LedgerKey, LedgerView};
use crate::money::{Amount, Split, split_price};
use crate::pricing::PricingTable;
use crate::request::{Request, RequestDraft, RequestStatus, TimeStamp};
use crate::rider::Rider;
use crate::store::{Store, abort, keys, tx_abort_err, tx_get, tx_put};
use crate::wallet::{Wallet, WalletRole, WalletTransaction, WalletTxKind};

/// Result of a completion call. Completing an already completed request is
/// not an error; the flag tells the caller nothing moved.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub request: Request,
    pub assignments_updated: usize,
    pub already_completed: bool,
}

pub struct DispatchService {
    store: Store,
    pricing: PricingTable,
}

impl DispatchService {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self::with_pricing(instance, PricingTable::default())
    }

    pub fn with_pricing(instance: Arc<sled::Db>, pricing: PricingTable) -> Self {
        Self {
            store: Store::new(instance),
            pricing,
        }
    }

    /// Direct read access for collaborators (listings, lookups).
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Create a new request in Pending state, pricing it from the submitted
    /// distance.
    pub fn create_request(&self, draft: RequestDraft) -> Result<Request, DispatchError> {
        let request = draft.finalise(&self.pricing)?;
        self.store.put_request(&request)?;

        info!(request_id = %request.id, price = %request.price, "request created");

        Ok(request)
    }

    /// Collaborator entry point; riders themselves are managed out of scope.
    pub fn register_rider(&self, rider: &Rider) -> Result<(), DispatchError> {
        self.store.put_rider(rider)
    }

    /// A rider is assignable while no open assignment references them.
    pub fn is_rider_available(&self, rider_id: &str) -> Result<bool, DispatchError> {
        Ok(self
            .store
            .find_open_assignment_for_rider(rider_id)?
            .is_none())
    }

    /// Assign a rider to a pending request. The availability check and the
    /// assignment insert run in one transaction, with the open-assignment
    /// marker as the uniqueness backstop against concurrent assigns.
    pub fn assign_rider(
        &self,
        request_id: &str,
        rider_id: &str,
    ) -> Result<Assignment, DispatchError> {
        let seed = Assignment::new(rider_id, Some(request_id))?;

        let assignment = self.store.transaction(
            |tx| -> ConflictableTransactionResult<Assignment, DispatchError> {
                let Some(mut request) = tx_get::<Request>(tx, &keys::request(request_id))? else {
                    return abort(DispatchError::not_found("request", request_id));
                };
                if request.deleted {
                    return abort(DispatchError::not_found("request", request_id));
                }
                if tx_get::<Rider>(tx, &keys::rider(rider_id))?.is_none() {
                    return abort(DispatchError::not_found("rider", rider_id));
                }
                if request.status != RequestStatus::Pending {
                    return abort(DispatchError::InvalidState(format!(
                        "cannot assign a rider to a {} request",
                        request.status
                    )));
                }
                if tx.get(keys::open_assignment(rider_id))?.is_some() {
                    return abort(DispatchError::Conflict(format!(
                        "rider unavailable: {rider_id} already has an open assignment"
                    )));
                }

                let assignment = seed.clone();
                tx_put(tx, keys::assignment(&assignment.id), &assignment)?;
                tx.insert(keys::open_assignment(rider_id), assignment.id.as_bytes())?;

                let mut ids: Vec<String> =
                    tx_get(tx, &keys::request_assignments(request_id))?.unwrap_or_default();
                ids.push(assignment.id.clone());
                tx_put(tx, keys::request_assignments(request_id), &ids)?;

                request.status = RequestStatus::Accepted;
                request.updated_at = TimeStamp::new();
                tx_put(tx, keys::request(request_id), &request)?;

                Ok(assignment)
            },
        )?;

        info!(request_id, rider_id, assignment_id = %assignment.id, "rider assigned");

        Ok(assignment)
    }

    /// Mark an accepted request as underway, stamping its open assignments.
    pub fn set_in_progress(&self, request_id: &str) -> Result<Request, DispatchError> {
        let request = self.store.transaction(
            |tx| -> ConflictableTransactionResult<Request, DispatchError> {
                let Some(mut request) = tx_get::<Request>(tx, &keys::request(request_id))? else {
                    return abort(DispatchError::not_found("request", request_id));
                };
                if request.status != RequestStatus::Accepted {
                    return abort(DispatchError::InvalidState(format!(
                        "cannot start a {} request",
                        request.status
                    )));
                }

                for mut assignment in open_assignments(tx, request_id)? {
                    assignment.status = AssignmentStatus::InProgress;
                    assignment.in_progress_at = Some(TimeStamp::new());
                    tx_put(tx, keys::assignment(&assignment.id), &assignment)?;
                }

                request.status = RequestStatus::InProgress;
                request.updated_at = TimeStamp::new();
                tx_put(tx, keys::request(request_id), &request)?;

                Ok(request)
            },
        )?;

        info!(request_id, "request in progress");

        Ok(request)
    }

    /// Complete a request: terminal status, close its open assignments and
    /// settle each exactly once. Idempotent on an already completed request.
    /// The whole pipeline is one transaction, so a settlement failure rolls
    /// back the status change as well.
    pub fn complete_request(&self, request_id: &str) -> Result<Completion, DispatchError> {
        let outcome = self.store.transaction(
            |tx| -> ConflictableTransactionResult<Completion, DispatchError> {
                let Some(mut request) = tx_get::<Request>(tx, &keys::request(request_id))? else {
                    return abort(DispatchError::not_found("request", request_id));
                };
                if request.status == RequestStatus::Completed {
                    return Ok(Completion {
                        request,
                        assignments_updated: 0,
                        already_completed: true,
                    });
                }
                if !matches!(
                    request.status,
                    RequestStatus::Accepted | RequestStatus::InProgress
                ) {
                    return abort(DispatchError::InvalidState(format!(
                        "cannot complete a {} request",
                        request.status
                    )));
                }

                let mut settled = 0;
                for mut assignment in open_assignments(tx, request_id)? {
                    assignment.status = AssignmentStatus::Completed;
                    assignment.completed_at = Some(TimeStamp::new());
                    tx_put(tx, keys::assignment(&assignment.id), &assignment)?;
                    tx.remove(keys::open_assignment(&assignment.rider_id))?;

                    // A request that was priced at zero (bad distance input)
                    // completes without touching the ledger.
                    if !request.price.is_zero() {
                        settle(tx, &request, &assignment)?;
                    }
                    settled += 1;
                }

                request.status = RequestStatus::Completed;
                request.updated_at = TimeStamp::new();
                tx_put(tx, keys::request(request_id), &request)?;

                Ok(Completion {
                    request,
                    assignments_updated: settled,
                    already_completed: false,
                })
            },
        );

        match outcome {
            Ok(completion) => {
                info!(
                    request_id,
                    settled = completion.assignments_updated,
                    no_op = completion.already_completed,
                    "request completed"
                );
                Ok(completion)
            }
            Err(err) => {
                if matches!(err, DispatchError::Internal(_)) {
                    error!(request_id, %err, "completion rolled back");
                }
                Err(err)
            }
        }
    }

    /// Assignment-flavoured completion. A linked assignment completes through
    /// its request; an orphaned one (request reassigned away) just closes,
    /// there is no price left to settle.
    pub fn complete_assignment(&self, assignment_id: &str) -> Result<Assignment, DispatchError> {
        let Some(assignment) = self.store.get_assignment(assignment_id)? else {
            return Err(DispatchError::not_found("assignment", assignment_id));
        };

        if let Some(request_id) = assignment.request_id.clone() {
            self.complete_request(&request_id)?;
            return self
                .store
                .get_assignment(assignment_id)?
                .ok_or_else(|| DispatchError::not_found("assignment", assignment_id));
        }

        self.store.transaction(
            |tx| -> ConflictableTransactionResult<Assignment, DispatchError> {
                let Some(mut assignment) =
                    tx_get::<Assignment>(tx, &keys::assignment(assignment_id))?
                else {
                    return abort(DispatchError::not_found("assignment", assignment_id));
                };
                if assignment.is_open() {
                    assignment.status = AssignmentStatus::Completed;
                    assignment.completed_at = Some(TimeStamp::new());
                    tx_put(tx, keys::assignment(&assignment.id), &assignment)?;
                    tx.remove(keys::open_assignment(&assignment.rider_id))?;
                }
                Ok(assignment)
            },
        )
    }

    /// Cancel a request that has not started yet, releasing its rider.
    pub fn cancel_request(&self, request_id: &str) -> Result<Request, DispatchError> {
        let request = self.store.transaction(
            |tx| -> ConflictableTransactionResult<Request, DispatchError> {
                let Some(mut request) = tx_get::<Request>(tx, &keys::request(request_id))? else {
                    return abort(DispatchError::not_found("request", request_id));
                };
                if !request.status.can_cancel() {
                    return abort(DispatchError::InvalidState(format!(
                        "cannot cancel a {} request",
                        request.status
                    )));
                }

                for mut assignment in open_assignments(tx, request_id)? {
                    assignment.status = AssignmentStatus::Cancelled;
                    assignment.cancelled_at = Some(TimeStamp::new());
                    tx_put(tx, keys::assignment(&assignment.id), &assignment)?;
                    tx.remove(keys::open_assignment(&assignment.rider_id))?;
                }

                request.status = RequestStatus::Cancelled;
                request.updated_at = TimeStamp::new();
                tx_put(tx, keys::request(request_id), &request)?;

                Ok(request)
            },
        )?;

        info!(request_id, "request cancelled");

        Ok(request)
    }

    /// Re-submit the details of a request that has not been picked up.
    pub fn update_request(
        &self,
        request_id: &str,
        draft: RequestDraft,
    ) -> Result<Request, DispatchError> {
        let fresh = draft.finalise(&self.pricing)?;

        let request = self.store.transaction(
            |tx| -> ConflictableTransactionResult<Request, DispatchError> {
                let Some(current) = tx_get::<Request>(tx, &keys::request(request_id))? else {
                    return abort(DispatchError::not_found("request", request_id));
                };
                if current.deleted {
                    return abort(DispatchError::not_found("request", request_id));
                }
                if !current.status.allows_edit() {
                    return abort(DispatchError::InvalidState(format!(
                        "cannot update a {} request",
                        current.status
                    )));
                }

                let mut updated = fresh.clone();
                updated.id = current.id.clone();
                updated.status = current.status;
                updated.created_at = current.created_at.clone();
                updated.updated_at = TimeStamp::new();
                tx_put(tx, keys::request(request_id), &updated)?;

                Ok(updated)
            },
        )?;

        info!(request_id, price = %request.price, "request updated");

        Ok(request)
    }

    /// Soft delete: the request drops out of default listings but the row and
    /// its history remain.
    pub fn delete_request(&self, request_id: &str, actor: &str) -> Result<Request, DispatchError> {
        let request = self.store.transaction(
            |tx| -> ConflictableTransactionResult<Request, DispatchError> {
                let Some(mut request) = tx_get::<Request>(tx, &keys::request(request_id))? else {
                    return abort(DispatchError::not_found("request", request_id));
                };
                if !request.status.allows_edit() {
                    return abort(DispatchError::InvalidState(format!(
                        "cannot delete a {} request",
                        request.status
                    )));
                }

                request.deleted = true;
                request.deleted_by = Some(actor.to_string());
                request.updated_at = TimeStamp::new();
                tx_put(tx, keys::request(request_id), &request)?;

                Ok(request)
            },
        )?;

        info!(request_id, actor, "request soft-deleted");

        Ok(request)
    }

    pub fn get_request(&self, request_id: &str) -> Result<Option<Request>, DispatchError> {
        self.store.get_request(request_id)
    }

    pub fn get_ledger(&self, key: &LedgerKey) -> Result<Option<LedgerView>, DispatchError> {
        let Some(ledger) = self.store.get_ledger(key)? else {
            return Ok(None);
        };
        let history = self.store.ledger_history(key)?;

        Ok(Some(LedgerView { ledger, history }))
    }

    pub fn get_wallet(
        &self,
        role: WalletRole,
        owner: Option<&str>,
    ) -> Result<Option<Wallet>, DispatchError> {
        self.store.get_wallet(role, owner)
    }
}

/// Open assignments referencing a request, loaded through the per-request
/// index inside the surrounding transaction.
fn open_assignments(
    tx: &TransactionalTree,
    request_id: &str,
) -> ConflictableTransactionResult<Vec<Assignment>, DispatchError> {
    let ids: Vec<String> = tx_get(tx, &keys::request_assignments(request_id))?.unwrap_or_default();

    let mut open = Vec::new();
    for id in &ids {
        let Some(assignment) = tx_get::<Assignment>(tx, &keys::assignment(id))? else {
            return abort(DispatchError::Internal(format!(
                "assignment index for {request_id} references missing row {id}"
            )));
        };
        if assignment.is_open() {
            open.push(assignment);
        }
    }
    Ok(open)
}

/// Split the request price and credit ledger and wallets, all inside the
/// caller's transaction. One ledger increment and one history row per call.
fn settle(
    tx: &TransactionalTree,
    request: &Request,
    assignment: &Assignment,
) -> ConflictableTransactionResult<Split, DispatchError> {
    let Some(rider) = tx_get::<Rider>(tx, &keys::rider(&assignment.rider_id))? else {
        return abort(DispatchError::Internal(format!(
            "rider {} missing while settling request {}",
            assignment.rider_id, request.id
        )));
    };

    let split = split_price(request.price, rider.commissioner.is_some());
    let key = LedgerKey::new(
        rider.settlement_party(),
        rider.commissioner.as_deref(),
        &rider.boss,
    );

    // get-or-create, serialized by the transaction
    let mut ledger =
        tx_get::<Ledger>(tx, &keys::ledger(&key))?.unwrap_or_else(|| Ledger::new(key.clone()));
    ledger.apply(&split);
    tx_put(tx, keys::ledger(&key), &ledger)?;

    let entry = LedgerEntry::new(key.clone(), Some(&request.id), &split).map_err(tx_abort_err)?;
    tx_put(tx, keys::ledger_entry(&key, &entry.id), &entry)?;

    let note = format!("settlement for {}", request.id);
    credit_wallet(
        tx,
        WalletRole::Rider,
        Some(rider.settlement_party()),
        split.rider,
        &note,
    )?;
    if let Some(commissioner) = rider.commissioner.as_deref() {
        credit_wallet(
            tx,
            WalletRole::Commissioner,
            Some(commissioner),
            split.commissioner,
            &note,
        )?;
    }
    // exactly one boss wallet system-wide, addressed by role
    credit_wallet(tx, WalletRole::Boss, None, split.boss, &note)?;

    Ok(split)
}

fn credit_wallet(
    tx: &TransactionalTree,
    role: WalletRole,
    owner: Option<&str>,
    amount: Amount,
    note: &str,
) -> ConflictableTransactionResult<(), DispatchError> {
    let key = keys::wallet(role, owner);
    let mut wallet = tx_get::<Wallet>(tx, &key)?
        .unwrap_or_else(|| Wallet::new(role, owner.map(str::to_string)));
    wallet.credit(amount);
    tx_put(tx, key, &wallet)?;

    let audit = WalletTransaction::new(role, owner, WalletTxKind::Credit, amount, note)
        .map_err(tx_abort_err)?;
    tx_put(tx, keys::wallet_tx(role, owner, &audit.id), &audit)?;

    Ok(())
}
