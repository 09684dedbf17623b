//! The ownership-transfer workflow.
//!
//! ```text
//! pending_admin_approval --approve--> approved --complete--> completed
//!         |        \                     |
//!       reject    cancel               cancel
//!         v          v                   v
//!      rejected   cancelled          cancelled
//! ```
//!
//! Every operation runs on the blocking pool with the database lock held,
//! so the existence checks and the writes that follow them are not
//! interleaved with other requests in this process. The schema's partial
//! unique indexes back the same invariants against other writers.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use taxtron_shared::classify::classify_vehicle_type;
use taxtron_shared::constants::UNKNOWN_PLACEHOLDER;
use taxtron_shared::{
    Cnic, TransferId, TransferStatus, UserId, VehicleId, VehicleStatus, VehicleType,
};
use taxtron_store::{
    CompletedTransfer, Database, OwnerSnapshot, OwnershipEntry, OwnershipHistory,
    OwnershipTransfer, StatusChange, StoreError, Vehicle,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The entity is absent, or not in a state the operation accepts.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidOperation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PaymentRequired(String),

    #[error(transparent)]
    Store(StoreError),

    /// The blocking task died or the database lock is poisoned.
    #[error("database task failed: {0}")]
    Task(String),
}

impl From<StoreError> for WorkflowError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(m) => WorkflowError::Conflict(m),
            other => WorkflowError::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Turns a store `NotFound` into a workflow `NotFound` with `message`.
fn not_found(message: &str) -> impl FnOnce(StoreError) -> WorkflowError + '_ {
    move |e| match e {
        StoreError::NotFound => WorkflowError::NotFound(message.to_string()),
        other => other.into(),
    }
}

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub vehicle_id: VehicleId,
    pub recipient_cnic: String,
    pub transfer_fee: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub blockchain_tx_hash: Option<String>,
    pub transfer_deed: Option<String>,
}

/// Descriptive vehicle fields attached to transfers and histories.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDetails {
    pub make: String,
    pub model: String,
    pub year: Option<i32>,
    pub color: String,
    pub registration_number: String,
    pub vehicle_type: VehicleType,
}

impl VehicleDetails {
    fn from_vehicle(v: &Vehicle) -> Self {
        Self {
            make: v.make.clone(),
            model: v.model.clone(),
            year: Some(v.year),
            color: v.color.clone(),
            registration_number: v
                .registration_number
                .clone()
                .unwrap_or_else(|| UNKNOWN_PLACEHOLDER.to_string()),
            vehicle_type: classify_vehicle_type(v.vehicle_type, &v.make, &v.model),
        }
    }

    fn unknown() -> Self {
        Self {
            make: UNKNOWN_PLACEHOLDER.to_string(),
            model: UNKNOWN_PLACEHOLDER.to_string(),
            year: None,
            color: UNKNOWN_PLACEHOLDER.to_string(),
            registration_number: UNKNOWN_PLACEHOLDER.to_string(),
            vehicle_type: VehicleType::Other,
        }
    }
}

/// What the owner sees when looking up one of their vehicles for transfer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSearch {
    pub vehicle_id: VehicleId,
    pub inspection_id: String,
    pub chassis_number: String,
    pub engine_number: String,
    #[serde(flatten)]
    pub details: VehicleDetails,
    pub is_paid: bool,
    pub tax_paid: bool,
    /// A transfer already pending or approved for this vehicle.
    pub existing_transfer: Option<OwnershipTransfer>,
}

/// The public part of a recipient's profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientSummary {
    pub user_id: UserId,
    pub name: String,
    pub cnic: Cnic,
    pub wallet_address: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferView {
    #[serde(flatten)]
    pub transfer: OwnershipTransfer,
    pub vehicle: VehicleDetails,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    pub vehicle_id: VehicleId,
    pub chassis_number: String,
    pub vehicle: VehicleDetails,
    pub ownership_history: Vec<OwnershipEntry>,
    pub current_owner: Option<OwnershipEntry>,
    pub total_transfers: u32,
}

impl HistoryView {
    fn new(history: OwnershipHistory, vehicle: VehicleDetails) -> Self {
        let current_owner = history.current_owner().cloned();
        Self {
            vehicle_id: history.vehicle_id,
            chassis_number: history.chassis_number,
            vehicle,
            ownership_history: history.entries,
            current_owner,
            total_transfers: history.total_transfers,
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct TransferService {
    db: Arc<Mutex<Database>>,
    default_fee: i64,
}

impl TransferService {
    pub fn new(db: Database, default_fee: i64) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            default_fee,
        }
    }

    /// Run `op` against the locked database on the blocking pool.
    async fn with_db<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut guard = db
                .lock()
                .map_err(|e| WorkflowError::Task(format!("mutex poisoned: {e}")))?;
            op(&mut guard)
        })
        .await
        .map_err(|e| WorkflowError::Task(format!("spawn_blocking failed: {e}")))?
    }

    // ------------------------------------------------------------------
    // Owner-side operations
    // ------------------------------------------------------------------

    /// Look up an approved vehicle by chassis number for its owner.
    pub async fn search_vehicle(&self, chassis_number: &str, caller: UserId) -> Result<VehicleSearch> {
        let chassis_number = chassis_number.trim().to_string();
        if chassis_number.is_empty() {
            return Err(WorkflowError::Validation("Chassis number is required".into()));
        }

        self.with_db(move |db| {
            let vehicle = db
                .find_vehicle_by_chassis_with_status(&chassis_number, VehicleStatus::Approved)
                .map_err(not_found("Vehicle not found or not approved"))?;

            if vehicle.user_id != caller {
                return Err(WorkflowError::Forbidden(
                    "You are not the owner of this vehicle".into(),
                ));
            }
            ensure_paid(&vehicle)?;

            let existing_transfer = db.find_active_transfer_for_vehicle(vehicle.id)?;

            Ok(VehicleSearch {
                vehicle_id: vehicle.id,
                details: VehicleDetails::from_vehicle(&vehicle),
                inspection_id: vehicle.inspection_id,
                chassis_number: vehicle.chassis_number,
                engine_number: vehicle.engine_number,
                is_paid: vehicle.is_paid,
                tax_paid: vehicle.tax_paid,
                existing_transfer,
            })
        })
        .await
    }

    /// Find the user a vehicle would be transferred to.
    pub async fn search_recipient(&self, cnic: &str, caller: UserId) -> Result<RecipientSummary> {
        let cnic = Cnic::parse(cnic).map_err(|e| WorkflowError::Validation(e.to_string()))?;

        self.with_db(move |db| {
            let user = db
                .find_user_by_cnic(&cnic)
                .map_err(not_found("No user found with this CNIC"))?;

            if user.id == caller {
                return Err(WorkflowError::InvalidOperation(
                    "You cannot transfer a vehicle to yourself".into(),
                ));
            }

            Ok(RecipientSummary {
                user_id: user.id,
                name: user.name,
                cnic: user.cnic,
                wallet_address: user.wallet_address,
            })
        })
        .await
    }

    pub async fn initiate(&self, req: InitiateRequest, initiator: UserId) -> Result<OwnershipTransfer> {
        let transfer_fee = req.transfer_fee.unwrap_or(self.default_fee);
        if transfer_fee < 0 {
            return Err(WorkflowError::Validation("Transfer fee cannot be negative".into()));
        }
        let recipient_cnic = Cnic::parse(&req.recipient_cnic)
            .map_err(|e| WorkflowError::Validation(e.to_string()))?;
        let vehicle_id = req.vehicle_id;

        self.with_db(move |db| {
            let vehicle = db
                .find_vehicle(vehicle_id)?
                .filter(|v| v.status == VehicleStatus::Approved && v.user_id == initiator)
                .ok_or_else(|| {
                    WorkflowError::NotFound("Vehicle not found or you are not the owner".into())
                })?;
            ensure_paid(&vehicle)?;

            let recipient = db
                .find_user_by_cnic(&recipient_cnic)
                .map_err(not_found("Recipient not found"))?;
            if recipient.id == initiator {
                return Err(WorkflowError::InvalidOperation(
                    "You cannot transfer a vehicle to yourself".into(),
                ));
            }
            let owner = db.get_user(initiator).map_err(not_found("User not found"))?;

            if db.find_active_transfer_for_vehicle(vehicle.id)?.is_some() {
                return Err(WorkflowError::Conflict(
                    "A transfer is already in progress for this vehicle".into(),
                ));
            }

            let transfer = OwnershipTransfer::new(
                &vehicle,
                OwnerSnapshot::from(&owner),
                OwnerSnapshot::from(&recipient),
                transfer_fee,
                initiator,
            );
            db.insert_transfer(&transfer)?;

            info!(
                transfer_id = %transfer.transfer_id,
                vehicle_id = %vehicle.id,
                from = %owner.id,
                to = %recipient.id,
                fee = transfer_fee,
                "ownership transfer initiated"
            );
            Ok(transfer)
        })
        .await
    }

    pub async fn cancel(&self, id: TransferId, caller: UserId) -> Result<OwnershipTransfer> {
        self.with_db(move |db| {
            let transfer = db.get_transfer(id).map_err(not_found("Transfer not found"))?;

            if transfer.initiated_by != caller {
                return Err(WorkflowError::Forbidden(
                    "Only the initiator can cancel this transfer".into(),
                ));
            }
            if !transfer.status.is_active()
                || !db.transition_transfer(id, TransferStatus::Cancelled, &StatusChange::default())?
            {
                return Err(WorkflowError::NotFound(
                    "Transfer not found or cannot be cancelled".into(),
                ));
            }

            info!(transfer_id = %id, "ownership transfer cancelled");
            Ok(db.get_transfer(id)?)
        })
        .await
    }

    /// Finish an approved transfer. The status change, the vehicle's new
    /// owner and the history entry are written in one transaction.
    pub async fn complete(
        &self,
        id: TransferId,
        caller: UserId,
        req: CompleteRequest,
    ) -> Result<CompletedTransfer> {
        let change = StatusChange {
            blockchain_tx_hash: non_blank(req.blockchain_tx_hash),
            transfer_deed: non_blank(req.transfer_deed),
            ..Default::default()
        };

        self.with_db(move |db| {
            let transfer = db.get_transfer(id).map_err(not_found("Transfer not found"))?;

            if transfer.initiated_by != caller {
                return Err(WorkflowError::Forbidden(
                    "Only the initiator can complete this transfer".into(),
                ));
            }
            if transfer.status != TransferStatus::Approved {
                return Err(WorkflowError::NotFound(
                    "Transfer not found or not approved".into(),
                ));
            }

            db.complete_transfer(id, &change)
                .map_err(not_found("Transfer not found or not approved"))
        })
        .await
    }

    /// One transfer, visible only to its two parties.
    pub async fn get_transfer(&self, id: TransferId, caller: UserId) -> Result<TransferView> {
        self.with_db(move |db| {
            let db: &Database = db;
            let transfer = db.get_transfer(id).map_err(not_found("Transfer not found"))?;
            if !transfer.involves(caller) {
                return Err(WorkflowError::Forbidden(
                    "Not authorized to view this transfer".into(),
                ));
            }
            Ok(enrich(db, transfer))
        })
        .await
    }

    pub async fn list_for_user(&self, user: UserId) -> Result<Vec<TransferView>> {
        self.with_db(move |db| {
            let db: &Database = db;
            let transfers = db.list_transfers_for_user(user)?;
            Ok(transfers.into_iter().map(|t| enrich(db, t)).collect())
        })
        .await
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    pub async fn history_by_vehicle(&self, vehicle_id: VehicleId) -> Result<HistoryView> {
        self.with_db(move |db| {
            let db: &Database = db;
            let history = db
                .get_history(vehicle_id)
                .map_err(not_found("No ownership history found for this vehicle"))?;
            Ok(history_view(db, history))
        })
        .await
    }

    pub async fn history_by_chassis(&self, chassis_number: &str) -> Result<HistoryView> {
        let chassis_number = chassis_number.to_string();
        self.with_db(move |db| {
            let db: &Database = db;
            let history = db
                .get_history_by_chassis(&chassis_number)
                .map_err(not_found("No ownership history found for this vehicle"))?;
            Ok(history_view(db, history))
        })
        .await
    }

    // ------------------------------------------------------------------
    // Admin review
    // ------------------------------------------------------------------

    pub async fn list_pending_for_admin(&self) -> Result<Vec<TransferView>> {
        self.list_all_for_admin(Some(TransferStatus::PendingAdminApproval))
            .await
    }

    pub async fn list_all_for_admin(&self, status: Option<TransferStatus>) -> Result<Vec<TransferView>> {
        self.with_db(move |db| {
            let db: &Database = db;
            let transfers = db.list_transfers(status)?;
            Ok(transfers.into_iter().map(|t| enrich(db, t)).collect())
        })
        .await
    }

    pub async fn admin_approve(
        &self,
        id: TransferId,
        admin: UserId,
        admin_notes: Option<String>,
    ) -> Result<OwnershipTransfer> {
        let change = StatusChange {
            admin_notes: non_blank(admin_notes),
            ..Default::default()
        };
        let transfer = self.review(id, TransferStatus::Approved, change).await?;
        info!(transfer_id = %id, admin = %admin, "ownership transfer approved");
        Ok(transfer)
    }

    pub async fn admin_reject(
        &self,
        id: TransferId,
        admin: UserId,
        rejection_reason: Option<String>,
    ) -> Result<OwnershipTransfer> {
        let Some(reason) = non_blank(rejection_reason) else {
            return Err(WorkflowError::Validation("Rejection reason is required".into()));
        };
        let change = StatusChange {
            rejection_reason: Some(reason),
            ..Default::default()
        };
        let transfer = self.review(id, TransferStatus::Rejected, change).await?;
        info!(transfer_id = %id, admin = %admin, "ownership transfer rejected");
        Ok(transfer)
    }

    /// Approve or reject; both only apply to `pending_admin_approval`.
    async fn review(
        &self,
        id: TransferId,
        to: TransferStatus,
        change: StatusChange,
    ) -> Result<OwnershipTransfer> {
        self.with_db(move |db| {
            let applied = match db.get_transfer(id) {
                Ok(t) if t.status == TransferStatus::PendingAdminApproval => {
                    db.transition_transfer(id, to, &change)?
                }
                Ok(_) | Err(StoreError::NotFound) => false,
                Err(e) => return Err(e.into()),
            };
            if !applied {
                return Err(WorkflowError::NotFound(
                    "Transfer not found or already processed".into(),
                ));
            }
            Ok(db.get_transfer(id)?)
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ensure_paid(vehicle: &Vehicle) -> Result<()> {
    if !vehicle.is_paid {
        return Err(WorkflowError::PaymentRequired(
            "Registration fee must be paid before transfer".into(),
        ));
    }
    if !vehicle.tax_paid {
        return Err(WorkflowError::PaymentRequired(
            "Annual tax must be paid before transfer".into(),
        ));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn vehicle_details(db: &Database, id: VehicleId) -> VehicleDetails {
    match db.find_vehicle(id) {
        Ok(Some(v)) => VehicleDetails::from_vehicle(&v),
        Ok(None) => VehicleDetails::unknown(),
        Err(e) => {
            warn!(vehicle_id = %id, error = %e, "vehicle lookup failed, using placeholders");
            VehicleDetails::unknown()
        }
    }
}

fn enrich(db: &Database, transfer: OwnershipTransfer) -> TransferView {
    let vehicle = vehicle_details(db, transfer.vehicle_id);
    TransferView { transfer, vehicle }
}

fn history_view(db: &Database, history: OwnershipHistory) -> HistoryView {
    let vehicle = vehicle_details(db, history.vehicle_id);
    HistoryView::new(history, vehicle)
}
