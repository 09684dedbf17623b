//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer. Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use taxtron_shared::{
    Cnic, TransferId, TransferStatus, TransferType, UserId, VehicleId, VehicleStatus,
    VehicleType,
};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered person who can own vehicles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub cnic: Cnic,
    /// MetaMask wallet the user signed up with.
    pub wallet_address: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Vehicle (inspection record)
// ---------------------------------------------------------------------------

/// A vehicle's registration case. Post-approval this is the vehicle's
/// primary record; `user_id` is its current owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: VehicleId,
    pub inspection_id: String,
    pub chassis_number: String,
    pub engine_number: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub color: String,
    pub vehicle_type: VehicleType,
    pub status: VehicleStatus,
    pub registration_number: Option<String>,
    /// Registration fee paid.
    pub is_paid: bool,
    /// Annual tax paid.
    pub tax_paid: bool,
    pub user_id: UserId,
    pub registered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Vehicle {
    /// When the current registration began, for the opening history entry.
    pub fn registration_start(&self) -> DateTime<Utc> {
        self.registered_at.unwrap_or(self.created_at)
    }
}

// ---------------------------------------------------------------------------
// Owner snapshot
// ---------------------------------------------------------------------------

/// A user's identity frozen at the moment a transfer was initiated.
///
/// Never re-synced with the `users` table: later profile edits do not
/// change what the transfer recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSnapshot {
    pub user_id: UserId,
    pub name: String,
    pub cnic: String,
    pub wallet_address: String,
    pub email: String,
}

impl From<&User> for OwnerSnapshot {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            name: user.name.clone(),
            cnic: user.cnic.to_string(),
            wallet_address: user.wallet_address.clone(),
            email: user.email.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ownership transfer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipTransfer {
    pub transfer_id: TransferId,
    pub vehicle_id: VehicleId,
    pub chassis_number: String,
    pub from_owner: OwnerSnapshot,
    pub to_owner: OwnerSnapshot,
    pub transfer_fee: i64,
    pub status: TransferStatus,
    pub blockchain_tx_hash: Option<String>,
    pub transfer_deed: Option<String>,
    pub rejection_reason: Option<String>,
    pub admin_notes: Option<String>,
    pub initiated_by: UserId,
    /// Set at initiation; the ownership timeline switches owners at this instant.
    pub transfer_date: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnershipTransfer {
    /// A fresh `pending_admin_approval` transfer.
    pub fn new(
        vehicle: &Vehicle,
        from_owner: OwnerSnapshot,
        to_owner: OwnerSnapshot,
        transfer_fee: i64,
        initiated_by: UserId,
    ) -> Self {
        let now = Utc::now();
        Self {
            transfer_id: TransferId::new(),
            vehicle_id: vehicle.id,
            chassis_number: vehicle.chassis_number.clone(),
            from_owner,
            to_owner,
            transfer_fee,
            status: TransferStatus::PendingAdminApproval,
            blockchain_tx_hash: None,
            transfer_deed: None,
            rejection_reason: None,
            admin_notes: None,
            initiated_by,
            transfer_date: now,
            approved_at: None,
            rejected_at: None,
            cancelled_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `user` is one of the two parties.
    pub fn involves(&self, user: UserId) -> bool {
        self.from_owner.user_id == user || self.to_owner.user_id == user
    }
}

// ---------------------------------------------------------------------------
// Ownership history
// ---------------------------------------------------------------------------

/// One owner's tenure in a vehicle's timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipEntry {
    pub owner_id: UserId,
    pub owner_name: String,
    pub owner_cnic: String,
    pub owner_wallet: String,
    pub owner_email: String,
    pub start_date: DateTime<Utc>,
    /// `None` while this is the current owner.
    pub end_date: Option<DateTime<Utc>>,
    pub transfer_type: TransferType,
    pub transfer_id: Option<TransferId>,
    pub is_current_owner: bool,
}

impl OwnershipEntry {
    /// An open entry for `owner` starting at `start_date`.
    pub fn open(
        owner: &OwnerSnapshot,
        start_date: DateTime<Utc>,
        transfer_type: TransferType,
        transfer_id: Option<TransferId>,
    ) -> Self {
        Self {
            owner_id: owner.user_id,
            owner_name: owner.name.clone(),
            owner_cnic: owner.cnic.clone(),
            owner_wallet: owner.wallet_address.clone(),
            owner_email: owner.email.clone(),
            start_date,
            end_date: None,
            transfer_type,
            transfer_id,
            is_current_owner: true,
        }
    }
}

/// Append-only ownership ledger of one vehicle, oldest entry first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipHistory {
    pub vehicle_id: VehicleId,
    pub chassis_number: String,
    #[serde(rename = "ownershipHistory")]
    pub entries: Vec<OwnershipEntry>,
    /// Count of entries with `transfer_type = transfer`.
    pub total_transfers: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnershipHistory {
    pub fn current_owner(&self) -> Option<&OwnershipEntry> {
        self.entries.iter().find(|e| e.is_current_owner)
    }
}
