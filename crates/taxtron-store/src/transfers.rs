//! Persistence for [`OwnershipTransfer`] records and their status changes.
//!
//! Status updates are compare-and-set: the allowed source states are derived
//! from [`TransferStatus::can_transition_to`], so a row that moved on in the
//! meantime is simply not updated.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use taxtron_shared::{TransferId, TransferStatus, UserId, VehicleId};

use crate::columns;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::history;
use crate::models::{OwnerSnapshot, OwnershipHistory, OwnershipTransfer};
use crate::vehicles;

const TRANSFER_COLUMNS: &str = "transfer_id, vehicle_id, chassis_number, \
     from_user_id, from_name, from_cnic, from_wallet, from_email, \
     to_user_id, to_name, to_cnic, to_wallet, to_email, \
     transfer_fee, status, blockchain_tx_hash, transfer_deed, rejection_reason, admin_notes, \
     initiated_by, transfer_date, approved_at, rejected_at, cancelled_at, completed_at, \
     created_at, updated_at";

/// Optional fields written alongside a status change. `None` leaves the
/// stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct StatusChange {
    pub admin_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub blockchain_tx_hash: Option<String>,
    pub transfer_deed: Option<String>,
}

/// Result of [`Database::complete_transfer`].
#[derive(Debug, Clone)]
pub struct CompletedTransfer {
    pub transfer: OwnershipTransfer,
    pub history: OwnershipHistory,
}

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new transfer.
    ///
    /// Fails with [`StoreError::Conflict`] if the vehicle already has a
    /// transfer pending approval or approved.
    pub fn insert_transfer(&self, t: &OwnershipTransfer) -> Result<()> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO ownership_transfers ({TRANSFER_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                             ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)"
                ),
                params![
                    t.transfer_id.to_string(),
                    t.vehicle_id.to_string(),
                    t.chassis_number,
                    t.from_owner.user_id.to_string(),
                    t.from_owner.name,
                    t.from_owner.cnic,
                    t.from_owner.wallet_address,
                    t.from_owner.email,
                    t.to_owner.user_id.to_string(),
                    t.to_owner.name,
                    t.to_owner.cnic,
                    t.to_owner.wallet_address,
                    t.to_owner.email,
                    t.transfer_fee,
                    t.status.as_str(),
                    t.blockchain_tx_hash,
                    t.transfer_deed,
                    t.rejection_reason,
                    t.admin_notes,
                    t.initiated_by.to_string(),
                    t.transfer_date.to_rfc3339(),
                    columns::opt_ts_text(t.approved_at),
                    columns::opt_ts_text(t.rejected_at),
                    columns::opt_ts_text(t.cancelled_at),
                    columns::opt_ts_text(t.completed_at),
                    t.created_at.to_rfc3339(),
                    t.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| {
                StoreError::from_insert(e, "an active transfer already exists for this vehicle")
            })?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_transfer(&self, id: TransferId) -> Result<OwnershipTransfer> {
        get_transfer(self.conn(), id)
    }

    /// The vehicle's transfer in `pending_admin_approval` or `approved`, if any.
    pub fn find_active_transfer_for_vehicle(
        &self,
        vehicle_id: VehicleId,
    ) -> Result<Option<OwnershipTransfer>> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {TRANSFER_COLUMNS} FROM ownership_transfers
                     WHERE vehicle_id = ?1 AND status IN ({})",
                    status_list(&TransferStatus::ACTIVE)
                ),
                params![vehicle_id.to_string()],
                row_to_transfer,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    /// All transfers, newest first, optionally restricted to one status.
    pub fn list_transfers(&self, status: Option<TransferStatus>) -> Result<Vec<OwnershipTransfer>> {
        let filter = match status {
            Some(s) => format!("WHERE status = '{}'", s.as_str()),
            None => String::new(),
        };
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM ownership_transfers {filter}
             ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map([], row_to_transfer)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Transfers where `user` is the sending or the receiving owner, newest first.
    pub fn list_transfers_for_user(&self, user: UserId) -> Result<Vec<OwnershipTransfer>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM ownership_transfers
             WHERE from_user_id = ?1 OR to_user_id = ?1
             ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(params![user.to_string()], row_to_transfer)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Move a transfer to `to` if its current status allows it.
    ///
    /// Returns `false` when the transfer does not exist or its status has no
    /// edge to `to`.
    pub fn transition_transfer(
        &self,
        id: TransferId,
        to: TransferStatus,
        change: &StatusChange,
    ) -> Result<bool> {
        transition(self.conn(), id, to, change, Utc::now())
    }

    /// Complete an approved transfer in one transaction: the transfer is
    /// marked `completed`, the vehicle is reassigned to the recipient and
    /// the ownership history gains the new owner. Any failure rolls back
    /// all three.
    ///
    /// Fails with [`StoreError::NotFound`] if the transfer is missing or not
    /// `approved`, and with [`StoreError::Conflict`] if the vehicle is no
    /// longer held by the transferring owner.
    pub fn complete_transfer(
        &mut self,
        id: TransferId,
        change: &StatusChange,
    ) -> Result<CompletedTransfer> {
        let tx = self.conn_mut().transaction()?;

        if !transition(&tx, id, TransferStatus::Completed, change, Utc::now())? {
            return Err(StoreError::NotFound);
        }
        let transfer = get_transfer(&tx, id)?;

        let vehicle = vehicles::get_vehicle(&tx, transfer.vehicle_id)?;
        if !vehicles::reassign_owner(
            &tx,
            vehicle.id,
            transfer.from_owner.user_id,
            transfer.to_owner.user_id,
        )? {
            return Err(StoreError::Conflict(
                "vehicle is no longer held by the transferring owner".to_string(),
            ));
        }

        history::append_transfer(&tx, &vehicle, &transfer)?;
        let history = history::get_history(&tx, vehicle.id)?;

        tx.commit()?;

        tracing::info!(
            transfer_id = %id,
            vehicle_id = %vehicle.id,
            new_owner = %transfer.to_owner.user_id,
            total_transfers = history.total_transfers,
            "ownership transfer committed"
        );

        Ok(CompletedTransfer { transfer, history })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn status_list(statuses: &[TransferStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn timestamp_column(status: TransferStatus) -> Option<&'static str> {
    match status {
        TransferStatus::PendingAdminApproval => None,
        TransferStatus::Approved => Some("approved_at"),
        TransferStatus::Rejected => Some("rejected_at"),
        TransferStatus::Cancelled => Some("cancelled_at"),
        TransferStatus::Completed => Some("completed_at"),
    }
}

const ALL_STATUSES: [TransferStatus; 5] = [
    TransferStatus::PendingAdminApproval,
    TransferStatus::Approved,
    TransferStatus::Rejected,
    TransferStatus::Cancelled,
    TransferStatus::Completed,
];

pub(crate) fn transition(
    conn: &Connection,
    id: TransferId,
    to: TransferStatus,
    change: &StatusChange,
    at: DateTime<Utc>,
) -> Result<bool> {
    let from: Vec<TransferStatus> = ALL_STATUSES
        .into_iter()
        .filter(|s| s.can_transition_to(to))
        .collect();
    let Some(ts_column) = timestamp_column(to) else {
        return Ok(false);
    };
    if from.is_empty() {
        return Ok(false);
    }

    let at = at.to_rfc3339();
    let affected = conn.execute(
        &format!(
            "UPDATE ownership_transfers
             SET status = ?1,
                 {ts_column} = ?2,
                 updated_at = ?2,
                 admin_notes = COALESCE(?3, admin_notes),
                 rejection_reason = COALESCE(?4, rejection_reason),
                 blockchain_tx_hash = COALESCE(?5, blockchain_tx_hash),
                 transfer_deed = COALESCE(?6, transfer_deed)
             WHERE transfer_id = ?7 AND status IN ({})",
            status_list(&from)
        ),
        params![
            to.as_str(),
            at,
            change.admin_notes,
            change.rejection_reason,
            change.blockchain_tx_hash,
            change.transfer_deed,
            id.to_string(),
        ],
    )?;
    Ok(affected > 0)
}

pub(crate) fn get_transfer(conn: &Connection, id: TransferId) -> Result<OwnershipTransfer> {
    conn.query_row(
        &format!("SELECT {TRANSFER_COLUMNS} FROM ownership_transfers WHERE transfer_id = ?1"),
        params![id.to_string()],
        row_to_transfer,
    )
    .map_err(StoreError::from_query)
}

fn row_to_snapshot(row: &rusqlite::Row<'_>, first: usize) -> rusqlite::Result<OwnerSnapshot> {
    Ok(OwnerSnapshot {
        user_id: UserId(columns::uuid(row, first)?),
        name: row.get(first + 1)?,
        cnic: row.get(first + 2)?,
        wallet_address: row.get(first + 3)?,
        email: row.get(first + 4)?,
    })
}

fn row_to_transfer(row: &rusqlite::Row<'_>) -> rusqlite::Result<OwnershipTransfer> {
    Ok(OwnershipTransfer {
        transfer_id: TransferId(columns::uuid(row, 0)?),
        vehicle_id: VehicleId(columns::uuid(row, 1)?),
        chassis_number: row.get(2)?,
        from_owner: row_to_snapshot(row, 3)?,
        to_owner: row_to_snapshot(row, 8)?,
        transfer_fee: row.get(13)?,
        status: columns::parsed(row, 14)?,
        blockchain_tx_hash: row.get(15)?,
        transfer_deed: row.get(16)?,
        rejection_reason: row.get(17)?,
        admin_notes: row.get(18)?,
        initiated_by: UserId(columns::uuid(row, 19)?),
        transfer_date: columns::timestamp(row, 20)?,
        approved_at: columns::opt_timestamp(row, 21)?,
        rejected_at: columns::opt_timestamp(row, 22)?,
        cancelled_at: columns::opt_timestamp(row, 23)?,
        completed_at: columns::opt_timestamp(row, 24)?,
        created_at: columns::timestamp(row, 25)?,
        updated_at: columns::timestamp(row, 26)?,
    })
}
