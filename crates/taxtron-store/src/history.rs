//! The per-vehicle ownership ledger.
//!
//! A vehicle's history is created on its first completed transfer, seeded
//! with a `registration` entry for the owner at that time. Every completed
//! transfer then closes the open entry and appends one for the recipient.
//! Appends are keyed by transfer id and applying the same transfer twice is
//! a no-op.

use rusqlite::{params, Connection, OptionalExtension};

use taxtron_shared::{TransferId, TransferType, UserId, VehicleId};

use crate::columns;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{OwnershipEntry, OwnershipHistory, OwnershipTransfer, Vehicle};

const ENTRY_COLUMNS: &str = "owner_id, owner_name, owner_cnic, owner_wallet, owner_email, \
     start_date, end_date, transfer_type, transfer_id, is_current_owner";

impl Database {
    pub fn get_history(&self, vehicle_id: VehicleId) -> Result<OwnershipHistory> {
        get_history(self.conn(), vehicle_id)
    }

    pub fn get_history_by_chassis(&self, chassis_number: &str) -> Result<OwnershipHistory> {
        let vehicle_id = self
            .conn()
            .query_row(
                "SELECT vehicle_id FROM ownership_histories WHERE chassis_number = ?1",
                params![chassis_number.trim()],
                |row| columns::uuid(row, 0),
            )
            .map(VehicleId)
            .map_err(StoreError::from_query)?;
        get_history(self.conn(), vehicle_id)
    }
}

pub(crate) fn get_history(conn: &Connection, vehicle_id: VehicleId) -> Result<OwnershipHistory> {
    let (chassis_number, total_transfers, created_at, updated_at) = conn
        .query_row(
            "SELECT chassis_number, total_transfers, created_at, updated_at
             FROM ownership_histories WHERE vehicle_id = ?1",
            params![vehicle_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    columns::timestamp(row, 2)?,
                    columns::timestamp(row, 3)?,
                ))
            },
        )
        .map_err(StoreError::from_query)?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM ownership_entries
         WHERE vehicle_id = ?1
         ORDER BY seq ASC"
    ))?;
    let entries = stmt
        .query_map(params![vehicle_id.to_string()], row_to_entry)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(OwnershipHistory {
        vehicle_id,
        chassis_number,
        entries,
        total_transfers,
        created_at,
        updated_at,
    })
}

/// Record `transfer` in the vehicle's history. `vehicle` is the record as it
/// was before the owner changed.
pub(crate) fn append_transfer(
    conn: &Connection,
    vehicle: &Vehicle,
    transfer: &OwnershipTransfer,
) -> Result<()> {
    let vid = vehicle.id.to_string();
    let now = chrono::Utc::now().to_rfc3339();

    let exists = conn
        .query_row(
            "SELECT 1 FROM ownership_histories WHERE vehicle_id = ?1",
            params![vid],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    if !exists {
        conn.execute(
            "INSERT INTO ownership_histories
                 (vehicle_id, chassis_number, total_transfers, created_at, updated_at)
             VALUES (?1, ?2, 0, ?3, ?3)",
            params![vid, vehicle.chassis_number, now],
        )?;
        let opening = OwnershipEntry::open(
            &transfer.from_owner,
            vehicle.registration_start(),
            TransferType::Registration,
            None,
        );
        insert_entry(conn, vehicle.id, 0, &opening)?;
        tracing::debug!(vehicle_id = %vehicle.id, "ownership history created");
    }

    let already_applied = conn
        .query_row(
            "SELECT 1 FROM ownership_entries WHERE vehicle_id = ?1 AND transfer_id = ?2",
            params![vid, transfer.transfer_id.to_string()],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if already_applied {
        tracing::debug!(transfer_id = %transfer.transfer_id, "transfer already in history");
        return Ok(());
    }

    let transfer_date = transfer.transfer_date.to_rfc3339();
    conn.execute(
        "UPDATE ownership_entries
         SET end_date = ?1, is_current_owner = 0
         WHERE vehicle_id = ?2 AND is_current_owner = 1",
        params![transfer_date, vid],
    )?;

    let next_seq: i64 = conn.query_row(
        "SELECT COALESCE(MAX(seq), -1) + 1 FROM ownership_entries WHERE vehicle_id = ?1",
        params![vid],
        |row| row.get(0),
    )?;
    let entry = OwnershipEntry::open(
        &transfer.to_owner,
        transfer.transfer_date,
        TransferType::Transfer,
        Some(transfer.transfer_id),
    );
    insert_entry(conn, vehicle.id, next_seq, &entry)?;

    conn.execute(
        "UPDATE ownership_histories
         SET total_transfers = (
                 SELECT COUNT(*) FROM ownership_entries
                 WHERE vehicle_id = ?1 AND transfer_type = ?2
             ),
             updated_at = ?3
         WHERE vehicle_id = ?1",
        params![vid, TransferType::Transfer.as_str(), now],
    )?;

    Ok(())
}

fn insert_entry(
    conn: &Connection,
    vehicle_id: VehicleId,
    seq: i64,
    entry: &OwnershipEntry,
) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO ownership_entries (vehicle_id, seq, {ENTRY_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            vehicle_id.to_string(),
            seq,
            entry.owner_id.to_string(),
            entry.owner_name,
            entry.owner_cnic,
            entry.owner_wallet,
            entry.owner_email,
            entry.start_date.to_rfc3339(),
            columns::opt_ts_text(entry.end_date),
            entry.transfer_type.as_str(),
            entry.transfer_id.map(|t| t.to_string()),
            entry.is_current_owner as i32,
        ],
    )?;
    Ok(())
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<OwnershipEntry> {
    Ok(OwnershipEntry {
        owner_id: UserId(columns::uuid(row, 0)?),
        owner_name: row.get(1)?,
        owner_cnic: row.get(2)?,
        owner_wallet: row.get(3)?,
        owner_email: row.get(4)?,
        start_date: columns::timestamp(row, 5)?,
        end_date: columns::opt_timestamp(row, 6)?,
        transfer_type: columns::parsed(row, 7)?,
        transfer_id: columns::opt_uuid(row, 8)?.map(TransferId),
        is_current_owner: columns::flag(row, 9)?,
    })
}
