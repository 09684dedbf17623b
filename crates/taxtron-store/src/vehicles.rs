//! CRUD operations for [`Vehicle`] (inspection) records.

use rusqlite::{params, Connection, OptionalExtension};

use taxtron_shared::{UserId, VehicleId, VehicleStatus};

use crate::columns;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Vehicle;

const VEHICLE_COLUMNS: &str = "id, inspection_id, chassis_number, engine_number, make, model, \
     year, color, vehicle_type, status, registration_number, is_paid, tax_paid, user_id, \
     registered_at, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn insert_vehicle(&self, vehicle: &Vehicle) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO vehicles (id, inspection_id, chassis_number, engine_number, make,
                     model, year, color, vehicle_type, status, registration_number, is_paid,
                     tax_paid, user_id, registered_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    vehicle.id.to_string(),
                    vehicle.inspection_id,
                    vehicle.chassis_number.trim(),
                    vehicle.engine_number,
                    vehicle.make,
                    vehicle.model,
                    vehicle.year,
                    vehicle.color,
                    vehicle.vehicle_type.as_str(),
                    vehicle.status.as_str(),
                    vehicle.registration_number,
                    vehicle.is_paid as i32,
                    vehicle.tax_paid as i32,
                    vehicle.user_id.to_string(),
                    columns::opt_ts_text(vehicle.registered_at),
                    vehicle.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::from_insert(e, "chassis number or inspection already registered"))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_vehicle(&self, id: VehicleId) -> Result<Vehicle> {
        get_vehicle(self.conn(), id)
    }

    /// Like [`Database::get_vehicle`] but a missing vehicle is `Ok(None)`.
    pub fn find_vehicle(&self, id: VehicleId) -> Result<Option<Vehicle>> {
        try_get_vehicle(self.conn(), id)
    }

    /// Chassis lookup restricted to vehicles with the given inspection
    /// status. Case-insensitive.
    pub fn find_vehicle_by_chassis_with_status(
        &self,
        chassis_number: &str,
        status: VehicleStatus,
    ) -> Result<Vehicle> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {VEHICLE_COLUMNS} FROM vehicles
                     WHERE chassis_number = ?1 AND status = ?2"
                ),
                params![chassis_number.trim(), status.as_str()],
                row_to_vehicle,
            )
            .map_err(StoreError::from_query)
    }
}

pub(crate) fn get_vehicle(conn: &Connection, id: VehicleId) -> Result<Vehicle> {
    conn.query_row(
        &format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = ?1"),
        params![id.to_string()],
        row_to_vehicle,
    )
    .map_err(StoreError::from_query)
}

pub(crate) fn try_get_vehicle(conn: &Connection, id: VehicleId) -> Result<Option<Vehicle>> {
    conn.query_row(
        &format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = ?1"),
        params![id.to_string()],
        row_to_vehicle,
    )
    .optional()
    .map_err(StoreError::Sqlite)
}

/// Moves the vehicle from `from` to `to`. Returns `false` when the vehicle
/// is gone or no longer owned by `from`.
pub(crate) fn reassign_owner(
    conn: &Connection,
    id: VehicleId,
    from: UserId,
    to: UserId,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE vehicles SET user_id = ?1 WHERE id = ?2 AND user_id = ?3",
        params![to.to_string(), id.to_string(), from.to_string()],
    )?;
    Ok(affected > 0)
}

fn row_to_vehicle(row: &rusqlite::Row<'_>) -> rusqlite::Result<Vehicle> {
    Ok(Vehicle {
        id: VehicleId(columns::uuid(row, 0)?),
        inspection_id: row.get(1)?,
        chassis_number: row.get(2)?,
        engine_number: row.get(3)?,
        make: row.get(4)?,
        model: row.get(5)?,
        year: row.get(6)?,
        color: row.get(7)?,
        vehicle_type: columns::parsed(row, 8)?,
        status: columns::parsed(row, 9)?,
        registration_number: row.get(10)?,
        is_paid: columns::flag(row, 11)?,
        tax_paid: columns::flag(row, 12)?,
        user_id: UserId(columns::uuid(row, 13)?),
        registered_at: columns::opt_timestamp(row, 14)?,
        created_at: columns::timestamp(row, 15)?,
    })
}
