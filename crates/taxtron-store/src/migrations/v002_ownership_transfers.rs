use rusqlite::Connection;

// Owner columns are snapshots taken at initiation, deliberately not FKs.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS ownership_transfers (
    transfer_id        TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    vehicle_id         TEXT NOT NULL,               -- FK -> vehicles(id)
    chassis_number     TEXT NOT NULL,

    from_user_id       TEXT NOT NULL,
    from_name          TEXT NOT NULL,
    from_cnic          TEXT NOT NULL,
    from_wallet        TEXT NOT NULL,
    from_email         TEXT NOT NULL,

    to_user_id         TEXT NOT NULL,
    to_name            TEXT NOT NULL,
    to_cnic            TEXT NOT NULL,
    to_wallet          TEXT NOT NULL,
    to_email           TEXT NOT NULL,

    transfer_fee       INTEGER NOT NULL DEFAULT 5000,
    status             TEXT NOT NULL DEFAULT 'pending_admin_approval',
    blockchain_tx_hash TEXT,
    transfer_deed      TEXT,
    rejection_reason   TEXT,
    admin_notes        TEXT,
    initiated_by       TEXT NOT NULL,
    transfer_date      TEXT NOT NULL,
    approved_at        TEXT,
    rejected_at        TEXT,
    cancelled_at       TEXT,
    completed_at       TEXT,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,

    FOREIGN KEY (vehicle_id) REFERENCES vehicles(id)
);

CREATE INDEX IF NOT EXISTS idx_transfers_status ON ownership_transfers(status, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_transfers_from ON ownership_transfers(from_user_id);
CREATE INDEX IF NOT EXISTS idx_transfers_to ON ownership_transfers(to_user_id);

-- At most one live transfer per vehicle.
CREATE UNIQUE INDEX IF NOT EXISTS idx_transfers_one_active_per_vehicle
    ON ownership_transfers(vehicle_id)
    WHERE status IN ('pending_admin_approval', 'approved');
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
