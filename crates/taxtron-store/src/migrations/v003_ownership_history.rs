use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS ownership_histories (
    vehicle_id      TEXT PRIMARY KEY NOT NULL,     -- FK -> vehicles(id)
    chassis_number  TEXT NOT NULL COLLATE NOCASE,
    total_transfers INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,

    FOREIGN KEY (vehicle_id) REFERENCES vehicles(id)
);

CREATE INDEX IF NOT EXISTS idx_histories_chassis ON ownership_histories(chassis_number);

CREATE TABLE IF NOT EXISTS ownership_entries (
    vehicle_id       TEXT NOT NULL,               -- FK -> ownership_histories(vehicle_id)
    seq              INTEGER NOT NULL,            -- 0-based position in the timeline
    owner_id         TEXT NOT NULL,
    owner_name       TEXT NOT NULL,
    owner_cnic       TEXT NOT NULL,
    owner_wallet     TEXT NOT NULL,
    owner_email      TEXT NOT NULL,
    start_date       TEXT NOT NULL,
    end_date         TEXT,                        -- NULL while current
    transfer_type    TEXT NOT NULL,               -- registration | transfer
    transfer_id      TEXT,
    is_current_owner INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1

    PRIMARY KEY (vehicle_id, seq),
    FOREIGN KEY (vehicle_id) REFERENCES ownership_histories(vehicle_id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_one_current
    ON ownership_entries(vehicle_id)
    WHERE is_current_owner = 1;

-- Makes the history append idempotent per transfer.
CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_transfer
    ON ownership_entries(vehicle_id, transfer_id)
    WHERE transfer_id IS NOT NULL;
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
