//! v001 -- Initial schema creation.
//!
//! Creates the collaborator tables the transfer workflow reads:
//! `users` and `vehicles` (the inspection / registration case).

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id             TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    name           TEXT NOT NULL,
    cnic           TEXT NOT NULL UNIQUE,          -- canonical DDDDD-DDDDDDD-D
    wallet_address TEXT NOT NULL UNIQUE COLLATE NOCASE,
    email          TEXT NOT NULL,
    created_at     TEXT NOT NULL                  -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Vehicles (inspection records)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS vehicles (
    id                  TEXT PRIMARY KEY NOT NULL,            -- UUID v4
    inspection_id       TEXT NOT NULL UNIQUE,
    chassis_number      TEXT NOT NULL UNIQUE COLLATE NOCASE,
    engine_number       TEXT NOT NULL,
    make                TEXT NOT NULL,
    model               TEXT NOT NULL,
    year                INTEGER NOT NULL,
    color               TEXT NOT NULL,
    vehicle_type        TEXT NOT NULL DEFAULT 'Other',
    status              TEXT NOT NULL DEFAULT 'Pending',      -- Pending | Approved | Rejected
    registration_number TEXT,
    is_paid             INTEGER NOT NULL DEFAULT 0,           -- registration fee, boolean 0/1
    tax_paid            INTEGER NOT NULL DEFAULT 0,           -- annual tax, boolean 0/1
    user_id             TEXT NOT NULL,                        -- current owner, FK -> users(id)
    registered_at       TEXT,
    created_at          TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_vehicles_user_id ON vehicles(user_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
