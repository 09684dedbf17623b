//! Startup seeding from a JSON file of users and vehicles.
//!
//! Registration and inspection live in other services; this is how a
//! standalone server gets the records the transfer workflow reads. Loading
//! is idempotent: a user whose CNIC or wallet is already registered, or a
//! vehicle whose chassis or inspection id is, is skipped.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use taxtron_shared::{Cnic, UserId, VehicleId, VehicleStatus, VehicleType};
use taxtron_store::{Database, StoreError, User, Vehicle};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("reading seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing seed file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("vehicle {chassis} names owner {cnic}, who is not registered")]
    UnknownOwner { chassis: String, cnic: Cnic },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedFile {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub vehicles: Vec<SeedVehicle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedUser {
    pub id: Option<UserId>,
    pub name: String,
    pub cnic: Cnic,
    pub wallet_address: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedVehicle {
    pub id: Option<VehicleId>,
    pub inspection_id: Option<String>,
    pub chassis_number: String,
    pub engine_number: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub color: String,
    #[serde(default = "other_type")]
    pub vehicle_type: VehicleType,
    #[serde(default = "approved")]
    pub status: VehicleStatus,
    pub registration_number: Option<String>,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub tax_paid: bool,
    /// CNIC of a user in this file or already in the database.
    pub owner_cnic: Cnic,
    pub registered_at: Option<DateTime<Utc>>,
}

fn other_type() -> VehicleType {
    VehicleType::Other
}

fn approved() -> VehicleStatus {
    VehicleStatus::Approved
}

/// How many records a load actually inserted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub vehicles: usize,
}

pub fn load_seed_file(db: &Database, path: &Path) -> Result<SeedReport, SeedError> {
    let raw = std::fs::read_to_string(path)?;
    let seed: SeedFile = serde_json::from_str(&raw)?;
    let report = apply_seed(db, seed)?;
    info!(
        path = %path.display(),
        users = report.users,
        vehicles = report.vehicles,
        "Seed file loaded"
    );
    Ok(report)
}

pub fn apply_seed(db: &Database, seed: SeedFile) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();
    let now = Utc::now();

    for u in seed.users {
        let user = User {
            id: u.id.unwrap_or_default(),
            name: u.name,
            cnic: u.cnic,
            wallet_address: u.wallet_address,
            email: u.email,
            created_at: now,
        };
        if inserted(db.insert_user(&user), "user", user.cnic.as_str())? {
            report.users += 1;
        }
    }

    for v in seed.vehicles {
        let owner = match db.find_user_by_cnic(&v.owner_cnic) {
            Ok(owner) => owner,
            Err(StoreError::NotFound) => {
                return Err(SeedError::UnknownOwner {
                    chassis: v.chassis_number,
                    cnic: v.owner_cnic,
                })
            }
            Err(e) => return Err(e.into()),
        };
        let id = v.id.unwrap_or_default();
        let vehicle = Vehicle {
            id,
            inspection_id: v
                .inspection_id
                .unwrap_or_else(|| format!("INS-{}", id.0.simple())),
            chassis_number: v.chassis_number,
            engine_number: v.engine_number,
            make: v.make,
            model: v.model,
            year: v.year,
            color: v.color,
            vehicle_type: v.vehicle_type,
            status: v.status,
            registration_number: v.registration_number,
            is_paid: v.is_paid,
            tax_paid: v.tax_paid,
            user_id: owner.id,
            registered_at: v.registered_at,
            created_at: now,
        };
        if inserted(db.insert_vehicle(&vehicle), "vehicle", &vehicle.chassis_number)? {
            report.vehicles += 1;
        }
    }

    Ok(report)
}

/// `Ok(false)` when the record was already there.
fn inserted(result: Result<(), StoreError>, kind: &str, key: &str) -> Result<bool, SeedError> {
    match result {
        Ok(()) => Ok(true),
        Err(StoreError::Conflict(reason)) => {
            debug!(kind, key, %reason, "seed record already present, skipping");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SEED: &str = r#"{
        "users": [
            { "name": "Alice", "cnic": "3520212345678", "walletAddress": "0xa11ce", "email": "alice@example.pk" },
            { "name": "Bob", "cnic": "11111-2222222-3", "walletAddress": "0xb0b", "email": "bob@example.pk" }
        ],
        "vehicles": [
            {
                "chassisNumber": "ABC123",
                "engineNumber": "ENG-1",
                "make": "Honda",
                "model": "CD 70",
                "year": 2020,
                "color": "Red",
                "registrationNumber": "LEB-20-1",
                "isPaid": true,
                "taxPaid": true,
                "ownerCnic": "35202-1234567-8"
            },
            {
                "chassisNumber": "PEND1",
                "engineNumber": "ENG-2",
                "make": "Suzuki",
                "model": "Mehran",
                "year": 2015,
                "color": "White",
                "status": "Pending",
                "ownerCnic": "11111-2222222-3"
            }
        ]
    }"#;

    fn seed_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SEED.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_users_and_vehicles() {
        let db = Database::open_in_memory().unwrap();
        let file = seed_file();

        let report = load_seed_file(&db, file.path()).unwrap();
        assert_eq!(report, SeedReport { users: 2, vehicles: 2 });

        let alice = db
            .find_user_by_cnic(&Cnic::parse("35202-1234567-8").unwrap())
            .unwrap();
        let bike = db
            .find_vehicle_by_chassis_with_status("ABC123", VehicleStatus::Approved)
            .unwrap();
        assert_eq!(bike.user_id, alice.id);
        assert_eq!(bike.vehicle_type, VehicleType::Other);
        assert!(bike.is_paid && bike.tax_paid);
        assert!(bike.inspection_id.starts_with("INS-"));

        let pending = db
            .find_vehicle_by_chassis_with_status("PEND1", VehicleStatus::Pending)
            .unwrap();
        assert!(!pending.is_paid);
    }

    #[test]
    fn loading_twice_inserts_nothing_new() {
        let db = Database::open_in_memory().unwrap();
        let file = seed_file();

        load_seed_file(&db, file.path()).unwrap();
        let again = load_seed_file(&db, file.path()).unwrap();
        assert_eq!(again, SeedReport::default());
    }

    #[test]
    fn vehicle_owner_must_exist() {
        let db = Database::open_in_memory().unwrap();
        let seed: SeedFile = serde_json::from_str(
            r#"{ "vehicles": [{
                "chassisNumber": "X1", "engineNumber": "E1", "make": "Toyota",
                "model": "Corolla", "year": 2019, "color": "Grey",
                "ownerCnic": "99999-9999999-9"
            }] }"#,
        )
        .unwrap();
        let err = apply_seed(&db, seed).unwrap_err();
        assert!(matches!(err, SeedError::UnknownOwner { .. }));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{ "users": [{ "name": "NoCnic" }] }"#).unwrap();
        assert!(matches!(
            load_seed_file(&db, file.path()),
            Err(SeedError::Parse(_))
        ));

        let missing = Path::new("/nonexistent/taxtron-seed.json");
        assert!(matches!(load_seed_file(&db, missing), Err(SeedError::Io(_))));
    }

    #[test]
    fn example_seed_file_loads() {
        let db = Database::open_in_memory().unwrap();
        let seed: SeedFile = serde_json::from_str(include_str!("../seed.example.json")).unwrap();
        let report = apply_seed(&db, seed).unwrap();
        assert_eq!(report, SeedReport { users: 2, vehicles: 2 });
    }

    #[tokio::test]
    async fn seeded_vehicle_can_be_transferred() {
        use crate::workflow::{InitiateRequest, TransferService};

        let db = Database::open_in_memory().unwrap();
        let seed: SeedFile = serde_json::from_str(SEED).unwrap();
        apply_seed(&db, seed).unwrap();
        let alice = db
            .find_user_by_cnic(&Cnic::parse("35202-1234567-8").unwrap())
            .unwrap();

        let service = TransferService::new(db, 5000);
        let found = service.search_vehicle("abc123", alice.id).await.unwrap();
        // "CD 70" is a motorcycle model
        assert_eq!(found.details.vehicle_type, VehicleType::Motorcycle);

        let t = service
            .initiate(
                InitiateRequest {
                    vehicle_id: found.vehicle_id,
                    recipient_cnic: "11111-2222222-3".into(),
                    transfer_fee: None,
                },
                alice.id,
            )
            .await
            .unwrap();
        assert_eq!(t.to_owner.cnic, "11111-2222222-3");
    }
}
