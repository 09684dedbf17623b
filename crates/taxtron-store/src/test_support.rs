//! Fixtures for the store's unit tests.

use chrono::{Duration, Utc};

use taxtron_shared::{Cnic, UserId, VehicleId, VehicleStatus, VehicleType};

use crate::database::Database;
use crate::models::{User, Vehicle};

pub(crate) fn user(name: &str, cnic: &str, wallet: &str) -> User {
    User {
        id: UserId::new(),
        name: name.to_string(),
        cnic: Cnic::parse(cnic).unwrap(),
        wallet_address: wallet.to_string(),
        email: format!("{}@example.pk", name.to_lowercase()),
        created_at: Utc::now(),
    }
}

/// An approved, fully paid car.
pub(crate) fn vehicle(owner: UserId, chassis: &str) -> Vehicle {
    let id = VehicleId::new();
    Vehicle {
        id,
        inspection_id: format!("INS-{}", id.0.simple()),
        chassis_number: chassis.to_string(),
        engine_number: format!("ENG-{chassis}"),
        make: "Toyota".to_string(),
        model: "Corolla".to_string(),
        year: 2019,
        color: "White".to_string(),
        vehicle_type: VehicleType::Car,
        status: VehicleStatus::Approved,
        registration_number: Some("LEA-19-1234".to_string()),
        is_paid: true,
        tax_paid: true,
        user_id: owner,
        registered_at: Some(Utc::now() - Duration::days(400)),
        created_at: Utc::now() - Duration::days(410),
    }
}

pub(crate) struct Seeded {
    pub db: Database,
    pub alice: User,
    pub bob: User,
    pub carol: User,
    /// Chassis `ABC123`, owned by alice.
    pub vehicle: Vehicle,
}

pub(crate) fn seeded() -> Seeded {
    let db = Database::open_in_memory().unwrap();
    let alice = user("Alice", "35202-1234567-8", "0xA11CE");
    let bob = user("Bob", "11111-2222222-3", "0xB0B");
    let carol = user("Carol", "42101-7654321-9", "0xCA401");
    for u in [&alice, &bob, &carol] {
        db.insert_user(u).unwrap();
    }
    let vehicle = vehicle(alice.id, "ABC123");
    db.insert_vehicle(&vehicle).unwrap();

    Seeded {
        db,
        alice,
        bob,
        carol,
        vehicle,
    }
}
