//! CRUD operations for [`User`] records.
//!
//! The transfer workflow only reads users; inserts exist for seeding.

use rusqlite::params;

use taxtron_shared::{Cnic, UserId};

use crate::columns;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;

const USER_COLUMNS: &str = "id, name, cnic, wallet_address, email, created_at";

impl Database {
    pub fn insert_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, name, cnic, wallet_address, email, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.id.to_string(),
                    user.name,
                    user.cnic.as_str(),
                    user.wallet_address,
                    user.email,
                    user.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::from_insert(e, "CNIC or wallet address already registered"))?;
        Ok(())
    }

    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .map_err(StoreError::from_query)
    }

    pub fn find_user_by_cnic(&self, cnic: &Cnic) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE cnic = ?1"),
                params![cnic.as_str()],
                row_to_user,
            )
            .map_err(StoreError::from_query)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(columns::uuid(row, 0)?),
        name: row.get(1)?,
        cnic: columns::parsed::<Cnic>(row, 2)?,
        wallet_address: row.get(3)?,
        email: row.get(4)?,
        created_at: columns::timestamp(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::user;

    #[test]
    fn lookup_by_id_and_cnic() {
        let db = Database::open_in_memory().unwrap();
        let alice = user("Alice", "35202-1234567-8", "0xAAA1");
        db.insert_user(&alice).unwrap();

        assert_eq!(db.get_user(alice.id).unwrap(), alice);
        let cnic = Cnic::parse("3520212345678").unwrap();
        assert_eq!(db.find_user_by_cnic(&cnic).unwrap().id, alice.id);
    }

    #[test]
    fn duplicate_cnic_is_a_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.insert_user(&user("Alice", "35202-1234567-8", "0x1")).unwrap();
        let err = db
            .insert_user(&user("Mallory", "3520212345678", "0x2"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn missing_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.get_user(UserId::new()), Err(StoreError::NotFound)));
    }
}
