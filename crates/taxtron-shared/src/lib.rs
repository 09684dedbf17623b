//! # taxtron-shared
//!
//! Types shared by the TaxTron store and server: typed identifiers, workflow
//! status enums, CNIC normalization, the vehicle category heuristic and
//! signed bearer session tokens.

pub mod classify;
pub mod cnic;
pub mod constants;
pub mod error;
pub mod session;
pub mod types;

pub use cnic::Cnic;
pub use error::{CnicError, ParseEnumError, TokenError};
pub use types::{TransferId, TransferStatus, TransferType, UserId, VehicleId, VehicleStatus, VehicleType};
