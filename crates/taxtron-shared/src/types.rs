use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseEnumError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a registered user (vehicle owner or recipient).
    UserId
);

uuid_id!(
    /// Identifier of a vehicle's registration case (the inspection record).
    VehicleId
);

uuid_id!(
    /// Identifier of one ownership transfer request.
    TransferId
);

/// Defines a string-backed enum with `as_str`, `Display` and `FromStr`
/// that agree with its serde representation.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseEnumError {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum!(
    /// Inspection outcome of a vehicle registration case.
    VehicleStatus {
        Pending => "Pending",
        Approved => "Approved",
        Rejected => "Rejected",
    }
);

string_enum!(
    VehicleType {
        Car => "Car",
        Motorcycle => "Motorcycle",
        Truck => "Truck",
        Bus => "Bus",
        Other => "Other",
    }
);

string_enum!(
    /// State of an ownership transfer.
    ///
    /// ```text
    /// pending_admin_approval -> approved | rejected | cancelled
    /// approved               -> completed | cancelled
    /// ```
    TransferStatus {
        PendingAdminApproval => "pending_admin_approval",
        Approved => "approved",
        Rejected => "rejected",
        Cancelled => "cancelled",
        Completed => "completed",
    }
);

string_enum!(
    /// How an owner came to hold a vehicle.
    TransferType {
        Registration => "registration",
        Transfer => "transfer",
    }
);

impl TransferStatus {
    /// Statuses that block a new transfer from being initiated for the
    /// same vehicle.
    pub const ACTIVE: [TransferStatus; 2] =
        [TransferStatus::PendingAdminApproval, TransferStatus::Approved];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled | Self::Completed)
    }

    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        use TransferStatus::*;
        matches!(
            (self, next),
            (PendingAdminApproval, Approved)
                | (PendingAdminApproval, Rejected)
                | (PendingAdminApproval, Cancelled)
                | (Approved, Cancelled)
                | (Approved, Completed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_status_serde_matches_as_str() {
        for status in [
            TransferStatus::PendingAdminApproval,
            TransferStatus::Approved,
            TransferStatus::Rejected,
            TransferStatus::Cancelled,
            TransferStatus::Completed,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<TransferStatus>().unwrap(), status);
        }
    }

    #[test]
    fn complete_only_reachable_from_approved() {
        use TransferStatus::*;
        for from in [PendingAdminApproval, Rejected, Cancelled, Completed] {
            assert!(!from.can_transition_to(Completed), "{from} -> completed");
        }
        assert!(Approved.can_transition_to(Completed));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        use TransferStatus::*;
        let all = [PendingAdminApproval, Approved, Rejected, Cancelled, Completed];
        for from in [Rejected, Cancelled, Completed] {
            assert!(from.is_terminal());
            assert!(all.iter().all(|to| !from.can_transition_to(*to)));
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = "archived".parse::<TransferStatus>().unwrap_err();
        assert_eq!(err.kind, "TransferStatus");
    }

    #[test]
    fn ids_parse_with_whitespace() {
        let id = VehicleId::new();
        let parsed = VehicleId::parse(&format!("  {id} ")).unwrap();
        assert_eq!(parsed, id);
        assert!(UserId::parse("not-a-uuid").is_err());
    }
}
