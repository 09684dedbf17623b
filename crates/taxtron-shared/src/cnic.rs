//! Pakistani national identity numbers (CNIC).
//!
//! Users type CNICs with or without dashes. Everything inside the system
//! works with the canonical `DDDDD-DDDDDDD-D` form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::CNIC_DIGITS;
use crate::error::CnicError;

/// A CNIC in canonical dashed form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cnic(String);

impl Cnic {
    /// Accepts `DDDDD-DDDDDDD-D` or 13 contiguous digits, surrounding
    /// whitespace ignored.
    pub fn parse(input: &str) -> Result<Self, CnicError> {
        let input = input.trim();
        let bytes = input.as_bytes();

        let digits: String = if is_dashed(bytes) {
            input.chars().filter(|c| *c != '-').collect()
        } else if bytes.len() == CNIC_DIGITS && bytes.iter().all(u8::is_ascii_digit) {
            input.to_string()
        } else {
            return Err(CnicError::InvalidFormat);
        };

        Ok(Self(format!(
            "{}-{}-{}",
            &digits[..5],
            &digits[5..12],
            &digits[12..]
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_dashed(bytes: &[u8]) -> bool {
    bytes.len() == 15
        && bytes.iter().enumerate().all(|(i, b)| match i {
            5 | 13 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

impl fmt::Display for Cnic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Cnic {
    type Err = CnicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Cnic {
    type Error = CnicError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Cnic> for String {
    fn from(cnic: Cnic) -> Self {
        cnic.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashed_and_plain_forms_agree() {
        let dashed = Cnic::parse("35202-1234567-8").unwrap();
        let plain = Cnic::parse("3520212345678").unwrap();
        assert_eq!(dashed, plain);
        assert_eq!(plain.as_str(), "35202-1234567-8");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["11111-2222222-3", "1111122222223", " 1111122222223 "] {
            let once = Cnic::parse(raw).unwrap();
            let twice = Cnic::parse(once.as_str()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn malformed_inputs_rejected() {
        for raw in [
            "",
            "123456789012",
            "12345678901234",
            "35202-1234567",
            "3520-21234567-8",
            "35202-12345a7-8",
            "ABCDE-FGHIJKL-M",
            "35202 1234567 8",
            "35202--234567-8",
        ] {
            assert_eq!(Cnic::parse(raw), Err(CnicError::InvalidFormat), "{raw:?}");
        }
    }

    #[test]
    fn deserializes_through_normalization() {
        let cnic: Cnic = serde_json::from_str("\"3520212345678\"").unwrap();
        assert_eq!(cnic.as_str(), "35202-1234567-8");
        assert!(serde_json::from_str::<Cnic>("\"bogus\"").is_err());
    }
}
