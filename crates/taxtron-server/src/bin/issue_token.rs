//! Print a bearer session token for local testing.
//!
//! ```text
//! TOKEN_SIGNING_KEY=<64 hex> issue-token <user|admin> <subject-uuid> [hours]
//! ```

use anyhow::{bail, Context};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use taxtron_shared::constants::{ADMIN_SESSION_HOURS, USER_SESSION_HOURS};
use taxtron_shared::session::{create_session_token, signing_key_from_hex, Role};

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (role, subject) = match args.as_slice() {
        [role, subject, ..] => (role.as_str(), subject.as_str()),
        _ => bail!("usage: issue-token <user|admin> <subject-uuid> [hours]"),
    };

    let role = match role {
        "user" => Role::User,
        "admin" => Role::Admin,
        other => bail!("unknown role {other:?}, expected user or admin"),
    };
    let subject = Uuid::parse_str(subject).context("subject must be a UUID")?;
    let hours = match args.get(2) {
        Some(h) => h.parse::<i64>().context("hours must be an integer")?,
        None if role == Role::Admin => ADMIN_SESSION_HOURS,
        None => USER_SESSION_HOURS,
    };

    let hex_key = std::env::var("TOKEN_SIGNING_KEY").context("TOKEN_SIGNING_KEY is not set")?;
    let key = signing_key_from_hex(&hex_key)?;

    let token = create_session_token(subject, role, expiry_after(Utc::now(), hours)?, &key);
    println!("{}", token.encode());
    Ok(())
}

fn expiry_after(now: DateTime<Utc>, hours: i64) -> anyhow::Result<DateTime<Utc>> {
    Duration::try_hours(hours)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .with_context(|| format!("{hours} hours is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_adds_hours() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, 8).unwrap(), now + Duration::hours(8));
    }

    #[test]
    fn huge_hour_counts_are_errors() {
        let now = Utc::now();
        assert!(expiry_after(now, i64::MAX).is_err());
        assert!(expiry_after(now, 9_000_000_000_000).is_err());
        assert!(expiry_after(now, -i64::MAX / 4).is_err());
    }
}
