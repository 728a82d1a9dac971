// 🔑 Registration Entity - time-limited keys mailed to account owners
//
// A key is issued when an account is created (activation), when it is
// deleted (the key reactivates it) and when a password reset is asked.

use crate::entities::user;
use crate::error::{Result, TrackerError};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationKind {
    Creation,
    Deletion,
    PasswordReset,
}

impl RegistrationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationKind::Creation => "creation",
            RegistrationKind::Deletion => "deletion",
            RegistrationKind::PasswordReset => "password_reset",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "creation" => Some(RegistrationKind::Creation),
            "deletion" => Some(RegistrationKind::Deletion),
            "password_reset" => Some(RegistrationKind::PasswordReset),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub id: i64,
    pub user_id: i64,
    pub key: String,
    pub kind: RegistrationKind,
    pub created: DateTime<Utc>,
}

impl Registration {
    /// Valid while no more than `validity_days` whole days have elapsed
    pub fn is_valid(&self, now: DateTime<Utc>, validity_days: i64) -> bool {
        (now - self.created).num_days() <= validity_days
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let kind: String = row.get(3)?;
        let kind = RegistrationKind::parse(&kind).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown registration kind {:?}", kind).into(),
            )
        })?;

        Ok(Registration {
            id: row.get(0)?,
            user_id: row.get(1)?,
            key: row.get(2)?,
            kind,
            created: row.get(4)?,
        })
    }
}

/// 40 hex characters from 20 random bytes
pub fn generate_key() -> String {
    let bytes: [u8; 20] = rand::random();
    hex::encode(bytes)
}

pub fn create(conn: &Connection, user_id: i64, kind: RegistrationKind) -> Result<Registration> {
    let key = generate_key();
    conn.execute(
        "INSERT INTO registrations (user_id, key, kind, created) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, key, kind.as_str(), Utc::now()],
    )?;
    find_by_key(conn, &key)?.ok_or(TrackerError::NotFound("Registration"))
}

pub fn find_by_key(conn: &Connection, key: &str) -> Result<Option<Registration>> {
    Ok(conn
        .query_row(
            "SELECT id, user_id, key, kind, created FROM registrations WHERE key = ?1",
            [key],
            Registration::from_row,
        )
        .optional()?)
}

pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM registrations WHERE id = ?1", [id])?;
    Ok(())
}

/// Activate the account behind an activation or reactivation key.
///
/// The registration is consumed in every case. Returns the activated
/// user id, or `None` when the key has expired. Unknown keys and
/// password-reset keys are `NotFound`.
pub fn activate_user(
    conn: &Connection,
    key: &str,
    now: DateTime<Utc>,
    validity_days: i64,
) -> Result<Option<i64>> {
    let registration = find_by_key(conn, key)?
        .filter(|r| r.kind != RegistrationKind::PasswordReset)
        .ok_or(TrackerError::NotFound("Registration"))?;

    let activated = if registration.is_valid(now, validity_days) {
        user::set_active(conn, registration.user_id, true)?;
        Some(registration.user_id)
    } else {
        None
    };

    delete(conn, registration.id)?;
    Ok(activated)
}

/// Delete registrations older than the validity window
pub fn delete_expired(conn: &Connection, now: DateTime<Utc>, validity_days: i64) -> Result<usize> {
    let cutoff = now - Duration::days(validity_days + 1);
    let deleted = conn.execute("DELETE FROM registrations WHERE created <= ?1", [cutoff])?;
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn inactive_user(conn: &Connection) -> i64 {
        user::create(
            conn,
            &user::NewUser {
                username: "test",
                email: "test@example.com",
                first_name: "",
                last_name: "",
                password_hash: "x",
                is_active: false,
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn test_key_format() {
        let key = generate_key();
        assert_eq!(key.len(), 40);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_key());
    }

    #[test]
    fn test_activation_consumes_key() {
        let conn = open_in_memory().unwrap();
        let user_id = inactive_user(&conn);
        let reg = create(&conn, user_id, RegistrationKind::Creation).unwrap();

        let activated = activate_user(&conn, &reg.key, Utc::now(), 30).unwrap();
        assert_eq!(activated, Some(user_id));
        assert!(user::get(&conn, user_id).unwrap().is_active);

        assert!(matches!(
            activate_user(&conn, &reg.key, Utc::now(), 30),
            Err(TrackerError::NotFound(_))
        ));
    }

    #[test]
    fn test_expired_activation() {
        let conn = open_in_memory().unwrap();
        let user_id = inactive_user(&conn);
        let reg = create(&conn, user_id, RegistrationKind::Creation).unwrap();

        let later = reg.created + Duration::days(31);
        assert_eq!(activate_user(&conn, &reg.key, later, 30).unwrap(), None);
        assert!(!user::get(&conn, user_id).unwrap().is_active);
        assert!(find_by_key(&conn, &reg.key).unwrap().is_none());
    }

    #[test]
    fn test_validity_boundary() {
        let conn = open_in_memory().unwrap();
        let user_id = inactive_user(&conn);
        let reg = create(&conn, user_id, RegistrationKind::Deletion).unwrap();

        assert!(reg.is_valid(reg.created + Duration::days(30), 30));
        assert!(!reg.is_valid(reg.created + Duration::days(31), 30));
    }

    #[test]
    fn test_delete_expired() {
        let conn = open_in_memory().unwrap();
        let user_id = inactive_user(&conn);
        let fresh = create(&conn, user_id, RegistrationKind::Creation).unwrap();
        let old = create(&conn, user_id, RegistrationKind::Creation).unwrap();
        conn.execute(
            "UPDATE registrations SET created = ?1 WHERE id = ?2",
            params![Utc::now() - Duration::days(40), old.id],
        )
        .unwrap();

        assert_eq!(delete_expired(&conn, Utc::now(), 30).unwrap(), 1);
        assert!(find_by_key(&conn, &fresh.key).unwrap().is_some());
        assert!(find_by_key(&conn, &old.key).unwrap().is_none());
    }
}
