// 👤 User Entity - accounts owning and sharing purses

use crate::error::{Result, TrackerError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

// ============================================================================
// USER ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,

    /// `pbkdf2_sha256$...` hash, never serialized
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Inactive accounts cannot log in (pending activation or deleted)
    pub is_active: bool,

    /// Purse used when no purse is given explicitly
    pub default_purse_id: Option<i64>,

    pub date_joined: DateTime<Utc>,
}

impl User {
    /// Name shown to other purse members: first name, else username
    pub fn display_name(&self) -> &str {
        if self.first_name.is_empty() {
            &self.username
        } else {
            &self.first_name
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
            password_hash: row.get(5)?,
            is_active: row.get(6)?,
            default_purse_id: row.get(7)?,
            date_joined: row.get(8)?,
        })
    }
}

/// Fields of a new account
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password_hash: &'a str,
    pub is_active: bool,
}

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, password_hash,
                            is_active, default_purse_id, date_joined";

// ============================================================================
// PERSISTENCE
// ============================================================================

pub fn create(conn: &Connection, new: &NewUser<'_>) -> Result<User> {
    conn.execute(
        "INSERT INTO users (username, email, first_name, last_name, password_hash,
                            is_active, date_joined)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            new.username,
            new.email,
            new.first_name,
            new.last_name,
            new.password_hash,
            new.is_active,
            Utc::now(),
        ],
    )?;

    get(conn, conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> Result<User> {
    find(conn, id)?.ok_or(TrackerError::NotFound("User"))
}

pub fn find(conn: &Connection, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    Ok(conn.query_row(&sql, [id], User::from_row).optional()?)
}

pub fn find_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
    Ok(conn.query_row(&sql, [username], User::from_row).optional()?)
}

/// Active accounts registered with this address (password reset)
pub fn find_active_by_email(conn: &Connection, email: &str) -> Result<Vec<User>> {
    let sql = format!(
        "SELECT {} FROM users WHERE is_active = 1 AND email <> '' AND fold_case(email) = fold_case(?1)",
        USER_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let users = stmt
        .query_map([email], User::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn username_exists(conn: &Connection, username: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        [username],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn update_profile(
    conn: &Connection,
    id: i64,
    first_name: &str,
    last_name: &str,
    email: &str,
    default_purse_id: Option<i64>,
) -> Result<User> {
    conn.execute(
        "UPDATE users SET first_name = ?1, last_name = ?2, email = ?3, default_purse_id = ?4
         WHERE id = ?5",
        params![first_name, last_name, email, default_purse_id, id],
    )?;
    get(conn, id)
}

pub fn set_password_hash(conn: &Connection, id: i64, password_hash: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![password_hash, id],
    )?;
    Ok(())
}

pub fn set_active(conn: &Connection, id: i64, active: bool) -> Result<()> {
    conn.execute(
        "UPDATE users SET is_active = ?1 WHERE id = ?2",
        params![active, id],
    )?;
    Ok(())
}

pub fn set_default_purse(conn: &Connection, id: i64, purse_id: Option<i64>) -> Result<()> {
    conn.execute(
        "UPDATE users SET default_purse_id = ?1 WHERE id = ?2",
        params![purse_id, id],
    )?;
    Ok(())
}

/// Delete inactive accounts that have no pending registration left.
///
/// Returns the number of deleted accounts.
pub fn delete_inactive_without_registration(conn: &Connection) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM users
         WHERE is_active = 0
           AND NOT EXISTS (SELECT 1 FROM registrations r WHERE r.user_id = users.id)",
        [],
    )?;
    Ok(deleted)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn new_user<'a>(username: &'a str, active: bool) -> NewUser<'a> {
        NewUser {
            username,
            email: "someone@example.com",
            first_name: "",
            last_name: "",
            password_hash: "x",
            is_active: active,
        }
    }

    #[test]
    fn test_create_and_find() {
        let conn = open_in_memory().unwrap();
        let user = create(&conn, &new_user("alice", true)).unwrap();

        assert!(user.is_active);
        assert_eq!(user.default_purse_id, None);

        let found = find_by_username(&conn, "alice").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(username_exists(&conn, "alice").unwrap());
        assert!(!username_exists(&conn, "bob").unwrap());
    }

    #[test]
    fn test_duplicate_username_rejected_by_store() {
        let conn = open_in_memory().unwrap();
        create(&conn, &new_user("alice", true)).unwrap();
        assert!(create(&conn, &new_user("alice", true)).is_err());
    }

    #[test]
    fn test_display_name_prefers_first_name() {
        let conn = open_in_memory().unwrap();
        let user = create(&conn, &new_user("alice", true)).unwrap();
        assert_eq!(user.display_name(), "alice");

        let user = update_profile(&conn, user.id, "Alice", "Liddell", "a@b.c", None).unwrap();
        assert_eq!(user.display_name(), "Alice");
    }

    #[test]
    fn test_cleanup_keeps_pending_registrations() {
        let conn = open_in_memory().unwrap();
        let pending = create(&conn, &new_user("pending", false)).unwrap();
        create(&conn, &new_user("orphan", false)).unwrap();
        create(&conn, &new_user("active", true)).unwrap();

        conn.execute(
            "INSERT INTO registrations (user_id, key, kind, created) VALUES (?1, 'k', 'creation', ?2)",
            params![pending.id, Utc::now()],
        )
        .unwrap();

        assert_eq!(delete_inactive_without_registration(&conn).unwrap(), 1);
        assert!(find_by_username(&conn, "orphan").unwrap().is_none());
        assert!(find_by_username(&conn, "pending").unwrap().is_some());
        assert!(find_by_username(&conn, "active").unwrap().is_some());
    }

    #[test]
    fn test_find_by_email_ignores_accented_case() {
        let conn = open_in_memory().unwrap();
        let user = create(&conn, &new_user("zoe", true)).unwrap();
        update_profile(&conn, user.id, "", "", "Zoé@example.com", None).unwrap();

        let found = find_active_by_email(&conn, "ZOÉ@EXAMPLE.COM").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "zoe");
    }
}
