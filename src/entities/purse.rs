// 👛 Purse Entity - a pool of expenditures shared by one or more accounts

use crate::error::{Result, TrackerError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Purse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created: DateTime<Utc>,
}

impl Purse {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Purse {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            created: row.get(3)?,
        })
    }
}

/// Create a purse; `owner_id` becomes its first member
pub fn create(conn: &Connection, name: &str, description: &str, owner_id: i64) -> Result<Purse> {
    conn.execute(
        "INSERT INTO purses (name, description, created) VALUES (?1, ?2, ?3)",
        params![name, description, Utc::now()],
    )?;
    let id = conn.last_insert_rowid();
    add_member(conn, id, owner_id)?;
    get(conn, id)
}

pub fn get(conn: &Connection, id: i64) -> Result<Purse> {
    conn.query_row(
        "SELECT id, name, description, created FROM purses WHERE id = ?1",
        [id],
        Purse::from_row,
    )
    .optional()?
    .ok_or(TrackerError::NotFound("Purse"))
}

pub fn update(conn: &Connection, id: i64, name: &str, description: &str) -> Result<Purse> {
    let changed = conn.execute(
        "UPDATE purses SET name = ?1, description = ?2 WHERE id = ?3",
        params![name, description, id],
    )?;
    if changed == 0 {
        return Err(TrackerError::NotFound("Purse"));
    }
    get(conn, id)
}

/// Delete a purse with its expenditures and tags.
///
/// Members using it as default purse fall back to none.
pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM purses WHERE id = ?1", [id])?;
    Ok(())
}

// ============================================================================
// MEMBERSHIP
// ============================================================================

/// Returns false when the account was already a member
pub fn add_member(conn: &Connection, purse_id: i64, user_id: i64) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO purse_users (purse_id, user_id) VALUES (?1, ?2)",
        params![purse_id, user_id],
    )?;
    Ok(inserted > 0)
}

pub fn remove_member(conn: &Connection, purse_id: i64, user_id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM purse_users WHERE purse_id = ?1 AND user_id = ?2",
        params![purse_id, user_id],
    )?;
    Ok(())
}

pub fn is_member(conn: &Connection, purse_id: i64, user_id: i64) -> Result<bool> {
    let member: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM purse_users WHERE purse_id = ?1 AND user_id = ?2)",
        params![purse_id, user_id],
        |row| row.get(0),
    )?;
    Ok(member)
}

pub fn member_count(conn: &Connection, purse_id: i64) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM purse_users WHERE purse_id = ?1",
        [purse_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Comma separated display names of the members, sorted
pub fn usernames(conn: &Connection, purse_id: i64) -> Result<String> {
    let mut stmt = conn.prepare(
        "SELECT CASE WHEN u.first_name = '' THEN u.username ELSE u.first_name END
         FROM users u JOIN purse_users pu ON pu.user_id = u.id
         WHERE pu.purse_id = ?1",
    )?;
    let mut names = stmt
        .query_map([purse_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    names.sort();
    Ok(names.join(", "))
}

pub fn count_for_user(conn: &Connection, user_id: i64) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM purse_users WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Purses of an account ordered by name, newest first on ties
pub fn list_for_user(
    conn: &Connection,
    user_id: i64,
    limit: usize,
    offset: usize,
) -> Result<Vec<Purse>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.name, p.description, p.created
         FROM purses p JOIN purse_users pu ON pu.purse_id = p.id
         WHERE pu.user_id = ?1
         ORDER BY p.name ASC, p.created DESC
         LIMIT ?2 OFFSET ?3",
    )?;
    let purses = stmt
        .query_map(params![user_id, limit as i64, offset as i64], Purse::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(purses)
}

pub fn all_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Purse>> {
    list_for_user(conn, user_id, i64::MAX as usize, 0)
}
