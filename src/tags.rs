// 🏷️ Tags - keywords extracted from expenditure descriptions
//
// Every non-generated expenditure is linked to one tag per keyword of its
// description. A tag's weight is the number of linked expenditures and the
// sum of their amounts.

use crate::entities::{expenditure, Expenditure};
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

// ============================================================================
// EXTRACTION
// ============================================================================

/// Split a description into lowercase tag names.
///
/// Words of `min_len` characters or fewer are dropped; `min_len == 0`
/// keeps every word.
pub fn tag_names(description: &str, min_len: usize) -> Vec<String> {
    description
        .split_whitespace()
        .filter(|word| min_len == 0 || word.chars().count() > min_len)
        .map(|word| word.to_lowercase())
        .collect()
}

// ============================================================================
// UPDATE STATISTICS
// ============================================================================

/// Counters reported by tag updates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TagStats {
    /// Tags that did not exist before
    pub created: usize,

    /// Links added to or removed from existing tags
    pub updated: usize,
}

impl TagStats {
    pub fn merge(&mut self, other: TagStats) {
        self.created += other.created;
        self.updated += other.updated;
    }
}

// ============================================================================
// INCREMENTAL UPDATE
// ============================================================================

/// Bring the tags of `e`'s purse in line with `e`'s description.
///
/// Generated expenditures are ignored.
pub fn update_from(conn: &Connection, e: &Expenditure, min_len: usize) -> Result<TagStats> {
    let mut stats = TagStats::default();
    if e.generated {
        return Ok(stats);
    }

    let names = tag_names(&e.description, min_len);

    for name in &names {
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM tags WHERE purse_id = ?1 AND name = ?2",
                params![e.purse_id, name],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            None => {
                conn.execute(
                    "INSERT INTO tags (name, purse_id) VALUES (?1, ?2)",
                    params![name, e.purse_id],
                )?;
                link(conn, conn.last_insert_rowid(), e.id)?;
                stats.created += 1;
            }
            Some(tag_id) => {
                if link(conn, tag_id, e.id)? {
                    stats.updated += 1;
                }
            }
        }
    }

    // Unlink tags whose keyword left the description (or whose purse changed)
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, t.purse_id FROM tags t
         JOIN tag_expenditures te ON te.tag_id = t.id
         WHERE te.expenditure_id = ?1",
    )?;
    let linked = stmt
        .query_map([e.id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for (tag_id, name, purse_id) in linked {
        if purse_id != e.purse_id || !names.contains(&name) {
            conn.execute(
                "DELETE FROM tag_expenditures WHERE tag_id = ?1 AND expenditure_id = ?2",
                params![tag_id, e.id],
            )?;
            stats.updated += 1;
        }
    }

    Ok(stats)
}

/// Returns false when the link already existed
fn link(conn: &Connection, tag_id: i64, expenditure_id: i64) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO tag_expenditures (tag_id, expenditure_id) VALUES (?1, ?2)",
        params![tag_id, expenditure_id],
    )?;
    Ok(inserted > 0)
}

/// Replay `update_from` over every expenditure in creation order
pub fn rebuild_all(conn: &Connection, min_len: usize) -> Result<TagStats> {
    let mut stats = TagStats::default();
    for e in expenditure::all_by_creation(conn)? {
        stats.merge(update_from(conn, &e, min_len)?);
    }
    Ok(stats)
}

// ============================================================================
// QUERIES
// ============================================================================

/// A tag with its weight inside the purse
#[derive(Debug, Clone, Serialize)]
pub struct TagWeight {
    pub id: i64,
    pub name: String,
    pub count: i64,
    pub amount: f64,
}

/// Tags of a purse still linked to at least one expenditure, heaviest
/// first. `name_filter` keeps names containing it (case-insensitive).
pub fn tags_for(
    conn: &Connection,
    purse_id: i64,
    name_filter: Option<&str>,
) -> Result<Vec<TagWeight>> {
    let pattern = name_filter.map(|f| f.to_lowercase()).unwrap_or_default();

    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, COUNT(e.id), COALESCE(SUM(e.amount), 0.0)
         FROM tags t
         JOIN tag_expenditures te ON te.tag_id = t.id
         JOIN expenditures e ON e.id = te.expenditure_id
         WHERE t.purse_id = ?1 AND instr(t.name, ?2) > 0
         GROUP BY t.id, t.name
         ORDER BY COUNT(e.id) DESC, t.name ASC",
    )?;

    let tags = stmt
        .query_map(params![purse_id, pattern], |row| {
            Ok(TagWeight {
                id: row.get(0)?,
                name: row.get(1)?,
                count: row.get(2)?,
                amount: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(tags)
}

/// Sorted names of every tag of a purse
pub fn names_for(conn: &Connection, purse_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM tags WHERE purse_id = ?1 ORDER BY name")?;
    let names = stmt
        .query_map([purse_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
}

// ============================================================================
// TESTS
// ============================================================================
