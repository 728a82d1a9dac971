// 💸 Expenditure Entity - a dated, authored amount belonging to a purse

use crate::error::{Result, TrackerError};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;

// ============================================================================
// EXPENDITURE ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Expenditure {
    pub id: i64,
    pub amount: f64,
    pub date: NaiveDate,
    pub description: String,
    pub author_id: i64,

    /// Author display name (first name, else username)
    pub author: String,

    pub purse_id: i64,

    /// Copy created by a recurrence; never feeds tags
    pub generated: bool,

    pub created: DateTime<Utc>,
}

impl Expenditure {
    /// Editable while no more than `edit_delay_days` whole days have
    /// elapsed since creation
    pub fn is_editable(&self, now: DateTime<Utc>, edit_delay_days: i64) -> bool {
        (now - self.created).num_days() <= edit_delay_days
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Expenditure {
            id: row.get(0)?,
            amount: row.get(1)?,
            date: row.get(2)?,
            description: row.get(3)?,
            author_id: row.get(4)?,
            author: row.get(5)?,
            purse_id: row.get(6)?,
            generated: row.get(7)?,
            created: row.get(8)?,
        })
    }
}

/// Fields of an expenditure about to be stored
#[derive(Debug, Clone)]
pub struct NewExpenditure {
    pub amount: f64,
    pub date: NaiveDate,
    pub description: String,
    pub author_id: i64,
    pub purse_id: i64,
    pub generated: bool,
}

const SELECT_EXPENDITURE: &str = "SELECT e.id, e.amount, e.date, e.description, e.author_id,
        CASE WHEN u.first_name = '' THEN u.username ELSE u.first_name END,
        e.purse_id, e.generated, e.created
    FROM expenditures e JOIN users u ON u.id = e.author_id";

const ORDERING: &str = "ORDER BY e.date DESC, e.created DESC, u.username ASC, e.id DESC";

// ============================================================================
// FILTERING
// ============================================================================

/// Selection of a purse's expenditures: optional date range and
/// description keywords (all must match, case-insensitive)
#[derive(Debug, Clone)]
pub struct ExpenditureFilter {
    pub purse_id: i64,

    /// Inclusive start date
    pub from: Option<NaiveDate>,

    /// Exclusive end date
    pub until: Option<NaiveDate>,

    pub keywords: Vec<String>,

    pub author_id: Option<i64>,
}

impl ExpenditureFilter {
    pub fn purse(purse_id: i64) -> Self {
        ExpenditureFilter {
            purse_id,
            from: None,
            until: None,
            keywords: Vec::new(),
            author_id: None,
        }
    }

    pub fn between(mut self, from: NaiveDate, until: NaiveDate) -> Self {
        self.from = Some(from);
        self.until = Some(until);
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn by_author(mut self, author_id: i64) -> Self {
        self.author_id = Some(author_id);
        self
    }

    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses = vec!["e.purse_id = ?".to_string()];
        let mut values = vec![Value::Integer(self.purse_id)];

        if let Some(from) = self.from {
            clauses.push("e.date >= ?".to_string());
            values.push(Value::Text(from.format("%Y-%m-%d").to_string()));
        }
        if let Some(until) = self.until {
            clauses.push("e.date < ?".to_string());
            values.push(Value::Text(until.format("%Y-%m-%d").to_string()));
        }
        if let Some(author_id) = self.author_id {
            clauses.push("e.author_id = ?".to_string());
            values.push(Value::Integer(author_id));
        }
        for keyword in &self.keywords {
            clauses.push("instr(fold_case(e.description), ?) > 0".to_string());
            values.push(Value::Text(keyword.to_lowercase()));
        }

        (format!("WHERE {}", clauses.join(" AND ")), values)
    }
}

// ============================================================================
// PERSISTENCE
// ============================================================================

pub fn insert(conn: &Connection, new: &NewExpenditure) -> Result<Expenditure> {
    conn.execute(
        "INSERT INTO expenditures (amount, date, description, author_id, purse_id, generated, created)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            new.amount,
            new.date,
            new.description,
            new.author_id,
            new.purse_id,
            new.generated,
            Utc::now(),
        ],
    )?;

    get(conn, conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> Result<Expenditure> {
    let sql = format!("{} WHERE e.id = ?1", SELECT_EXPENDITURE);
    conn.query_row(&sql, [id], Expenditure::from_row)
        .optional()?
        .ok_or(TrackerError::NotFound("Expenditure"))
}

pub fn update(
    conn: &Connection,
    id: i64,
    amount: f64,
    date: NaiveDate,
    description: &str,
    purse_id: i64,
) -> Result<Expenditure> {
    let changed = conn.execute(
        "UPDATE expenditures SET amount = ?1, date = ?2, description = ?3, purse_id = ?4
         WHERE id = ?5",
        params![amount, date, description, purse_id, id],
    )?;
    if changed == 0 {
        return Err(TrackerError::NotFound("Expenditure"));
    }
    get(conn, id)
}

pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM expenditures WHERE id = ?1", [id])?;
    Ok(())
}

/// Filtered expenditures, newest first
pub fn list(
    conn: &Connection,
    filter: &ExpenditureFilter,
    limit: usize,
    offset: usize,
) -> Result<Vec<Expenditure>> {
    let (where_clause, mut values) = filter.where_clause();
    let sql = format!(
        "{} {} {} LIMIT ? OFFSET ?",
        SELECT_EXPENDITURE, where_clause, ORDERING
    );
    values.push(Value::Integer(limit.min(i64::MAX as usize) as i64));
    values.push(Value::Integer(offset as i64));

    let mut stmt = conn.prepare(&sql)?;
    let expenditures = stmt
        .query_map(params_from_iter(values), Expenditure::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(expenditures)
}

pub fn count(conn: &Connection, filter: &ExpenditureFilter) -> Result<usize> {
    let (where_clause, values) = filter.where_clause();
    let sql = format!("SELECT COUNT(*) FROM expenditures e {}", where_clause);
    let count: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
    Ok(count as usize)
}

/// Sum of amounts, `None` when nothing matches
pub fn sum_amounts(conn: &Connection, filter: &ExpenditureFilter) -> Result<Option<f64>> {
    let (where_clause, values) = filter.where_clause();
    let sql = format!("SELECT SUM(e.amount) FROM expenditures e {}", where_clause);
    let total: Option<f64> = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
    Ok(total)
}

/// Every expenditure in creation order (tag rebuild)
pub fn all_by_creation(conn: &Connection) -> Result<Vec<Expenditure>> {
    let sql = format!("{} ORDER BY e.created ASC, e.id ASC", SELECT_EXPENDITURE);
    let mut stmt = conn.prepare(&sql)?;
    let expenditures = stmt
        .query_map([], Expenditure::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(expenditures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::entities::{purse, user};
    use chrono::Duration;

    fn setup() -> (Connection, i64, i64) {
        let conn = open_in_memory().unwrap();
        let author = user::create(
            &conn,
            &user::NewUser {
                username: "test",
                email: "",
                first_name: "",
                last_name: "",
                password_hash: "x",
                is_active: true,
            },
        )
        .unwrap();
        let purse = purse::create(&conn, "test", "", author.id).unwrap();
        (conn, author.id, purse.id)
    }

    fn add(conn: &Connection, author: i64, purse: i64, date: &str, amount: f64, desc: &str) -> Expenditure {
        insert(
            conn,
            &NewExpenditure {
                amount,
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
                description: desc.to_string(),
                author_id: author,
                purse_id: purse,
                generated: false,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_is_editable() {
        let (conn, author, purse) = setup();
        let e = add(&conn, author, purse, "2024-03-10", 100.0, "test");

        assert!(e.is_editable(Utc::now(), 2));
        assert!(e.is_editable(e.created + Duration::days(2) + Duration::hours(23), 2));
        assert!(!e.is_editable(e.created + Duration::days(3), 2));
    }

    #[test]
    fn test_month_range_and_keywords() {
        let (conn, author, purse) = setup();
        add(&conn, author, purse, "2024-02-28", 10.0, "Bread and butter");
        add(&conn, author, purse, "2024-03-01", 20.0, "Fresh bread");
        add(&conn, author, purse, "2024-03-15", 30.0, "Cinema");

        let march = ExpenditureFilter::purse(purse).between(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        );
        assert_eq!(count(&conn, &march).unwrap(), 2);
        assert_eq!(sum_amounts(&conn, &march).unwrap(), Some(50.0));

        let bread = ExpenditureFilter::purse(purse).with_keywords(vec!["BREAD".to_string()]);
        let found = list(&conn, &bread, 10, 0).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].description, "Fresh bread");

        let both = ExpenditureFilter::purse(purse)
            .with_keywords(vec!["bread".to_string(), "butter".to_string()]);
        assert_eq!(count(&conn, &both).unwrap(), 1);
    }

    #[test]
    fn test_keywords_ignore_case_beyond_ascii() {
        let (conn, author, purse) = setup();
        add(&conn, author, purse, "2024-09-02", 120.0, "École fees");
        add(&conn, author, purse, "2024-09-03", 8.5, "Straße café");
        add(&conn, author, purse, "2024-09-04", 3.0, "Bakery");

        for keyword in ["école", "ÉCOLE", "École"] {
            let filter = ExpenditureFilter::purse(purse).with_keywords(vec![keyword.to_string()]);
            let found = list(&conn, &filter, 10, 0).unwrap();
            assert_eq!(found.len(), 1, "keyword {}", keyword);
            assert_eq!(found[0].description, "École fees");
        }

        let cafe = ExpenditureFilter::purse(purse).with_keywords(vec!["CAFÉ".to_string()]);
        assert_eq!(count(&conn, &cafe).unwrap(), 1);
    }

    #[test]
    fn test_sum_of_nothing_is_none() {
        let (conn, _, purse) = setup();
        assert_eq!(sum_amounts(&conn, &ExpenditureFilter::purse(purse)).unwrap(), None);
    }

    #[test]
    fn test_ordering_newest_date_first() {
        let (conn, author, purse) = setup();
        add(&conn, author, purse, "2024-01-01", 1.0, "old");
        add(&conn, author, purse, "2024-06-01", 2.0, "new");

        let all = list(&conn, &ExpenditureFilter::purse(purse), 10, 0).unwrap();
        assert_eq!(all[0].description, "new");
        assert_eq!(all[1].description, "old");
        assert_eq!(all[0].author, "test");
    }
}
